//! Wordlist loading
//!
//! Words come from a file (one entry per line, blanks dropped) or from one
//! of the small built-in lists. When a path does not name a readable file it
//! is retried as a built-in name before the original read error is returned.

use crate::{BurrowError, Result};
use std::fs;
use std::path::Path;

const DEFAULT_WORDLIST: &str = include_str!("wordlists/default.txt");
const SHORT_WORDLIST: &str = include_str!("wordlists/short.txt");

/// Loads a wordlist from a path or built-in name; `None` loads the default
/// built-in list.
pub fn load_wordlist(path: Option<&str>) -> Result<Vec<String>> {
    let Some(path) = path else {
        return load_builtin("default");
    };
    match read_wordlist_file(Path::new(path)) {
        Ok(words) => Ok(words),
        Err(read_err) => match load_builtin(path) {
            Ok(words) => Ok(words),
            Err(_) => Err(read_err),
        },
    }
}

/// Loads a wordlist from a file on disk.
pub fn read_wordlist_file(path: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path)?;
    Ok(parse_wordlist(&contents))
}

/// Loads one of the built-in wordlists by name.
pub fn load_builtin(name: &str) -> Result<Vec<String>> {
    match name {
        "default" => Ok(parse_wordlist(DEFAULT_WORDLIST)),
        "short" => Ok(parse_wordlist(SHORT_WORDLIST)),
        other => Err(BurrowError::Wordlist(format!(
            "no such built-in wordlist: {other}"
        ))),
    }
}

fn parse_wordlist(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
