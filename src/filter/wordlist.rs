//! Wordlist expansion
//!
//! For every task that passes through, the expander forwards the original
//! and then one derivative per wordlist entry, appended to the task's path.
//! Preprocessing can add case variants and directory (slash-suffixed)
//! siblings; entries containing a `.` are treated as filenames and never get
//! a slash sibling.

use crate::scope::{dedupe_strings, url_is_dir};
use crate::task::Task;
use crate::workqueue::WorkCounter;
use std::sync::Arc;
use tokio::sync::mpsc;
use url::Url;

pub struct WordlistExpander {
    wordlist: Vec<String>,
    add_slashes: bool,
    mangle_cases: bool,
    queue_size: usize,
    counter: Arc<WorkCounter>,
}

impl WordlistExpander {
    pub fn new(
        wordlist: Vec<String>,
        add_slashes: bool,
        mangle_cases: bool,
        queue_size: usize,
        counter: Arc<WorkCounter>,
    ) -> Self {
        Self {
            wordlist,
            add_slashes,
            mangle_cases,
            queue_size,
            counter,
        }
    }

    /// Applies case mangling and slash-suffixing, then dedupes. The result
    /// is a fixed point: processing an already-processed list changes
    /// nothing.
    pub fn process_wordlist(&mut self) {
        let mut list = self.wordlist.clone();
        if self.mangle_cases {
            for word in &self.wordlist {
                list.push(word.to_lowercase());
                list.push(word.to_uppercase());
                list.push(title_case(word));
            }
        }
        if self.add_slashes {
            for word in list.clone() {
                if word.contains('.') || word.ends_with('/') {
                    continue;
                }
                list.push(format!("{word}/"));
            }
        }
        self.wordlist = dedupe_strings(list);
    }

    pub fn wordlist(&self) -> &[String] {
        &self.wordlist
    }

    /// Spawns the expansion stage.
    pub fn expand(self, mut src: mpsc::Receiver<Task>) -> mpsc::Receiver<Task> {
        let (tx, out) = mpsc::channel(self.queue_size);
        tokio::spawn(async move {
            while let Some(task) = src.recv().await {
                // Announce the derivatives before anything can be consumed,
                // or a fast worker could equalize the counter mid-expansion.
                self.counter.add(self.wordlist.len() as i64);
                if tx.send(task.clone()).await.is_err() {
                    self.counter.done(self.wordlist.len() as i64);
                    return;
                }
                for (i, word) in self.wordlist.iter().enumerate() {
                    let mut derived = task.clone();
                    derived.url = extend_url(&task.url, word);
                    if tx.send(derived).await.is_err() {
                        self.counter.done((self.wordlist.len() - i) as i64);
                        return;
                    }
                }
            }
        });
        out
    }
}

/// Appends `tail` to a URL path, inserting a `/` unless the path already
/// names a directory.
pub fn extend_url(url: &Url, tail: &str) -> Url {
    let mut extended = url.clone();
    let path = url.path();
    if url_is_dir(url) {
        extended.set_path(&format!("{path}{tail}"));
    } else {
        extended.set_path(&format!("{path}/{tail}"));
    }
    extended
}

/// Uppercases the first letter of each whitespace-separated word and
/// lowercases the rest.
fn title_case(input: &str) -> String {
    input
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;
    use std::collections::HashSet;

    fn u(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn expander(words: &[&str], slashes: bool, cases: bool) -> WordlistExpander {
        WordlistExpander::new(
            words.iter().map(|w| w.to_string()).collect(),
            slashes,
            cases,
            16,
            Arc::new(WorkCounter::new()),
        )
    }

    #[test]
    fn test_extend_url_file_and_dir() {
        assert_eq!(extend_url(&u("http://x/base"), "w").path(), "/base/w");
        assert_eq!(extend_url(&u("http://x/base/"), "w").path(), "/base/w");
        assert_eq!(extend_url(&u("http://x/"), "w").path(), "/w");
    }

    #[test]
    fn test_process_adds_slashes() {
        let mut e = expander(&["word", "file.txt", "dir/"], true, false);
        e.process_wordlist();
        let words: HashSet<&str> = e.wordlist().iter().map(String::as_str).collect();
        assert!(words.contains("word"));
        assert!(words.contains("word/"));
        assert!(words.contains("file.txt"));
        assert!(!words.contains("file.txt/"));
        assert!(words.contains("dir/"));
        assert!(!words.contains("dir//"));
    }

    #[test]
    fn test_process_mangles_cases() {
        let mut e = expander(&["aDmIn"], false, true);
        e.process_wordlist();
        let words: HashSet<&str> = e.wordlist().iter().map(String::as_str).collect();
        assert!(words.contains("aDmIn"));
        assert!(words.contains("admin"));
        assert!(words.contains("ADMIN"));
        assert!(words.contains("Admin"));
    }

    #[test]
    fn test_process_is_idempotent() {
        let mut once = expander(&["aDmIn", "file.txt", "img"], true, true);
        once.process_wordlist();
        let first: HashSet<String> = once.wordlist().iter().cloned().collect();

        let mut twice = WordlistExpander::new(
            once.wordlist().to_vec(),
            true,
            true,
            16,
            Arc::new(WorkCounter::new()),
        );
        twice.process_wordlist();
        let second: HashSet<String> = twice.wordlist().iter().cloned().collect();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_expand_forwards_original_then_derivatives() {
        let counter = Arc::new(WorkCounter::new());
        counter.add(1);
        let e = WordlistExpander::new(
            vec!["a".to_string(), "b".to_string()],
            false,
            false,
            16,
            counter.clone(),
        );

        let (tx, rx) = mpsc::channel(16);
        let mut out = e.expand(rx);
        tx.send(Task::from_url(u("http://x/base"), &HeaderMap::new()))
            .await
            .unwrap();
        drop(tx);

        let paths: Vec<String> = {
            let mut v = Vec::new();
            while let Some(task) = out.recv().await {
                v.push(task.url.path().to_string());
            }
            v
        };
        assert_eq!(paths, vec!["/base", "/base/a", "/base/b"]);
        assert_eq!(counter.counts(), (0, 3));
    }
}
