//! Scan settings
//!
//! [`Settings`] is the resolved configuration for one run: defaults, then
//! values from an optional TOML config file, then command-line flags, in
//! that order of precedence. The CLI layer lives in `main.rs`; this module
//! owns the value types, the file loading, and validation.

use crate::{ConfigError, ConfigResult};
use clap::ValueEnum;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// How the pipeline is wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum RunMode {
    /// Expand a wordlist against the scope roots
    #[default]
    Enumeration,
    /// Cross the scope roots with a host list for vhost discovery
    #[value(name = "dotproduct")]
    DotProduct,
    /// Spider from the roots and validate cross-references
    #[value(name = "linkcheck")]
    LinkCheck,
}

/// How robots.txt is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum RobotsMode {
    /// Don't fetch robots.txt at all
    #[default]
    Ignore,
    /// Treat disallowed paths as exclusions
    Obey,
    /// Enqueue disallowed paths as probe targets
    Seed,
}

/// Output rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Csv,
    Html,
    Diff,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunMode::Enumeration => "enumeration",
            RunMode::DotProduct => "dotproduct",
            RunMode::LinkCheck => "linkcheck",
        };
        f.write_str(name)
    }
}

impl fmt::Display for RobotsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RobotsMode::Ignore => "ignore",
            RobotsMode::Obey => "obey",
            RobotsMode::Seed => "seed",
        };
        f.write_str(name)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Text => "text",
            OutputFormat::Csv => "csv",
            OutputFormat::Html => "html",
            OutputFormat::Diff => "diff",
        };
        f.write_str(name)
    }
}

/// All the knobs for one scan.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Scope roots (also the seed URLs)
    pub urls: Vec<String>,
    pub run_mode: RunMode,
    /// Worker pool size
    pub workers: usize,
    /// Wordlist path or built-in name; `None` for the default built-in
    pub wordlist: Option<String>,
    /// Extensions appended to extensionless paths
    pub extensions: Vec<String>,
    /// Probe backup-filename rewrites
    pub mangle: bool,
    /// Parse HTML responses for links
    pub parse_html: bool,
    /// Add slash-suffixed wordlist variants
    pub add_slashes: bool,
    /// Add case-mangled wordlist variants
    pub mangle_cases: bool,
    /// Excluded URL roots
    pub exclude_paths: Vec<String>,
    /// SOCKS/HTTP proxy URLs
    pub proxies: Vec<String>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Sleep between requests, per worker
    pub sleep_time: Duration,
    /// Channel capacity throughout the pipeline
    pub queue_size: usize,
    pub format: OutputFormat,
    /// Output file; `None` for stdout
    pub output_path: Option<PathBuf>,
    pub include_redirects: bool,
    pub robots_mode: RobotsMode,
    /// Allow http scope roots to cover their https twins
    pub allow_upgrade: bool,
    /// Response codes that keep directory spidering going
    pub spider_codes: Vec<u16>,
    pub http_username: Option<String>,
    pub http_password: Option<String>,
    /// Headers sent with every request, as `Name: value` lines
    pub header: Vec<String>,
    /// Headers tried one at a time, as `Name: value` lines
    pub optional_header: Vec<String>,
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            urls: Vec::new(),
            run_mode: RunMode::default(),
            workers: cpus * 2,
            wordlist: None,
            extensions: ["html", "php", "asp", "aspx"]
                .map(str::to_string)
                .to_vec(),
            mangle: true,
            parse_html: true,
            add_slashes: true,
            mangle_cases: false,
            exclude_paths: Vec::new(),
            proxies: Vec::new(),
            timeout: Duration::from_secs(30),
            sleep_time: Duration::ZERO,
            queue_size: 1024,
            format: OutputFormat::default(),
            output_path: None,
            include_redirects: false,
            robots_mode: RobotsMode::default(),
            allow_upgrade: false,
            spider_codes: vec![200],
            http_username: None,
            http_password: None,
            header: Vec::new(),
            optional_header: Vec::new(),
            user_agent: default_user_agent(),
        }
    }
}

pub fn default_user_agent() -> String {
    format!("burrow/{}", env!("CARGO_PKG_VERSION"))
}

impl Settings {
    /// Checks the settings are runnable.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.urls.is_empty() {
            return Err(ConfigError::MissingScope);
        }
        Ok(())
    }

    /// Parses the scope roots. The url crate normalizes an empty path to `/`
    /// for http(s) URLs, which is exactly the invariant the scope test
    /// needs.
    pub fn scopes(&self) -> ConfigResult<Vec<Url>> {
        let mut scopes = Vec::with_capacity(self.urls.len());
        for raw in &self.urls {
            let url = Url::parse(raw).map_err(|err| ConfigError::InvalidScope {
                url: raw.clone(),
                message: err.to_string(),
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ConfigError::InvalidScope {
                    url: raw.clone(),
                    message: format!("unsupported scheme {}", url.scheme()),
                });
            }
            tracing::debug!("added scope root: {url}");
            scopes.push(url);
        }
        Ok(scopes)
    }

    /// The header map sent with every request.
    pub fn default_header(&self) -> ConfigResult<HeaderMap> {
        parse_header_lines(&self.header)
    }

    /// The optional headers tried one at a time by the header expander.
    pub fn optional_header_map(&self) -> ConfigResult<HeaderMap> {
        parse_header_lines(&self.optional_header)
    }

    /// Overlays values from a config file. Only keys present in the file are
    /// applied; CLI flags are applied after this and win.
    pub fn apply_file(&mut self, file: &FileConfig) {
        if let Some(wordlist) = &file.wordlist {
            self.wordlist = Some(wordlist.clone());
        }
        if let Some(workers) = file.workers {
            self.workers = workers;
        }
        if let Some(seconds) = file.timeout {
            self.timeout = Duration::from_secs(seconds);
        }
        if let Some(user_agent) = &file.user_agent {
            self.user_agent = user_agent.clone();
        }
        if let Some(extensions) = &file.extensions {
            self.extensions = extensions.clone();
        }
        if let Some(spider_codes) = &file.spider_codes {
            self.spider_codes = spider_codes.clone();
        }
    }
}

/// Parses `Name: value` lines into a header map.
pub fn parse_header_lines(lines: &[String]) -> ConfigResult<HeaderMap> {
    let mut map = HeaderMap::new();
    for line in lines {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| ConfigError::InvalidHeader(line.clone()))?;
        let name: HeaderName = name
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidHeader(line.clone()))?;
        let value: HeaderValue = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidHeader(line.clone()))?;
        map.append(name, value);
    }
    Ok(map)
}

/// The subset of settings a config file may provide.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub wordlist: Option<String>,
    pub workers: Option<usize>,
    /// Seconds
    pub timeout: Option<u64>,
    #[serde(rename = "user-agent")]
    pub user_agent: Option<String>,
    pub extensions: Option<Vec<String>>,
    #[serde(rename = "spider-codes")]
    pub spider_codes: Option<Vec<u16>>,
}

/// Loads a config file from an explicit path.
pub fn load_config_file(path: &Path) -> ConfigResult<FileConfig> {
    let contents = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&contents)?)
}

/// The default config file search order.
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(home) = std::env::var("HOME") {
        paths.push(Path::new(&home).join(".config").join("burrow.conf"));
    }
    paths.push(PathBuf::from("/etc/burrow.conf"));
    paths
}

/// Loads the first config file found in the default search paths, if any.
pub fn load_default_config_file() -> ConfigResult<Option<FileConfig>> {
    for path in default_config_paths() {
        if path.is_file() {
            tracing::debug!("loading config file {}", path.display());
            return load_config_file(&path).map(Some);
        }
    }
    Ok(None)
}
