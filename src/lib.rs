//! Burrow: a concurrent web content discovery engine
//!
//! This crate implements the pipeline behind the `burrow` binary: a bounded
//! work queue fed by streaming expanders, guarded by scope and dedup filters,
//! drained by a pool of HTTP workers whose findings (spidered links,
//! redirects) feed back into the queue until all inflight work completes.

pub mod client;
pub mod config;
pub mod engine;
pub mod filter;
pub mod results;
pub mod robots;
pub mod scope;
pub mod task;
pub mod wordlist;
pub mod worker;
pub mod workqueue;

use thiserror::Error;

/// Main error type for burrow operations
#[derive(Debug, Error)]
pub enum BurrowError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error for {url}: {source}")]
    Transport { url: String, source: reqwest::Error },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Wordlist error: {0}")]
    Wordlist(String),

    #[error("Robots.txt error for {url}: {message}")]
    Robots { url: String, message: String },

    #[error("Output error: {0}")]
    Output(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("At least one URL is required")]
    MissingScope,

    #[error("Invalid scope URL {url}: {message}")]
    InvalidScope { url: String, message: String },

    #[error("Invalid proxy URL: {0}")]
    InvalidProxy(String),

    #[error("Unsupported proxy protocol: {0}")]
    UnsupportedProxy(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

/// Result type alias for burrow operations
pub type Result<T> = std::result::Result<T, BurrowError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{RobotsMode, RunMode, Settings};
pub use results::{LinkType, ScanResult};
pub use task::Task;
