//! The unit of work flowing through the pipeline
//!
//! A [`Task`] is a request intent: the URL to probe, an optional override for
//! the HTTP `Host` header (virtual-host discovery), and the full header map
//! to send. Expanders derive new tasks by cloning; the clone is deep (the
//! header map owns its values), so a task is never mutated once enqueued.

use reqwest::header::HeaderMap;
use std::fmt;
use url::Url;

/// A single request intent.
#[derive(Debug, Clone)]
pub struct Task {
    /// Target URL
    pub url: Url,

    /// Override for the HTTP `Host` header; `None` means use `url.host`
    pub host: Option<String>,

    /// Headers to send with the request
    pub header: HeaderMap,
}

impl Task {
    /// Creates a task for a URL, seeded with the given default header map.
    pub fn from_url(url: Url, default_header: &HeaderMap) -> Self {
        Self {
            url,
            host: None,
            header: default_header.clone(),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.host {
            Some(host) => write!(f, "{} ({})", self.url, host),
            None => write!(f, "{}", self.url),
        }
    }
}
