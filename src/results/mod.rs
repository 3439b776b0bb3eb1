//! Result model and output sinks
//!
//! Every probe emits one [`ScanResult`]; a sink consumes the result channel
//! until it closes and renders to its writer. Codes that carry no signal for
//! enumeration (404 and friends) are filtered out by the sinks, not by the
//! workers, so every sink sees the full stream.

mod csv_sink;
mod diff;
mod html;
mod linkcheck;
mod plain;

pub use csv_sink::CsvResults;
pub use diff::{BaselineResult, DiffResults};
pub use html::HtmlResults;
pub use linkcheck::LinkCheckResults;
pub use plain::PlainResults;

use crate::config::{OutputFormat, RunMode, Settings};
use crate::task::Task;
use crate::Result;
use reqwest::header::HeaderMap;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Write;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

/// Where a link was found in a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    Href,
    Img,
    Script,
    Style,
}

impl LinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::Href => "href",
            LinkType::Img => "img",
            LinkType::Script => "script",
            LinkType::Style => "style",
        }
    }
}

/// The outcome of a single probe.
#[derive(Debug, Clone)]
pub struct ScanResult {
    /// URL of the probed resource
    pub url: Url,
    /// Host header override, if different from the URL host
    pub host: Option<String>,
    /// HTTP status code; 0 when the request never completed
    pub code: u16,
    /// Transport error, if one occurred
    pub error: Option<String>,
    /// Trapped redirect target
    pub redirect: Option<Url>,
    /// Content length, -1 if unknown
    pub length: i64,
    /// Content-Type header value
    pub content_type: String,
    /// Headers sent with the request
    pub request_header: HeaderMap,
    /// Headers received in the response
    pub response_header: HeaderMap,
    /// Bucket key for the diff sink (the URL host)
    pub result_group: String,
    /// Links extracted from the body, keyed by resolved URL string
    pub links: HashMap<String, LinkType>,
}

impl ScanResult {
    /// Creates an empty result for a task; the probe fills in the rest.
    pub fn for_task(task: &Task) -> Self {
        Self {
            url: task.url.clone(),
            host: task.host.clone(),
            code: 0,
            error: None,
            redirect: None,
            length: -1,
            content_type: String::new(),
            request_header: task.header.clone(),
            response_header: HeaderMap::new(),
            result_group: task.url.host_str().unwrap_or("").to_string(),
            links: HashMap::new(),
        }
    }

    pub fn add_link(&mut self, url: &Url, link_type: LinkType) {
        self.links.insert(url.to_string(), link_type);
    }
}

impl fmt::Display for ScanResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.host {
            Some(host) => write!(f, "{} ({}): {}", self.url, host, self.code),
            None => write!(f, "{}: {}", self.url, self.code),
        }
    }
}

/// Returns true if this status code is a finding worth reporting.
pub fn found_something(code: u16) -> bool {
    !matches!(code, 0 | 404 | 410 | 502 | 503 | 504)
}

/// Returns true if this result should be included in reports.
pub fn report_result(result: &ScanResult) -> bool {
    result.error.is_none() && found_something(result.code)
}

/// A sink that consumes the result channel until it closes.
pub trait ResultsManager: Send {
    /// Spawns the sink loop; the handle resolves after the channel closes
    /// and the output is flushed.
    fn run(self: Box<Self>, rx: mpsc::Receiver<ScanResult>) -> JoinHandle<()>;
}

/// Writer destination shared by all sinks.
pub type SinkWriter = Box<dyn Write + Send>;

/// Builds the sink selected by the settings, writing to the configured
/// output file or stdout.
pub fn results_manager(settings: &Settings) -> Result<Box<dyn ResultsManager>> {
    let writer: SinkWriter = match &settings.output_path {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(std::io::stdout()),
    };
    let base_url = settings.urls.first().cloned().unwrap_or_default();

    if settings.run_mode == RunMode::LinkCheck {
        let sink = LinkCheckResults::new(writer, settings.format, &base_url)?;
        return Ok(Box::new(sink));
    }

    match settings.format {
        OutputFormat::Text => Ok(Box::new(PlainResults::new(
            writer,
            settings.include_redirects,
        ))),
        OutputFormat::Csv => Ok(Box::new(CsvResults::new(writer))),
        OutputFormat::Html => Ok(Box::new(HtmlResults::new(writer, &base_url))),
        OutputFormat::Diff => Ok(Box::new(DiffResults::new(writer))),
    }
}

pub(crate) fn log_write_error(err: std::io::Error) {
    tracing::warn!("error writing results: {err}");
}

/// Minimal HTML attribute/text escaping for report output.
pub(crate) fn html_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;

    fn result(code: u16) -> ScanResult {
        let task = Task::from_url(Url::parse("http://x/a").unwrap(), &HeaderMap::new());
        let mut r = ScanResult::for_task(&task);
        r.code = code;
        r
    }

    #[test]
    fn test_found_something() {
        assert!(found_something(200));
        assert!(found_something(301));
        assert!(found_something(403));
        assert!(found_something(500));
        for code in [0, 404, 410, 502, 503, 504] {
            assert!(!found_something(code));
        }
    }

    #[test]
    fn test_report_result_requires_no_error() {
        let mut r = result(200);
        assert!(report_result(&r));
        r.error = Some("connection refused".to_string());
        assert!(!report_result(&r));
    }

    #[test]
    fn test_result_group_is_host() {
        assert_eq!(result(200).result_group, "x");
    }

    #[test]
    fn test_display() {
        let mut r = result(200);
        assert_eq!(r.to_string(), "http://x/a: 200");
        r.host = Some("v.example".to_string());
        assert_eq!(r.to_string(), "http://x/a (v.example): 200");
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("a<b>&\"c\"'d'"), "a&lt;b&gt;&amp;&quot;c&quot;&#39;d&#39;");
    }
}
