//! Broken-link reporting
//!
//! Accumulates every result, then cross-references each page's outbound
//! links against the probed set. A link counts as broken only when its
//! target was actually probed and answered with a 4xx/5xx; targets we never
//! probed are not judged.

use super::{html_escape, log_write_error, ResultsManager, ScanResult, SinkWriter};
use crate::config::OutputFormat;
use crate::{BurrowError, Result};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct LinkCheckResults {
    writer: LinkCheckWriter,
    base_url: String,
}

impl LinkCheckResults {
    /// The `text` format is promoted to CSV; `diff` has no link-check
    /// rendering.
    pub fn new(writer: SinkWriter, format: OutputFormat, base_url: &str) -> Result<Self> {
        let writer = match format {
            OutputFormat::Text | OutputFormat::Csv => {
                LinkCheckWriter::Csv(csv::Writer::from_writer(writer))
            }
            OutputFormat::Html => LinkCheckWriter::Html(writer),
            OutputFormat::Diff => {
                return Err(BurrowError::Output(
                    "diff format has no link-check rendering".to_string(),
                ))
            }
        };
        Ok(Self {
            writer,
            base_url: base_url.to_string(),
        })
    }
}

fn code_is_broken(code: u16) -> bool {
    code >= 400
}

impl ResultsManager for LinkCheckResults {
    fn run(mut self: Box<Self>, mut rx: mpsc::Receiver<ScanResult>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut res_map: HashMap<String, ScanResult> = HashMap::new();
            while let Some(result) = rx.recv().await {
                res_map.insert(result.url.to_string(), result);
            }

            let mut keys: Vec<&String> = res_map.keys().collect();
            keys.sort();

            self.writer.write_header(&self.base_url);
            let mut count = 0;
            for key in keys {
                let result = &res_map[key];
                let mut links: Vec<&String> = result.links.keys().collect();
                links.sort();
                let mut group_written = false;
                for link in links {
                    let broken = res_map
                        .get(link)
                        .map(|target| code_is_broken(target.code))
                        .unwrap_or(false);
                    if !broken {
                        continue;
                    }
                    if !group_written {
                        group_written = true;
                        self.writer.write_group(key);
                    }
                    self.writer
                        .write_broken_link(key, link, result.links[link].as_str());
                    count += 1;
                }
            }
            self.writer.write_footer(count);
            self.writer.flush();
        })
    }
}

enum LinkCheckWriter {
    Csv(csv::Writer<SinkWriter>),
    Html(SinkWriter),
}

impl LinkCheckWriter {
    fn write_header(&mut self, base_url: &str) {
        match self {
            LinkCheckWriter::Csv(writer) => {
                if let Err(err) = writer.write_record(["Source URL", "Destination URL", "Type"]) {
                    tracing::warn!("error writing results: {err}");
                }
            }
            LinkCheckWriter::Html(writer) => {
                let base = html_escape(base_url);
                let header = format!(
                    "<html><head><title>burrow: link check for {base}</title></head><body>\
                     <h1>burrow: link check for {base}</h1><table>\n"
                );
                if let Err(err) = writer.write_all(header.as_bytes()) {
                    log_write_error(err);
                }
            }
        }
    }

    fn write_group(&mut self, source: &str) {
        match self {
            LinkCheckWriter::Csv(_) => {}
            LinkCheckWriter::Html(writer) => {
                let source = html_escape(source);
                let row = format!(
                    "<tr class='source'><td colspan='2'><a href='{source}'>{source}</a></td></tr>\n"
                );
                if let Err(err) = writer.write_all(row.as_bytes()) {
                    log_write_error(err);
                }
            }
        }
    }

    fn write_broken_link(&mut self, source: &str, dest: &str, link_type: &str) {
        match self {
            LinkCheckWriter::Csv(writer) => {
                if let Err(err) = writer.write_record([source, dest, link_type]) {
                    tracing::warn!("error writing results: {err}");
                }
            }
            LinkCheckWriter::Html(writer) => {
                let dest = html_escape(dest);
                let row = format!(
                    "<tr class='broken'><td><a href='{dest}'>{dest}</a></td><td>{link_type}</td></tr>\n"
                );
                if let Err(err) = writer.write_all(row.as_bytes()) {
                    log_write_error(err);
                }
            }
        }
    }

    fn write_footer(&mut self, count: usize) {
        match self {
            LinkCheckWriter::Csv(_) => {}
            LinkCheckWriter::Html(writer) => {
                let footer = format!(
                    "</table><p>Total Broken Links Found: <b>{count}</b></p></body></html>\n"
                );
                if let Err(err) = writer.write_all(footer.as_bytes()) {
                    log_write_error(err);
                }
            }
        }
    }

    fn flush(&mut self) {
        let flushed = match self {
            LinkCheckWriter::Csv(writer) => writer.flush(),
            LinkCheckWriter::Html(writer) => writer.flush(),
        };
        if let Err(err) = flushed {
            log_write_error(err);
        }
    }
}
