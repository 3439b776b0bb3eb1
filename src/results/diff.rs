//! Baseline-diff output
//!
//! Results are partitioned by result group (the URL host). Each group may
//! carry a baseline computed from a sample of responses; only results that
//! differ from their baseline on a significant field are retained and
//! written out when the stream closes.

use super::{log_write_error, ResultsManager, ScanResult, SinkWriter};
use crate::{BurrowError, Result};
use std::collections::HashMap;
use std::io::Write;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Response headers that never distinguish anything.
const NEVER_IMPORTANT: [&str; 2] = ["etag", "cache-control"];

/// A sampled result plus the fields that proved stable across the sample.
#[derive(Debug, Clone)]
pub struct BaselineResult {
    pub result: ScanResult,
    pub path_significant: bool,
    pub headers_significant: Vec<String>,
    pub code_significant: bool,
}

impl BaselineResult {
    /// Derives a baseline from one or more sampled results: a field is
    /// significant when every sample agrees on it.
    pub fn new(samples: &[ScanResult]) -> Result<Self> {
        let first = samples
            .first()
            .ok_or_else(|| BurrowError::Output("need at least one result".to_string()))?;

        let mut baseline = Self {
            result: first.clone(),
            path_significant: true,
            headers_significant: Vec::new(),
            code_significant: true,
        };

        for pair in samples.windows(2) {
            if pair[0].code != pair[1].code {
                baseline.code_significant = false;
            }
            if pair[0].url.path() != pair[1].url.path() {
                baseline.path_significant = false;
            }
        }

        for key in first.response_header.keys() {
            let name = key.as_str().to_lowercase();
            if NEVER_IMPORTANT.contains(&name.as_str()) {
                continue;
            }
            let reference = first.response_header.get(key);
            let stable = samples[1..]
                .iter()
                .all(|sample| sample.response_header.get(key) == reference);
            if stable {
                baseline.headers_significant.push(name);
            }
        }

        Ok(baseline)
    }

    /// Returns true when `other` agrees with the baseline on every
    /// significant field.
    pub fn matches(&self, other: &ScanResult) -> bool {
        if self.path_significant && self.result.url.path() != other.url.path() {
            return false;
        }
        if self.code_significant && self.result.code != other.code {
            return false;
        }
        for name in &self.headers_significant {
            if self.result.response_header.get(name.as_str())
                != other.response_header.get(name.as_str())
            {
                return false;
            }
        }
        true
    }
}

pub struct DiffResults {
    writer: SinkWriter,
    baselines: HashMap<String, BaselineResult>,
}

impl DiffResults {
    pub fn new(writer: SinkWriter) -> Self {
        Self {
            writer,
            baselines: HashMap::new(),
        }
    }

    /// Registers a baseline for the sample's result group.
    pub fn add_group(&mut self, samples: &[ScanResult]) -> Result<()> {
        let baseline = BaselineResult::new(samples)?;
        self.baselines
            .insert(baseline.result.result_group.clone(), baseline);
        Ok(())
    }
}

impl ResultsManager for DiffResults {
    fn run(mut self: Box<Self>, mut rx: mpsc::Receiver<ScanResult>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut keep: HashMap<String, Vec<ScanResult>> = HashMap::new();
            while let Some(result) = rx.recv().await {
                let retain = match self.baselines.get(&result.result_group) {
                    None => true,
                    Some(baseline) => !baseline.matches(&result),
                };
                if retain {
                    keep.entry(result.result_group.clone()).or_default().push(result);
                }
            }

            let mut groups: Vec<&String> = keep.keys().collect();
            groups.sort();
            for group in groups {
                if let Err(err) = writeln!(self.writer, "Group: {group}") {
                    log_write_error(err);
                }
                for result in &keep[group] {
                    let host = result.host.as_deref().unwrap_or("");
                    if let Err(err) =
                        writeln!(self.writer, "\t{}\t{}\t{}", result.url, host, result.code)
                    {
                        log_write_error(err);
                    }
                }
                if let Err(err) = writeln!(self.writer) {
                    log_write_error(err);
                }
            }
            if let Err(err) = self.writer.flush() {
                log_write_error(err);
            }
        })
    }
}
