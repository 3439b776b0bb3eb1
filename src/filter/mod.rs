//! Dedup and exclusion filtering, plus the streaming expanders
//!
//! The [`WorkFilter`] is the last stage before the workers: it guarantees a
//! given task string is tested at most once per run and drops anything under
//! an excluded path (configured or learned from robots.txt). Rejected tasks
//! are still counted as finished so the pipeline can terminate.

mod dotproduct;
mod extension;
mod header;
mod wordlist;

pub use dotproduct::DotProductExpander;
pub use extension::ExtensionExpander;
pub use header::HeaderExpander;
pub use wordlist::{extend_url, WordlistExpander};

use crate::client::ClientFactory;
use crate::robots;
use crate::scope::url_is_subpath;
use crate::task::Task;
use crate::workqueue::WorkCounter;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use url::Url;

/// Rejects tasks that were already seen or fall under an excluded path.
pub struct WorkFilter {
    exclusions: Vec<Url>,
    user_agent: String,
    queue_size: usize,
    counter: Arc<WorkCounter>,
}

impl WorkFilter {
    /// Builds the filter from the configured exclusion URLs; entries that do
    /// not parse as absolute URLs are logged and dropped.
    pub fn new(
        exclude_paths: &[String],
        user_agent: &str,
        queue_size: usize,
        counter: Arc<WorkCounter>,
    ) -> Self {
        let mut filter = Self {
            exclusions: Vec::with_capacity(exclude_paths.len()),
            user_agent: user_agent.to_string(),
            queue_size,
            counter,
        };
        for path in exclude_paths {
            match Url::parse(path) {
                Ok(url) => filter.filter_url(url),
                Err(err) => {
                    tracing::error!("unable to parse exclusion path {path}: {err}");
                }
            }
        }
        filter
    }

    /// Adds one more excluded root.
    pub fn filter_url(&mut self, url: Url) {
        self.exclusions.push(url);
    }

    /// Fetches robots.txt for each scope root and excludes every path
    /// disallowed for our user agent.
    pub async fn add_robots_filter<F: ClientFactory>(&mut self, scope: &[Url], factory: &F) {
        for root in scope {
            tracing::debug!("getting robots.txt exclusions for {root}");
            match robots::fetch_for_url(root, factory).await {
                Ok(data) => {
                    for disallowed in data.for_user_agent(&self.user_agent) {
                        let mut url = root.clone();
                        url.set_path(&disallowed);
                        tracing::debug!("disallowing URL by robots: {url}");
                        self.filter_url(url);
                    }
                }
                Err(err) => {
                    tracing::warn!("unable to get robots.txt data: {err}");
                }
            }
        }
    }

    /// Spawns the filter stage over a channel of tasks.
    pub fn run_filter(self, mut src: mpsc::Receiver<Task>) -> mpsc::Receiver<Task> {
        let (tx, out) = mpsc::channel(self.queue_size);
        tokio::spawn(async move {
            let mut seen: HashSet<String> = HashSet::new();
            'task: while let Some(task) = src.recv().await {
                if !seen.insert(task.to_string()) {
                    self.reject(&task, "already done");
                    continue;
                }
                for exclusion in &self.exclusions {
                    if url_is_subpath(exclusion, &task.url) {
                        self.reject(&task, "excluded");
                        continue 'task;
                    }
                }
                if tx.send(task).await.is_err() {
                    return;
                }
            }
        });
        out
    }

    fn reject(&self, task: &Task, reason: &str) {
        tracing::debug!("filter rejected {task}: {reason}");
        self.counter.done(1);
    }
}
