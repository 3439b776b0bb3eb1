//! Extension expansion
//!
//! Appends `.ext` derivatives to paths that carry no extension yet.
//! Directory URLs and URLs that already have an extension pass through
//! untouched, with no derivatives and nothing added to the work count.

use crate::scope::{url_has_extension, url_is_dir};
use crate::task::Task;
use crate::workqueue::WorkCounter;
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct ExtensionExpander {
    extensions: Vec<String>,
    queue_size: usize,
    counter: Arc<WorkCounter>,
}

impl ExtensionExpander {
    pub fn new(extensions: Vec<String>, queue_size: usize, counter: Arc<WorkCounter>) -> Self {
        Self {
            extensions,
            queue_size,
            counter,
        }
    }

    /// Spawns the expansion stage.
    pub fn expand(self, mut src: mpsc::Receiver<Task>) -> mpsc::Receiver<Task> {
        let (tx, out) = mpsc::channel(self.queue_size);
        tokio::spawn(async move {
            while let Some(task) = src.recv().await {
                if url_has_extension(&task.url) || url_is_dir(&task.url) {
                    if tx.send(task).await.is_err() {
                        return;
                    }
                    continue;
                }
                // Announce before forwarding; see WordlistExpander.
                self.counter.add(self.extensions.len() as i64);
                if tx.send(task.clone()).await.is_err() {
                    self.counter.done(self.extensions.len() as i64);
                    return;
                }
                for (i, ext) in self.extensions.iter().enumerate() {
                    let mut derived = task.clone();
                    let path = format!("{}.{}", task.url.path(), ext);
                    derived.url.set_path(&path);
                    if tx.send(derived).await.is_err() {
                        self.counter.done((self.extensions.len() - i) as i64);
                        return;
                    }
                }
            }
        });
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;
    use url::Url;

    fn task(s: &str) -> Task {
        Task::from_url(Url::parse(s).unwrap(), &HeaderMap::new())
    }

    async fn expand_one(input: &str) -> Vec<String> {
        let counter = Arc::new(WorkCounter::new());
        counter.add(1);
        let e = ExtensionExpander::new(
            vec!["html".to_string(), "php".to_string()],
            16,
            counter,
        );
        let (tx, rx) = mpsc::channel(16);
        let mut out = e.expand(rx);
        tx.send(task(input)).await.unwrap();
        drop(tx);

        let mut paths = Vec::new();
        while let Some(task) = out.recv().await {
            paths.push(task.url.path().to_string());
        }
        paths
    }

    #[tokio::test]
    async fn test_plain_path_gets_derivatives() {
        assert_eq!(
            expand_one("http://x/foo").await,
            vec!["/foo", "/foo.html", "/foo.php"]
        );
    }

    #[tokio::test]
    async fn test_existing_extension_skipped() {
        assert_eq!(expand_one("http://x/foo.html").await, vec!["/foo.html"]);
    }

    #[tokio::test]
    async fn test_directory_skipped() {
        assert_eq!(expand_one("http://x/foo/").await, vec!["/foo/"]);
    }

    #[tokio::test]
    async fn test_count_only_added_for_expanded_tasks() {
        let counter = Arc::new(WorkCounter::new());
        counter.add(2);
        let e = ExtensionExpander::new(vec!["html".to_string()], 16, counter.clone());
        let (tx, rx) = mpsc::channel(16);
        let mut out = e.expand(rx);
        tx.send(task("http://x/dir/")).await.unwrap();
        tx.send(task("http://x/file")).await.unwrap();
        drop(tx);
        let mut n = 0;
        while out.recv().await.is_some() {
            n += 1;
        }
        assert_eq!(n, 3);
        // One derivative announced for /file, none for /dir/.
        assert_eq!(counter.counts(), (0, 3));
    }
}
