//! Host-list expansion for virtual-host discovery
//!
//! Crosses each incoming task with the configured host list: the original is
//! forwarded, then one copy per host with only the `Host` override swapped.

use crate::task::Task;
use crate::workqueue::WorkCounter;
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct DotProductExpander {
    hostlist: Vec<String>,
    queue_size: usize,
    counter: Arc<WorkCounter>,
}

impl DotProductExpander {
    pub fn new(hostlist: Vec<String>, queue_size: usize, counter: Arc<WorkCounter>) -> Self {
        Self {
            hostlist,
            queue_size,
            counter,
        }
    }

    /// Spawns the expansion stage.
    pub fn expand(self, mut src: mpsc::Receiver<Task>) -> mpsc::Receiver<Task> {
        let (tx, out) = mpsc::channel(self.queue_size);
        tokio::spawn(async move {
            while let Some(task) = src.recv().await {
                // Announce before forwarding; see WordlistExpander.
                self.counter.add(self.hostlist.len() as i64);
                if tx.send(task.clone()).await.is_err() {
                    self.counter.done(self.hostlist.len() as i64);
                    return;
                }
                for (i, host) in self.hostlist.iter().enumerate() {
                    let mut derived = task.clone();
                    derived.host = Some(host.clone());
                    if tx.send(derived).await.is_err() {
                        self.counter.done((self.hostlist.len() - i) as i64);
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

    #[tokio::test]
    async fn test_expands_across_hosts() {
        let counter = Arc::new(WorkCounter::new());
        counter.add(1);
        let e = DotProductExpander::new(
            vec!["a.example".to_string(), "b.example".to_string()],
            16,
            counter.clone(),
        );
        let (tx, rx) = mpsc::channel(16);
        let mut out = e.expand(rx);
        let task = Task::from_url(Url::parse("http://x/").unwrap(), &HeaderMap::new());
        tx.send(task).await.unwrap();
        drop(tx);

        let mut hosts = Vec::new();
        while let Some(task) = out.recv().await {
            assert_eq!(task.url.as_str(), "http://x/");
            hosts.push(task.host);
        }
        assert_eq!(
            hosts,
            vec![
                None,
                Some("a.example".to_string()),
                Some("b.example".to_string())
            ]
        );
        assert_eq!(counter.counts(), (0, 3));
    }
}
