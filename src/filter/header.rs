//! Optional-header expansion
//!
//! For each `(name, value)` pair in the optional header table, emits a copy
//! of the task with that single pair set (overwriting any existing value for
//! the name). The original task keeps its headers untouched.

use crate::task::Task;
use crate::workqueue::WorkCounter;
use reqwest::header::HeaderMap;
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct HeaderExpander {
    header: HeaderMap,
    queue_size: usize,
    counter: Arc<WorkCounter>,
}

impl HeaderExpander {
    pub fn new(header: HeaderMap, queue_size: usize, counter: Arc<WorkCounter>) -> Self {
        Self {
            header,
            queue_size,
            counter,
        }
    }

    /// Spawns the expansion stage.
    pub fn expand(self, mut src: mpsc::Receiver<Task>) -> mpsc::Receiver<Task> {
        let (tx, out) = mpsc::channel(self.queue_size);
        tokio::spawn(async move {
            let pairs = self.header.iter().count() as i64;
            while let Some(task) = src.recv().await {
                // Announce before forwarding; see WordlistExpander.
                self.counter.add(pairs);
                if tx.send(task.clone()).await.is_err() {
                    self.counter.done(pairs);
                    return;
                }
                for (i, (name, value)) in self.header.iter().enumerate() {
                    let mut derived = task.clone();
                    derived.header.insert(name.clone(), value.clone());
                    if tx.send(derived).await.is_err() {
                        self.counter.done(pairs - i as i64);
                        return;
                    }
                }
            }
        });
        out
    }
}
