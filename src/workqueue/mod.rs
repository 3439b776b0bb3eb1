//! The queue of work to be done
//!
//! The work queue sits between the seeding/feedback side of the pipeline and
//! the expander chain. It reads candidate tasks from a bounded ingress
//! channel, drops anything outside the configured scope (still counting it
//! as finished), buffers the rest, and feeds a bounded egress channel. One
//! transfer loop owns all queue state; everything else talks to it through
//! channels and the shared [`WorkCounter`].

mod counter;

pub use counter::WorkCounter;

use crate::client::ClientFactory;
use crate::robots;
use crate::scope::ScopeFilter;
use crate::task::Task;
use reqwest::header::HeaderMap;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use url::Url;

/// Shared handle for adding work and accounting for it.
#[derive(Clone)]
pub struct QueueHandle {
    tx: mpsc::Sender<Task>,
    counter: Arc<WorkCounter>,
}

impl QueueHandle {
    /// Counts and enqueues one task.
    pub async fn add_task(&self, task: Task) {
        self.add_tasks(vec![task]).await;
    }

    /// Counts and enqueues a batch of tasks.
    pub async fn add_tasks(&self, tasks: Vec<Task>) {
        self.counter.add(tasks.len() as i64);
        for task in tasks {
            if self.tx.send(task).await.is_err() {
                // Queue already shut down; balance the count.
                self.counter.done(1);
            }
        }
    }

    /// Announces `n` units of future work (used by expanders before they
    /// emit derivatives downstream of the queue).
    pub fn add_count(&self, n: i64) {
        self.counter.add(n);
    }

    /// Marks `n` units of work finished.
    pub fn done(&self, n: i64) {
        self.counter.done(n);
    }

    pub fn counter(&self) -> Arc<WorkCounter> {
        self.counter.clone()
    }
}

/// The work queue; see the module docs.
pub struct WorkQueue {
    src_tx: mpsc::Sender<Task>,
    src_rx: Option<mpsc::Receiver<Task>>,
    dst_tx: Option<mpsc::Sender<Task>>,
    dst_rx: Option<mpsc::Receiver<Task>>,
    shutdown_tx: watch::Sender<bool>,
    scope: ScopeFilter,
    counter: Arc<WorkCounter>,
}

impl WorkQueue {
    /// Creates a queue over the given scope roots, with bounded channels of
    /// `queue_size` on both sides.
    pub fn new(queue_size: usize, scope: &[Url], allow_upgrade: bool) -> Self {
        let (src_tx, src_rx) = mpsc::channel(queue_size);
        let (dst_tx, dst_rx) = mpsc::channel(queue_size);
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            src_tx,
            src_rx: Some(src_rx),
            dst_tx: Some(dst_tx),
            dst_rx: Some(dst_rx),
            shutdown_tx,
            scope: ScopeFilter::new(scope, allow_upgrade),
            counter: Arc::new(WorkCounter::new()),
        }
    }

    /// A cloneable handle for adding and accounting work.
    pub fn handle(&self) -> QueueHandle {
        QueueHandle {
            tx: self.src_tx.clone(),
            counter: self.counter.clone(),
        }
    }

    pub fn counter(&self) -> Arc<WorkCounter> {
        self.counter.clone()
    }

    /// Takes the egress receiver; the head of the expander chain reads it.
    pub fn take_work_chan(&mut self) -> mpsc::Receiver<Task> {
        self.dst_rx.take().expect("work channel already taken")
    }

    /// Signals the transfer loop to drain and close the egress.
    pub fn input_finished(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Waits until every task ever added has been accounted done.
    pub async fn wait_pipe(&self) {
        self.counter.wait().await;
    }

    /// Fetches robots.txt for each scope root and enqueues every disallowed
    /// path as a task; the scope filter discards off-scope entries.
    pub async fn seed_from_robots<F: ClientFactory>(
        &self,
        scope: &[Url],
        factory: &F,
        default_header: &HeaderMap,
    ) {
        let handle = self.handle();
        for root in scope {
            match robots::fetch_for_url(root, factory).await {
                Ok(data) => {
                    for path in data.all_paths() {
                        let mut url = root.clone();
                        url.set_path(&path);
                        handle.add_task(Task::from_url(url, default_header)).await;
                    }
                }
                Err(err) => {
                    tracing::warn!("unable to get robots.txt data: {err}");
                }
            }
        }
    }

    /// Spawns the transfer loop.
    pub fn run_in_background(&mut self) -> JoinHandle<()> {
        let src = self.src_rx.take().expect("queue already running");
        let dst = self.dst_tx.take().expect("queue already running");
        let shutdown = self.shutdown_tx.subscribe();
        let scope = self.scope.clone();
        let counter = self.counter.clone();
        tokio::spawn(transfer_loop(src, dst, shutdown, scope, counter))
    }
}

async fn transfer_loop(
    mut src: mpsc::Receiver<Task>,
    dst: mpsc::Sender<Task>,
    mut shutdown: watch::Receiver<bool>,
    scope: ScopeFilter,
    counter: Arc<WorkCounter>,
) {
    let mut pending: VecDeque<Task> = VecDeque::new();
    loop {
        if pending.is_empty() {
            // Blocking read, non-blocking send.
            tokio::select! {
                _ = shutdown.changed() => break,
                received = src.recv() => match received {
                    Some(task) => {
                        if !scope.contains(&task.url) {
                            reject(&task, &counter);
                            continue;
                        }
                        match dst.try_send(task) {
                            Ok(()) => {}
                            Err(TrySendError::Full(task)) => pending.push_back(task),
                            Err(TrySendError::Closed(_)) => return,
                        }
                    }
                    None => break,
                },
            }
        } else {
            // Whichever side is ready first: take more input, or move the
            // buffer head downstream.
            tokio::select! {
                _ = shutdown.changed() => break,
                received = src.recv() => match received {
                    Some(task) => {
                        if scope.contains(&task.url) {
                            pending.push_back(task);
                        } else {
                            reject(&task, &counter);
                        }
                    }
                    None => break,
                },
                permit = dst.reserve() => match permit {
                    Ok(permit) => {
                        let task = pending.pop_front().expect("pending checked non-empty");
                        permit.send(task);
                    }
                    Err(_) => return,
                },
            }
        }
    }
    while let Some(task) = pending.pop_front() {
        if dst.send(task).await.is_err() {
            return;
        }
    }
}

fn reject(task: &Task, counter: &WorkCounter) {
    tracing::debug!("workqueue rejecting {task}");
    counter.done(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn u(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn task(s: &str) -> Task {
        Task::from_url(u(s), &HeaderMap::new())
    }

    #[tokio::test]
    async fn test_empty_queue_closes_on_input_finished() {
        let mut queue = WorkQueue::new(4, &[u("http://x/")], false);
        let mut work = queue.take_work_chan();
        let loop_handle = queue.run_in_background();

        queue.wait_pipe().await;
        queue.input_finished();
        assert!(work.recv().await.is_none());
        loop_handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_in_scope_task_flows_through() {
        let mut queue = WorkQueue::new(4, &[u("http://x/")], false);
        let mut work = queue.take_work_chan();
        queue.run_in_background();

        queue.handle().add_task(task("http://x/a")).await;
        let received = work.recv().await.unwrap();
        assert_eq!(received.url.as_str(), "http://x/a");

        queue.counter().done(1);
        queue.wait_pipe().await;
    }

    #[tokio::test]
    async fn test_out_of_scope_task_rejected_and_counted() {
        let mut queue = WorkQueue::new(4, &[u("http://x/a")], false);
        let _work = queue.take_work_chan();
        queue.run_in_background();

        queue.handle().add_task(task("http://x/b")).await;
        // Rejection accounts the task done, so the pipe settles on its own.
        tokio::time::timeout(Duration::from_secs(1), queue.wait_pipe())
            .await
            .expect("rejected task settled the counter");
    }

    #[tokio::test]
    async fn test_buffers_past_egress_capacity() {
        let mut queue = WorkQueue::new(2, &[u("http://x/")], false);
        let mut work = queue.take_work_chan();
        queue.run_in_background();

        let handle = queue.handle();
        let tasks: Vec<Task> = (0..10)
            .map(|i| task(&format!("http://x/{i}")))
            .collect();
        handle.add_tasks(tasks).await;

        let mut seen = Vec::new();
        for _ in 0..10 {
            let task = tokio::time::timeout(Duration::from_secs(1), work.recv())
                .await
                .expect("task delivered")
                .unwrap();
            seen.push(task.url.path().to_string());
            queue.counter().done(1);
        }
        assert_eq!(seen.len(), 10);
        assert_eq!(seen[0], "/0");
        queue.wait_pipe().await;
    }

    #[tokio::test]
    async fn test_input_finished_drains_buffer() {
        let mut queue = WorkQueue::new(2, &[u("http://x/")], false);
        let mut work = queue.take_work_chan();
        queue.run_in_background();

        let handle = queue.handle();
        for i in 0..5 {
            handle.add_task(task(&format!("http://x/{i}"))).await;
        }
        for _ in 0..5 {
            work.recv().await.unwrap();
            queue.counter().done(1);
        }
        queue.wait_pipe().await;
        queue.input_finished();
        assert!(work.recv().await.is_none());
    }
}
