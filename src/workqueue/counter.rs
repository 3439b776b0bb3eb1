//! Inflight work accounting
//!
//! Every task that enters the pipeline is `add`ed exactly once and `done`d
//! exactly once, whether it was processed by a worker or rejected by a
//! filter. The pipeline has terminated precisely when the two counts are
//! equal, at which point all waiters are released.

use std::sync::Mutex;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Counts {
    todo: i64,
    done: i64,
}

/// Counter of work added and work finished.
#[derive(Debug, Default)]
pub struct WorkCounter {
    counts: Mutex<Counts>,
    notify: Notify,
}

impl WorkCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `n` new units of work.
    pub fn add(&self, n: i64) {
        let mut counts = self.counts.lock().unwrap();
        counts.todo += n;
        tracing::trace!("work counter: {}/{}", counts.done, counts.todo);
    }

    /// Records `n` finished units of work, releasing waiters on equality.
    ///
    /// # Panics
    ///
    /// Panics if `done` would exceed `todo`; that means some stage finished
    /// work it never announced, and the termination condition is meaningless.
    pub fn done(&self, n: i64) {
        let mut counts = self.counts.lock().unwrap();
        counts.done += n;
        tracing::trace!("work counter: {}/{}", counts.done, counts.todo);
        if counts.done > counts.todo {
            panic!(
                "work counter done ({}) exceeded todo ({})",
                counts.done, counts.todo
            );
        }
        if counts.done == counts.todo {
            tracing::debug!("work counter reached equilibrium");
            self.notify.notify_waiters();
        }
    }

    /// Waits until `done == todo`. Returns immediately if they are already
    /// equal.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let counts = self.counts.lock().unwrap();
                if counts.done == counts.todo {
                    return;
                }
            }
            notified.await;
        }
    }

    /// Current `(done, todo)` snapshot, for stats.
    pub fn counts(&self) -> (i64, i64) {
        let counts = self.counts.lock().unwrap();
        (counts.done, counts.todo)
    }
}
