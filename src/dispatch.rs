//! The execution context observers and callbacks run on.
//!
//! Transport callbacks fire on arbitrary threads and must never wait on
//! caller code. Notifications are therefore boxed and pushed onto a
//! [`SerialQueue`], a single Tokio task running them one after the other in
//! submission order. A panicking job is logged and skipped; the jobs
//! behind it still run.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tokio::sync::{mpsc, oneshot};
use tracing::{trace, warn};

/// A unit of work submitted to a [`SerialQueue`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fire-and-forget serial executor.
#[derive(Clone)]
pub struct SerialQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl fmt::Debug for SerialQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialQueue")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl SerialQueue {
    /// Spawns the queue on the current Tokio runtime.
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                if let Err(panic) = catch_unwind(AssertUnwindSafe(job)) {
                    warn!("Notification panicked: {}", panic_message(&*panic));
                }
            }
            trace!("Serial queue stopped");
        });
        Self { tx }
    }

    /// Queues `job` behind every previously dispatched job.
    pub fn dispatch<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.tx.send(Box::new(job)).is_err() {
            warn!("Serial queue is gone, dropping notification");
        }
    }

    /// Waits until every job dispatched before this call has run.
    pub async fn barrier(&self) {
        let (done, wait) = oneshot::channel();
        self.dispatch(move || {
            let _ = done.send(());
        });
        let _ = wait.await;
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_jobs_run_in_order() {
        let queue = SerialQueue::spawn();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..50 {
            let seen = seen.clone();
            queue.dispatch(move || seen.lock().unwrap().push(i));
        }
        queue.barrier().await;
        assert_eq!(*seen.lock().unwrap(), (0..50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_panicking_job_does_not_stop_the_queue() {
        let queue = SerialQueue::spawn();
        let seen = Arc::new(Mutex::new(Vec::new()));
        queue.dispatch(|| panic!("observer bug"));
        let after = seen.clone();
        queue.dispatch(move || after.lock().unwrap().push("after"));
        queue.barrier().await;
        assert_eq!(*seen.lock().unwrap(), vec!["after"]);
    }
}
