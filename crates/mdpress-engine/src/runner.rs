//! Serial task execution.
//!
//! All regeneration work - full builds and per-file rebuilds - funnels
//! through one [`TaskRunner`], which executes tasks strictly in enqueue
//! order, one at a time. Serialization is the backpressure mechanism:
//! bursts of filesystem events queue up instead of fanning out.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Serial task runner.
///
/// Tasks are consumed by a single dispatcher task, so task N+1 starts only
/// after task N has settled. Failures are handled inside each task and
/// never affect later tasks or the dispatcher.
pub struct TaskRunner {
    tx: Mutex<Option<mpsc::UnboundedSender<Task>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl TaskRunner {
    /// Create a runner and spawn its dispatcher.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Task>();
        let dispatcher = tokio::spawn(async move {
            while let Some(task) = rx.recv().await {
                task.await;
            }
        });

        Self {
            tx: Mutex::new(Some(tx)),
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    /// Enqueue a task to execute after all previously enqueued tasks.
    ///
    /// Never blocks. Tasks enqueued after [`drain`](Self::drain) are
    /// dropped.
    pub fn enqueue<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guard = self.tx.lock().unwrap();
        match guard.as_ref() {
            Some(tx) => {
                let _ = tx.send(Box::pin(task));
            }
            None => tracing::debug!("Task dropped: runner is draining"),
        }
    }

    /// Stop accepting tasks and wait for the queue to empty.
    ///
    /// Already-enqueued tasks run to completion, including the one in
    /// flight. Idempotent.
    pub async fn drain(&self) {
        drop(self.tx.lock().unwrap().take());
        let dispatcher = self.dispatcher.lock().unwrap().take();
        if let Some(dispatcher) = dispatcher {
            let _ = dispatcher.await;
        }
    }
}

impl Default for TaskRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn tasks_execute_in_enqueue_order() {
        let runner = TaskRunner::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..10u64 {
            let order = Arc::clone(&order);
            runner.enqueue(async move {
                // Later tasks sleep less; order must still hold.
                tokio::time::sleep(Duration::from_millis(10 - i)).await;
                order.lock().unwrap().push(i);
            });
        }
        runner.drain().await;

        assert_eq!(*order.lock().unwrap(), (0..10).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn tasks_never_overlap() {
        let runner = TaskRunner::new();
        let in_flight = Arc::new(AtomicBool::new(false));
        let overlaps = Arc::new(AtomicUsize::new(0));

        for _ in 0..20 {
            let in_flight = Arc::clone(&in_flight);
            let overlaps = Arc::clone(&overlaps);
            runner.enqueue(async move {
                if in_flight.swap(true, Ordering::SeqCst) {
                    overlaps.fetch_add(1, Ordering::SeqCst);
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
                in_flight.store(false, Ordering::SeqCst);
            });
        }
        runner.drain().await;

        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failing_task_does_not_break_the_chain() {
        let runner = TaskRunner::new();
        let completed = Arc::new(AtomicUsize::new(0));

        runner.enqueue(async {
            let result: Result<(), std::io::Error> = Err(std::io::Error::other("boom"));
            if let Err(err) = result {
                tracing::error!(error = %err, "task failed");
            }
        });
        let completed_clone = Arc::clone(&completed);
        runner.enqueue(async move {
            completed_clone.fetch_add(1, Ordering::SeqCst);
        });
        runner.drain().await;

        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn drain_waits_for_in_flight_task() {
        let runner = TaskRunner::new();
        let finished = Arc::new(AtomicBool::new(false));

        let finished_clone = Arc::clone(&finished);
        runner.enqueue(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            finished_clone.store(true, Ordering::SeqCst);
        });
        runner.drain().await;

        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn enqueue_after_drain_is_dropped() {
        let runner = TaskRunner::new();
        runner.drain().await;

        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = Arc::clone(&ran);
        runner.enqueue(async move {
            ran_clone.store(true, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn drain_is_idempotent() {
        let runner = TaskRunner::new();
        runner.drain().await;
        runner.drain().await;
    }
}
