//! Detached background work for counter bookkeeping.
//!
//! Contract: each submitted task runs on the runtime under its own deadline,
//! independent of the submitting request. Tasks are best-effort. A failure or
//! timeout is logged and counted, and is never retried.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use metrics::counter;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, info_span, warn};

use crate::application::repos::RepoError;
use crate::cache::lock::mutex_lock;

const SOURCE: &str = "application::tasks";
pub const METRIC_BACKGROUND_FAILED: &str = "chorus_background_task_failed_total";

pub struct BackgroundTasks {
    deadline: Duration,
    tasks: Mutex<JoinSet<()>>,
}

impl BackgroundTasks {
    pub fn new(deadline: Duration) -> Self {
        Self {
            deadline,
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Spawn `task` and return immediately. Must be called from within a
    /// tokio runtime.
    pub fn submit<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = Result<(), RepoError>> + Send + 'static,
    {
        let deadline = self.deadline;
        let work = async move {
            match tokio::time::timeout(deadline, task).await {
                Ok(Ok(())) => debug!(task = name, "Background task completed"),
                Ok(Err(err)) => {
                    counter!(METRIC_BACKGROUND_FAILED, "task" => name, "reason" => "error")
                        .increment(1);
                    warn!(task = name, error = %err, "Background task failed");
                }
                Err(_) => {
                    counter!(METRIC_BACKGROUND_FAILED, "task" => name, "reason" => "timeout")
                        .increment(1);
                    warn!(
                        task = name,
                        deadline_ms = deadline.as_millis() as u64,
                        "Background task exceeded its deadline"
                    );
                }
            }
        }
        .instrument(info_span!("background_task", task = name));

        let mut tasks = mutex_lock(&self.tasks, SOURCE, "submit");
        while let Some(finished) = tasks.try_join_next() {
            log_join_error(finished);
        }
        tasks.spawn(work);
    }

    /// Tasks spawned and not yet reaped.
    pub fn pending(&self) -> usize {
        mutex_lock(&self.tasks, SOURCE, "pending").len()
    }

    /// Wait for everything submitted so far.
    pub async fn drain(&self) {
        let mut tasks = std::mem::take(&mut *mutex_lock(&self.tasks, SOURCE, "drain"));
        while let Some(finished) = tasks.join_next().await {
            log_join_error(finished);
        }
    }
}

fn log_join_error(result: Result<(), tokio::task::JoinError>) {
    if let Err(err) = result {
        counter!(METRIC_BACKGROUND_FAILED, "task" => "unknown", "reason" => "panic").increment(1);
        warn!(error = %err, "Background task panicked");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn submitted_tasks_run_to_completion() {
        let tasks = BackgroundTasks::new(Duration::from_secs(1));
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let hits = hits.clone();
            tasks.submit("count", async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        tasks.drain().await;

        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(tasks.pending(), 0);
    }

    #[tokio::test]
    async fn failures_are_swallowed_and_not_retried() {
        let tasks = BackgroundTasks::new(Duration::from_secs(1));
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        tasks.submit("failing", async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(RepoError::from_persistence("store unavailable"))
        });

        tasks.drain().await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tasks_are_cut_off_at_their_deadline() {
        let tasks = BackgroundTasks::new(Duration::from_millis(100));
        let finished = Arc::new(AtomicUsize::new(0));
        let flag = finished.clone();
        tasks.submit("slow", async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            flag.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        tasks.drain().await;

        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn submit_does_not_wait_for_the_task() {
        let tasks = BackgroundTasks::new(Duration::from_secs(5));
        let (release, gate) = tokio::sync::oneshot::channel::<()>();
        tasks.submit("gated", async move {
            let _ = gate.await;
            Ok(())
        });

        assert_eq!(tasks.pending(), 1);
        release.send(()).expect("task still waiting");
        tasks.drain().await;
        assert_eq!(tasks.pending(), 0);
    }
}
