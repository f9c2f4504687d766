//! Supervision of long-running background tasks.
//!
//! # Responsibilities
//! - Run a task, observe how it ends
//! - Log panics and unexpected exits, then restart with backoff
//! - Give up after a bounded number of restarts with an error-level fault
//!
//! # Design Decisions
//! - A task that returns while shutdown is in progress is not restarted
//! - Restart attempts reset nothing: the counter is for the process lifetime

use std::future::Future;

use tokio::task::JoinHandle;

use crate::lifecycle::Shutdown;
use crate::resilience::Backoff;

/// How a supervised task is restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    /// `None` restarts forever.
    pub max_restarts: Option<u32>,
    pub backoff: Backoff,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_restarts: None,
            backoff: Backoff::default(),
        }
    }
}

/// Why the supervisor stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorExit {
    Shutdown,
    GaveUp { restarts: u32 },
}

/// Spawn `factory`'s task under supervision.
///
/// `factory` is called again for every restart and receives a clone of the
/// shutdown handle the task should observe.
pub fn supervise<F, Fut>(
    name: &'static str,
    shutdown: Shutdown,
    policy: RestartPolicy,
    mut factory: F,
) -> JoinHandle<SupervisorExit>
where
    F: FnMut(Shutdown) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut restarts = 0u32;
        loop {
            let result = tokio::spawn(factory(shutdown.clone())).await;

            if shutdown.is_triggered() {
                tracing::debug!(task = name, "Supervised task stopped for shutdown");
                return SupervisorExit::Shutdown;
            }

            match result {
                Ok(()) => tracing::warn!(task = name, "Supervised task exited unexpectedly"),
                Err(e) if e.is_panic() => {
                    tracing::error!(task = name, error = %e, "Supervised task panicked")
                }
                Err(e) => tracing::error!(task = name, error = %e, "Supervised task aborted"),
            }

            restarts += 1;
            if let Some(max) = policy.max_restarts {
                if restarts > max {
                    tracing::error!(
                        task = name,
                        restarts = max,
                        "Supervised task exceeded restart limit; its state is no longer updated"
                    );
                    return SupervisorExit::GaveUp { restarts: max };
                }
            }

            let delay = policy.backoff.delay(restarts);
            tracing::warn!(
                task = name,
                restart = restarts,
                delay_ms = delay.as_millis() as u64,
                "Restarting supervised task"
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.wait() => return SupervisorExit::Shutdown,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn fast_policy(max_restarts: Option<u32>) -> RestartPolicy {
        RestartPolicy {
            max_restarts,
            backoff: Backoff::new(1, 5),
        }
    }

    #[tokio::test]
    async fn panicking_task_is_restarted_until_limit() {
        let runs = Arc::new(AtomicU32::new(0));
        let counter = runs.clone();
        let handle = supervise("panicky", Shutdown::new(), fast_policy(Some(2)), move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                panic!("boom");
            }
        });

        let exit = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(exit, SupervisorExit::GaveUp { restarts: 2 });
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn recovers_after_transient_crash() {
        let runs = Arc::new(AtomicU32::new(0));
        let counter = runs.clone();
        let shutdown = Shutdown::new();
        let handle = supervise("flaky", shutdown.clone(), fast_policy(None), move |shutdown| {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("first run fails");
                }
                shutdown.wait().await;
            }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        shutdown.trigger();
        let exit = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(exit, SupervisorExit::Shutdown);
    }
}
