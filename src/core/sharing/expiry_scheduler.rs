use super::share_service::FileHost;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;

/// What to do with deletions still pending when the process shuts down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPolicy {
    /// Delete every pending remote file right away.
    DeleteNow,
    /// Drop pending deletions; the remote files stay shared.
    Abandon,
}

/// Delayed deletion of remote files, tied to the process lifecycle.
///
/// Every scheduled deletion is a task in a `JoinSet`, and all of them
/// listen on one shutdown channel, so `shutdown` resolves each pending
/// deletion one way or the other before it returns.
pub struct ExpiryScheduler {
    tasks: Mutex<JoinSet<()>>,
    shutdown_tx: watch::Sender<Option<ShutdownPolicy>>,
}

impl ExpiryScheduler {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(None);
        Self {
            tasks: Mutex::new(JoinSet::new()),
            shutdown_tx,
        }
    }

    /// Deletes `file_id` from `host` once `delay` has elapsed.
    pub fn schedule(&self, host: Arc<dyn FileHost>, file_id: String, delay: Duration) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);

        // Reap deletions that already finished.
        while tasks.try_join_next().is_some() {}

        tracing::info!(%file_id, delay_secs = delay.as_secs(), "Scheduled remote deletion");

        tasks.spawn(async move {
            let sleep = tokio::time::sleep(delay);
            tokio::pin!(sleep);

            // None = timer fired; Some(policy) = shutdown was requested.
            let signal = tokio::select! {
                _ = &mut sleep => None,
                changed = shutdown_rx.wait_for(Option::is_some) => Some(changed.map(|p| *p).ok().flatten()),
            };

            let delete = match signal {
                None => true,
                Some(Some(ShutdownPolicy::DeleteNow)) => true,
                Some(Some(ShutdownPolicy::Abandon)) => false,
                // Scheduler dropped without a shutdown: honour the timer.
                Some(None) => {
                    sleep.await;
                    true
                }
            };

            if !delete {
                tracing::warn!(%file_id, "Abandoned pending remote deletion");
                return;
            }

            match host.delete(&file_id).await {
                Ok(()) => tracing::info!(%file_id, "Deleted remote file"),
                Err(e) => tracing::error!(%file_id, error = %e, "Failed to delete remote file"),
            }
        });
    }

    /// Number of deletions not yet finished.
    pub fn pending(&self) -> usize {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.len()
    }

    /// Resolves every pending deletion according to `policy` and waits for
    /// all of them.
    pub async fn shutdown(&self, policy: ShutdownPolicy) {
        let pending = self.pending();
        self.shutdown_tx.send_replace(Some(policy));

        let mut tasks = {
            let mut guard = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };

        tracing::info!(pending, ?policy, "Resolving pending remote deletions");
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Deletion task panicked");
            }
        }
    }
}

impl Default for ExpiryScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sharing::test_support::RecordingHost;

    #[tokio::test(start_paused = true)]
    async fn test_deletes_after_delay() {
        let host = RecordingHost::new();
        let scheduler = ExpiryScheduler::new();

        scheduler.schedule(host.clone(), "file-1".to_string(), Duration::from_secs(300));
        tokio::time::sleep(Duration::from_secs(299)).await;
        assert!(host.deleted().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(host.deleted(), vec!["file-1".to_string()]);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_delete_now_does_not_wait_for_timer() {
        let host = RecordingHost::new();
        let scheduler = ExpiryScheduler::new();
        let started = tokio::time::Instant::now();

        scheduler.schedule(host.clone(), "a".to_string(), Duration::from_secs(300));
        scheduler.schedule(host.clone(), "b".to_string(), Duration::from_secs(600));
        assert_eq!(scheduler.pending(), 2);

        scheduler.shutdown(ShutdownPolicy::DeleteNow).await;

        let mut deleted = host.deleted();
        deleted.sort();
        assert_eq!(deleted, vec!["a".to_string(), "b".to_string()]);
        assert!(started.elapsed() < Duration::from_secs(300));
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_abandon_skips_deletes() {
        let host = RecordingHost::new();
        let scheduler = ExpiryScheduler::new();

        scheduler.schedule(host.clone(), "a".to_string(), Duration::from_secs(300));
        scheduler.shutdown(ShutdownPolicy::Abandon).await;

        assert!(host.deleted().is_empty());
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_failure_is_contained() {
        let host = RecordingHost::failing_deletes();
        let scheduler = ExpiryScheduler::new();

        scheduler.schedule(host.clone(), "a".to_string(), Duration::from_secs(1));
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(host.delete_attempts(), 1);
        assert_eq!(scheduler.pending(), 0);
    }
}
