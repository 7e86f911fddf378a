//! # Sync Scheduler
//!
//! Background task that turns triggers into drain passes:
//!
//! - explicit requests sent through a [`SyncHandle`] (manual, route view
//!   activation, submission behind older entries)
//! - offline → online transitions of [`Connectivity`]
//! - bounded automatic retries after a transient halt, spaced by
//!   [`BackoffCalculator`]
//!
//! After `max_retry_attempts` automatic retries the scheduler stops retrying
//! and waits for the next external trigger. Any external trigger resets the
//! retry counter.

use std::sync::Arc;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::backoff::BackoffCalculator;
use super::coordinator::{SyncCoordinator, SyncError, SyncTrigger};
use crate::services::Connectivity;

/// Cloneable handle for requesting drains and stopping the scheduler
#[derive(Debug, Clone)]
pub struct SyncHandle {
    sender: mpsc::UnboundedSender<SyncTrigger>,
    shutdown: Arc<Notify>,
}

impl SyncHandle {
    /// Request a drain pass; false once the scheduler has stopped
    pub fn request(&self, trigger: SyncTrigger) -> bool {
        self.sender.send(trigger).is_ok()
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingRetry {
    attempt: u32,
    deadline: Instant,
}

pub struct SyncScheduler {
    coordinator: Arc<SyncCoordinator>,
    connectivity: Connectivity,
    backoff: BackoffCalculator,
    max_retry_attempts: u32,
}

impl SyncScheduler {
    pub fn new(
        coordinator: Arc<SyncCoordinator>,
        connectivity: Connectivity,
        backoff: BackoffCalculator,
        max_retry_attempts: u32,
    ) -> Self {
        Self {
            coordinator,
            connectivity,
            backoff,
            max_retry_attempts,
        }
    }

    /// Start the scheduler loop on the current runtime
    pub fn spawn(self) -> (SyncHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let shutdown = Arc::new(Notify::new());
        let handle = SyncHandle {
            sender,
            shutdown: shutdown.clone(),
        };

        // Subscribed before the task is polled so a flip in between is seen
        let mut online = self.connectivity.subscribe();
        let was_online = *online.borrow_and_update();
        let task = tokio::spawn(self.run(receiver, online, was_online, shutdown));
        (handle, task)
    }

    async fn run(
        self,
        mut triggers: mpsc::UnboundedReceiver<SyncTrigger>,
        mut online: watch::Receiver<bool>,
        mut was_online: bool,
        shutdown: Arc<Notify>,
    ) {
        let mut retry: Option<PendingRetry> = None;

        info!(
            max_retry_attempts = self.max_retry_attempts,
            online = was_online,
            "🚀 Sync scheduler started"
        );

        loop {
            let retry_wait = async move {
                match retry {
                    Some(pending) => tokio::time::sleep_until(pending.deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            let trigger = tokio::select! {
                _ = shutdown.notified() => break,
                received = triggers.recv() => match received {
                    Some(trigger) => trigger,
                    None => break,
                },
                changed = online.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let now_online = *online.borrow_and_update();
                    let restored = now_online && !was_online;
                    was_online = now_online;
                    if !restored {
                        continue;
                    }
                    SyncTrigger::ConnectivityRestored
                },
                _ = retry_wait => {
                    let attempt = retry.map_or(1, |pending| pending.attempt);
                    SyncTrigger::Retry { attempt }
                },
            };

            let attempt = match trigger {
                SyncTrigger::Retry { attempt } => attempt,
                _ => 0,
            };
            retry = None;

            match self.coordinator.drain(trigger).await {
                Ok(report) if report.halted_on_transient() => {
                    retry = self.schedule_retry(attempt);
                }
                Ok(_) => {}
                Err(SyncError::AlreadyDraining) => {
                    debug!("Drain already running, trigger coalesced");
                }
                Err(SyncError::Offline) => {
                    debug!("Offline, waiting for connectivity");
                }
                Err(error) => {
                    warn!(error = %error, "⚠️ Drain pass failed");
                    retry = self.schedule_retry(attempt);
                }
            }
        }

        info!("🛑 Sync scheduler stopped");
    }

    /// Next automatic retry after `completed_attempt`, or None once exhausted
    fn schedule_retry(&self, completed_attempt: u32) -> Option<PendingRetry> {
        let next_attempt = completed_attempt + 1;
        if next_attempt > self.max_retry_attempts {
            warn!(
                attempts = completed_attempt,
                "⏸️ Automatic retries exhausted, waiting for the next trigger"
            );
            return None;
        }

        let delay = self.backoff.delay_for(completed_attempt);
        debug!(
            attempt = next_attempt,
            delay_ms = delay.as_millis() as u64,
            "Scheduling drain retry"
        );

        Some(PendingRetry {
            attempt: next_attempt,
            deadline: Instant::now() + delay,
        })
    }
}
