//! Debounced + periodic resync scheduling
//!
//! A [`ResyncScheduler`] owns one background task driving one sync domain
//! (group topology or group status). Every trigger restarts both the debounce
//! deadline and the periodic deadline; the fetch runs when either fires.
//! Fetches are awaited inside the loop, so a burst of triggers never produces
//! overlapping fetches.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// Timing of a resync domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResyncConfig {
    /// Quiet period after the last trigger before the fetch runs
    pub debounce: Duration,
    /// Fallback cadence, restarted by every trigger
    pub interval: Duration,
}

impl Default for ResyncConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(2500),
            interval: Duration::from_secs(60 * 60),
        }
    }
}

/// A fetch run by a scheduler
#[async_trait]
pub trait ResyncTask: Send + Sync + 'static {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Run one fetch; failures are handled (logged) inside
    async fn run(&self);
}

/// Cheap handle for requesting a resync
#[derive(Debug, Clone)]
pub struct ResyncTrigger {
    tx: mpsc::UnboundedSender<()>,
}

impl ResyncTrigger {
    /// Restart the debounce and periodic timers
    pub fn trigger(&self) {
        // Closed after shutdown; nothing left to schedule
        let _ = self.tx.send(());
    }
}

/// Create a trigger and the receiving end for [`ResyncScheduler::spawn`]
pub fn resync_channel() -> (ResyncTrigger, mpsc::UnboundedReceiver<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ResyncTrigger { tx }, rx)
}

/// Background task running a [`ResyncTask`] on debounce and interval
pub struct ResyncScheduler {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl ResyncScheduler {
    /// Start the scheduler loop. Nothing runs until the first trigger.
    pub fn spawn(
        config: ResyncConfig,
        triggers: mpsc::UnboundedReceiver<()>,
        task: Arc<dyn ResyncTask>,
    ) -> Self {
        let name = task.name();
        let handle = tokio::spawn(run_loop(config, triggers, task));
        Self { name, handle }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Cancel both timers and stop the loop
    pub fn shutdown(&self) {
        tracing::debug!("Stopping {} resync scheduler", self.name);
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ResyncScheduler {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn run_loop(
    config: ResyncConfig,
    mut triggers: mpsc::UnboundedReceiver<()>,
    task: Arc<dyn ResyncTask>,
) {
    let mut debounce: Option<Instant> = None;
    let mut periodic: Option<Instant> = None;

    loop {
        tokio::select! {
            trigger = triggers.recv() => match trigger {
                Some(()) => {
                    let now = Instant::now();
                    debounce = Some(now + config.debounce);
                    periodic = Some(now + config.interval);
                }
                None => {
                    tracing::debug!("{} resync triggers closed", task.name());
                    break;
                }
            },
            _ = sleep_until_opt(debounce) => {
                debounce = None;
                tracing::debug!("Running debounced {} resync", task.name());
                task.run().await;
            }
            _ = sleep_until_opt(periodic) => {
                periodic = Some(Instant::now() + config.interval);
                tracing::debug!("Running periodic {} resync", task.name());
                task.run().await;
            }
        }
    }
}
