//! Background scheduling around the sync manager: periodic passes with
//! jitter, fast follow-up while mutations are pending, and an immediate
//! pass when connectivity is regained.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use rand::Rng;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::manager::SyncManager;
use super::ports::NetworkMonitor;

/// Periodic cadence while online.
pub const SYNC_PERIODIC_INTERVAL_SECS: u64 = 60;

/// Maximum jitter added to periodic intervals.
pub const SYNC_INTERVAL_JITTER_SECS: u64 = 5;

/// Poll cadence while offline, watching for the online transition.
pub const SYNC_OFFLINE_POLL_SECS: u64 = 5;

/// Follow-up delay when the queue still has pending entries after a pass.
pub const SYNC_PENDING_FOLLOWUP_SECS: u64 = 2;

pub struct SyncScheduler {
    manager: Arc<SyncManager>,
    network: Arc<dyn NetworkMonitor>,
    background_task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncScheduler {
    pub fn new(manager: Arc<SyncManager>, network: Arc<dyn NetworkMonitor>) -> Self {
        Self {
            manager,
            network,
            background_task: Mutex::new(None),
        }
    }

    /// Fire-and-forget trigger, typically after a local mutation. A trigger
    /// arriving while a pass runs coalesces inside the manager.
    pub fn trigger(&self) {
        let manager = Arc::clone(&self.manager);
        tokio::spawn(async move {
            if let Err(err) = manager.run_pass().await {
                warn!("Triggered sync pass failed: {}", err);
            }
        });
    }

    /// Spawn the periodic loop if it is not already running.
    pub async fn ensure_background_started(&self) {
        let mut guard = self.background_task.lock().await;
        if let Some(handle) = guard.as_ref() {
            if !handle.is_finished() {
                return;
            }
            guard.take();
        }

        let manager = Arc::clone(&self.manager);
        let network = Arc::clone(&self.network);
        let handle = tokio::spawn(async move {
            let mut was_online = network.is_online();
            loop {
                let online = network.is_online();
                let regained = online && !was_online;
                was_online = online;

                if online {
                    if regained {
                        debug!("Connectivity regained; running sync pass");
                    }
                    if let Err(err) = manager.run_pass().await {
                        warn!("Background sync pass failed: {}", err);
                    }
                }

                let delay_secs = if !online {
                    SYNC_OFFLINE_POLL_SECS
                } else {
                    let pending = manager
                        .stats()
                        .map(|stats| stats.pending_count > 0)
                        .unwrap_or(false);
                    if pending {
                        SYNC_PENDING_FOLLOWUP_SECS
                    } else {
                        let jitter = rand::thread_rng().gen_range(0..=SYNC_INTERVAL_JITTER_SECS);
                        SYNC_PERIODIC_INTERVAL_SECS + jitter
                    }
                };
                tokio::time::sleep(Duration::from_secs(delay_secs)).await;
            }
        });
        *guard = Some(handle);
    }

    /// Abort the background loop. In-flight store transactions are atomic,
    /// so aborting between entries leaves no partial state.
    pub async fn shutdown(&self) {
        let mut guard = self.background_task.lock().await;
        if let Some(handle) = guard.take() {
            handle.abort();
        }
    }
}
