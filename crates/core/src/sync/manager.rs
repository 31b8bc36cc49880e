//! The background reconciliation loop between the local queue and the
//! remote service.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use tokio::sync::watch;

use crate::errors::Result;

use super::ports::{
    GatewayError, GatewayErrorKind, NetworkMonitor, RecordSyncStore, RemoteGateway, SyncQueueStore,
};
use super::queue_model::{
    QueueAction, QueueEntry, QueuePayload, SyncPassOutcome, SyncPassSummary, SyncStats,
    SYNC_RETRY_CEILING,
};

/// What happened to a single dispatched entry.
enum DispatchOutcome {
    /// Entry discharged; record bookkeeping already updated.
    Succeeded,
    /// Transient failure recorded; the entry stays queued below the ceiling.
    Failed,
    /// Parent not ready; no attempt was made.
    Deferred,
}

/// Single-flight sync manager. Trigger requests arriving while a pass is
/// running coalesce into a no-op; repeated passes are driven externally by
/// the scheduler and by explicit triggers after local mutations.
pub struct SyncManager {
    queue: Arc<dyn SyncQueueStore>,
    records: Arc<dyn RecordSyncStore>,
    gateway: Arc<dyn RemoteGateway>,
    network: Arc<dyn NetworkMonitor>,
    running: AtomicBool,
    last_sync_time: RwLock<Option<DateTime<Utc>>>,
    completions: watch::Sender<Option<SyncPassSummary>>,
}

impl SyncManager {
    pub fn new(
        queue: Arc<dyn SyncQueueStore>,
        records: Arc<dyn RecordSyncStore>,
        gateway: Arc<dyn RemoteGateway>,
        network: Arc<dyn NetworkMonitor>,
    ) -> Self {
        let (completions, _) = watch::channel(None);
        Self {
            queue,
            records,
            gateway,
            network,
            running: AtomicBool::new(false),
            last_sync_time: RwLock::new(None),
            completions,
        }
    }

    /// Observe pass completions without polling. Each finished pass (other
    /// than coalesced triggers) publishes its summary.
    pub fn subscribe(&self) -> watch::Receiver<Option<SyncPassSummary>> {
        self.completions.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> Result<SyncStats> {
        Ok(SyncStats {
            pending_count: self.queue.pending_count()?,
            error_count: self.records.error_count()?,
            last_sync_time: *self
                .last_sync_time
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
            is_running: self.is_running(),
        })
    }

    /// Run one sync pass. Every due entry is attempted at most once; the
    /// pass does not loop internally.
    pub async fn run_pass(&self) -> Result<SyncPassSummary> {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("Sync pass already in flight; trigger coalesced");
            return Ok(SyncPassSummary::empty(SyncPassOutcome::AlreadyRunning));
        }

        let result = self.run_pass_inner().await;
        self.running.store(false, Ordering::SeqCst);

        if let Ok(summary) = &result {
            self.completions.send_replace(Some(summary.clone()));
        }
        result
    }

    async fn run_pass_inner(&self) -> Result<SyncPassSummary> {
        if !self.network.is_online() {
            debug!("Sync pass skipped: offline");
            return Ok(SyncPassSummary::empty(SyncPassOutcome::Offline));
        }

        let removed = self.queue.dedup().await?;
        if removed > 0 {
            debug!("Queue compacted before dispatch: {} entries dropped", removed);
        }

        let entries = self.queue.drain_order()?;
        let mut summary = SyncPassSummary::empty(SyncPassOutcome::Completed);

        for entry in entries {
            // Connectivity lost mid-pass: leave the rest queued untouched.
            if !self.network.is_online() {
                summary.outcome = SyncPassOutcome::AbortedOffline;
                break;
            }

            match self.dispatch_entry(&entry).await? {
                DispatchOutcome::Succeeded => {
                    summary.dispatched += 1;
                    summary.succeeded += 1;
                }
                DispatchOutcome::Failed => {
                    summary.dispatched += 1;
                    summary.failed += 1;
                }
                DispatchOutcome::Deferred => summary.deferred += 1,
            }
        }

        *self
            .last_sync_time
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Utc::now());

        debug!(
            "Sync pass finished: {:?} dispatched={} succeeded={} failed={} deferred={}",
            summary.outcome, summary.dispatched, summary.succeeded, summary.failed, summary.deferred
        );
        Ok(summary)
    }

    async fn dispatch_entry(&self, entry: &QueueEntry) -> Result<DispatchOutcome> {
        // Parent-before-child is enforced structurally, not by timestamps:
        // an item create waits until its parent report has a remote id.
        // Not an error and no attempt is consumed.
        let parent_remote_id = match &entry.payload {
            QueuePayload::ItemCreate(item) => {
                match self.records.report_remote_id(&item.parent_local_id)? {
                    Some(remote_id) => Some(remote_id),
                    None => {
                        debug!(
                            "Deferring item create {}: parent {} has no remote id yet",
                            entry.record_id, item.parent_local_id
                        );
                        return Ok(DispatchOutcome::Deferred);
                    }
                }
            }
            _ => None,
        };

        match self.call_gateway(entry, parent_remote_id.as_deref()).await {
            Ok(()) => {
                self.queue.discard(entry.queue_id).await?;
                Ok(DispatchOutcome::Succeeded)
            }
            Err(err) if err.kind == GatewayErrorKind::NotFound
                && entry.action == QueueAction::Delete =>
            {
                // Remote counterpart already gone: idempotent delete.
                debug!(
                    "Delete for {} treated as success: remote already absent",
                    entry.record_id
                );
                self.queue.discard(entry.queue_id).await?;
                Ok(DispatchOutcome::Succeeded)
            }
            Err(err) => self.record_failure(entry, err).await,
        }
    }

    /// Dispatch the payload and apply record-side bookkeeping on success.
    async fn call_gateway(
        &self,
        entry: &QueueEntry,
        parent_remote_id: Option<&str>,
    ) -> std::result::Result<(), GatewayError> {
        match &entry.payload {
            QueuePayload::ReportCreate(report) => {
                let remote_id = self.gateway.create_report(report).await?;
                self.records
                    .bind_remote_id(entry.table, &entry.record_id, &remote_id)
                    .await
                    .map_err(|e| GatewayError::transient(e.to_string()))?;
                Ok(())
            }
            QueuePayload::ReportUpdate(report) => {
                let remote_id = report
                    .remote_id
                    .as_deref()
                    .ok_or_else(|| GatewayError::rejected("Report update without remote id"))?;
                self.gateway.update_report(remote_id, report).await?;
                self.records
                    .mark_synced(entry.table, &entry.record_id)
                    .await
                    .map_err(|e| GatewayError::transient(e.to_string()))?;
                Ok(())
            }
            QueuePayload::ReportDelete { remote_id } => {
                self.gateway.delete_report(remote_id).await
            }
            QueuePayload::ItemCreate(item) => {
                // Presence checked by the caller before dispatch.
                let parent = parent_remote_id
                    .ok_or_else(|| GatewayError::rejected("Item create without parent remote id"))?;
                let remote_id = self.gateway.create_item(parent, item).await?;
                self.records
                    .bind_remote_id(entry.table, &entry.record_id, &remote_id)
                    .await
                    .map_err(|e| GatewayError::transient(e.to_string()))?;
                Ok(())
            }
            QueuePayload::ItemUpdate(item) => {
                let remote_id = item
                    .remote_id
                    .as_deref()
                    .ok_or_else(|| GatewayError::rejected("Item update without remote id"))?;
                self.gateway.update_item(remote_id, item).await?;
                self.records
                    .mark_synced(entry.table, &entry.record_id)
                    .await
                    .map_err(|e| GatewayError::transient(e.to_string()))?;
                Ok(())
            }
            QueuePayload::ItemDelete { remote_id } => self.gateway.delete_item(remote_id).await,
        }
    }

    async fn record_failure(
        &self,
        entry: &QueueEntry,
        err: GatewayError,
    ) -> Result<DispatchOutcome> {
        let attempts = self
            .queue
            .mark_attempt(entry.queue_id, Some(err.message.clone()))
            .await?;

        // Rejected and not-found errors fail identically on retry;
        // short-circuit the remaining attempts instead of burning the full
        // ceiling. Only transient failures are worth repeating.
        let exhausted = attempts >= SYNC_RETRY_CEILING || err.kind != GatewayErrorKind::Transient;
        if exhausted {
            warn!(
                "Abandoning {:?} for {} after {} attempt(s): {}",
                entry.action, entry.record_id, attempts, err.message
            );
            self.records
                .mark_sync_error(entry.table, &entry.record_id)
                .await?;
            self.queue.discard(entry.queue_id).await?;
        } else {
            debug!(
                "Dispatch failed for {} (attempt {}/{}): {}",
                entry.record_id, attempts, SYNC_RETRY_CEILING, err.message
            );
        }
        Ok(DispatchOutcome::Failed)
    }
}
