//! Sync queue domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::records::{Item, Report};

/// Maximum dispatch attempts before a queue entry is abandoned and the
/// record is flagged `error`. Further local edits enqueue a fresh entry
/// with a reset counter.
pub const SYNC_RETRY_CEILING: i32 = 5;

/// Local tables participating in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueTable {
    Reports,
    Items,
}

/// Supported queue actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueAction {
    Create,
    Update,
    Delete,
}

/// Typed snapshot carried by a queue entry, captured at enqueue time.
/// Later edits append new entries rather than mutating old ones; delete
/// variants only need the server-side identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueuePayload {
    ReportCreate(Report),
    ReportUpdate(Report),
    ReportDelete { remote_id: String },
    ItemCreate(Item),
    ItemUpdate(Item),
    ItemDelete { remote_id: String },
}

impl QueuePayload {
    pub fn table(&self) -> QueueTable {
        match self {
            Self::ReportCreate(_) | Self::ReportUpdate(_) | Self::ReportDelete { .. } => {
                QueueTable::Reports
            }
            Self::ItemCreate(_) | Self::ItemUpdate(_) | Self::ItemDelete { .. } => {
                QueueTable::Items
            }
        }
    }

    pub fn action(&self) -> QueueAction {
        match self {
            Self::ReportCreate(_) | Self::ItemCreate(_) => QueueAction::Create,
            Self::ReportUpdate(_) | Self::ItemUpdate(_) => QueueAction::Update,
            Self::ReportDelete { .. } | Self::ItemDelete { .. } => QueueAction::Delete,
        }
    }
}

/// One pending mutation in dispatch order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub queue_id: i64,
    pub table: QueueTable,
    pub record_id: String,
    pub action: QueueAction,
    pub payload: QueuePayload,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Snapshot of sync health exposed to the application layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStats {
    pub pending_count: i64,
    pub error_count: i64,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub is_running: bool,
}

/// How a sync pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPassOutcome {
    /// Every due entry was attempted once.
    Completed,
    /// The device was offline at pass start; nothing was touched.
    Offline,
    /// Connectivity dropped mid-pass; remaining entries were left queued
    /// without incrementing their attempts.
    AbortedOffline,
    /// Another pass was already in flight; this trigger coalesced into it.
    AlreadyRunning,
}

/// Per-pass counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPassSummary {
    pub outcome: SyncPassOutcome,
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Item creates skipped because the parent report has no remote id yet.
    pub deferred: usize,
}

impl SyncPassSummary {
    pub fn empty(outcome: SyncPassOutcome) -> Self {
        Self {
            outcome,
            dispatched: 0,
            succeeded: 0,
            failed: 0,
            deferred: 0,
        }
    }
}
