//! Ports consumed by the sync manager. The storage crate implements the
//! queue and record stores; the connect crate implements the gateway; the
//! application layer supplies a network monitor.

use async_trait::async_trait;

use crate::errors::Result;
use crate::records::{Item, Report};

use super::queue_model::{QueueEntry, QueueTable};

/// Classification of a gateway failure, driving the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    /// Network/server-side; retried up to the ceiling.
    Transient,
    /// Validation-class; expected to fail identically on retry.
    Rejected,
    /// The remote counterpart does not exist. Success for deletes.
    NotFound,
}

#[derive(Debug, Clone)]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    pub message: String,
}

impl GatewayError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: GatewayErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            kind: GatewayErrorKind::Rejected,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: GatewayErrorKind::NotFound,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for GatewayError {}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Remote API surface. Creates return the server-issued id.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn create_report(&self, report: &Report) -> GatewayResult<String>;
    async fn update_report(&self, remote_id: &str, report: &Report) -> GatewayResult<()>;
    async fn delete_report(&self, remote_id: &str) -> GatewayResult<()>;

    async fn create_item(&self, parent_remote_id: &str, item: &Item) -> GatewayResult<String>;
    async fn update_item(&self, remote_id: &str, item: &Item) -> GatewayResult<()>;
    async fn delete_item(&self, remote_id: &str) -> GatewayResult<()>;
}

/// Connectivity signal. Polled at pass start and between entries.
pub trait NetworkMonitor: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Pending-mutation ledger operations used during a pass.
#[async_trait]
pub trait SyncQueueStore: Send + Sync {
    /// All entries in dispatch order: `created_at` ascending with the
    /// insertion-ordered id as tiebreaker.
    fn drain_order(&self) -> Result<Vec<QueueEntry>>;

    /// Collapse redundant entries; returns the number removed.
    async fn dedup(&self) -> Result<usize>;

    /// Increment the attempt counter and record the error. Returns the new
    /// attempt count.
    async fn mark_attempt(&self, queue_id: i64, error: Option<String>) -> Result<i32>;

    /// Remove an entry, either on success or once the retry ceiling is
    /// reached.
    async fn discard(&self, queue_id: i64) -> Result<()>;

    fn pending_count(&self) -> Result<i64>;
}

/// Record-side bookkeeping driven by reconciliation results.
#[async_trait]
pub trait RecordSyncStore: Send + Sync {
    /// Parent-readiness probe for deferred item creates.
    fn report_remote_id(&self, report_local_id: &str) -> Result<Option<String>>;

    /// Bind the server-issued id after a successful create and mark the
    /// record synced.
    async fn bind_remote_id(
        &self,
        table: QueueTable,
        local_id: &str,
        remote_id: &str,
    ) -> Result<()>;

    /// Mark a record synced after a successful update dispatch.
    async fn mark_synced(&self, table: QueueTable, local_id: &str) -> Result<()>;

    /// Flag a record as failed after the retry ceiling or a rejection.
    /// A no-op when the local row no longer exists (deletes).
    async fn mark_sync_error(&self, table: QueueTable, local_id: &str) -> Result<()>;

    fn error_count(&self) -> Result<i64>;
}
