//! Repository contracts implemented by the SQLite storage crate.
//!
//! Reads are synchronous against the pool; mutations go through the
//! serialized writer and are therefore async. Every mutation is atomic:
//! the row change and its sync-queue side effect commit together.

use async_trait::async_trait;

use crate::errors::Result;

use super::model::{
    ArchiveOutcome, Item, ItemFilter, ItemPatch, NewItem, NewReport, Report, ReportFilter,
    ReportPatch,
};

#[async_trait]
pub trait ReportRepositoryTrait: Send + Sync {
    /// Insert a new report with `sync_status = pending` and enqueue its
    /// `create` entry. Returns the stored record.
    async fn create(&self, new_report: NewReport) -> Result<Report>;

    /// Lookup by `local_id`, falling back to `remote_id` for callers that
    /// only know the server-assigned id.
    fn resolve(&self, id: &str) -> Result<Report>;

    fn find_by_local_id(&self, local_id: &str) -> Result<Option<Report>>;
    fn find_by_remote_id(&self, remote_id: &str) -> Result<Option<Report>>;
    fn list(&self, filter: ReportFilter) -> Result<Vec<Report>>;

    /// Merge partial fields, flip to pending, and enqueue an `update` entry
    /// when the record already exists remotely.
    async fn update(&self, id: &str, patch: ReportPatch) -> Result<Report>;

    /// Same merge, but deliberately without status flip or queue entry.
    /// For purely local bookkeeping that must not trigger a round-trip.
    async fn update_local_only(&self, id: &str, patch: ReportPatch) -> Result<Report>;

    /// Soft-delete a synced report; hard-delete a never-synced one.
    async fn archive(&self, id: &str) -> Result<ArchiveOutcome>;

    /// Remove the report (and its items) locally; enqueue a remote `delete`
    /// only when a `remote_id` exists.
    async fn delete(&self, id: &str) -> Result<()>;
}

#[async_trait]
pub trait ItemRepositoryTrait: Send + Sync {
    async fn create(&self, new_item: NewItem) -> Result<Item>;

    fn resolve(&self, id: &str) -> Result<Item>;
    fn find_by_local_id(&self, local_id: &str) -> Result<Option<Item>>;
    fn find_by_remote_id(&self, remote_id: &str) -> Result<Option<Item>>;
    fn list(&self, filter: ItemFilter) -> Result<Vec<Item>>;

    async fn update(&self, id: &str, patch: ItemPatch) -> Result<Item>;
    async fn update_local_only(&self, id: &str, patch: ItemPatch) -> Result<Item>;
    async fn archive(&self, id: &str) -> Result<ArchiveOutcome>;
    async fn delete(&self, id: &str) -> Result<()>;
}
