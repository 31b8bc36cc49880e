//! SQLite implementation of the sync queue and record-side sync state.

pub mod model;
pub mod repository;

pub use model::SyncQueueEntryDB;
pub use repository::{
    has_queued_create, purge_record_entries, write_queue_entry, RecordSyncRepository,
    SyncQueueRepository,
};

#[cfg(test)]
mod tests;
