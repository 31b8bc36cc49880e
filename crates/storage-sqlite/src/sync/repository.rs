//! Sync queue persistence and the record-side sync bookkeeping.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use diesel::prelude::*;
use diesel::SqliteConnection;
use log::debug;

use ledgerly_core::errors::Result;
use ledgerly_core::records::{Item, Report};
use ledgerly_core::sync::{QueueEntry, QueuePayload, QueueTable, RecordSyncStore, SyncQueueStore};

use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::items::ItemDB;
use crate::reports::ReportDB;
use crate::schema::{items, reports, sync_queue};

use super::model::{action_to_str, table_to_str, NewSyncQueueEntryDB, SyncQueueEntryDB};

/// Append a queue entry inside the caller's transaction. Record mutations
/// call this so the row change and its queue entry commit together.
pub fn write_queue_entry(
    conn: &mut SqliteConnection,
    record_id: &str,
    payload: &QueuePayload,
) -> Result<()> {
    let row = NewSyncQueueEntryDB {
        table_name: table_to_str(payload.table()).to_string(),
        record_id: record_id.to_string(),
        action: action_to_str(payload.action()).to_string(),
        payload: serde_json::to_string(payload)?,
        attempts: 0,
        created_at: Utc::now().to_rfc3339(),
    };

    diesel::insert_into(sync_queue::table)
        .values(&row)
        .execute(conn)
        .map_err(StorageError::from)?;
    Ok(())
}

/// Drop every queue entry for one record, inside the caller's transaction.
/// Used when a record is removed locally before its mutations ever reached
/// the server.
pub fn purge_record_entries(
    conn: &mut SqliteConnection,
    table: QueueTable,
    record_id: &str,
) -> Result<usize> {
    let purged = diesel::delete(
        sync_queue::table
            .filter(sync_queue::table_name.eq(table_to_str(table)))
            .filter(sync_queue::record_id.eq(record_id)),
    )
    .execute(conn)
    .map_err(StorageError::from)?;
    Ok(purged)
}

/// Whether a create entry for the record is still queued. Drives revival:
/// an edit to a never-synced record whose create was abandoned re-enqueues
/// a fresh create with a reset attempt counter.
pub fn has_queued_create(
    conn: &mut SqliteConnection,
    table: QueueTable,
    record_id: &str,
) -> Result<bool> {
    let count: i64 = sync_queue::table
        .filter(sync_queue::table_name.eq(table_to_str(table)))
        .filter(sync_queue::record_id.eq(record_id))
        .filter(sync_queue::action.eq("create"))
        .count()
        .get_result(conn)
        .map_err(StorageError::from)?;
    Ok(count > 0)
}

fn load_in_drain_order(conn: &mut SqliteConnection) -> Result<Vec<SyncQueueEntryDB>> {
    sync_queue::table
        .order((sync_queue::created_at.asc(), sync_queue::queue_id.asc()))
        .load::<SyncQueueEntryDB>(conn)
        .map_err(StorageError::from)
        .map_err(ledgerly_core::Error::from)
}

/// Creates dispatch the record's current state, not the enqueue-time
/// snapshot. Edits made before the first successful sync never enqueue an
/// update entry, so the create has to carry them.
fn refresh_create_snapshot(conn: &mut SqliteConnection, entry: &mut QueueEntry) -> Result<()> {
    match &entry.payload {
        QueuePayload::ReportCreate(_) => {
            let row = reports::table
                .filter(reports::local_id.eq(&entry.record_id))
                .first::<ReportDB>(conn)
                .optional()
                .map_err(StorageError::from)?;
            if let Some(row) = row {
                entry.payload = QueuePayload::ReportCreate(Report::try_from(row)?);
            }
        }
        QueuePayload::ItemCreate(_) => {
            let row = items::table
                .filter(items::local_id.eq(&entry.record_id))
                .first::<ItemDB>(conn)
                .optional()
                .map_err(StorageError::from)?;
            if let Some(row) = row {
                entry.payload = QueuePayload::ItemCreate(Item::try_from(row)?);
            }
        }
        _ => {}
    }
    Ok(())
}

pub struct SyncQueueRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl SyncQueueRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait::async_trait]
impl SyncQueueStore for SyncQueueRepository {
    fn drain_order(&self) -> Result<Vec<QueueEntry>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = load_in_drain_order(&mut conn)?;
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let mut entry = QueueEntry::try_from(row)?;
            refresh_create_snapshot(&mut conn, &mut entry)?;
            entries.push(entry);
        }
        Ok(entries)
    }

    async fn dedup(&self) -> Result<usize> {
        self.writer
            .exec(|conn| {
                let rows = load_in_drain_order(conn)?;
                let mut remove: HashSet<i64> = HashSet::new();

                // Entries for the same (table, record, action) collapse to
                // the newest one; a burst of edits keeps only the latest
                // update payload.
                let mut last_seen: HashMap<(&str, &str, &str), i64> = HashMap::new();
                for row in &rows {
                    let key = (
                        row.table_name.as_str(),
                        row.record_id.as_str(),
                        row.action.as_str(),
                    );
                    if let Some(previous) = last_seen.insert(key, row.queue_id) {
                        remove.insert(previous);
                    }
                }

                // Updates are redundant when the record's create has not been
                // dispatched yet (the create carries the snapshot and the
                // record cannot be addressed remotely), and when a later
                // delete makes them moot. Creates and deletes are never
                // shadowed.
                let mut groups: HashMap<(&str, &str), Vec<&SyncQueueEntryDB>> = HashMap::new();
                for row in &rows {
                    groups
                        .entry((row.table_name.as_str(), row.record_id.as_str()))
                        .or_default()
                        .push(row);
                }
                for group in groups.values() {
                    let has_create = group.iter().any(|r| r.action == "create");
                    let first_delete = group.iter().position(|r| r.action == "delete");
                    for (position, row) in group.iter().enumerate() {
                        if row.action != "update" {
                            continue;
                        }
                        let shadowed = has_create
                            || first_delete.map_or(false, |delete_at| position < delete_at);
                        if shadowed {
                            remove.insert(row.queue_id);
                        }
                    }
                }

                if remove.is_empty() {
                    return Ok(0);
                }

                let ids: Vec<i64> = remove.into_iter().collect();
                let removed =
                    diesel::delete(sync_queue::table.filter(sync_queue::queue_id.eq_any(&ids)))
                        .execute(conn)
                        .map_err(StorageError::from)?;
                debug!("Dedup removed {} redundant queue entries", removed);
                Ok(removed)
            })
            .await
    }

    async fn mark_attempt(&self, queue_id: i64, error: Option<String>) -> Result<i32> {
        self.writer
            .exec(move |conn| {
                let attempts = diesel::update(
                    sync_queue::table.filter(sync_queue::queue_id.eq(queue_id)),
                )
                .set((
                    sync_queue::attempts.eq(sync_queue::attempts + 1),
                    sync_queue::last_error.eq(error),
                ))
                .returning(sync_queue::attempts)
                .get_result::<i32>(conn)
                .map_err(StorageError::from)?;
                Ok(attempts)
            })
            .await
    }

    async fn discard(&self, queue_id: i64) -> Result<()> {
        self.writer
            .exec(move |conn| {
                diesel::delete(sync_queue::table.filter(sync_queue::queue_id.eq(queue_id)))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    fn pending_count(&self) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        sync_queue::table
            .count()
            .get_result(&mut conn)
            .map_err(StorageError::from)
            .map_err(ledgerly_core::Error::from)
    }
}

pub struct RecordSyncRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl RecordSyncRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait::async_trait]
impl RecordSyncStore for RecordSyncRepository {
    fn report_remote_id(&self, report_local_id: &str) -> Result<Option<String>> {
        let mut conn = get_connection(&self.pool)?;
        let remote_id = reports::table
            .filter(reports::local_id.eq(report_local_id))
            .select(reports::remote_id)
            .first::<Option<String>>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(remote_id.flatten())
    }

    async fn bind_remote_id(
        &self,
        table: QueueTable,
        local_id: &str,
        remote_id: &str,
    ) -> Result<()> {
        let local_id = local_id.to_string();
        let remote_id = remote_id.to_string();
        self.writer
            .exec(move |conn| {
                let now = Utc::now().to_rfc3339();
                match table {
                    QueueTable::Reports => {
                        diesel::update(reports::table.filter(reports::local_id.eq(&local_id)))
                            .set((
                                reports::remote_id.eq(&remote_id),
                                reports::sync_status.eq("synced"),
                                reports::updated_at.eq(&now),
                                reports::last_synced_at.eq(&now),
                            ))
                            .execute(conn)
                            .map_err(StorageError::from)?;
                    }
                    QueueTable::Items => {
                        diesel::update(items::table.filter(items::local_id.eq(&local_id)))
                            .set((
                                items::remote_id.eq(&remote_id),
                                items::sync_status.eq("synced"),
                                items::updated_at.eq(&now),
                                items::last_synced_at.eq(&now),
                            ))
                            .execute(conn)
                            .map_err(StorageError::from)?;
                    }
                }
                Ok(())
            })
            .await
    }

    async fn mark_synced(&self, table: QueueTable, local_id: &str) -> Result<()> {
        let local_id = local_id.to_string();
        self.writer
            .exec(move |conn| {
                let now = Utc::now().to_rfc3339();
                match table {
                    QueueTable::Reports => {
                        diesel::update(reports::table.filter(reports::local_id.eq(&local_id)))
                            .set((
                                reports::sync_status.eq("synced"),
                                reports::updated_at.eq(&now),
                                reports::last_synced_at.eq(&now),
                            ))
                            .execute(conn)
                            .map_err(StorageError::from)?;
                    }
                    QueueTable::Items => {
                        diesel::update(items::table.filter(items::local_id.eq(&local_id)))
                            .set((
                                items::sync_status.eq("synced"),
                                items::updated_at.eq(&now),
                                items::last_synced_at.eq(&now),
                            ))
                            .execute(conn)
                            .map_err(StorageError::from)?;
                    }
                }
                Ok(())
            })
            .await
    }

    async fn mark_sync_error(&self, table: QueueTable, local_id: &str) -> Result<()> {
        let local_id = local_id.to_string();
        self.writer
            .exec(move |conn| {
                // Zero rows is fine: the local row is already gone for
                // abandoned deletes.
                let now = Utc::now().to_rfc3339();
                match table {
                    QueueTable::Reports => {
                        diesel::update(reports::table.filter(reports::local_id.eq(&local_id)))
                            .set((
                                reports::sync_status.eq("error"),
                                reports::updated_at.eq(&now),
                            ))
                            .execute(conn)
                            .map_err(StorageError::from)?;
                    }
                    QueueTable::Items => {
                        diesel::update(items::table.filter(items::local_id.eq(&local_id)))
                            .set((items::sync_status.eq("error"), items::updated_at.eq(&now)))
                            .execute(conn)
                            .map_err(StorageError::from)?;
                    }
                }
                Ok(())
            })
            .await
    }

    fn error_count(&self) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        let report_errors: i64 = reports::table
            .filter(reports::sync_status.eq("error"))
            .count()
            .get_result(&mut conn)
            .map_err(StorageError::from)?;
        let item_errors: i64 = items::table
            .filter(items::sync_status.eq("error"))
            .count()
            .get_result(&mut conn)
            .map_err(StorageError::from)?;
        Ok(report_errors + item_errors)
    }
}
