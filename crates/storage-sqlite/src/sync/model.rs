use diesel::prelude::*;

use ledgerly_core::errors::Result;
use ledgerly_core::sync::{QueueAction, QueueEntry, QueuePayload, QueueTable};

use crate::mapping;
use crate::schema::sync_queue;

/// Row shape of the `sync_queue` table. The payload column holds the JSON
/// snapshot captured at enqueue time.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = sync_queue)]
#[diesel(primary_key(queue_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SyncQueueEntryDB {
    pub queue_id: i64,
    pub table_name: String,
    pub record_id: String,
    pub action: String,
    pub payload: String,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: String,
}

/// Insert shape; `queue_id` is assigned by the database.
#[derive(Debug, Insertable)]
#[diesel(table_name = sync_queue)]
pub struct NewSyncQueueEntryDB {
    pub table_name: String,
    pub record_id: String,
    pub action: String,
    pub payload: String,
    pub attempts: i32,
    pub created_at: String,
}

pub(crate) fn table_to_str(table: QueueTable) -> &'static str {
    match table {
        QueueTable::Reports => "reports",
        QueueTable::Items => "items",
    }
}

pub(crate) fn table_from_str(value: &str) -> Result<QueueTable> {
    match value {
        "reports" => Ok(QueueTable::Reports),
        "items" => Ok(QueueTable::Items),
        other => Err(mapping::corrupt_row("table_name", other)),
    }
}

pub(crate) fn action_to_str(action: QueueAction) -> &'static str {
    match action {
        QueueAction::Create => "create",
        QueueAction::Update => "update",
        QueueAction::Delete => "delete",
    }
}

pub(crate) fn action_from_str(value: &str) -> Result<QueueAction> {
    match value {
        "create" => Ok(QueueAction::Create),
        "update" => Ok(QueueAction::Update),
        "delete" => Ok(QueueAction::Delete),
        other => Err(mapping::corrupt_row("action", other)),
    }
}

impl TryFrom<SyncQueueEntryDB> for QueueEntry {
    type Error = ledgerly_core::Error;

    fn try_from(row: SyncQueueEntryDB) -> Result<Self> {
        let payload: QueuePayload = serde_json::from_str(&row.payload)?;
        Ok(Self {
            queue_id: row.queue_id,
            table: table_from_str(&row.table_name)?,
            record_id: row.record_id,
            action: action_from_str(&row.action)?,
            payload,
            attempts: row.attempts,
            last_error: row.last_error,
            created_at: mapping::parse_datetime("created_at", &row.created_at)?,
        })
    }
}
