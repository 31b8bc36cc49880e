//! Item persistence. Mirrors the report repository; the one extra rule is
//! that creates require an existing parent report row.

use std::sync::Arc;

use chrono::Utc;
use diesel::prelude::*;
use diesel::SqliteConnection;
use uuid::Uuid;

use ledgerly_core::errors::{Error, Result};
use ledgerly_core::records::{
    ArchiveOutcome, Item, ItemFilter, ItemPatch, ItemRepositoryTrait, NewItem, SyncStatus,
};
use ledgerly_core::sync::{QueuePayload, QueueTable};

use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::mapping;
use crate::schema::{items, reports};
use crate::sync::{has_queued_create, purge_record_entries, write_queue_entry};

use super::model::ItemDB;

pub struct ItemRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl ItemRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

fn load_for_update(conn: &mut SqliteConnection, id: &str) -> Result<Item> {
    let by_local = items::table
        .filter(items::local_id.eq(id))
        .first::<ItemDB>(conn)
        .optional()
        .map_err(StorageError::from)?;
    let row = match by_local {
        Some(row) => Some(row),
        None => items::table
            .filter(items::remote_id.eq(id))
            .first::<ItemDB>(conn)
            .optional()
            .map_err(StorageError::from)?,
    };
    row.map(Item::try_from)
        .transpose()?
        .ok_or_else(|| Error::not_found(format!("Item {} not found", id)))
}

fn save(conn: &mut SqliteConnection, item: &Item) -> Result<()> {
    let row = ItemDB::from(item);
    diesel::update(items::table.filter(items::local_id.eq(&item.local_id)))
        .set(&row)
        .execute(conn)
        .map_err(StorageError::from)?;
    Ok(())
}

fn remove_locally(conn: &mut SqliteConnection, item: &Item) -> Result<()> {
    purge_record_entries(conn, QueueTable::Items, &item.local_id)?;
    diesel::delete(items::table.filter(items::local_id.eq(&item.local_id)))
        .execute(conn)
        .map_err(StorageError::from)?;
    Ok(())
}

fn apply_update(
    conn: &mut SqliteConnection,
    id: &str,
    patch: ItemPatch,
    enqueue: bool,
) -> Result<Item> {
    let mut item = load_for_update(conn, id)?;
    patch.apply_to(&mut item);
    item.updated_at = Utc::now();
    if enqueue {
        item.sync_status = SyncStatus::Pending;
    }
    save(conn, &item)?;
    if enqueue {
        if item.remote_id.is_some() {
            write_queue_entry(conn, &item.local_id, &QueuePayload::ItemUpdate(item.clone()))?;
        } else if !has_queued_create(conn, QueueTable::Items, &item.local_id)? {
            // Revive an item whose create was abandoned at the retry
            // ceiling.
            write_queue_entry(conn, &item.local_id, &QueuePayload::ItemCreate(item.clone()))?;
        }
    }
    Ok(item)
}

#[async_trait::async_trait]
impl ItemRepositoryTrait for ItemRepository {
    async fn create(&self, new_item: NewItem) -> Result<Item> {
        let now = Utc::now();
        let item = Item {
            local_id: Uuid::new_v4().to_string(),
            remote_id: None,
            parent_local_id: new_item.parent_local_id,
            title: new_item.title,
            amount: new_item.amount,
            currency: new_item.currency,
            category: new_item.category,
            extracted_data: new_item.extracted_data,
            item_date: new_item.item_date,
            is_archived: false,
            sync_status: SyncStatus::Pending,
            created_at: now,
            updated_at: now,
            last_synced_at: None,
        };

        let stored = item.clone();
        self.writer
            .exec(move |conn| {
                let parent_exists: i64 = reports::table
                    .filter(reports::local_id.eq(&item.parent_local_id))
                    .count()
                    .get_result(conn)
                    .map_err(StorageError::from)?;
                if parent_exists == 0 {
                    return Err(Error::not_found(format!(
                        "Report {} not found",
                        item.parent_local_id
                    )));
                }

                let row = ItemDB::from(&item);
                diesel::insert_into(items::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                let local_id = item.local_id.clone();
                write_queue_entry(conn, &local_id, &QueuePayload::ItemCreate(item))?;
                Ok(())
            })
            .await?;
        Ok(stored)
    }

    fn resolve(&self, id: &str) -> Result<Item> {
        if let Some(item) = self.find_by_local_id(id)? {
            return Ok(item);
        }
        self.find_by_remote_id(id)?
            .ok_or_else(|| Error::not_found(format!("Item {} not found", id)))
    }

    fn find_by_local_id(&self, local_id: &str) -> Result<Option<Item>> {
        let mut conn = get_connection(&self.pool)?;
        items::table
            .filter(items::local_id.eq(local_id))
            .first::<ItemDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?
            .map(Item::try_from)
            .transpose()
    }

    fn find_by_remote_id(&self, remote_id: &str) -> Result<Option<Item>> {
        let mut conn = get_connection(&self.pool)?;
        items::table
            .filter(items::remote_id.eq(remote_id))
            .first::<ItemDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?
            .map(Item::try_from)
            .transpose()
    }

    fn list(&self, filter: ItemFilter) -> Result<Vec<Item>> {
        let mut conn = get_connection(&self.pool)?;
        let mut query = items::table.into_boxed();
        if !filter.include_archived {
            query = query.filter(items::is_archived.eq(false));
        }
        if let Some(parent) = filter.parent_local_id {
            query = query.filter(items::parent_local_id.eq(parent));
        }
        if let Some(from) = mapping::format_opt_date(filter.from_date) {
            query = query.filter(items::item_date.ge(from));
        }
        if let Some(to) = mapping::format_opt_date(filter.to_date) {
            query = query.filter(items::item_date.le(to));
        }
        query
            .order(items::created_at.desc())
            .load::<ItemDB>(&mut conn)
            .map_err(StorageError::from)?
            .into_iter()
            .map(Item::try_from)
            .collect()
    }

    async fn update(&self, id: &str, patch: ItemPatch) -> Result<Item> {
        let id = id.to_string();
        self.writer
            .exec(move |conn| apply_update(conn, &id, patch, true))
            .await
    }

    async fn update_local_only(&self, id: &str, patch: ItemPatch) -> Result<Item> {
        let id = id.to_string();
        self.writer
            .exec(move |conn| apply_update(conn, &id, patch, false))
            .await
    }

    async fn archive(&self, id: &str) -> Result<ArchiveOutcome> {
        let id = id.to_string();
        self.writer
            .exec(move |conn| {
                let item = load_for_update(conn, &id)?;
                if item.remote_id.is_none() {
                    remove_locally(conn, &item)?;
                    return Ok(ArchiveOutcome::Removed);
                }
                apply_update(
                    conn,
                    &item.local_id,
                    ItemPatch {
                        is_archived: Some(true),
                        ..Default::default()
                    },
                    true,
                )?;
                Ok(ArchiveOutcome::Archived)
            })
            .await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.writer
            .exec(move |conn| {
                let item = load_for_update(conn, &id)?;
                remove_locally(conn, &item)?;
                if let Some(remote_id) = item.remote_id {
                    write_queue_entry(
                        conn,
                        &item.local_id,
                        &QueuePayload::ItemDelete { remote_id },
                    )?;
                }
                Ok(())
            })
            .await
    }
}
