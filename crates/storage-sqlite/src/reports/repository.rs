//! Report persistence. Every mutation commits its row change and the
//! matching sync-queue entry in one writer transaction.

use std::sync::Arc;

use chrono::Utc;
use diesel::prelude::*;
use diesel::SqliteConnection;
use uuid::Uuid;

use ledgerly_core::errors::{Error, Result};
use ledgerly_core::records::{
    ArchiveOutcome, NewReport, Report, ReportFilter, ReportPatch, ReportRepositoryTrait,
    SyncStatus,
};
use ledgerly_core::sync::{QueuePayload, QueueTable};

use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::mapping;
use crate::schema::{items, reports};
use crate::sync::{has_queued_create, purge_record_entries, write_queue_entry};

use super::model::ReportDB;

pub struct ReportRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl ReportRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

/// Resolve by `local_id` first, then by `remote_id`, inside the caller's
/// transaction so the merge-and-save below stays consistent.
fn load_for_update(conn: &mut SqliteConnection, id: &str) -> Result<Report> {
    let by_local = reports::table
        .filter(reports::local_id.eq(id))
        .first::<ReportDB>(conn)
        .optional()
        .map_err(StorageError::from)?;
    let row = match by_local {
        Some(row) => Some(row),
        None => reports::table
            .filter(reports::remote_id.eq(id))
            .first::<ReportDB>(conn)
            .optional()
            .map_err(StorageError::from)?,
    };
    row.map(Report::try_from)
        .transpose()?
        .ok_or_else(|| Error::not_found(format!("Report {} not found", id)))
}

fn save(conn: &mut SqliteConnection, report: &Report) -> Result<()> {
    let row = ReportDB::from(report);
    diesel::update(reports::table.filter(reports::local_id.eq(&report.local_id)))
        .set(&row)
        .execute(conn)
        .map_err(StorageError::from)?;
    Ok(())
}

/// Remove the report, its items, and every queue entry belonging to any of
/// them. The remote side cascades item removal from the report delete, so
/// no per-item delete entries are written.
fn remove_locally(conn: &mut SqliteConnection, report: &Report) -> Result<()> {
    let item_ids: Vec<String> = items::table
        .filter(items::parent_local_id.eq(&report.local_id))
        .select(items::local_id)
        .load(conn)
        .map_err(StorageError::from)?;
    for item_id in &item_ids {
        purge_record_entries(conn, QueueTable::Items, item_id)?;
    }
    diesel::delete(items::table.filter(items::parent_local_id.eq(&report.local_id)))
        .execute(conn)
        .map_err(StorageError::from)?;

    purge_record_entries(conn, QueueTable::Reports, &report.local_id)?;
    diesel::delete(reports::table.filter(reports::local_id.eq(&report.local_id)))
        .execute(conn)
        .map_err(StorageError::from)?;
    Ok(())
}

fn apply_update(
    conn: &mut SqliteConnection,
    id: &str,
    patch: ReportPatch,
    enqueue: bool,
) -> Result<Report> {
    let mut report = load_for_update(conn, id)?;
    patch.apply_to(&mut report);
    report.updated_at = Utc::now();
    if enqueue {
        report.sync_status = SyncStatus::Pending;
    }
    save(conn, &report)?;
    if enqueue {
        if report.remote_id.is_some() {
            write_queue_entry(
                conn,
                &report.local_id,
                &QueuePayload::ReportUpdate(report.clone()),
            )?;
        } else if !has_queued_create(conn, QueueTable::Reports, &report.local_id)? {
            // The original create was abandoned at the retry ceiling; this
            // edit revives the record with a fresh create.
            write_queue_entry(
                conn,
                &report.local_id,
                &QueuePayload::ReportCreate(report.clone()),
            )?;
        }
    }
    Ok(report)
}

#[async_trait::async_trait]
impl ReportRepositoryTrait for ReportRepository {
    async fn create(&self, new_report: NewReport) -> Result<Report> {
        let now = Utc::now();
        let report = Report {
            local_id: Uuid::new_v4().to_string(),
            remote_id: None,
            title: new_report.title,
            category: new_report.category,
            currency: new_report.currency,
            notes: new_report.notes,
            report_date: new_report.report_date,
            is_archived: false,
            sync_status: SyncStatus::Pending,
            created_at: now,
            updated_at: now,
            last_synced_at: None,
        };

        let stored = report.clone();
        self.writer
            .exec(move |conn| {
                let row = ReportDB::from(&report);
                diesel::insert_into(reports::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                let local_id = report.local_id.clone();
                write_queue_entry(conn, &local_id, &QueuePayload::ReportCreate(report))?;
                Ok(())
            })
            .await?;
        Ok(stored)
    }

    fn resolve(&self, id: &str) -> Result<Report> {
        if let Some(report) = self.find_by_local_id(id)? {
            return Ok(report);
        }
        self.find_by_remote_id(id)?
            .ok_or_else(|| Error::not_found(format!("Report {} not found", id)))
    }

    fn find_by_local_id(&self, local_id: &str) -> Result<Option<Report>> {
        let mut conn = get_connection(&self.pool)?;
        reports::table
            .filter(reports::local_id.eq(local_id))
            .first::<ReportDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?
            .map(Report::try_from)
            .transpose()
    }

    fn find_by_remote_id(&self, remote_id: &str) -> Result<Option<Report>> {
        let mut conn = get_connection(&self.pool)?;
        reports::table
            .filter(reports::remote_id.eq(remote_id))
            .first::<ReportDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?
            .map(Report::try_from)
            .transpose()
    }

    fn list(&self, filter: ReportFilter) -> Result<Vec<Report>> {
        let mut conn = get_connection(&self.pool)?;
        let mut query = reports::table.into_boxed();
        if !filter.include_archived {
            query = query.filter(reports::is_archived.eq(false));
        }
        if let Some(category) = filter.category {
            query = query.filter(reports::category.eq(category));
        }
        if let Some(from) = mapping::format_opt_date(filter.from_date) {
            query = query.filter(reports::report_date.ge(from));
        }
        if let Some(to) = mapping::format_opt_date(filter.to_date) {
            query = query.filter(reports::report_date.le(to));
        }
        query
            .order(reports::created_at.desc())
            .load::<ReportDB>(&mut conn)
            .map_err(StorageError::from)?
            .into_iter()
            .map(Report::try_from)
            .collect()
    }

    async fn update(&self, id: &str, patch: ReportPatch) -> Result<Report> {
        let id = id.to_string();
        self.writer
            .exec(move |conn| apply_update(conn, &id, patch, true))
            .await
    }

    async fn update_local_only(&self, id: &str, patch: ReportPatch) -> Result<Report> {
        let id = id.to_string();
        self.writer
            .exec(move |conn| apply_update(conn, &id, patch, false))
            .await
    }

    async fn archive(&self, id: &str) -> Result<ArchiveOutcome> {
        let id = id.to_string();
        self.writer
            .exec(move |conn| {
                let report = load_for_update(conn, &id)?;
                if report.remote_id.is_none() {
                    // Nothing to reconcile; the record vanishes without a
                    // trace and without touching the network.
                    remove_locally(conn, &report)?;
                    return Ok(ArchiveOutcome::Removed);
                }
                apply_update(
                    conn,
                    &report.local_id,
                    ReportPatch {
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
                let report = load_for_update(conn, &id)?;
                remove_locally(conn, &report)?;
                if let Some(remote_id) = report.remote_id {
                    write_queue_entry(
                        conn,
                        &report.local_id,
                        &QueuePayload::ReportDelete { remote_id },
                    )?;
                }
                Ok(())
            })
            .await
    }
}
