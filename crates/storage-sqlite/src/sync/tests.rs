use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tempfile::TempDir;

use ledgerly_core::records::{
    ItemFilter, ItemRepositoryTrait, NewItem, NewReport, Report, ReportFilter, ReportPatch,
    ReportRepositoryTrait, SyncStatus,
};
use ledgerly_core::records::ArchiveOutcome;
use ledgerly_core::sync::{
    QueueAction, QueuePayload, QueueTable, RecordSyncStore, SyncQueueStore,
};

use crate::db::{create_pool, init, spawn_writer, WriteHandle};
use crate::items::ItemRepository;
use crate::migrations::run_migrations;
use crate::reports::ReportRepository;

use super::repository::{write_queue_entry, RecordSyncRepository, SyncQueueRepository};

struct Fixture {
    _dir: TempDir,
    writer: WriteHandle,
    reports: ReportRepository,
    items: ItemRepository,
    queue: SyncQueueRepository,
    records: RecordSyncRepository,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let db_path = init(dir.path().to_str().unwrap()).unwrap();
    let pool = create_pool(&db_path).unwrap();
    let mut conn = pool.get().unwrap();
    run_migrations(&mut conn).unwrap();
    drop(conn);
    let writer = spawn_writer(pool.as_ref().clone());
    Fixture {
        _dir: dir,
        writer: writer.clone(),
        reports: ReportRepository::new(Arc::clone(&pool), writer.clone()),
        items: ItemRepository::new(Arc::clone(&pool), writer.clone()),
        queue: SyncQueueRepository::new(Arc::clone(&pool), writer.clone()),
        records: RecordSyncRepository::new(pool, writer),
    }
}

fn travel_report() -> NewReport {
    NewReport {
        title: "Berlin onsite".to_string(),
        category: Some("travel".to_string()),
        currency: "EUR".to_string(),
        notes: None,
        report_date: NaiveDate::from_ymd_opt(2025, 6, 2),
    }
}

fn taxi_item(parent_local_id: &str) -> NewItem {
    NewItem {
        parent_local_id: parent_local_id.to_string(),
        title: "Taxi to airport".to_string(),
        amount: Decimal::new(4250, 2),
        currency: "EUR".to_string(),
        category: Some("transport".to_string()),
        extracted_data: None,
        item_date: NaiveDate::from_ymd_opt(2025, 6, 2),
    }
}

fn canned_report(local_id: &str) -> Report {
    Report {
        local_id: local_id.to_string(),
        remote_id: Some("R-0".to_string()),
        title: "canned".to_string(),
        category: None,
        currency: "EUR".to_string(),
        notes: None,
        report_date: None,
        is_archived: false,
        sync_status: SyncStatus::Pending,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        last_synced_at: None,
    }
}

async fn enqueue_raw(writer: &WriteHandle, record_id: &str, payload: QueuePayload) {
    let record_id = record_id.to_string();
    writer
        .exec(move |conn| write_queue_entry(conn, &record_id, &payload))
        .await
        .unwrap();
}

/// Mark a report's create as dispatched: bind the remote id and drop the
/// create entry, the way a successful sync pass would.
async fn simulate_synced(fx: &Fixture, local_id: &str, remote_id: &str) {
    fx.records
        .bind_remote_id(QueueTable::Reports, local_id, remote_id)
        .await
        .unwrap();
    let create_ids: Vec<i64> = fx
        .queue
        .drain_order()
        .unwrap()
        .into_iter()
        .filter(|e| e.record_id == local_id && e.action == QueueAction::Create)
        .map(|e| e.queue_id)
        .collect();
    for id in create_ids {
        fx.queue.discard(id).await.unwrap();
    }
}

#[tokio::test]
async fn create_commits_row_and_queue_entry_together() {
    let fx = fixture();
    let report = fx.reports.create(travel_report()).await.unwrap();

    assert_eq!(report.sync_status, SyncStatus::Pending);
    assert_eq!(fx.queue.pending_count().unwrap(), 1);

    let entries = fx.queue.drain_order().unwrap();
    assert_eq!(entries[0].action, QueueAction::Create);
    assert_eq!(entries[0].record_id, report.local_id);
    assert_eq!(entries[0].attempts, 0);
}

#[tokio::test]
async fn edits_before_first_sync_ride_along_on_the_create() {
    let fx = fixture();
    let report = fx.reports.create(travel_report()).await.unwrap();
    fx.reports
        .update(
            &report.local_id,
            ReportPatch {
                title: Some("Berlin onsite (amended)".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // No update entry while the record has never been synced.
    let entries = fx.queue.drain_order().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, QueueAction::Create);

    // The create payload reflects the edit.
    match &entries[0].payload {
        QueuePayload::ReportCreate(snapshot) => {
            assert_eq!(snapshot.title, "Berlin onsite (amended)");
        }
        other => panic!("unexpected payload: {:?}", other),
    }
}

#[tokio::test]
async fn edits_after_sync_enqueue_an_update() {
    let fx = fixture();
    let report = fx.reports.create(travel_report()).await.unwrap();
    simulate_synced(&fx, &report.local_id, "R-9").await;

    let updated = fx
        .reports
        .update(
            &report.local_id,
            ReportPatch {
                notes: Some(Some("second pass".to_string())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.sync_status, SyncStatus::Pending);

    let entries = fx.queue.drain_order().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, QueueAction::Update);
    match &entries[0].payload {
        QueuePayload::ReportUpdate(snapshot) => {
            assert_eq!(snapshot.remote_id.as_deref(), Some("R-9"));
            assert_eq!(snapshot.notes.as_deref(), Some("second pass"));
        }
        other => panic!("unexpected payload: {:?}", other),
    }
}

#[tokio::test]
async fn local_only_updates_skip_the_queue_and_the_status_flip() {
    let fx = fixture();
    let report = fx.reports.create(travel_report()).await.unwrap();
    simulate_synced(&fx, &report.local_id, "R-3").await;

    let updated = fx
        .reports
        .update_local_only(
            &report.local_id,
            ReportPatch {
                notes: Some(Some("moved to the Q2 folder".to_string())),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.notes.as_deref(), Some("moved to the Q2 folder"));
    assert_eq!(updated.sync_status, SyncStatus::Synced);
    assert_eq!(fx.queue.pending_count().unwrap(), 0);
}

#[tokio::test]
async fn resolving_by_remote_id_reaches_the_same_row() {
    let fx = fixture();
    let report = fx.reports.create(travel_report()).await.unwrap();
    simulate_synced(&fx, &report.local_id, "R-42").await;

    let resolved = fx.reports.resolve("R-42").unwrap();
    assert_eq!(resolved.local_id, report.local_id);

    let updated = fx
        .reports
        .update(
            "R-42",
            ReportPatch {
                title: Some("renamed via remote id".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.local_id, report.local_id);
}

#[tokio::test]
async fn archiving_a_never_synced_report_leaves_no_trace() {
    let fx = fixture();
    let report = fx.reports.create(travel_report()).await.unwrap();
    fx.items.create(taxi_item(&report.local_id)).await.unwrap();
    assert_eq!(fx.queue.pending_count().unwrap(), 2);

    let outcome = fx.reports.archive(&report.local_id).await.unwrap();
    assert_eq!(outcome, ArchiveOutcome::Removed);
    assert!(fx.reports.find_by_local_id(&report.local_id).unwrap().is_none());
    assert!(fx
        .items
        .list(ItemFilter {
            parent_local_id: Some(report.local_id.clone()),
            include_archived: true,
            ..Default::default()
        })
        .unwrap()
        .is_empty());
    assert_eq!(fx.queue.pending_count().unwrap(), 0);
}

#[tokio::test]
async fn archiving_a_synced_report_soft_deletes_and_enqueues() {
    let fx = fixture();
    let report = fx.reports.create(travel_report()).await.unwrap();
    simulate_synced(&fx, &report.local_id, "R-1").await;

    let outcome = fx.reports.archive(&report.local_id).await.unwrap();
    assert_eq!(outcome, ArchiveOutcome::Archived);

    let stored = fx.reports.resolve(&report.local_id).unwrap();
    assert!(stored.is_archived);
    assert_eq!(stored.sync_status, SyncStatus::Pending);

    // Default listing hides it; explicit opt-in shows it.
    assert!(fx.reports.list(ReportFilter::default()).unwrap().is_empty());
    assert_eq!(
        fx.reports
            .list(ReportFilter {
                include_archived: true,
                ..Default::default()
            })
            .unwrap()
            .len(),
        1
    );

    let entries = fx.queue.drain_order().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, QueueAction::Update);
}

#[tokio::test]
async fn deleting_a_synced_report_cascades_items_and_enqueues_one_delete() {
    let fx = fixture();
    let report = fx.reports.create(travel_report()).await.unwrap();
    simulate_synced(&fx, &report.local_id, "R-1").await;
    let item = fx.items.create(taxi_item(&report.local_id)).await.unwrap();

    fx.reports.delete(&report.local_id).await.unwrap();

    assert!(fx.reports.find_by_local_id(&report.local_id).unwrap().is_none());
    assert!(fx.items.find_by_local_id(&item.local_id).unwrap().is_none());

    // The item's queued create is purged; the server cascades from the
    // report delete.
    let entries = fx.queue.drain_order().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].payload,
        QueuePayload::ReportDelete {
            remote_id: "R-1".to_string()
        }
    );
}

#[tokio::test]
async fn dedup_keeps_only_the_newest_update_per_record() {
    let fx = fixture();
    let report = fx.reports.create(travel_report()).await.unwrap();
    simulate_synced(&fx, &report.local_id, "R-1").await;

    for n in 0..3 {
        fx.reports
            .update(
                &report.local_id,
                ReportPatch {
                    title: Some(format!("revision {}", n)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }
    assert_eq!(fx.queue.pending_count().unwrap(), 3);

    let removed = fx.queue.dedup().await.unwrap();
    assert_eq!(removed, 2);

    let entries = fx.queue.drain_order().unwrap();
    assert_eq!(entries.len(), 1);
    match &entries[0].payload {
        QueuePayload::ReportUpdate(snapshot) => assert_eq!(snapshot.title, "revision 2"),
        other => panic!("unexpected payload: {:?}", other),
    }
}

#[tokio::test]
async fn dedup_drops_updates_shadowed_by_an_undischarged_create() {
    let fx = fixture();
    let report = fx.reports.create(travel_report()).await.unwrap();

    // Repositories never write this shape, but a queue restored from an
    // older database version can contain it.
    enqueue_raw(
        &fx.writer,
        &report.local_id,
        QueuePayload::ReportUpdate(canned_report(&report.local_id)),
    )
    .await;

    let removed = fx.queue.dedup().await.unwrap();
    assert_eq!(removed, 1);

    let entries = fx.queue.drain_order().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, QueueAction::Create);
}

#[tokio::test]
async fn dedup_drops_updates_superseded_by_a_pending_delete() {
    let fx = fixture();

    enqueue_raw(
        &fx.writer,
        "ghost-1",
        QueuePayload::ReportUpdate(canned_report("ghost-1")),
    )
    .await;
    enqueue_raw(
        &fx.writer,
        "ghost-1",
        QueuePayload::ReportDelete {
            remote_id: "R-0".to_string(),
        },
    )
    .await;

    let removed = fx.queue.dedup().await.unwrap();
    assert_eq!(removed, 1);

    let entries = fx.queue.drain_order().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, QueueAction::Delete);
}

#[tokio::test]
async fn attempts_accumulate_until_the_entry_is_discarded() {
    let fx = fixture();
    let report = fx.reports.create(travel_report()).await.unwrap();
    let entry = fx.queue.drain_order().unwrap().remove(0);

    assert_eq!(
        fx.queue
            .mark_attempt(entry.queue_id, Some("connection reset".to_string()))
            .await
            .unwrap(),
        1
    );
    assert_eq!(fx.queue.mark_attempt(entry.queue_id, None).await.unwrap(), 2);

    let reloaded = fx.queue.drain_order().unwrap().remove(0);
    assert_eq!(reloaded.attempts, 2);
    assert_eq!(reloaded.last_error, None);
    assert_eq!(reloaded.record_id, report.local_id);

    fx.queue.discard(entry.queue_id).await.unwrap();
    assert_eq!(fx.queue.pending_count().unwrap(), 0);
}

#[tokio::test]
async fn a_local_edit_revives_an_abandoned_create() {
    let fx = fixture();
    let report = fx.reports.create(travel_report()).await.unwrap();
    let entry = fx.queue.drain_order().unwrap().remove(0);

    // The way a sync pass abandons an entry at the retry ceiling.
    for _ in 0..5 {
        fx.queue
            .mark_attempt(entry.queue_id, Some("server unavailable".to_string()))
            .await
            .unwrap();
    }
    fx.records
        .mark_sync_error(QueueTable::Reports, &report.local_id)
        .await
        .unwrap();
    fx.queue.discard(entry.queue_id).await.unwrap();
    assert_eq!(fx.queue.pending_count().unwrap(), 0);

    fx.reports
        .update(
            &report.local_id,
            ReportPatch {
                title: Some("second try".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let entries = fx.queue.drain_order().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, QueueAction::Create);
    assert_eq!(entries[0].attempts, 0);
    assert_eq!(
        fx.reports.resolve(&report.local_id).unwrap().sync_status,
        SyncStatus::Pending
    );
}

#[tokio::test]
async fn record_store_tracks_remote_identity_and_errors() {
    let fx = fixture();
    let report = fx.reports.create(travel_report()).await.unwrap();

    assert_eq!(fx.records.report_remote_id(&report.local_id).unwrap(), None);

    fx.records
        .bind_remote_id(QueueTable::Reports, &report.local_id, "R-5")
        .await
        .unwrap();
    assert_eq!(
        fx.records.report_remote_id(&report.local_id).unwrap(),
        Some("R-5".to_string())
    );

    let stored = fx.reports.resolve(&report.local_id).unwrap();
    assert_eq!(stored.sync_status, SyncStatus::Synced);
    assert!(stored.last_synced_at.is_some());

    fx.records
        .mark_sync_error(QueueTable::Reports, &report.local_id)
        .await
        .unwrap();
    assert_eq!(fx.records.error_count().unwrap(), 1);

    // Rows that are already gone are a no-op, not an error.
    fx.records
        .mark_sync_error(QueueTable::Reports, "no-such-row")
        .await
        .unwrap();
}
