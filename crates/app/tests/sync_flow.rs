//! End-to-end flows through the assembled context: SQLite stores, the sync
//! engine, and a scripted in-process server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tempfile::TempDir;

use ledgerly_app::ServiceContext;
use ledgerly_connect::SharedNetworkMonitor;
use ledgerly_core::records::{
    ArchiveOutcome, Item, ItemPatch, NewItem, NewReport, Report, ReportPatch, SyncStatus,
};
use ledgerly_core::sync::{
    GatewayError, GatewayResult, NetworkMonitor, RemoteGateway, SyncPassOutcome,
};

#[derive(Default)]
struct FakeServer {
    calls: Mutex<Vec<String>>,
    next_id: AtomicUsize,
    failure: Mutex<Option<GatewayError>>,
}

impl FakeServer {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn fail_with(&self, err: GatewayError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    fn heal(&self) {
        *self.failure.lock().unwrap() = None;
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn accept(&self, call: String) -> GatewayResult<()> {
        if let Some(err) = self.failure.lock().unwrap().clone() {
            return Err(err);
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }

    fn issue_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl RemoteGateway for FakeServer {
    async fn create_report(&self, report: &Report) -> GatewayResult<String> {
        self.accept(format!("create_report {}", report.title))?;
        Ok(self.issue_id("R"))
    }

    async fn update_report(&self, remote_id: &str, report: &Report) -> GatewayResult<()> {
        self.accept(format!("update_report {} {}", remote_id, report.title))
    }

    async fn delete_report(&self, remote_id: &str) -> GatewayResult<()> {
        self.accept(format!("delete_report {}", remote_id))
    }

    async fn create_item(&self, parent_remote_id: &str, item: &Item) -> GatewayResult<String> {
        self.accept(format!("create_item {} {}", parent_remote_id, item.title))?;
        Ok(self.issue_id("I"))
    }

    async fn update_item(&self, remote_id: &str, item: &Item) -> GatewayResult<()> {
        self.accept(format!("update_item {} {}", remote_id, item.amount))
    }

    async fn delete_item(&self, remote_id: &str) -> GatewayResult<()> {
        self.accept(format!("delete_item {}", remote_id))
    }
}

struct App {
    _dir: TempDir,
    ctx: ServiceContext,
    server: Arc<FakeServer>,
    monitor: Arc<SharedNetworkMonitor>,
}

async fn start(online: bool) -> App {
    let dir = tempfile::tempdir().unwrap();
    let server = FakeServer::new();
    let monitor = SharedNetworkMonitor::new(online);
    let ctx = ServiceContext::initialize(
        dir.path().to_str().unwrap(),
        Arc::clone(&server) as Arc<dyn RemoteGateway>,
        Arc::clone(&monitor) as Arc<dyn NetworkMonitor>,
    )
    .await
    .unwrap();
    App {
        _dir: dir,
        ctx,
        server,
        monitor,
    }
}

fn trip_report() -> NewReport {
    NewReport {
        title: "Trip to Paris".to_string(),
        category: Some("travel".to_string()),
        currency: "EUR".to_string(),
        notes: None,
        report_date: None,
    }
}

fn taxi(parent_local_id: &str) -> NewItem {
    NewItem {
        parent_local_id: parent_local_id.to_string(),
        title: "Taxi".to_string(),
        amount: Decimal::new(2300, 2),
        currency: "EUR".to_string(),
        category: Some("transport".to_string()),
        extracted_data: None,
        item_date: None,
    }
}

#[tokio::test]
async fn offline_mutations_reach_the_server_once_connectivity_returns() {
    let app = start(false).await;
    let reports = app.ctx.report_service();
    let items = app.ctx.item_service();

    let report = reports.create_report(trip_report()).await.unwrap();
    let item = items.create_item(taxi(&report.local_id)).await.unwrap();

    let summary = app.ctx.sync_manager().run_pass().await.unwrap();
    assert_eq!(summary.outcome, SyncPassOutcome::Offline);
    assert!(app.server.calls().is_empty());
    assert_eq!(app.ctx.sync_stats().unwrap().pending_count, 2);

    app.monitor.set_online(true);
    let summary = app.ctx.sync_manager().run_pass().await.unwrap();
    assert_eq!(summary.outcome, SyncPassOutcome::Completed);
    assert_eq!(summary.succeeded, 2);

    // The parent report binds its remote id first; the item follows within
    // the same pass.
    assert_eq!(
        app.server.calls(),
        vec!["create_report Trip to Paris", "create_item R-1 Taxi"]
    );

    let report = reports.get_report(&report.local_id).unwrap();
    assert_eq!(report.sync_status, SyncStatus::Synced);
    assert_eq!(report.remote_id.as_deref(), Some("R-1"));

    let item = items.get_item(&item.local_id).unwrap();
    assert_eq!(item.sync_status, SyncStatus::Synced);
    assert_eq!(item.remote_id.as_deref(), Some("I-2"));

    let stats = app.ctx.sync_stats().unwrap();
    assert_eq!(stats.pending_count, 0);
    assert!(stats.last_sync_time.is_some());
}

#[tokio::test]
async fn archiving_a_never_synced_report_never_touches_the_network() {
    let app = start(true).await;
    let reports = app.ctx.report_service();

    let report = reports.create_report(trip_report()).await.unwrap();
    let outcome = reports.archive_report(&report.local_id).await.unwrap();
    assert_eq!(outcome, ArchiveOutcome::Removed);

    let summary = app.ctx.sync_manager().run_pass().await.unwrap();
    assert_eq!(summary.outcome, SyncPassOutcome::Completed);
    assert_eq!(summary.dispatched, 0);
    assert!(app.server.calls().is_empty());
    assert_eq!(app.ctx.sync_stats().unwrap().pending_count, 0);
}

#[tokio::test]
async fn transient_failures_exhaust_the_ceiling_and_an_edit_revives() {
    let app = start(true).await;
    let reports = app.ctx.report_service();

    app.server
        .fail_with(GatewayError::transient("503 Service Unavailable"));
    let report = reports.create_report(trip_report()).await.unwrap();

    for _ in 0..5 {
        app.ctx.sync_manager().run_pass().await.unwrap();
    }

    let stats = app.ctx.sync_stats().unwrap();
    assert_eq!(stats.pending_count, 0);
    assert_eq!(stats.error_count, 1);
    assert_eq!(
        reports.get_report(&report.local_id).unwrap().sync_status,
        SyncStatus::Error
    );

    app.server.heal();
    reports
        .update_report(
            &report.local_id,
            ReportPatch {
                title: Some("Trip to Paris (fixed)".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let summary = app.ctx.sync_manager().run_pass().await.unwrap();
    assert_eq!(summary.succeeded, 1);

    let revived = reports.get_report(&report.local_id).unwrap();
    assert_eq!(revived.sync_status, SyncStatus::Synced);
    assert!(revived.remote_id.is_some());
    assert_eq!(app.server.calls(), vec!["create_report Trip to Paris (fixed)"]);
}

#[tokio::test]
async fn rejected_failures_do_not_burn_the_full_ceiling() {
    let app = start(true).await;
    let reports = app.ctx.report_service();

    app.server
        .fail_with(GatewayError::rejected("422 currency is required"));
    let report = reports.create_report(trip_report()).await.unwrap();

    let summary = app.ctx.sync_manager().run_pass().await.unwrap();
    assert_eq!(summary.failed, 1);

    let stats = app.ctx.sync_stats().unwrap();
    assert_eq!(stats.pending_count, 0);
    assert_eq!(stats.error_count, 1);
    assert_eq!(
        reports.get_report(&report.local_id).unwrap().sync_status,
        SyncStatus::Error
    );
}

#[tokio::test]
async fn an_update_burst_collapses_to_the_latest_payload() {
    let app = start(true).await;
    let reports = app.ctx.report_service();

    let report = reports.create_report(trip_report()).await.unwrap();
    app.ctx.sync_manager().run_pass().await.unwrap();

    for n in 1..=10 {
        reports
            .update_report(
                &report.local_id,
                ReportPatch {
                    title: Some(format!("Trip to Paris v{}", n)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    let summary = app.ctx.sync_manager().run_pass().await.unwrap();
    assert_eq!(summary.dispatched, 1);

    let calls = app.server.calls();
    assert_eq!(
        calls,
        vec![
            "create_report Trip to Paris",
            "update_report R-1 Trip to Paris v10"
        ]
    );
    assert_eq!(app.ctx.sync_stats().unwrap().pending_count, 0);
}

#[tokio::test]
async fn item_edits_and_report_deletion_round_trip() {
    let app = start(true).await;
    let reports = app.ctx.report_service();
    let items = app.ctx.item_service();

    let report = reports.create_report(trip_report()).await.unwrap();
    let item = items.create_item(taxi(&report.local_id)).await.unwrap();
    app.ctx.sync_manager().run_pass().await.unwrap();

    items
        .update_item(
            &item.local_id,
            ItemPatch {
                amount: Some(Decimal::new(2750, 2)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    app.ctx.sync_manager().run_pass().await.unwrap();

    reports.delete_report(&report.local_id).await.unwrap();
    app.ctx.sync_manager().run_pass().await.unwrap();

    assert_eq!(
        app.server.calls(),
        vec![
            "create_report Trip to Paris",
            "create_item R-1 Taxi",
            "update_item I-2 27.50",
            "delete_report R-1"
        ]
    );
    assert!(reports.get_report(&report.local_id).is_err());
    assert!(items.get_item(&item.local_id).is_err());
    assert_eq!(app.ctx.sync_stats().unwrap().pending_count, 0);
}

#[tokio::test]
async fn background_scheduler_drains_the_queue_without_explicit_passes() {
    let app = start(true).await;
    let reports = app.ctx.report_service();

    reports.create_report(trip_report()).await.unwrap();
    app.ctx.start_background_sync().await;

    let mut drained = false;
    for _ in 0..100 {
        if app.ctx.sync_stats().unwrap().pending_count == 0 {
            drained = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    app.ctx.teardown().await;
    assert!(drained, "background loop never drained the queue");
}
