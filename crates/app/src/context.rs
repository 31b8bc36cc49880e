use std::sync::Arc;

use log::info;

use ledgerly_core::errors::Result;
use ledgerly_core::records::{
    ItemService, ItemServiceTrait, ReportService, ReportServiceTrait,
};
use ledgerly_core::sync::{
    NetworkMonitor, RemoteGateway, SyncManager, SyncScheduler, SyncStats,
};
use ledgerly_storage_sqlite::{
    create_pool, get_connection, init, run_migrations, spawn_writer, DbPool, ItemRepository,
    RecordSyncRepository, ReportRepository, SyncQueueRepository,
};

/// Everything the embedding application needs, built once at startup.
/// Accessors hand out cheap `Arc` clones.
pub struct ServiceContext {
    db_path: String,
    pool: Arc<DbPool>,
    report_service: Arc<dyn ReportServiceTrait>,
    item_service: Arc<dyn ItemServiceTrait>,
    sync_manager: Arc<SyncManager>,
    sync_scheduler: Arc<SyncScheduler>,
}

impl ServiceContext {
    /// Open (or create) the database under `app_data_dir`, run migrations,
    /// and assemble services and the sync engine. The background scheduler
    /// is started separately via [`ServiceContext::start_background_sync`].
    pub async fn initialize(
        app_data_dir: &str,
        gateway: Arc<dyn RemoteGateway>,
        network: Arc<dyn NetworkMonitor>,
    ) -> Result<Self> {
        let db_path = init(app_data_dir)?;
        let pool = create_pool(&db_path)?;
        {
            let mut conn = get_connection(&pool)?;
            run_migrations(&mut conn)?;
        }
        let writer = spawn_writer(pool.as_ref().clone());

        let report_repository =
            Arc::new(ReportRepository::new(Arc::clone(&pool), writer.clone()));
        let item_repository = Arc::new(ItemRepository::new(Arc::clone(&pool), writer.clone()));
        let queue_store = Arc::new(SyncQueueRepository::new(Arc::clone(&pool), writer.clone()));
        let record_store = Arc::new(RecordSyncRepository::new(Arc::clone(&pool), writer));

        let report_service = Arc::new(ReportService::new(report_repository.clone()));
        let item_service = Arc::new(ItemService::new(item_repository, report_repository));

        let sync_manager = Arc::new(SyncManager::new(
            queue_store,
            record_store,
            gateway,
            Arc::clone(&network),
        ));
        let sync_scheduler = Arc::new(SyncScheduler::new(Arc::clone(&sync_manager), network));

        info!("Service context initialized with database {}", db_path);
        Ok(Self {
            db_path,
            pool,
            report_service,
            item_service,
            sync_manager,
            sync_scheduler,
        })
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    pub fn pool(&self) -> Arc<DbPool> {
        Arc::clone(&self.pool)
    }

    pub fn report_service(&self) -> Arc<dyn ReportServiceTrait> {
        Arc::clone(&self.report_service)
    }

    pub fn item_service(&self) -> Arc<dyn ItemServiceTrait> {
        Arc::clone(&self.item_service)
    }

    pub fn sync_manager(&self) -> Arc<SyncManager> {
        Arc::clone(&self.sync_manager)
    }

    pub fn sync_scheduler(&self) -> Arc<SyncScheduler> {
        Arc::clone(&self.sync_scheduler)
    }

    /// Start the periodic background loop. Idempotent.
    pub async fn start_background_sync(&self) {
        self.sync_scheduler.ensure_background_started().await;
    }

    /// Request a sync pass now, without waiting for it.
    pub fn trigger_sync(&self) {
        self.sync_scheduler.trigger();
    }

    pub fn sync_stats(&self) -> Result<SyncStats> {
        self.sync_manager.stats()
    }

    /// Stop background work. Store transactions are atomic, so shutting
    /// down mid-pass leaves no partial state.
    pub async fn teardown(&self) {
        self.sync_scheduler.shutdown().await;
        info!("Service context shut down");
    }
}
