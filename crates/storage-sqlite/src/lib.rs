//! SQLite persistence for ledgerly: connection pool, serialized write
//! actor, schema migrations, and the repositories implementing the core
//! storage contracts.

pub mod db;
pub mod errors;
pub mod items;
pub(crate) mod mapping;
pub mod migrations;
pub mod reports;
pub mod schema;
pub mod sync;

pub use db::{create_pool, get_connection, init, spawn_writer, DbPool, WriteHandle};
pub use errors::StorageError;
pub use items::ItemRepository;
pub use migrations::run_migrations;
pub use reports::ReportRepository;
pub use sync::{RecordSyncRepository, SyncQueueRepository};
