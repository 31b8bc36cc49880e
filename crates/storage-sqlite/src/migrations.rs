//! Version-gated schema migrations. Each step runs at most once per
//! database; the whole runner is safe to call on every startup. Statements
//! are written so a partially applied step can be replayed without error.

use chrono::Utc;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sql_types::Integer;
use log::info;

use ledgerly_core::errors::{Error, Result};

use crate::db::DbConnection;
use crate::errors::StorageError;

struct Migration {
    version: i32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create reports and items",
        sql: "CREATE TABLE IF NOT EXISTS reports (
                  local_id TEXT PRIMARY KEY NOT NULL,
                  remote_id TEXT,
                  title TEXT NOT NULL,
                  category TEXT,
                  currency TEXT NOT NULL,
                  notes TEXT,
                  report_date TEXT,
                  is_archived BOOLEAN NOT NULL DEFAULT 0,
                  sync_status TEXT NOT NULL DEFAULT 'pending',
                  created_at TEXT NOT NULL,
                  updated_at TEXT NOT NULL,
                  last_synced_at TEXT
              );
              CREATE TABLE IF NOT EXISTS items (
                  local_id TEXT PRIMARY KEY NOT NULL,
                  remote_id TEXT,
                  parent_local_id TEXT NOT NULL REFERENCES reports (local_id),
                  title TEXT NOT NULL,
                  amount TEXT NOT NULL,
                  currency TEXT NOT NULL,
                  category TEXT,
                  extracted_data TEXT,
                  item_date TEXT,
                  is_archived BOOLEAN NOT NULL DEFAULT 0,
                  sync_status TEXT NOT NULL DEFAULT 'pending',
                  created_at TEXT NOT NULL,
                  updated_at TEXT NOT NULL,
                  last_synced_at TEXT
              );
              CREATE INDEX IF NOT EXISTS idx_items_parent ON items (parent_local_id);
              CREATE UNIQUE INDEX IF NOT EXISTS idx_reports_remote
                  ON reports (remote_id) WHERE remote_id IS NOT NULL;
              CREATE UNIQUE INDEX IF NOT EXISTS idx_items_remote
                  ON items (remote_id) WHERE remote_id IS NOT NULL;",
    },
    Migration {
        version: 2,
        description: "create sync queue",
        sql: "CREATE TABLE IF NOT EXISTS sync_queue (
                  queue_id INTEGER PRIMARY KEY AUTOINCREMENT,
                  table_name TEXT NOT NULL,
                  record_id TEXT NOT NULL,
                  action TEXT NOT NULL,
                  payload TEXT NOT NULL,
                  attempts INTEGER NOT NULL DEFAULT 0,
                  last_error TEXT,
                  created_at TEXT NOT NULL
              );
              CREATE INDEX IF NOT EXISTS idx_sync_queue_record
                  ON sync_queue (table_name, record_id);",
    },
];

/// Apply any migrations the database has not seen yet.
pub fn run_migrations(conn: &mut DbConnection) -> Result<()> {
    conn.batch_execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
             id INTEGER PRIMARY KEY CHECK (id = 1),
             version INTEGER NOT NULL,
             applied_at TEXT NOT NULL
         );",
    )
    .map_err(|e| StorageError::Migration(e.to_string()))
    .map_err(Error::from)?;

    let current = current_version(conn)?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        info!(
            "Applying schema migration {}: {}",
            migration.version, migration.description
        );
        apply(conn, migration)?;
    }

    Ok(())
}

fn current_version(conn: &mut DbConnection) -> Result<i32> {
    #[derive(QueryableByName)]
    struct VersionRow {
        #[diesel(sql_type = Integer)]
        version: i32,
    }

    let rows: Vec<VersionRow> =
        diesel::sql_query("SELECT version FROM schema_version WHERE id = 1")
            .load(conn)
            .map_err(|e| StorageError::Migration(e.to_string()))
            .map_err(Error::from)?;

    Ok(rows.first().map(|r| r.version).unwrap_or(0))
}

fn apply(conn: &mut DbConnection, migration: &Migration) -> Result<()> {
    let sql = format!(
        "BEGIN IMMEDIATE;
         {}
         INSERT INTO schema_version (id, version, applied_at)
             VALUES (1, {}, '{}')
             ON CONFLICT (id) DO UPDATE SET
                 version = excluded.version,
                 applied_at = excluded.applied_at;
         COMMIT;",
        migration.sql,
        migration.version,
        Utc::now().to_rfc3339(),
    );

    conn.batch_execute(&sql)
        .map_err(|e| {
            StorageError::Migration(format!(
                "migration {} ({}) failed: {}",
                migration.version, migration.description, e
            ))
        })
        .map_err(Error::from)
}
