//! Serialized write actor: all mutations funnel through one blocking task,
//! each job wrapped in an immediate transaction. Callers never need their
//! own locking; a failed job rolls back atomically.

use diesel::SqliteConnection;
use log::warn;
use tokio::sync::{mpsc, oneshot};

use ledgerly_core::errors::{Error, Result};

use crate::errors::StorageError;

use super::DbPool;

type Job = Box<dyn FnOnce(&mut SqliteConnection) + Send + 'static>;

const WRITE_QUEUE_CAPACITY: usize = 128;

/// Cloneable handle to the writer task.
#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::Sender<Job>,
}

impl WriteHandle {
    /// Run a closure inside an immediate transaction on the writer task.
    /// The closure's error (or any transaction failure) rolls everything
    /// back and is returned to the caller.
    pub async fn exec<T, F>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let wrapped: Job = Box::new(move |conn| {
            let result = run_in_transaction(conn, job);
            let _ = reply_tx.send(result);
        });

        self.tx.send(wrapped).await.map_err(|_| {
            Error::from(StorageError::WriterUnavailable(
                "Writer task has stopped".to_string(),
            ))
        })?;

        reply_rx.await.map_err(|_| {
            Error::from(StorageError::WriterUnavailable(
                "Writer task dropped the job before replying".to_string(),
            ))
        })?
    }
}

/// Bridges the application error type through diesel's transaction plumbing,
/// which requires `From<diesel::result::Error>`.
enum TxError {
    App(Error),
    Db(diesel::result::Error),
}

impl From<diesel::result::Error> for TxError {
    fn from(err: diesel::result::Error) -> Self {
        Self::Db(err)
    }
}

fn run_in_transaction<T, F>(conn: &mut SqliteConnection, job: F) -> Result<T>
where
    F: FnOnce(&mut SqliteConnection) -> Result<T>,
{
    conn.immediate_transaction::<T, TxError, _>(|tx| job(tx).map_err(TxError::App))
        .map_err(|err| match err {
            TxError::App(app) => app,
            TxError::Db(db) => Error::from(StorageError::from(db)),
        })
}

/// Spawn the writer task for a pool. Jobs are executed strictly in arrival
/// order on a single connection at a time.
pub fn spawn_writer(pool: DbPool) -> WriteHandle {
    let (tx, mut rx) = mpsc::channel::<Job>(WRITE_QUEUE_CAPACITY);

    tokio::task::spawn_blocking(move || {
        while let Some(job) = rx.blocking_recv() {
            match pool.get() {
                Ok(mut conn) => job(&mut conn),
                // Dropping the job closes its reply channel; the caller
                // observes a WriterUnavailable error.
                Err(err) => warn!("Writer could not check out a connection: {}", err),
            }
        }
    });

    WriteHandle { tx }
}
