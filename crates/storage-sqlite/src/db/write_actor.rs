//! Single-writer actor.
//!
//! All writes go through one dedicated thread holding one connection, so
//! SQLite never sees competing writers. Each job runs inside an immediate
//! transaction: it either commits completely or rolls back.

use diesel::sqlite::SqliteConnection;
use log::{debug, error};
use tokio::sync::{mpsc, oneshot};

use pocketledger_core::errors::{DatabaseError, Error, Result};

use super::{get_connection, DbPool};
use crate::errors::StorageError;

type Job = Box<dyn FnOnce(&mut SqliteConnection) + Send + 'static>;

/// Cloneable handle to the writer thread. The thread exits once every handle
/// has been dropped.
#[derive(Clone, Debug)]
pub struct WriteHandle {
    sender: mpsc::UnboundedSender<Job>,
}

enum TxError {
    Diesel(diesel::result::Error),
    App(Error),
}

impl From<diesel::result::Error> for TxError {
    fn from(err: diesel::result::Error) -> Self {
        TxError::Diesel(err)
    }
}

fn run_in_transaction<F, T>(conn: &mut SqliteConnection, job: F) -> Result<T>
where
    F: FnOnce(&mut SqliteConnection) -> Result<T>,
{
    conn.immediate_transaction::<T, TxError, _>(|conn| job(conn).map_err(TxError::App))
        .map_err(|err| match err {
            TxError::App(err) => err,
            TxError::Diesel(err) => StorageError::from(err).into(),
        })
}

/// Start the writer thread on a dedicated pooled connection.
pub fn spawn_writer(pool: DbPool) -> Result<WriteHandle> {
    let mut conn = get_connection(&pool)?;
    let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();

    std::thread::Builder::new()
        .name("pocketledger-db-writer".to_string())
        .spawn(move || {
            while let Some(job) = receiver.blocking_recv() {
                job(&mut *conn);
            }
            debug!("Database writer stopped");
        })
        .map_err(StorageError::from)?;

    Ok(WriteHandle { sender })
}

impl WriteHandle {
    /// Run `job` on the writer connection inside one transaction.
    pub async fn exec<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let boxed: Job = Box::new(move |conn| {
            let result = run_in_transaction(conn, job);
            if reply_tx.send(result).is_err() {
                debug!("Write completed after caller went away");
            }
        });

        self.sender.send(boxed).map_err(|_| {
            error!("Database writer is not running");
            Error::Database(DatabaseError::Internal(
                "Database writer is not running".to_string(),
            ))
        })?;

        reply_rx.await.map_err(|_| {
            Error::Database(DatabaseError::Internal(
                "Database writer dropped the request".to_string(),
            ))
        })?
    }
}
