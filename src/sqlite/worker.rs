use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use rusqlite::Connection;
use tokio::sync::oneshot;
use tracing::debug;

use crate::driver::{DriverFailure, RawPoll};
use crate::error::SqlHandlesError;

use super::query::run_query;

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

enum Command {
    Query {
        sql: String,
        respond_to: oneshot::Sender<RawPoll>,
    },
    Shutdown,
}

/// Dedicated thread owning one `rusqlite` connection. Statements run in issue order.
pub(crate) struct SqliteWorker {
    sender: Sender<Command>,
    id: u64,
}

impl SqliteWorker {
    pub(crate) fn spawn(conn: Connection) -> Result<Self, SqlHandlesError> {
        let (sender, receiver) = mpsc::channel::<Command>();
        let id = NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed);
        thread::Builder::new()
            .name(format!("sqlite-worker-{id}"))
            .spawn(move || run_sqlite_worker(&conn, &receiver))
            .map_err(|err| {
                SqlHandlesError::ConnectionError(format!(
                    "failed to spawn SQLite worker thread: {err}"
                ))
            })?;
        Ok(Self { sender, id })
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Queue a statement; its outcome arrives on the returned receiver.
    pub(crate) fn submit(&self, sql: String) -> Result<oneshot::Receiver<RawPoll>, SqlHandlesError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Command::Query {
                sql,
                respond_to: tx,
            })
            .map_err(|_| SqlHandlesError::ConnectionError("SQLite worker closed".into()))?;
        Ok(rx)
    }

    pub(crate) fn shutdown(&self) {
        let _ = self.sender.send(Command::Shutdown);
    }
}

impl Drop for SqliteWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_sqlite_worker(conn: &Connection, receiver: &Receiver<Command>) {
    while let Ok(command) = receiver.recv() {
        match command {
            Command::Query { sql, respond_to } => {
                let outcome = match run_query(conn, &sql) {
                    Ok(result) => RawPoll::Ready(result),
                    Err(err) => RawPoll::Failed(to_failure(&err)),
                };
                // receiver gone means the handle was freed; nothing to deliver
                let _ = respond_to.send(outcome);
            }
            Command::Shutdown => break,
        }
    }
    debug!("sqlite worker stopped");
}

fn to_failure(err: &SqlHandlesError) -> DriverFailure {
    let code = match err {
        SqlHandlesError::SqliteError(rusqlite::Error::SqliteFailure(ffi, _)) => {
            i64::from(ffi.extended_code)
        }
        _ => -1,
    };
    DriverFailure::new(code, err.to_string())
}
