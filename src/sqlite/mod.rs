//! `SQLite` driver backend built on `rusqlite`.
//!
//! Each connection owns a worker thread; issuing a query queues it there and the handle
//! awaits the outcome. Cells are delivered as text, like a text-protocol network driver.

mod query;
mod worker;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::oneshot;
use tracing::debug;

use crate::driver::{
    Driver, DriverConnection, DriverFailure, DriverHandle, RawPoll, SqlDialect,
};
use crate::error::SqlHandlesError;

use worker::SqliteWorker;

/// Opens `SQLite` databases. The `dbname` connection-string key is the database path.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDriver;

impl SqliteDriver {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Value of `key` in a `k=v;k=v` connection string.
fn conn_string_value<'a>(conn_string: &'a str, key: &str) -> Option<&'a str> {
    conn_string.split(';').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k.trim() == key).then(|| v.trim())
    })
}

#[async_trait]
impl Driver for SqliteDriver {
    async fn open(
        &self,
        _driver_name: &str,
        conn_string: &str,
        _user: &str,
        _password: &str,
    ) -> Result<Arc<dyn DriverConnection>, SqlHandlesError> {
        let path = conn_string_value(conn_string, "dbname")
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                SqlHandlesError::ConfigError(format!("no dbname in '{conn_string}'"))
            })?
            .to_string();
        let conn = tokio::task::spawn_blocking(move || Connection::open(path))
            .await
            .map_err(|e| SqlHandlesError::ConnectionError(format!("SQLite open task failed: {e}")))?
            .map_err(|e| SqlHandlesError::ConnectionError(format!("Failed to open SQLite: {e}")))?;
        let worker = SqliteWorker::spawn(conn)?;
        debug!(worker = worker.id(), "sqlite connection opened");
        Ok(Arc::new(SqliteConnection {
            worker,
            connected: AtomicBool::new(true),
        }))
    }
}

/// Live `SQLite` session.
pub struct SqliteConnection {
    worker: SqliteWorker,
    connected: AtomicBool,
}

#[async_trait]
impl DriverConnection for SqliteConnection {
    fn escape_string(&self, text: &str) -> String {
        text.replace('\'', "''")
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::Sqlite
    }

    async fn query(&self, sql: &str) -> Result<Arc<dyn DriverHandle>, SqlHandlesError> {
        if !self.is_connected() {
            return Err(SqlHandlesError::ConnectionError(
                "SQLite connection closed".into(),
            ));
        }
        let receiver = self.worker.submit(sql.to_string()).inspect_err(|_| {
            self.connected.store(false, Ordering::SeqCst);
        })?;
        Ok(Arc::new(SqliteHandle {
            receiver: Mutex::new(Some(receiver)),
        }))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn destroy(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.worker.shutdown();
        }
    }
}

/// Pending statement on a [`SqliteConnection`].
pub struct SqliteHandle {
    receiver: Mutex<Option<oneshot::Receiver<RawPoll>>>,
}

impl SqliteHandle {
    fn take_receiver(&self) -> Option<oneshot::Receiver<RawPoll>> {
        match self.receiver.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    fn put_back(&self, receiver: oneshot::Receiver<RawPoll>) {
        match self.receiver.lock() {
            Ok(mut guard) => *guard = Some(receiver),
            Err(poisoned) => *poisoned.into_inner() = Some(receiver),
        }
    }
}

#[async_trait]
impl DriverHandle for SqliteHandle {
    async fn poll(&self, timeout: Duration, multiple_result_sets: bool) -> RawPoll {
        let Some(mut receiver) = self.take_receiver() else {
            return RawPoll::Failed(DriverFailure::new(-1, "query handle already freed"));
        };
        match tokio::time::timeout(timeout, &mut receiver).await {
            Ok(Ok(RawPoll::Ready(mut result))) => {
                if !multiple_result_sets {
                    result.result_sets.truncate(1);
                }
                RawPoll::Ready(result)
            }
            Ok(Ok(other)) => other,
            Ok(Err(_)) => RawPoll::Failed(DriverFailure::new(
                -1,
                "SQLite worker dropped while executing query",
            )),
            Err(_) => {
                self.put_back(receiver);
                RawPoll::Pending
            }
        }
    }

    fn free(&self) {
        drop(self.take_receiver());
    }
}
