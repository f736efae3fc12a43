//! The seam between this crate and a concrete database driver.
//!
//! A driver supplies three things: a way to open a connection, a connection that can escape
//! text and issue queries, and a per-query handle that can be polled and freed. Everything
//! else (slot accounting, timeouts, shaping) lives on this side of the seam.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::SqlHandlesError;
use crate::results::QueryResult;

/// Error reported by the driver for a failed query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverFailure {
    pub code: i64,
    pub message: String,
}

impl DriverFailure {
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for DriverFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Lexical rules the server applies to statement text.
///
/// Placeholder scanning has to agree with the server on where literals and comments start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqlDialect {
    /// `#` and `-- ` comments, backslash escapes inside quoted strings.
    #[default]
    MySql,
    /// Any `--` opens a comment; quotes are only escaped by doubling.
    Sqlite,
}

impl SqlDialect {
    #[must_use]
    pub fn backslash_escapes(self) -> bool {
        matches!(self, Self::MySql)
    }
}

/// What a single driver-level poll reports.
///
/// After `Ready` or `Failed` the driver has already released the handle's resources;
/// calling [`DriverHandle::free`] afterwards must not be done.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPoll {
    /// Not finished within the poll's wait.
    Pending,
    Ready(QueryResult),
    Failed(DriverFailure),
}

/// Opens connections.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Open a connection.
    ///
    /// # Errors
    /// Returns `SqlHandlesError::ConnectionError` when no live connection could be made.
    async fn open(
        &self,
        driver_name: &str,
        conn_string: &str,
        user: &str,
        password: &str,
    ) -> Result<Arc<dyn DriverConnection>, SqlHandlesError>;
}

/// One live database session.
#[async_trait]
pub trait DriverConnection: Send + Sync {
    /// Escape text for inclusion inside a single-quoted SQL literal.
    fn escape_string(&self, text: &str) -> String;

    /// Lexical rules of the server behind this session.
    fn dialect(&self) -> SqlDialect {
        SqlDialect::MySql
    }

    /// Issue a query. The statement may still be running when this returns.
    ///
    /// # Errors
    /// Returns an error if the driver refuses to issue the statement at all.
    async fn query(&self, sql: &str) -> Result<Arc<dyn DriverHandle>, SqlHandlesError>;

    /// False once the session has been lost.
    fn is_connected(&self) -> bool;

    /// Close the session. Safe to call more than once.
    async fn destroy(&self);
}

/// Driver reference to one issued query.
#[async_trait]
pub trait DriverHandle: Send + Sync {
    /// Wait up to `timeout` for the query to resolve.
    async fn poll(&self, timeout: Duration, multiple_result_sets: bool) -> RawPoll;

    /// Release the handle without reading its result.
    fn free(&self);
}
