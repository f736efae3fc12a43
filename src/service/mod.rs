//! The service object application code talks to.
//!
//! One [`SqlService`] is built at startup and shared (usually behind an `Arc`) by every
//! caller. It owns the connection manager and the handle pool, so there is no ambient
//! global state.

mod caller;
mod shapers;

pub use caller::CallerScope;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::DbConfig;
use crate::connection::ConnectionManager;
use crate::driver::Driver;
use crate::error::SqlHandlesError;
use crate::interpolation::interpolate;
use crate::poller::{self, PollOutcome};
use crate::pool::{HandlePool, SlotIndex};
use crate::types::RowValues;

/// Connection, handle pool and result shapers behind one lifecycle.
#[derive(Debug)]
pub struct SqlService {
    config: Arc<DbConfig>,
    connection: ConnectionManager,
    pool: HandlePool,
}

impl SqlService {
    /// Build the service without connecting. The first query connects.
    ///
    /// # Errors
    /// Returns `SqlHandlesError::ConfigError` if the configuration is invalid.
    pub fn new(config: DbConfig, driver: Arc<dyn Driver>) -> Result<Self, SqlHandlesError> {
        config.validate()?;
        let config = Arc::new(config);
        Ok(Self {
            pool: HandlePool::new(config.pool_capacity),
            connection: ConnectionManager::new(driver, Arc::clone(&config)),
            config,
        })
    }

    /// Build the service and connect immediately.
    ///
    /// Hosts treat an error here as fatal: a service that cannot reach its database at startup
    /// should not come up.
    ///
    /// # Errors
    /// Returns `SqlHandlesError::ConfigError` for an invalid configuration or
    /// `SqlHandlesError::ConnectionError` if the first connection fails.
    pub async fn open(config: DbConfig, driver: Arc<dyn Driver>) -> Result<Self, SqlHandlesError> {
        let service = Self::new(config, driver)?;
        service.connection.connect().await?;
        Ok(service)
    }

    /// Free every outstanding handle and close the connection. Safe to call repeatedly.
    pub async fn close(&self) {
        let drained = self.pool.drain_all();
        self.connection.disconnect().await;
        info!(drained, "sql service closed");
    }

    #[must_use]
    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    #[must_use]
    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    #[must_use]
    pub fn pool(&self) -> &HandlePool {
        &self.pool
    }

    /// Run the result-fetching entry points on behalf of a named caller.
    #[must_use]
    pub fn caller<'a>(&'a self, name: &'a str) -> CallerScope<'a> {
        CallerScope::new(self, name)
    }

    /// Interpolate, issue and park a query in the pool. The caller owns the returned slot and
    /// must eventually [`poll`](Self::poll) it and then forget or free it.
    ///
    /// # Errors
    /// Returns connection, parameter or driver errors, or `SqlHandlesError::PoolExhausted`
    /// if the statement was sent but no slot was free to hold its handle.
    pub async fn query_handle(
        &self,
        query: &str,
        args: &[RowValues],
    ) -> Result<SlotIndex, SqlHandlesError> {
        let conn = self.connection.ensure_connected().await?;
        let sql = interpolate(conn.as_ref(), query, args)?;
        debug!(%sql, "issuing query");
        let handle = conn.query(&sql).await?;
        self.pool.allocate(handle, sql.into_owned())
    }

    /// Wait on a parked handle. `None` uses the configured poll timeout.
    ///
    /// # Errors
    /// Returns `SqlHandlesError::UnknownSlot` if `index` holds no handle.
    pub async fn poll(
        &self,
        index: SlotIndex,
        multiple_result_sets: bool,
        timeout: Option<Duration>,
    ) -> Result<PollOutcome, SqlHandlesError> {
        let timeout = timeout.unwrap_or(self.config.poll_timeout);
        poller::poll(&self.pool, index, multiple_result_sets, timeout).await
    }

    /// Free the handle in `index` and clear the slot.
    ///
    /// # Errors
    /// Returns `SqlHandlesError::UnknownSlot` if `index` holds no handle.
    pub fn free_query_handle(&self, index: SlotIndex) -> Result<(), SqlHandlesError> {
        self.pool.release(index)
    }

    /// Clear the slot without freeing, for a handle the driver already released.
    ///
    /// # Errors
    /// Returns `SqlHandlesError::UnknownSlot` if `index` holds no handle.
    pub fn remove_query_handle(&self, index: SlotIndex) -> Result<(), SqlHandlesError> {
        self.pool.forget(index)
    }
}
