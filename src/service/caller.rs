use tracing::debug;

use crate::error::SqlHandlesError;
use crate::results::Row;
use crate::types::RowValues;

use super::SqlService;

/// The service as seen by one named caller.
///
/// Callers listed in `blocked_callers` are refused by the four result-fetching entry points
/// before anything is sent to the database. `exec` is not gated.
#[derive(Debug, Clone, Copy)]
pub struct CallerScope<'a> {
    service: &'a SqlService,
    name: &'a str,
}

impl<'a> CallerScope<'a> {
    pub(super) fn new(service: &'a SqlService, name: &'a str) -> Self {
        Self { service, name }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.name
    }

    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.service.config().is_blocked_caller(self.name)
    }

    fn check(&self) -> Result<(), SqlHandlesError> {
        if self.is_blocked() {
            debug!(caller = self.name, "refusing result fetch for blocked caller");
            return Err(SqlHandlesError::DisallowedCaller {
                caller: self.name.to_string(),
            });
        }
        Ok(())
    }

    /// See [`SqlService::rows`].
    ///
    /// # Errors
    /// Returns `SqlHandlesError::DisallowedCaller` for blocked callers, otherwise as
    /// [`SqlService::rows`].
    pub async fn rows(&self, query: &str, args: &[RowValues]) -> Result<Vec<Row>, SqlHandlesError> {
        self.check()?;
        self.service.rows(query, args).await
    }

    /// See [`SqlService::row`].
    ///
    /// # Errors
    /// Returns `SqlHandlesError::DisallowedCaller` for blocked callers, otherwise as
    /// [`SqlService::row`].
    pub async fn row(&self, query: &str, args: &[RowValues]) -> Result<Row, SqlHandlesError> {
        self.check()?;
        self.service.row(query, args).await
    }

    /// See [`SqlService::insert_id`].
    ///
    /// # Errors
    /// Returns `SqlHandlesError::DisallowedCaller` for blocked callers, otherwise as
    /// [`SqlService::insert_id`].
    pub async fn insert_id(&self, query: &str, args: &[RowValues]) -> Result<u64, SqlHandlesError> {
        self.check()?;
        self.service.insert_id(query, args).await
    }

    /// See [`SqlService::affected_rows`].
    ///
    /// # Errors
    /// Returns `SqlHandlesError::DisallowedCaller` for blocked callers, otherwise as
    /// [`SqlService::affected_rows`].
    pub async fn affected_rows(
        &self,
        query: &str,
        args: &[RowValues],
    ) -> Result<u64, SqlHandlesError> {
        self.check()?;
        self.service.affected_rows(query, args).await
    }

    /// See [`SqlService::exec`].
    ///
    /// # Errors
    /// As [`SqlService::exec`].
    pub async fn exec(&self, query: &str, args: &[RowValues]) -> Result<(), SqlHandlesError> {
        self.service.exec(query, args).await
    }
}
