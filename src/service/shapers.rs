use tracing::{error, warn};

use crate::error::SqlHandlesError;
use crate::interpolation::interpolate;
use crate::poller::PollOutcome;
use crate::results::{QueryResult, Row, shape_result_set};
use crate::types::RowValues;

use super::SqlService;

impl SqlService {
    /// Issue a query, wait for it, and reclaim its slot on every path.
    pub(super) async fn fetch(
        &self,
        query: &str,
        args: &[RowValues],
    ) -> Result<QueryResult, SqlHandlesError> {
        let index = self.query_handle(query, args).await?;
        let outcome = match self.poll(index, false, None).await {
            Ok(outcome) => outcome,
            Err(err) => {
                let _ = self.pool.release(index);
                return Err(err);
            }
        };
        match outcome {
            PollOutcome::Ready(result) => {
                self.pool.forget(index)?;
                Ok(result)
            }
            PollOutcome::Failed(failure) => {
                self.pool.forget(index)?;
                error!(code = failure.code, error = %failure.message, %query, "query failed");
                Err(SqlHandlesError::ExecutionError(failure.message))
            }
            PollOutcome::TimedOut => {
                self.pool.release(index)?;
                warn!(
                    timeout_ms = u64::try_from(self.config.poll_timeout.as_millis()).unwrap_or(u64::MAX),
                    %query,
                    "query poll timed out"
                );
                Err(SqlHandlesError::PollTimeout)
            }
        }
    }

    /// All rows of the first result set, numeric text coerced and NULL columns omitted.
    ///
    /// # Errors
    /// Returns connection, parameter, pool, driver (`ExecutionError`) or `PollTimeout` errors.
    pub async fn rows(&self, query: &str, args: &[RowValues]) -> Result<Vec<Row>, SqlHandlesError> {
        let result = self.fetch(query, args).await?;
        Ok(result
            .into_first_set()
            .map(shape_result_set)
            .unwrap_or_default())
    }

    /// The first row of the first result set.
    ///
    /// # Errors
    /// As [`rows`](Self::rows), plus `SqlHandlesError::NoRows` when the result is empty.
    pub async fn row(&self, query: &str, args: &[RowValues]) -> Result<Row, SqlHandlesError> {
        self.rows(query, args)
            .await?
            .into_iter()
            .next()
            .ok_or(SqlHandlesError::NoRows)
    }

    /// Last insert id reported for the statement.
    ///
    /// # Errors
    /// Returns connection, parameter, pool, driver (`ExecutionError`) or `PollTimeout` errors.
    pub async fn insert_id(&self, query: &str, args: &[RowValues]) -> Result<u64, SqlHandlesError> {
        Ok(self.fetch(query, args).await?.last_insert_id)
    }

    /// Affected-row count reported for the statement.
    ///
    /// # Errors
    /// Returns connection, parameter, pool, driver (`ExecutionError`) or `PollTimeout` errors.
    pub async fn affected_rows(
        &self,
        query: &str,
        args: &[RowValues],
    ) -> Result<u64, SqlHandlesError> {
        Ok(self.fetch(query, args).await?.affected_rows)
    }

    /// Issue a statement and free its handle straight away, without waiting for a result.
    ///
    /// The handle never enters the pool, so this works even when every slot is taken.
    ///
    /// # Errors
    /// Returns connection, parameter or issue-time driver errors only.
    pub async fn exec(&self, query: &str, args: &[RowValues]) -> Result<(), SqlHandlesError> {
        let conn = self.connection.ensure_connected().await?;
        let sql = interpolate(conn.as_ref(), query, args)?;
        let handle = conn.query(&sql).await?;
        handle.free();
        Ok(())
    }
}
