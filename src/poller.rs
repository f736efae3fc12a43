use std::time::Duration;

use tracing::debug;

use crate::driver::{DriverFailure, RawPoll};
use crate::error::SqlHandlesError;
use crate::pool::{HandlePool, SlotIndex};
use crate::results::QueryResult;

/// Outcome of waiting on a query handle.
///
/// A timeout is a value here, not an error, so it can never be confused with a successful
/// query that returned nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Ready(QueryResult),
    Failed(DriverFailure),
    TimedOut,
}

impl PollOutcome {
    #[must_use]
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut)
    }
}

/// Wait up to `timeout` on the handle in `index`.
///
/// The slot is left as it is; the caller decides whether to `forget` (driver already freed
/// the handle) or `release` it. Giving up on a timeout does not cancel the statement on the
/// server.
///
/// # Errors
/// Returns `SqlHandlesError::UnknownSlot` if `index` holds no handle.
pub async fn poll(
    pool: &HandlePool,
    index: SlotIndex,
    multiple_result_sets: bool,
    timeout: Duration,
) -> Result<PollOutcome, SqlHandlesError> {
    let handle = pool.handle(index)?;
    // The outer deadline guards against drivers that overrun their own wait.
    let outcome = match tokio::time::timeout(timeout, handle.poll(timeout, multiple_result_sets))
        .await
    {
        Ok(RawPoll::Ready(mut result)) => {
            if !multiple_result_sets {
                result.result_sets.truncate(1);
            }
            PollOutcome::Ready(result)
        }
        Ok(RawPoll::Failed(failure)) => PollOutcome::Failed(failure),
        Ok(RawPoll::Pending) | Err(_) => PollOutcome::TimedOut,
    };
    debug!(slot = index.get(), timed_out = outcome.is_timed_out(), "poll finished");
    Ok(outcome)
}
