use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::driver::{
    Driver, DriverConnection, DriverFailure, DriverHandle, RawPoll, SqlDialect,
};
use crate::error::SqlHandlesError;
use crate::results::{QueryResult, ResultSet};
use crate::types::RowValues;

/// Scripted behaviour for a statement issued against the mock driver.
#[derive(Debug, Clone, PartialEq)]
pub enum MockOutcome {
    Ready(QueryResult),
    Fail(DriverFailure),
    /// Never resolves; every poll times out.
    Hang,
    /// Resolves once the delay has passed since the statement was issued.
    Delayed(Duration, Box<MockOutcome>),
    /// `query` itself fails; no handle is created.
    Reject(String),
}

impl MockOutcome {
    /// A single result set of text cells, the way a text-protocol driver returns them.
    #[must_use]
    pub fn rows(columns: &[&str], rows: Vec<Vec<RowValues>>) -> Self {
        let mut set = ResultSet::new(columns.iter().map(|c| (*c).to_string()).collect());
        for row in rows {
            set.add_row_values(row);
        }
        MockOutcome::Ready(QueryResult {
            affected_rows: set.len() as u64,
            result_sets: vec![set],
            last_insert_id: 0,
        })
    }

    /// An empty result carrying only the statement summary.
    #[must_use]
    pub fn summary(affected_rows: u64, last_insert_id: u64) -> Self {
        MockOutcome::Ready(QueryResult {
            result_sets: Vec::new(),
            affected_rows,
            last_insert_id,
        })
    }

    #[must_use]
    pub fn fail(code: i64, message: &str) -> Self {
        MockOutcome::Fail(DriverFailure::new(code, message))
    }

    #[must_use]
    pub fn delayed(delay: Duration, outcome: MockOutcome) -> Self {
        MockOutcome::Delayed(delay, Box::new(outcome))
    }
}

impl Default for MockOutcome {
    fn default() -> Self {
        MockOutcome::Ready(QueryResult::default())
    }
}

/// `mysql_real_escape_string` rules.
#[must_use]
pub fn mysql_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    for ch in text.chars() {
        match ch {
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\x1a' => out.push_str("\\Z"),
            other => out.push(other),
        }
    }
    out
}

#[derive(Default)]
struct MockInner {
    refuse: bool,
    opens: Vec<(String, String, String, String)>,
    connections: Vec<Arc<AtomicBool>>,
    rules: Vec<(String, MockOutcome)>,
    default_outcome: MockOutcome,
    issued: Vec<String>,
    escaped: Vec<String>,
    handles_created: usize,
    handles_freed: usize,
    handles_resolved: usize,
    double_frees: usize,
}

#[derive(Default)]
struct MockState {
    inner: Mutex<MockInner>,
}

impl MockState {
    fn lock(&self) -> MutexGuard<'_, MockInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// In-memory [`Driver`] whose statements resolve according to registered rules.
#[derive(Clone, Default)]
pub struct MockDriver {
    state: Arc<MockState>,
}

impl MockDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Statements containing `pattern` resolve to `outcome`. Earlier rules win.
    pub fn on_query(&self, pattern: &str, outcome: MockOutcome) -> &Self {
        self.state.lock().rules.push((pattern.to_string(), outcome));
        self
    }

    pub fn set_default_outcome(&self, outcome: MockOutcome) {
        self.state.lock().default_outcome = outcome;
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.state.lock().refuse = refuse;
    }

    /// Simulate the server dropping every open session.
    pub fn drop_connections(&self) {
        for flag in &self.state.lock().connections {
            flag.store(false, Ordering::SeqCst);
        }
    }

    #[must_use]
    pub fn open_count(&self) -> usize {
        self.state.lock().opens.len()
    }

    /// `(driver_name, conn_string, user, password)` of the latest successful open.
    #[must_use]
    pub fn last_open(&self) -> Option<(String, String, String, String)> {
        self.state.lock().opens.last().cloned()
    }

    #[must_use]
    pub fn live_connections(&self) -> usize {
        self.state
            .lock()
            .connections
            .iter()
            .filter(|flag| flag.load(Ordering::SeqCst))
            .count()
    }

    /// Every statement that reached the driver, in order.
    #[must_use]
    pub fn issued(&self) -> Vec<String> {
        self.state.lock().issued.clone()
    }

    #[must_use]
    pub fn escaped(&self) -> Vec<String> {
        self.state.lock().escaped.clone()
    }

    /// Handles neither freed by the caller nor resolved by a poll.
    #[must_use]
    pub fn live_handles(&self) -> usize {
        let inner = self.state.lock();
        inner.handles_created - inner.handles_freed - inner.handles_resolved
    }

    #[must_use]
    pub fn double_frees(&self) -> usize {
        self.state.lock().double_frees
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn open(
        &self,
        driver_name: &str,
        conn_string: &str,
        user: &str,
        password: &str,
    ) -> Result<Arc<dyn DriverConnection>, SqlHandlesError> {
        let mut inner = self.state.lock();
        if inner.refuse {
            return Err(SqlHandlesError::ConnectionError(format!(
                "Can't connect to server using '{conn_string}'"
            )));
        }
        inner.opens.push((
            driver_name.to_string(),
            conn_string.to_string(),
            user.to_string(),
            password.to_string(),
        ));
        let connected = Arc::new(AtomicBool::new(true));
        inner.connections.push(Arc::clone(&connected));
        Ok(Arc::new(MockConnection {
            state: Arc::clone(&self.state),
            connected,
            dialect: SqlDialect::MySql,
        }))
    }
}

/// Connection handed out by [`MockDriver`].
pub struct MockConnection {
    state: Arc<MockState>,
    connected: Arc<AtomicBool>,
    dialect: SqlDialect,
}

impl MockConnection {
    /// A standalone connected session, for tests that only need escaping.
    #[must_use]
    pub fn new() -> Self {
        Self::with_dialect(SqlDialect::MySql)
    }

    #[must_use]
    pub fn with_dialect(dialect: SqlDialect) -> Self {
        Self {
            state: Arc::default(),
            connected: Arc::new(AtomicBool::new(true)),
            dialect,
        }
    }

    #[must_use]
    pub fn escaped(&self) -> Vec<String> {
        self.state.lock().escaped.clone()
    }
}

impl Default for MockConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DriverConnection for MockConnection {
    fn escape_string(&self, text: &str) -> String {
        self.state.lock().escaped.push(text.to_string());
        match self.dialect {
            SqlDialect::MySql => mysql_escape(text),
            SqlDialect::Sqlite => text.replace('\'', "''"),
        }
    }

    fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    async fn query(&self, sql: &str) -> Result<Arc<dyn DriverHandle>, SqlHandlesError> {
        if !self.is_connected() {
            return Err(SqlHandlesError::ConnectionError(
                "MySQL server has gone away".to_string(),
            ));
        }
        let mut inner = self.state.lock();
        let outcome = inner
            .rules
            .iter()
            .find(|(pattern, _)| sql.contains(pattern.as_str()))
            .map_or_else(|| inner.default_outcome.clone(), |(_, o)| o.clone());
        if let MockOutcome::Reject(message) = outcome {
            return Err(SqlHandlesError::ExecutionError(message));
        }
        inner.issued.push(sql.to_string());
        inner.handles_created += 1;
        drop(inner);
        Ok(Arc::new(MockHandle::new(Arc::clone(&self.state), outcome)))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn destroy(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

/// Handle handed out by [`MockConnection::query`].
pub struct MockHandle {
    state: Arc<MockState>,
    outcome: MockOutcome,
    issued_at: Instant,
    done: AtomicBool,
    free_calls: AtomicUsize,
}

impl MockHandle {
    fn new(state: Arc<MockState>, outcome: MockOutcome) -> Self {
        Self {
            state,
            outcome,
            issued_at: Instant::now(),
            done: AtomicBool::new(false),
            free_calls: AtomicUsize::new(0),
        }
    }

    /// A handle not tied to any driver, resolving to an empty result.
    #[must_use]
    pub fn detached() -> Arc<Self> {
        Self::with_outcome(MockOutcome::default())
    }

    #[must_use]
    pub fn with_outcome(outcome: MockOutcome) -> Arc<Self> {
        let state = Arc::new(MockState::default());
        state.lock().handles_created += 1;
        Arc::new(Self::new(state, outcome))
    }

    /// Number of `free` calls received, valid or not.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free_calls.load(Ordering::SeqCst)
    }

    fn resolve(&self, raw: RawPoll) -> RawPoll {
        self.done.store(true, Ordering::SeqCst);
        self.state.lock().handles_resolved += 1;
        raw
    }
}

fn settle(outcome: &MockOutcome, issued_at: Instant) -> (Option<Instant>, RawPoll) {
    match outcome {
        MockOutcome::Ready(result) => (Some(issued_at), RawPoll::Ready(result.clone())),
        MockOutcome::Fail(failure) => (Some(issued_at), RawPoll::Failed(failure.clone())),
        MockOutcome::Hang => (None, RawPoll::Pending),
        MockOutcome::Reject(message) => (
            Some(issued_at),
            RawPoll::Failed(DriverFailure::new(-1, message.clone())),
        ),
        MockOutcome::Delayed(delay, inner) => {
            let (ready_at, raw) = settle(inner, issued_at);
            (ready_at.map(|at| at + *delay), raw)
        }
    }
}

#[async_trait]
impl DriverHandle for MockHandle {
    async fn poll(&self, timeout: Duration, multiple_result_sets: bool) -> RawPoll {
        if self.done.load(Ordering::SeqCst) {
            return RawPoll::Failed(DriverFailure::new(-1, "query handle already freed"));
        }
        let (ready_at, raw) = settle(&self.outcome, self.issued_at);
        let deadline = Instant::now() + timeout;
        match ready_at {
            Some(at) if at <= deadline => {
                tokio::time::sleep_until(at.into()).await;
                let raw = match raw {
                    RawPoll::Ready(mut result) if !multiple_result_sets => {
                        result.result_sets.truncate(1);
                        RawPoll::Ready(result)
                    }
                    other => other,
                };
                self.resolve(raw)
            }
            _ => {
                tokio::time::sleep(timeout).await;
                RawPoll::Pending
            }
        }
    }

    fn free(&self) {
        self.free_calls.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.state.lock();
        if self.done.swap(true, Ordering::SeqCst) {
            inner.double_frees += 1;
        } else {
            inner.handles_freed += 1;
        }
    }
}
