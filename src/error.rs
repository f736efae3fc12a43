use thiserror::Error;

/// Failures surfaced by the connection manager, the handle pool and the result shapers.
#[derive(Debug, Error)]
pub enum SqlHandlesError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Every slot is occupied. The query already ran on the server; its handle was discarded.
    #[error("Query handle pool exhausted ({capacity} slots in use)")]
    PoolExhausted { capacity: usize },

    #[error("Parameter error: {0}")]
    ParameterError(String),

    /// Driver-reported failure; the message is the driver's own error text.
    #[error("{0}")]
    ExecutionError(String),

    #[error("Poll timeout.")]
    PollTimeout,

    /// Refused before issue. Displays nothing; the caller's name is kept for logs.
    #[error("")]
    DisallowedCaller { caller: String },

    #[error("No query handle in slot {0}")]
    UnknownSlot(usize),

    #[error("Query returned no rows")]
    NoRows,

    #[error("Other database error: {0}")]
    Other(String),
}

impl SqlHandlesError {
    /// True when the statement executed server-side but its result can no longer be read.
    #[must_use]
    pub fn is_issued_but_unretrievable(&self) -> bool {
        matches!(self, Self::PoolExhausted { .. })
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::PollTimeout)
    }
}
