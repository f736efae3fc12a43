//! Convenient imports for common functionality.

pub use crate::config::{DbConfig, DbConfigBuilder, EnvSettings, SettingsSource};
pub use crate::connection::ConnectionManager;
pub use crate::driver::{
    Driver, DriverConnection, DriverFailure, DriverHandle, RawPoll, SqlDialect,
};
pub use crate::error::SqlHandlesError;
pub use crate::interpolation::{escape, interpolate};
pub use crate::poller::PollOutcome;
pub use crate::pool::{HandlePool, SlotIndex};
pub use crate::results::{QueryResult, ResultSet, Row};
pub use crate::service::{CallerScope, SqlService};
pub use crate::types::{DriverKind, RowValues};

#[cfg(feature = "sqlite")]
pub use crate::sqlite::SqliteDriver;
