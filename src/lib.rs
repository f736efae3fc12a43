//! Bounded query-handle manager for a single database connection.
//!
//! A [`SqlService`] keeps one lazily (re)established connection, escapes and substitutes
//! caller arguments into statement text, tracks every in-flight query in a fixed-size slot
//! pool and turns a bounded-wait poll into rows, a single row, an insert id or an
//! affected-row count.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sql_handles::prelude::*;
//!
//! # async fn demo() -> Result<(), SqlHandlesError> {
//! let cfg = DbConfig::builder().database("scores.db").finish();
//! let service = SqlService::open(cfg, Arc::new(SqliteDriver::new())).await?;
//! let rows = service
//!     .rows("SELECT name, points FROM players WHERE points > ?", &[RowValues::Int(10)])
//!     .await?;
//! # let _ = rows;
//! service.close().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod interpolation;
pub mod poller;
pub mod pool;
pub mod prelude;
pub mod results;
pub mod service;
pub mod types;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::DbConfig;
pub use error::SqlHandlesError;
pub use service::SqlService;
