use std::time::Duration;

use clap::{Parser, ValueEnum};
use sql_handles::prelude::*;
use sql_handles::results::coerce_value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum Mode {
    /// Every row of the result
    Rows,
    /// First row only
    Row,
    /// Last insert id
    InsertId,
    /// Affected-row count
    Affected,
    /// Issue and free without waiting
    Exec,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Run one query through a bounded query-handle service")]
pub(crate) struct Args {
    #[arg(long, value_enum, default_value = "sqlite")]
    pub(crate) driver: DriverKind,
    /// Database name (the file path for SQLite)
    #[arg(long)]
    pub(crate) database: Option<String>,
    #[arg(long)]
    pub(crate) server: Option<String>,
    #[arg(long)]
    pub(crate) port: Option<u16>,
    #[arg(long)]
    pub(crate) user: Option<String>,
    #[arg(long, value_parser = humantime::parse_duration)]
    pub(crate) timeout: Option<Duration>,
    #[arg(long)]
    pub(crate) capacity: Option<usize>,
    /// Statements run (and waited on) before the main query
    #[arg(long)]
    pub(crate) setup: Vec<String>,
    /// Run as this caller identity
    #[arg(long)]
    pub(crate) caller: Option<String>,
    #[arg(long, value_enum, default_value = "rows")]
    pub(crate) mode: Mode,
    /// Query with `?` placeholders
    pub(crate) query: String,
    /// Placeholder values; numeric-looking values are sent as numbers
    pub(crate) args: Vec<String>,
}

impl Args {
    /// Environment settings first, then explicit flags on top.
    pub(crate) fn config(&self) -> Result<DbConfig, SqlHandlesError> {
        let mut cfg = DbConfig::from_settings(&EnvSettings::default())?;
        cfg.driver = self.driver.driver_name().to_string();
        if let Some(database) = &self.database {
            cfg.database.clone_from(database);
        }
        if let Some(server) = &self.server {
            cfg.server.clone_from(server);
        }
        if let Some(port) = self.port {
            cfg.port = port;
        }
        if let Some(user) = &self.user {
            cfg.user.clone_from(user);
        }
        if let Some(timeout) = self.timeout {
            cfg.poll_timeout = timeout;
        }
        if let Some(capacity) = self.capacity {
            cfg.pool_capacity = capacity;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub(crate) fn query_args(&self) -> Vec<RowValues> {
        self.args
            .iter()
            .map(|raw| coerce_value(RowValues::Text(raw.clone())).unwrap_or(RowValues::Null))
            .collect()
    }
}
