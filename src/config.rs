use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SqlHandlesError;

pub const DEFAULT_DRIVER: &str = "mysql";
pub const DEFAULT_SERVER: &str = "localhost";
pub const DEFAULT_USER: &str = "root";
pub const DEFAULT_DATABASE: &str = "mta";
pub const DEFAULT_PORT: u16 = 3306;
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(500);
pub const DEFAULT_POOL_CAPACITY: usize = 128;
pub const DEFAULT_SUPERUSER_WARNING_DELAY: Duration = Duration::from_secs(1);

/// Accounts that trigger the superuser warning after connecting.
const SUPERUSER_ACCOUNTS: &[&str] = &["root"];

/// Connection and polling settings.
///
/// Every field has a default, so a host that supplies nothing still gets a usable local
/// configuration:
/// ```rust
/// use sql_handles::prelude::*;
///
/// let cfg = DbConfig::builder().database("game").port(3307).finish();
/// assert_eq!(cfg.server, "localhost");
/// assert_eq!(cfg.connection_string(), "dbname=game;host=localhost;port=3307");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub driver: String,
    pub server: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub port: u16,
    pub socket: Option<String>,
    #[serde(with = "millis")]
    pub poll_timeout: Duration,
    pub pool_capacity: usize,
    /// Caller identities refused by the result-fetching entry points.
    pub blocked_callers: Vec<String>,
    #[serde(with = "millis")]
    pub superuser_warning_delay: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            driver: DEFAULT_DRIVER.to_string(),
            server: DEFAULT_SERVER.to_string(),
            user: DEFAULT_USER.to_string(),
            password: String::new(),
            database: DEFAULT_DATABASE.to_string(),
            port: DEFAULT_PORT,
            socket: None,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            pool_capacity: DEFAULT_POOL_CAPACITY,
            blocked_callers: Vec::new(),
            superuser_warning_delay: DEFAULT_SUPERUSER_WARNING_DELAY,
        }
    }
}

impl DbConfig {
    #[must_use]
    pub fn builder() -> DbConfigBuilder {
        DbConfigBuilder::default()
    }

    /// Driver connection string: `dbname=..;host=..;port=..[;unix_socket=..]`.
    #[must_use]
    pub fn connection_string(&self) -> String {
        let mut conn = format!(
            "dbname={};host={};port={}",
            self.database, self.server, self.port
        );
        if let Some(socket) = self.socket.as_deref().filter(|s| !s.is_empty()) {
            conn.push_str(";unix_socket=");
            conn.push_str(socket);
        }
        conn
    }

    #[must_use]
    pub fn is_superuser(&self) -> bool {
        SUPERUSER_ACCOUNTS.contains(&self.user.as_str())
    }

    #[must_use]
    pub fn is_blocked_caller(&self, caller: &str) -> bool {
        self.blocked_callers.iter().any(|blocked| blocked == caller)
    }

    /// Check invariants the rest of the crate relies on.
    ///
    /// # Errors
    /// Returns `SqlHandlesError::ConfigError` for a zero pool capacity or zero poll timeout.
    pub fn validate(&self) -> Result<(), SqlHandlesError> {
        if self.pool_capacity == 0 {
            return Err(SqlHandlesError::ConfigError(
                "pool_capacity must be at least 1".to_string(),
            ));
        }
        if self.poll_timeout.is_zero() {
            return Err(SqlHandlesError::ConfigError(
                "poll_timeout must be non-zero".to_string(),
            ));
        }
        if self.database.is_empty() {
            return Err(SqlHandlesError::ConfigError(
                "database is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Build a configuration from the host's key/value settings, falling back to defaults.
    ///
    /// Recognised keys: `server`, `user`, `password`, `database`, `port`, `socket`,
    /// `poll_timeout` (milliseconds), `pool_capacity`, `blocked_callers` (comma separated).
    ///
    /// # Errors
    /// Returns `SqlHandlesError::ConfigError` when a numeric key does not parse.
    pub fn from_settings(settings: &impl SettingsSource) -> Result<Self, SqlHandlesError> {
        let mut cfg = DbConfig::default();
        if let Some(driver) = settings.get("driver") {
            cfg.driver = driver;
        }
        if let Some(server) = settings.get("server") {
            cfg.server = server;
        }
        if let Some(user) = settings.get("user") {
            cfg.user = user;
        }
        if let Some(password) = settings.get("password") {
            cfg.password = password;
        }
        if let Some(database) = settings.get("database") {
            cfg.database = database;
        }
        if let Some(port) = settings.get("port") {
            cfg.port = parse_setting("port", &port)?;
        }
        cfg.socket = settings.get("socket").filter(|s| !s.is_empty());
        if let Some(timeout) = settings.get("poll_timeout") {
            cfg.poll_timeout = Duration::from_millis(parse_setting("poll_timeout", &timeout)?);
        }
        if let Some(capacity) = settings.get("pool_capacity") {
            cfg.pool_capacity = parse_setting("pool_capacity", &capacity)?;
        }
        if let Some(blocked) = settings.get("blocked_callers") {
            cfg.blocked_callers = blocked
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_setting<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, SqlHandlesError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e| {
        SqlHandlesError::ConfigError(format!("invalid value '{raw}' for setting '{key}': {e}"))
    })
}

/// Host-provided key/value settings store.
pub trait SettingsSource {
    fn get(&self, key: &str) -> Option<String>;
}

impl SettingsSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Reads settings from environment variables named `<PREFIX><KEY>` (key upper-cased).
#[derive(Debug, Clone)]
pub struct EnvSettings {
    prefix: String,
}

impl EnvSettings {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for EnvSettings {
    fn default() -> Self {
        Self::new("SQL_HANDLES_")
    }
}

impl SettingsSource for EnvSettings {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(format!("{}{}", self.prefix, key.to_ascii_uppercase())).ok()
    }
}

/// Fluent builder for [`DbConfig`].
#[derive(Debug, Clone, Default)]
pub struct DbConfigBuilder {
    cfg: DbConfig,
}

impl DbConfigBuilder {
    #[must_use]
    pub fn driver(mut self, driver: impl Into<String>) -> Self {
        self.cfg.driver = driver.into();
        self
    }

    #[must_use]
    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.cfg.server = server.into();
        self
    }

    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.cfg.user = user.into();
        self
    }

    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.cfg.password = password.into();
        self
    }

    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.cfg.database = database.into();
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.cfg.port = port;
        self
    }

    #[must_use]
    pub fn socket(mut self, socket: impl Into<String>) -> Self {
        self.cfg.socket = Some(socket.into());
        self
    }

    #[must_use]
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.cfg.poll_timeout = timeout;
        self
    }

    #[must_use]
    pub fn pool_capacity(mut self, capacity: usize) -> Self {
        self.cfg.pool_capacity = capacity;
        self
    }

    #[must_use]
    pub fn block_caller(mut self, caller: impl Into<String>) -> Self {
        self.cfg.blocked_callers.push(caller.into());
        self
    }

    #[must_use]
    pub fn superuser_warning_delay(mut self, delay: Duration) -> Self {
        self.cfg.superuser_warning_delay = delay;
        self
    }

    #[must_use]
    pub fn finish(self) -> DbConfig {
        self.cfg
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn defaults_match_host_conventions() {
        let cfg = DbConfig::from_settings(&HashMap::<String, String>::new()).unwrap();
        assert_eq!(cfg.server, "localhost");
        assert_eq!(cfg.user, "root");
        assert_eq!(cfg.password, "");
        assert_eq!(cfg.database, "mta");
        assert_eq!(cfg.port, 3306);
        assert_eq!(cfg.socket, None);
        assert_eq!(cfg.poll_timeout, Duration::from_millis(500));
        assert!(cfg.is_superuser());
    }

    #[test]
    fn connection_string_appends_socket() {
        let cfg = DbConfig::from_settings(&settings(&[
            ("server", "db.internal"),
            ("socket", "/run/mysqld/mysqld.sock"),
        ]))
        .unwrap();
        assert_eq!(
            cfg.connection_string(),
            "dbname=mta;host=db.internal;port=3306;unix_socket=/run/mysqld/mysqld.sock"
        );
    }

    #[test]
    fn empty_socket_is_ignored() {
        let cfg = DbConfig::from_settings(&settings(&[("socket", "")])).unwrap();
        assert_eq!(cfg.connection_string(), "dbname=mta;host=localhost;port=3306");
    }

    #[test]
    fn malformed_port_is_config_error() {
        let err = DbConfig::from_settings(&settings(&[("port", "mysql")])).unwrap_err();
        assert!(matches!(err, SqlHandlesError::ConfigError(msg) if msg.contains("port")));
    }

    #[test]
    fn blocked_callers_are_split() {
        let cfg =
            DbConfig::from_settings(&settings(&[("blocked_callers", "runcode, , admin")])).unwrap();
        assert!(cfg.is_blocked_caller("runcode"));
        assert!(cfg.is_blocked_caller("admin"));
        assert!(!cfg.is_blocked_caller("race"));
    }

    #[test]
    fn zero_capacity_rejected() {
        let cfg = DbConfig::builder().pool_capacity(0).finish();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn deserializes_with_defaults() {
        let cfg: DbConfig =
            serde_json::from_str(r#"{"user":"mta_game","poll_timeout":250}"#).unwrap();
        assert_eq!(cfg.user, "mta_game");
        assert!(!cfg.is_superuser());
        assert_eq!(cfg.poll_timeout, Duration::from_millis(250));
        assert_eq!(cfg.pool_capacity, DEFAULT_POOL_CAPACITY);
    }
}
