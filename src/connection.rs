use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::DbConfig;
use crate::driver::{Driver, DriverConnection};
use crate::error::SqlHandlesError;

/// Owns the single live driver connection and re-establishes it on demand.
///
/// The connection sits behind an async mutex, so concurrent callers that find it missing wait
/// for one reconnect attempt instead of racing their own.
pub struct ConnectionManager {
    driver: Arc<dyn Driver>,
    config: Arc<DbConfig>,
    conn: Mutex<Option<Arc<dyn DriverConnection>>>,
    superuser_warned: Arc<AtomicBool>,
    superuser_warnings: Arc<AtomicUsize>,
}

// Manual Debug implementation because the driver trait objects don't implement Debug
impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("driver", &self.config.driver)
            .field("conn_string", &self.config.connection_string())
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    #[must_use]
    pub fn new(driver: Arc<dyn Driver>, config: Arc<DbConfig>) -> Self {
        Self {
            driver,
            config,
            conn: Mutex::new(None),
            superuser_warned: Arc::new(AtomicBool::new(false)),
            superuser_warnings: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Return the live connection, connecting first if there is none or it was lost.
    ///
    /// # Errors
    /// Returns `SqlHandlesError::ConnectionError` if a new connection cannot be opened.
    pub async fn ensure_connected(&self) -> Result<Arc<dyn DriverConnection>, SqlHandlesError> {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            if conn.is_connected() {
                return Ok(Arc::clone(conn));
            }
            warn!("database connection lost, reconnecting");
        }
        self.connect_locked(&mut guard).await
    }

    /// Open a fresh connection, closing any existing one first.
    ///
    /// # Errors
    /// Returns `SqlHandlesError::ConnectionError` if the driver cannot connect.
    pub async fn connect(&self) -> Result<Arc<dyn DriverConnection>, SqlHandlesError> {
        let mut guard = self.conn.lock().await;
        self.connect_locked(&mut guard).await
    }

    async fn connect_locked(
        &self,
        slot: &mut Option<Arc<dyn DriverConnection>>,
    ) -> Result<Arc<dyn DriverConnection>, SqlHandlesError> {
        if let Some(old) = slot.take() {
            old.destroy().await;
        }

        let conn_string = self.config.connection_string();
        debug!(driver = %self.config.driver, %conn_string, "connecting");
        let conn = self
            .driver
            .open(
                &self.config.driver,
                &conn_string,
                &self.config.user,
                &self.config.password,
            )
            .await
            .map_err(|e| {
                error!(%conn_string, error = %e, "database connection failed");
                match e {
                    SqlHandlesError::ConnectionError(_) => e,
                    other => SqlHandlesError::ConnectionError(other.to_string()),
                }
            })?;

        info!(%conn_string, "database connection established");
        *slot = Some(Arc::clone(&conn));
        self.schedule_superuser_warning();
        Ok(conn)
    }

    // One warning per manager, emitted after a delay so it lands after startup noise.
    fn schedule_superuser_warning(&self) {
        if !self.config.is_superuser() || self.superuser_warned.swap(true, Ordering::SeqCst) {
            return;
        }
        let user = self.config.user.clone();
        let delay = self.config.superuser_warning_delay;
        let emitted = Arc::clone(&self.superuser_warnings);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    warn_superuser(&user, &emitted);
                });
            }
            Err(_) => warn_superuser(&user, &emitted),
        }
    }

    /// True once the superuser warning has been scheduled.
    #[must_use]
    pub fn superuser_warning_issued(&self) -> bool {
        self.superuser_warned.load(Ordering::SeqCst)
    }

    /// How many times the superuser warning has actually been logged.
    #[must_use]
    pub fn superuser_warnings_emitted(&self) -> usize {
        self.superuser_warnings.load(Ordering::SeqCst)
    }

    /// Close the connection if there is one. Safe to call when already disconnected.
    pub async fn disconnect(&self) {
        let taken = self.conn.lock().await.take();
        if let Some(conn) = taken {
            conn.destroy().await;
            info!("database connection closed");
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.conn
            .lock()
            .await
            .as_ref()
            .is_some_and(|conn| conn.is_connected())
    }
}

fn warn_superuser(user: &str, emitted: &AtomicUsize) {
    emitted.fetch_add(1, Ordering::SeqCst);
    warn!(
        user,
        "connected to the database as a superuser account; use a restricted account instead"
    );
}
