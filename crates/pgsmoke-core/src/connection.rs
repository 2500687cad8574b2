//! Scoped database handles.

use std::str::FromStr;

use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{ConnectOptions, Connection};
use tracing::{debug, info};

use crate::descriptor::{ConnectionDescriptor, DRIVER_NAME};
use crate::error::{HarnessError, HarnessResult};

/// A single open connection to the provisioned database.
///
/// Dropping the handle closes the socket; [`DatabaseHandle::close`] performs
/// the protocol-level shutdown and reports failures.
#[derive(Debug)]
pub struct DatabaseHandle {
    conn: PgConnection,
    target: String,
}

impl DatabaseHandle {
    /// Open a connection described by `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Connection`] if the driver rejects the
    /// descriptor or the server cannot be reached.
    pub async fn open(descriptor: &ConnectionDescriptor) -> HarnessResult<Self> {
        let options = PgConnectOptions::from_str(descriptor.as_str())
            .map_err(|err| HarnessError::connection("connection.options", err))?;
        let conn = options
            .connect()
            .await
            .map_err(|err| HarnessError::connection("connection.connect", err))?;
        let target = descriptor.redacted();
        info!(driver = DRIVER_NAME, endpoint = %target, "database connection opened");
        Ok(Self { conn, target })
    }

    /// Parse `raw` as a descriptor and open it.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Connection`] if `raw` is malformed or the
    /// server cannot be reached.
    pub async fn open_str(raw: &str) -> HarnessResult<Self> {
        let descriptor = ConnectionDescriptor::parse(raw)?;
        Self::open(&descriptor).await
    }

    /// Mutable access to the underlying driver connection.
    pub const fn connection(&mut self) -> &mut PgConnection {
        &mut self.conn
    }

    /// Redacted descriptor of the connected target.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Close the connection gracefully.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Connection`] if the termination handshake fails.
    pub async fn close(self) -> HarnessResult<()> {
        let Self { conn, target } = self;
        conn.close()
            .await
            .map_err(|err| HarnessError::connection("connection.close", err))?;
        debug!(endpoint = %target, "database connection closed");
        Ok(())
    }
}
