//! Connection descriptors for the provisioned database.

use std::fmt::{self, Debug, Display, Formatter};

use url::Url;

use crate::error::{ConnectionFailure, HarnessError, HarnessResult};

/// Driver name and URL scheme used to reach the database.
pub const DRIVER_NAME: &str = "postgres";

const ACCEPTED_SCHEMES: [&str; 2] = [DRIVER_NAME, "postgresql"];
const REDACTED_PASSWORD: &str = "***";

/// How to reach a running Postgres instance: host, port, credentials,
/// database, and driver session parameters encoded as a `postgres://` URL.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    url: Url,
}

impl ConnectionDescriptor {
    /// Assemble a descriptor from its parts.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Connection`] if the parts cannot form a valid URL.
    pub fn new(
        host: &str,
        port: u16,
        database: &str,
        username: &str,
        password: &str,
        session_params: &[(String, String)],
    ) -> HarnessResult<Self> {
        Self::assemble(host, port, database, username, password, session_params)
            .map_err(|err| HarnessError::connection("descriptor.build", err))
    }

    pub(crate) fn assemble(
        host: &str,
        port: u16,
        database: &str,
        username: &str,
        password: &str,
        session_params: &[(String, String)],
    ) -> Result<Self, ConnectionFailure> {
        let mut url = Url::parse(&format!("{DRIVER_NAME}://{host}:{port}"))?;
        url.set_username(username)
            .map_err(|()| ConnectionFailure::Malformed {
                reason: "username cannot be encoded",
            })?;
        url.set_password(Some(password))
            .map_err(|()| ConnectionFailure::Malformed {
                reason: "password cannot be encoded",
            })?;
        url.set_path(&format!("/{database}"));
        if !session_params.is_empty() {
            url.query_pairs_mut().extend_pairs(session_params);
        }
        Self::from_url(url)
    }

    /// Parse an externally supplied connection string.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Connection`] if the string is not a URL, uses a
    /// scheme other than `postgres`/`postgresql`, or lacks a host.
    pub fn parse(raw: &str) -> HarnessResult<Self> {
        Url::parse(raw)
            .map_err(ConnectionFailure::from)
            .and_then(Self::from_url)
            .map_err(|err| HarnessError::connection("descriptor.parse", err))
    }

    fn from_url(url: Url) -> Result<Self, ConnectionFailure> {
        if !ACCEPTED_SCHEMES.contains(&url.scheme()) {
            return Err(ConnectionFailure::Malformed {
                reason: "scheme is not postgres",
            });
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(ConnectionFailure::Malformed {
                reason: "missing host",
            });
        }
        Ok(Self { url })
    }

    /// Full connection string, credentials included.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Host component.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }

    /// Explicit port, if present.
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.url.port()
    }

    /// Database name, or `None` when the driver default applies.
    #[must_use]
    pub fn database(&self) -> Option<&str> {
        Some(self.url.path().trim_start_matches('/')).filter(|name| !name.is_empty())
    }

    /// Value of a session parameter carried in the query string.
    #[must_use]
    pub fn session_param(&self, key: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.into_owned())
    }

    /// Connection string with the password masked, suitable for logs.
    #[must_use]
    pub fn redacted(&self) -> String {
        let mut url = self.url.clone();
        if url.password().is_some() {
            let _ = url.set_password(Some(REDACTED_PASSWORD));
        }
        url.into()
    }
}

impl Display for ConnectionDescriptor {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.redacted())
    }
}

impl Debug for ConnectionDescriptor {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter
            .debug_tuple("ConnectionDescriptor")
            .field(&self.redacted())
            .finish()
    }
}
