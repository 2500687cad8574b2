//! # Design
//!
//! - Every fatal failure of the harness is a `HarnessError`; assertion failures are not.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve the driver or container runtime error as `source` without re-wording it.

use thiserror::Error;

/// Result alias for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Fatal harness errors. Any of these stops the run.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// A configuration value could not be used.
    #[error("invalid harness configuration")]
    Config {
        /// Configuration field that failed validation.
        field: &'static str,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// The database container failed to start, never became ready, or its
    /// mapped address could not be turned into a descriptor.
    #[error("failed to provision database container")]
    Provisioning {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying cause.
        source: ProvisioningFailure,
    },
    /// The connection descriptor was malformed or the target unreachable.
    #[error("failed to open database connection")]
    Connection {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying cause.
        source: ConnectionFailure,
    },
    /// A DDL statement failed.
    #[error("schema statement failed")]
    Schema {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying SQL error.
        source: sqlx::Error,
    },
    /// A DML statement failed.
    #[error("write statement failed")]
    Write {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying SQL error.
        source: sqlx::Error,
    },
    /// A query failed to execute or to deliver its rows.
    #[error("query failed")]
    Query {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying SQL error.
        source: sqlx::Error,
    },
    /// A row could not be scanned into its typed fields.
    #[error("failed to decode row")]
    Decode {
        /// Column that failed to decode.
        column: &'static str,
        /// Underlying SQL error.
        source: sqlx::Error,
    },
    /// Explicit container removal failed.
    #[error("failed to tear down database container")]
    Teardown {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying container runtime error.
        source: testcontainers::TestcontainersError,
    },
}

/// Underlying cause of a [`HarnessError::Provisioning`].
#[derive(Debug, Error)]
pub enum ProvisioningFailure {
    /// The container runtime refused or timed out.
    #[error("container runtime error")]
    Runtime(#[from] testcontainers::TestcontainersError),
    /// The container's mapped host and port did not form a valid descriptor.
    #[error("container address is not a valid descriptor")]
    Descriptor(#[from] ConnectionFailure),
}

/// Underlying cause of a [`HarnessError::Connection`].
#[derive(Debug, Error)]
pub enum ConnectionFailure {
    /// The descriptor could not be parsed as a URL.
    #[error("connection descriptor is not a valid url")]
    Url(#[from] url::ParseError),
    /// The descriptor parsed but does not describe a reachable postgres target.
    #[error("connection descriptor is malformed")]
    Malformed {
        /// Static reason for the rejection.
        reason: &'static str,
    },
    /// The driver rejected the descriptor or could not reach the server.
    #[error("database driver error")]
    Driver(#[from] sqlx::Error),
}

/// Coarse classification of a [`HarnessError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// See [`HarnessError::Config`].
    Config,
    /// See [`HarnessError::Provisioning`].
    Provisioning,
    /// See [`HarnessError::Connection`].
    Connection,
    /// See [`HarnessError::Schema`].
    Schema,
    /// See [`HarnessError::Write`].
    Write,
    /// See [`HarnessError::Query`].
    Query,
    /// See [`HarnessError::Decode`].
    Decode,
    /// See [`HarnessError::Teardown`].
    Teardown,
}

impl HarnessError {
    /// Classify the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } => ErrorKind::Config,
            Self::Provisioning { .. } => ErrorKind::Provisioning,
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Schema { .. } => ErrorKind::Schema,
            Self::Write { .. } => ErrorKind::Write,
            Self::Query { .. } => ErrorKind::Query,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::Teardown { .. } => ErrorKind::Teardown,
        }
    }

    pub(crate) fn provisioning<E: Into<ProvisioningFailure>>(
        operation: &'static str,
    ) -> impl FnOnce(E) -> Self {
        move |source| Self::Provisioning {
            operation,
            source: source.into(),
        }
    }

    pub(crate) fn connection(operation: &'static str, source: impl Into<ConnectionFailure>) -> Self {
        Self::Connection {
            operation,
            source: source.into(),
        }
    }

    pub(crate) fn schema(operation: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Self::Schema { operation, source }
    }

    pub(crate) fn write(operation: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Self::Write { operation, source }
    }

    pub(crate) fn query(operation: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Self::Query { operation, source }
    }

    pub(crate) fn decode(column: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Self::Decode { column, source }
    }
}
