//! Harness configuration: image, credentials, readiness policy, and session parameters.
//!
//! Defaults describe the stock `postgres` image. Individual values can be
//! overridden through `PGSMOKE_*` environment variables.

use std::time::Duration;

use crate::error::{HarnessError, HarnessResult};

/// Log line Postgres prints once per server start.
pub const READY_LOG_LINE: &str = "database system is ready to accept connections";

const DEFAULT_IMAGE: &str = "docker.io/postgres";
const DEFAULT_TAG: &str = "latest";
const DEFAULT_DATABASE: &str = "example-db";
const DEFAULT_USERNAME: &str = "user";
const DEFAULT_PASSWORD: &str = "password";
// The image restarts the server once after first-time initialisation, so the
// ready line has to appear twice before the final server is accepting.
const DEFAULT_READY_OCCURRENCES: usize = 2;
const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_APPLICATION_NAME: &str = "test";

const ENV_IMAGE: &str = "PGSMOKE_IMAGE";
const ENV_TAG: &str = "PGSMOKE_IMAGE_TAG";
const ENV_DATABASE: &str = "PGSMOKE_DATABASE";
const ENV_USERNAME: &str = "PGSMOKE_USERNAME";
const ENV_PASSWORD: &str = "PGSMOKE_PASSWORD";
const ENV_READY_OCCURRENCES: &str = "PGSMOKE_READY_OCCURRENCES";
const ENV_STARTUP_TIMEOUT_SECS: &str = "PGSMOKE_STARTUP_TIMEOUT_SECS";

/// Container output stream watched for the readiness pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    /// Standard output.
    Stdout,
    /// Standard error. Postgres writes its server log here.
    Stderr,
}

/// Predicate deciding when a freshly started container may be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessCondition {
    /// Log line to wait for.
    pub pattern: String,
    /// Stream the log line is expected on.
    pub stream: LogStream,
    /// Number of times the log line must appear.
    pub occurrences: usize,
    /// Upper bound on the whole startup, image pull excluded.
    pub startup_timeout: Duration,
}

impl Default for ReadinessCondition {
    fn default() -> Self {
        Self {
            pattern: READY_LOG_LINE.to_string(),
            stream: LogStream::Stderr,
            occurrences: DEFAULT_READY_OCCURRENCES,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }
}

/// Everything needed to provision and reach the disposable database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Image name, registry prefix included.
    pub image: String,
    /// Image tag.
    pub tag: String,
    /// Database created by the image entrypoint.
    pub database: String,
    /// Superuser name created by the image entrypoint.
    pub username: String,
    /// Password for [`HarnessConfig::username`].
    pub password: String,
    /// Readiness policy applied while the container starts.
    pub readiness: ReadinessCondition,
    /// Driver query parameters appended to the connection descriptor.
    pub session_params: Vec<(String, String)>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE.to_string(),
            tag: DEFAULT_TAG.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            username: DEFAULT_USERNAME.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            readiness: ReadinessCondition::default(),
            session_params: vec![
                ("sslmode".to_string(), "disable".to_string()),
                (
                    "application_name".to_string(),
                    DEFAULT_APPLICATION_NAME.to_string(),
                ),
            ],
        }
    }
}

impl HarnessConfig {
    /// Load the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] when an override cannot be parsed or
    /// the resulting configuration is unusable.
    pub fn from_env() -> HarnessResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load the configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] when an override cannot be parsed or
    /// the resulting configuration is unusable.
    pub fn from_lookup<F>(lookup: F) -> HarnessResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let text = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(image) = text(ENV_IMAGE) {
            config.image = image;
        }
        if let Some(tag) = text(ENV_TAG) {
            config.tag = tag;
        }
        if let Some(database) = text(ENV_DATABASE) {
            config.database = database;
        }
        if let Some(username) = text(ENV_USERNAME) {
            config.username = username;
        }
        if let Some(password) = text(ENV_PASSWORD) {
            config.password = password;
        }
        if let Some(raw) = text(ENV_READY_OCCURRENCES) {
            config.readiness.occurrences = parse_number(ENV_READY_OCCURRENCES, &raw)?;
        }
        if let Some(raw) = text(ENV_STARTUP_TIMEOUT_SECS) {
            config.readiness.startup_timeout =
                Duration::from_secs(parse_number(ENV_STARTUP_TIMEOUT_SECS, &raw)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the container runtime would reject
    /// or that make readiness impossible.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] naming the first offending field.
    pub fn validate(&self) -> HarnessResult<()> {
        require_non_empty("image", &self.image)?;
        require_non_empty("tag", &self.tag)?;
        require_non_empty("database", &self.database)?;
        require_non_empty("username", &self.username)?;
        require_non_empty("password", &self.password)?;
        require_non_empty("readiness.pattern", &self.readiness.pattern)?;
        if self.readiness.occurrences == 0 {
            return Err(HarnessError::Config {
                field: "readiness.occurrences",
                value: Some("0".to_string()),
                reason: "must be at least one",
            });
        }
        if self.readiness.startup_timeout.is_zero() {
            return Err(HarnessError::Config {
                field: "readiness.startup_timeout",
                value: Some("0".to_string()),
                reason: "must be positive",
            });
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(field: &'static str, raw: &str) -> HarnessResult<T> {
    raw.parse().map_err(|_| HarnessError::Config {
        field,
        value: Some(raw.to_string()),
        reason: "not a non-negative integer",
    })
}

fn require_non_empty(field: &'static str, value: &str) -> HarnessResult<()> {
    if value.trim().is_empty() {
        return Err(HarnessError::Config {
            field,
            value: None,
            reason: "must not be empty",
        });
    }
    Ok(())
}
