//! Disposable Postgres containers for integration runs.
//!
//! # Design
//! - One container per provisioner call, exclusively owned by the caller.
//! - Readiness is decided by the container runtime's log wait strategy; there is no retry.
//! - Dropping [`ProvisionedPostgres`] removes the container, so every exit path releases it.

use std::time::Instant;

use testcontainers::core::wait::LogWaitStrategy;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};
use tracing::{debug, info};

use crate::config::{HarnessConfig, LogStream, ReadinessCondition};
use crate::descriptor::ConnectionDescriptor;
use crate::error::{HarnessError, HarnessResult};

/// Port Postgres listens on inside the container.
pub const POSTGRES_PORT: u16 = 5432;

/// Starts disposable Postgres containers from a [`HarnessConfig`].
#[derive(Debug, Clone)]
pub struct PostgresProvisioner {
    config: HarnessConfig,
}

impl PostgresProvisioner {
    /// Create a provisioner for the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] if the configuration is unusable.
    pub fn new(config: HarnessConfig) -> HarnessResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Configuration the provisioner was built with.
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Start a container and block until the readiness condition holds.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Provisioning`] if the container fails to launch,
    /// the readiness log line is not seen often enough before the startup
    /// timeout, or its mapped address cannot be resolved into a descriptor.
    pub async fn start(&self) -> HarnessResult<ProvisionedPostgres> {
        let config = &self.config;
        let started = Instant::now();
        info!(
            image = %config.image,
            tag = %config.tag,
            occurrences = config.readiness.occurrences,
            timeout_secs = config.readiness.startup_timeout.as_secs(),
            "starting postgres container"
        );

        let container = GenericImage::new(config.image.as_str(), config.tag.as_str())
            .with_exposed_port(ContainerPort::Tcp(POSTGRES_PORT))
            .with_wait_for(wait_strategy(&config.readiness))
            .with_env_var("POSTGRES_DB", config.database.as_str())
            .with_env_var("POSTGRES_USER", config.username.as_str())
            .with_env_var("POSTGRES_PASSWORD", config.password.as_str())
            .with_startup_timeout(config.readiness.startup_timeout)
            .start()
            .await
            .map_err(HarnessError::provisioning("container.start"))?;

        let host = container
            .get_host()
            .await
            .map_err(HarnessError::provisioning("container.host"))?;
        let port = container
            .get_host_port_ipv4(ContainerPort::Tcp(POSTGRES_PORT))
            .await
            .map_err(HarnessError::provisioning("container.port"))?;

        let descriptor = descriptor_for(config, &host.to_string(), port)?;

        info!(
            container_id = container.id(),
            descriptor = %descriptor,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "postgres container ready"
        );

        Ok(ProvisionedPostgres {
            container,
            descriptor,
        })
    }
}

fn descriptor_for(
    config: &HarnessConfig,
    host: &str,
    port: u16,
) -> HarnessResult<ConnectionDescriptor> {
    ConnectionDescriptor::assemble(
        host,
        port,
        &config.database,
        &config.username,
        &config.password,
        &config.session_params,
    )
    .map_err(HarnessError::provisioning("descriptor.build"))
}

fn wait_strategy(readiness: &ReadinessCondition) -> WaitFor {
    let strategy = match readiness.stream {
        LogStream::Stdout => LogWaitStrategy::stdout(readiness.pattern.clone()),
        LogStream::Stderr => LogWaitStrategy::stderr(readiness.pattern.clone()),
    };
    WaitFor::Log(strategy.with_times(readiness.occurrences))
}

/// A running, ready Postgres container together with its descriptor.
///
/// The container is removed when this value is dropped. [`Self::terminate`]
/// does the same explicitly and reports failures.
pub struct ProvisionedPostgres {
    container: ContainerAsync<GenericImage>,
    descriptor: ConnectionDescriptor,
}

impl ProvisionedPostgres {
    /// Descriptor for reaching the database from the host.
    #[must_use]
    pub const fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    /// Container runtime identifier.
    #[must_use]
    pub fn container_id(&self) -> &str {
        self.container.id()
    }

    /// Stop and remove the container.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Teardown`] if the container runtime refuses the removal.
    pub async fn terminate(self) -> HarnessResult<()> {
        let container_id = self.container.id().to_string();
        self.container
            .rm()
            .await
            .map_err(|source| HarnessError::Teardown {
                operation: "container.rm",
                source,
            })?;
        debug!(container_id = %container_id, "postgres container removed");
        Ok(())
    }
}
