//! End-to-end run: provision, connect, exercise, verify, tear down.
//!
//! # Design
//! - Steps run strictly in sequence and the first fatal error ends the run.
//! - The connection is closed and the container removed on every path; a
//!   step error wins over a teardown error when both occur.
//! - Assertion failures never end the run; they come back in the report.

use std::pin::pin;

use futures_util::TryStreamExt;
use tracing::{info, warn};

use crate::config::HarnessConfig;
use crate::connection::DatabaseHandle;
use crate::descriptor::ConnectionDescriptor;
use crate::error::HarnessResult;
use crate::exercise::{ExerciseDriver, UserRow};
use crate::provision::PostgresProvisioner;
use crate::verify::{EXPECTED_NAMES, EXPECTED_ROW_COUNT, VerificationReport, Verifier};

/// Everything observed during one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioReport {
    /// Rows read back, in the order the database returned them.
    pub rows: Vec<UserRow>,
    /// Row count reported by the aggregate query.
    pub count: i64,
    /// Outcome of every check.
    pub verification: VerificationReport,
}

impl ScenarioReport {
    /// `true` when every check passed.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.verification.is_success()
    }
}

/// Provision a fresh database, run the exercise against it, and tear it down.
///
/// # Errors
///
/// Returns the first fatal [`HarnessError`](crate::HarnessError) raised by
/// provisioning, connecting, the exercise steps, or teardown.
pub async fn run_scenario(config: &HarnessConfig) -> HarnessResult<ScenarioReport> {
    let provisioner = PostgresProvisioner::new(config.clone())?;
    let database = provisioner.start().await?;

    let outcome = run_against(database.descriptor()).await;
    let container_id = database.container_id().to_string();
    let teardown = database.terminate().await;

    if let Err(err) = &teardown {
        warn!(container_id = %container_id, error = %err, "container teardown failed");
    }
    let report = outcome?;
    teardown?;

    info!(
        container_id = %container_id,
        rows = report.rows.len(),
        count = report.count,
        passed = report.is_success(),
        "scenario finished"
    );
    Ok(report)
}

/// Open a connection to `descriptor`, run the exercise, and close it.
///
/// # Errors
///
/// Returns a connection error if the handle cannot be opened or closed, or
/// the first fatal error raised by the exercise.
pub async fn run_against(descriptor: &ConnectionDescriptor) -> HarnessResult<ScenarioReport> {
    let mut handle = DatabaseHandle::open(descriptor).await?;
    let outcome = run_exercise(&mut handle).await;
    if let Err(err) = &outcome {
        warn!(endpoint = handle.target(), error = %err, "exercise failed; closing connection");
    }
    let closed = handle.close().await;
    let report = outcome?;
    closed?;
    Ok(report)
}

/// Run the create, insert, select, and count steps over an open handle and
/// verify what comes back.
///
/// # Errors
///
/// Returns a schema, write, query, or decode error from the first step that fails.
pub async fn run_exercise(handle: &mut DatabaseHandle) -> HarnessResult<ScenarioReport> {
    let mut driver = ExerciseDriver::new(handle);
    driver.create_schema().await?;
    driver.insert_users(EXPECTED_NAMES).await?;

    let mut verifier = Verifier::default();
    let mut rows = Vec::new();
    {
        let mut stream = pin!(driver.users());
        while let Some(row) = stream.try_next().await? {
            verifier.check_row(&row);
            rows.push(row);
        }
    }

    let count = driver.count_users().await?;
    verifier.check_count(count, EXPECTED_ROW_COUNT);

    Ok(ScenarioReport {
        rows,
        count,
        verification: verifier.finish(),
    })
}
