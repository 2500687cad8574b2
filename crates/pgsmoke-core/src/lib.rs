#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Disposable Postgres harness: provision a container, run a fixed SQL
//! exercise over one connection, verify the results, and tear everything down.

pub mod config;
pub mod connection;
pub mod descriptor;
pub mod error;
pub mod exercise;
pub mod provision;
pub mod scenario;
pub mod verify;

pub use config::{HarnessConfig, LogStream, ReadinessCondition};
pub use connection::DatabaseHandle;
pub use descriptor::{ConnectionDescriptor, DRIVER_NAME};
pub use error::{ConnectionFailure, ErrorKind, HarnessError, HarnessResult, ProvisioningFailure};
pub use exercise::{ExerciseDriver, UserRow};
pub use provision::{PostgresProvisioner, ProvisionedPostgres};
pub use scenario::{ScenarioReport, run_against, run_exercise, run_scenario};
pub use verify::{AssertionFailure, EXPECTED_NAMES, EXPECTED_ROW_COUNT, VerificationReport, Verifier};
