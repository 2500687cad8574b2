use std::future::Future;
use std::pin::pin;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::TryStreamExt;
use pgsmoke_core::{
    AssertionFailure, ConnectionDescriptor, DatabaseHandle, ErrorKind, ExerciseDriver,
    HarnessConfig, PostgresProvisioner, UserRow, Verifier, run_against, run_scenario,
};
use pgsmoke_telemetry::init_test_logging;
use pgsmoke_test_support::fixtures::skip_without_docker;

async fn with_postgres<F, Fut>(test_name: &str, test: F) -> Result<()>
where
    F: FnOnce(ConnectionDescriptor) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    if skip_without_docker(test_name) {
        return Ok(());
    }
    init_test_logging();

    let provisioner = PostgresProvisioner::new(HarnessConfig::from_env()?)?;
    let database = provisioner
        .start()
        .await
        .context("failed to provision postgres container")?;

    let result = test(database.descriptor().clone()).await;

    database.terminate().await?;
    result
}

async fn read_all(driver: &mut ExerciseDriver<'_>) -> Result<Vec<UserRow>> {
    let stream = pin!(driver.users());
    Ok(stream.try_collect::<Vec<_>>().await?)
}

#[tokio::test]
async fn scenario_reads_back_both_users_and_counts_two() -> Result<()> {
    if skip_without_docker("scenario_reads_back_both_users_and_counts_two") {
        return Ok(());
    }
    init_test_logging();

    let report = run_scenario(&HarnessConfig::from_env()?).await?;

    assert!(report.is_success(), "{}", report.verification);
    assert_eq!(report.count, 2);
    assert_eq!(report.rows.len(), 2);
    let mut names: Vec<&str> = report.rows.iter().map(|row| row.name.as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, ["Alice", "Bob"]);
    assert_eq!(report.verification.checks(), 3);
    Ok(())
}

#[tokio::test]
async fn creating_the_table_twice_is_a_schema_error() -> Result<()> {
    with_postgres(
        "creating_the_table_twice_is_a_schema_error",
        |descriptor| async move {
            let mut handle = DatabaseHandle::open(&descriptor).await?;
            let mut driver = ExerciseDriver::new(&mut handle);
            driver.create_schema().await?;

            let err = driver
                .create_schema()
                .await
                .expect_err("second CREATE TABLE must fail");
            assert_eq!(err.kind(), ErrorKind::Schema);

            handle.close().await?;
            Ok(())
        },
    )
    .await
}

#[tokio::test]
async fn failed_exercise_still_releases_its_connection() -> Result<()> {
    with_postgres(
        "failed_exercise_still_releases_its_connection",
        |descriptor| async move {
            let mut handle = DatabaseHandle::open(&descriptor).await?;
            assert!(handle.target().contains(":***@"), "{}", handle.target());
            ExerciseDriver::new(&mut handle).create_schema().await?;

            let err = run_against(&descriptor)
                .await
                .expect_err("users table already exists");
            assert_eq!(err.kind(), ErrorKind::Schema);

            let application = descriptor
                .session_param("application_name")
                .context("descriptor carries an application name")?;
            let mut sessions = i64::MAX;
            for _ in 0..20 {
                sessions = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM pg_stat_activity WHERE application_name = $1;",
                )
                .bind(application.clone())
                .fetch_one(handle.connection())
                .await?;
                if sessions == 1 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            assert_eq!(sessions, 1, "only this connection should remain open");

            handle.close().await?;
            Ok(())
        },
    )
    .await
}

#[tokio::test]
async fn names_are_bound_as_parameters() -> Result<()> {
    with_postgres("names_are_bound_as_parameters", |descriptor| async move {
        let hostile = "Robert'); DROP TABLE users;--";
        let mut handle = DatabaseHandle::open(&descriptor).await?;
        let mut driver = ExerciseDriver::new(&mut handle);
        driver.create_schema().await?;
        assert_eq!(driver.insert_users([hostile, "Bob"]).await?, 2);

        let rows = read_all(&mut driver).await?;
        assert_eq!(driver.count_users().await?, 2);

        let mut verifier = Verifier::default();
        for row in &rows {
            verifier.check_row(row);
        }
        let report = verifier.finish();
        assert!(matches!(
            report.failures(),
            [AssertionFailure::UnexpectedName { name, .. }] if name == hostile
        ));

        handle.close().await?;
        Ok(())
    })
    .await
}

#[tokio::test]
async fn undecodable_row_aborts_the_read_loop() -> Result<()> {
    with_postgres("undecodable_row_aborts_the_read_loop", |descriptor| async move {
        let mut handle = DatabaseHandle::open(&descriptor).await?;
        ExerciseDriver::new(&mut handle).create_schema().await?;
        sqlx::query("INSERT INTO users (name) VALUES (NULL);")
            .execute(handle.connection())
            .await?;

        let mut driver = ExerciseDriver::new(&mut handle);
        let err = read_all(&mut driver)
            .await
            .expect_err("NULL name cannot decode into a String");
        let err = err
            .downcast::<pgsmoke_core::HarnessError>()
            .expect("harness error");
        assert_eq!(err.kind(), ErrorKind::Decode);

        handle.close().await?;
        Ok(())
    })
    .await
}

#[tokio::test]
async fn terminated_container_refuses_connections() -> Result<()> {
    if skip_without_docker("terminated_container_refuses_connections") {
        return Ok(());
    }
    init_test_logging();

    let provisioner = PostgresProvisioner::new(HarnessConfig::from_env()?)?;
    let database = provisioner.start().await?;
    let descriptor = database.descriptor().clone();

    let handle = DatabaseHandle::open(&descriptor).await?;
    handle.close().await?;
    database.terminate().await?;

    let err = DatabaseHandle::open(&descriptor)
        .await
        .expect_err("container is gone");
    assert_eq!(err.kind(), ErrorKind::Connection);
    Ok(())
}

#[tokio::test]
async fn missing_readiness_signal_is_a_provisioning_error() -> Result<()> {
    if skip_without_docker("missing_readiness_signal_is_a_provisioning_error") {
        return Ok(());
    }
    init_test_logging();

    let mut config = HarnessConfig::from_env()?;
    config.readiness.pattern = "this line is never logged".to_string();
    config.readiness.startup_timeout = Duration::from_secs(3);

    let err = run_scenario(&config)
        .await
        .expect_err("readiness can never be observed");
    assert_eq!(err.kind(), ErrorKind::Provisioning);
    Ok(())
}
