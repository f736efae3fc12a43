use std::sync::Arc;
use std::time::Duration;

use sql_handles::prelude::*;
use sql_handles::test_utils::{MockDriver, MockOutcome};

fn text(s: &str) -> RowValues {
    RowValues::Text(s.to_string())
}

fn config() -> DbConfig {
    DbConfig::builder()
        .user("mta_game")
        .poll_timeout(Duration::from_millis(30))
        .pool_capacity(4)
        .block_caller("runcode")
        .finish()
}

async fn service(driver: &MockDriver) -> Result<SqlService, SqlHandlesError> {
    SqlService::open(config(), Arc::new(driver.clone())).await
}

fn assert_reclaimed(service: &SqlService, driver: &MockDriver) {
    assert!(service.pool().is_empty(), "slot left occupied");
    assert_eq!(driver.live_handles(), 0, "driver handle leaked");
    assert_eq!(driver.double_frees(), 0, "driver handle freed twice");
}

#[tokio::test]
async fn rows_are_coerced_and_nulls_omitted() -> Result<(), SqlHandlesError> {
    let driver = MockDriver::new();
    driver.on_query(
        "FROM players",
        MockOutcome::rows(
            &["id", "name", "cash", "clan"],
            vec![
                vec![text("1"), text("alice"), text("250.75"), RowValues::Null],
                vec![text("2"), text("12abc"), text("0"), text("red")],
            ],
        ),
    );
    let service = service(&driver).await?;

    let rows = service
        .rows("SELECT * FROM players WHERE name <> ?", &["x".into()])
        .await?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("id"), Some(&RowValues::Int(1)));
    assert_eq!(rows[0].get("name"), Some(&text("alice")));
    assert_eq!(rows[0].get("cash"), Some(&RowValues::Float(250.75)));
    assert!(!rows[0].contains("clan"));
    assert_eq!(rows[1].get("name"), Some(&text("12abc")));
    assert_eq!(rows[1].get("clan"), Some(&text("red")));

    assert_eq!(
        driver.issued(),
        vec!["SELECT * FROM players WHERE name <> 'x'".to_string()]
    );
    assert_reclaimed(&service, &driver);
    Ok(())
}

#[tokio::test]
async fn single_row_returns_first_or_no_rows() -> Result<(), SqlHandlesError> {
    let driver = MockDriver::new();
    driver
        .on_query(
            "FROM accounts",
            MockOutcome::rows(&["id"], vec![vec![text("7")], vec![text("8")]]),
        )
        .on_query("FROM empty", MockOutcome::rows(&["id"], Vec::new()));
    let service = service(&driver).await?;

    let row = service.row("SELECT id FROM accounts", &[]).await?;
    assert_eq!(row.get("id"), Some(&RowValues::Int(7)));

    let err = service.row("SELECT id FROM empty", &[]).await.unwrap_err();
    assert!(matches!(err, SqlHandlesError::NoRows));
    assert_reclaimed(&service, &driver);
    Ok(())
}

#[tokio::test]
async fn summary_shapers_ignore_rows() -> Result<(), SqlHandlesError> {
    let driver = MockDriver::new();
    driver
        .on_query("INSERT", MockOutcome::summary(1, 42))
        .on_query("UPDATE", MockOutcome::summary(5, 0));
    let service = service(&driver).await?;

    let id = service
        .insert_id("INSERT INTO bans (serial) VALUES (?)", &["ABC".into()])
        .await?;
    assert_eq!(id, 42);
    let affected = service
        .affected_rows("UPDATE players SET cash = cash + ?", &[RowValues::Int(100)])
        .await?;
    assert_eq!(affected, 5);
    assert_reclaimed(&service, &driver);
    Ok(())
}

#[tokio::test]
async fn every_fetch_mode_reports_poll_timeout() -> Result<(), SqlHandlesError> {
    let driver = MockDriver::new();
    driver.on_query("SLEEP", MockOutcome::Hang);
    let service = service(&driver).await?;
    let q = "SELECT SLEEP(10)";

    let errors = vec![
        service.rows(q, &[]).await.unwrap_err(),
        service.row(q, &[]).await.unwrap_err(),
        service.insert_id(q, &[]).await.unwrap_err(),
        service.affected_rows(q, &[]).await.unwrap_err(),
    ];
    for err in errors {
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Poll timeout.");
    }
    assert_reclaimed(&service, &driver);
    Ok(())
}

#[tokio::test]
async fn driver_error_text_is_returned() -> Result<(), SqlHandlesError> {
    let driver = MockDriver::new();
    driver.on_query(
        "FROM nope",
        MockOutcome::fail(1146, "Table 'mta.nope' doesn't exist"),
    );
    let service = service(&driver).await?;

    let err = service.rows("SELECT * FROM nope", &[]).await.unwrap_err();
    assert!(matches!(err, SqlHandlesError::ExecutionError(_)));
    assert_eq!(err.to_string(), "Table 'mta.nope' doesn't exist");
    assert_reclaimed(&service, &driver);
    Ok(())
}

#[tokio::test]
async fn blocked_caller_is_refused_before_issue() -> Result<(), SqlHandlesError> {
    let driver = MockDriver::new();
    let service = service(&driver).await?;

    let blocked = service.caller("runcode");
    assert!(blocked.is_blocked());
    assert!(matches!(
        blocked.rows("SELECT 1", &[]).await,
        Err(SqlHandlesError::DisallowedCaller { caller }) if caller == "runcode"
    ));
    let err = blocked.row("SELECT 1", &[]).await.unwrap_err();
    assert_eq!(err.to_string(), "");
    assert!(blocked.insert_id("SELECT 1", &[]).await.is_err());
    assert!(blocked.affected_rows("SELECT 1", &[]).await.is_err());
    assert!(driver.issued().is_empty());

    service.caller("race").rows("SELECT 1", &[]).await?;
    assert_eq!(driver.issued().len(), 1);
    Ok(())
}

#[tokio::test]
async fn exec_frees_without_polling() -> Result<(), SqlHandlesError> {
    let driver = MockDriver::new();
    driver.on_query("SLEEP", MockOutcome::Hang);
    let service = service(&driver).await?;

    service.exec("DO SLEEP(?)", &[RowValues::Int(5)]).await?;
    assert_eq!(driver.issued(), vec!["DO SLEEP(5)".to_string()]);
    assert_reclaimed(&service, &driver);
    Ok(())
}

#[tokio::test]
async fn dropped_connection_heals_on_next_fetch() -> Result<(), SqlHandlesError> {
    let driver = MockDriver::new();
    let service = service(&driver).await?;
    assert_eq!(driver.open_count(), 1);

    driver.drop_connections();
    service.rows("SELECT 1", &[]).await?;
    assert_eq!(driver.open_count(), 2);
    assert_eq!(driver.live_connections(), 1);

    driver.drop_connections();
    service.exec("DELETE FROM sessions", &[]).await?;
    assert_eq!(driver.open_count(), 3);
    Ok(())
}

#[tokio::test]
async fn unreachable_server_fails_startup_and_calls() {
    let driver = MockDriver::new();
    driver.refuse_connections(true);
    let err = SqlService::open(config(), Arc::new(driver.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, SqlHandlesError::ConnectionError(_)));

    let lazy = SqlService::new(config(), Arc::new(driver.clone())).unwrap();
    assert!(matches!(
        lazy.rows("SELECT 1", &[]).await,
        Err(SqlHandlesError::ConnectionError(_))
    ));
    driver.refuse_connections(false);
    assert!(lazy.rows("SELECT 1", &[]).await.is_ok());
}

#[tokio::test]
async fn bad_arguments_never_reach_the_driver() -> Result<(), SqlHandlesError> {
    let driver = MockDriver::new();
    let service = service(&driver).await?;

    let err = service
        .rows("SELECT ? , ?", &[RowValues::Int(1)])
        .await
        .unwrap_err();
    assert!(matches!(err, SqlHandlesError::ParameterError(_)));
    let err = service
        .exec("UPDATE t SET b = ?", &[RowValues::Blob(vec![1, 2])])
        .await
        .unwrap_err();
    assert!(matches!(err, SqlHandlesError::ParameterError(_)));
    assert!(driver.issued().is_empty());
    Ok(())
}

#[tokio::test]
async fn concurrent_fetches_share_the_pool() -> Result<(), SqlHandlesError> {
    let driver = MockDriver::new();
    driver.set_default_outcome(MockOutcome::delayed(
        Duration::from_millis(5),
        MockOutcome::rows(&["n"], vec![vec![text("1")]]),
    ));
    let service = Arc::new(service(&driver).await?);

    let tasks: Vec<_> = (0..4)
        .map(|i| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.row("SELECT ? AS n", &[RowValues::Int(i)]).await })
        })
        .collect();
    for task in tasks {
        let row = task.await.expect("task panicked")?;
        assert_eq!(row.get("n"), Some(&RowValues::Int(1)));
    }
    assert_reclaimed(&service, &driver);
    Ok(())
}
