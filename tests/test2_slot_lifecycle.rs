use std::sync::Arc;
use std::time::Duration;

use sql_handles::prelude::*;
use sql_handles::results::ResultSet;
use sql_handles::test_utils::{MockDriver, MockOutcome};

async fn service(driver: &MockDriver, capacity: usize) -> Result<SqlService, SqlHandlesError> {
    let cfg = DbConfig::builder()
        .pool_capacity(capacity)
        .poll_timeout(Duration::from_millis(30))
        .finish();
    SqlService::open(cfg, Arc::new(driver.clone())).await
}

#[tokio::test]
async fn overflow_query_runs_but_its_handle_is_discarded() -> Result<(), SqlHandlesError> {
    let driver = MockDriver::new();
    driver.set_default_outcome(MockOutcome::Hang);
    let service = service(&driver, 3).await?;

    let mut slots = Vec::new();
    for i in 0..3 {
        slots.push(service.query_handle("SELECT ?", &[RowValues::Int(i)]).await?);
    }
    assert_eq!(
        slots.iter().map(|s| s.get()).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );

    let err = service
        .query_handle("INSERT INTO log VALUES (1)", &[])
        .await
        .unwrap_err();
    assert!(err.is_issued_but_unretrievable());
    // sent to the server, handle freed, no slot taken
    assert_eq!(driver.issued().len(), 4);
    assert_eq!(driver.live_handles(), 3);
    assert_eq!(service.pool().occupied(), 3);

    // fire-and-forget does not need a slot
    service.exec("DELETE FROM log", &[]).await?;

    service.free_query_handle(slots[1])?;
    let reused = service.query_handle("SELECT 9", &[]).await?;
    assert_eq!(reused.get(), 2);
    Ok(())
}

#[tokio::test]
async fn manual_poll_then_remove() -> Result<(), SqlHandlesError> {
    let driver = MockDriver::new();
    let mut first = ResultSet::new(vec!["a".into()]);
    first.add_row_values(vec![RowValues::Text("1".into())]);
    let mut second = ResultSet::new(vec!["b".into()]);
    second.add_row_values(vec![RowValues::Text("2".into())]);
    driver.on_query(
        "CALL",
        MockOutcome::Ready(QueryResult {
            result_sets: vec![first, second],
            affected_rows: 0,
            last_insert_id: 0,
        }),
    );
    let service = service(&driver, 2).await?;

    let slot = service.query_handle("CALL report()", &[]).await?;
    assert_eq!(service.pool().query_text(slot).as_deref(), Some("CALL report()"));
    let PollOutcome::Ready(result) = service.poll(slot, true, None).await? else {
        panic!("expected a result");
    };
    assert_eq!(result.result_sets.len(), 2);

    // the driver already released the handle
    service.remove_query_handle(slot)?;
    assert!(service.pool().is_empty());
    assert_eq!(driver.double_frees(), 0);
    assert!(matches!(
        service.remove_query_handle(slot),
        Err(SqlHandlesError::UnknownSlot(1))
    ));
    Ok(())
}

#[tokio::test]
async fn manual_poll_timeout_keeps_slot_until_freed() -> Result<(), SqlHandlesError> {
    let driver = MockDriver::new();
    driver.set_default_outcome(MockOutcome::delayed(
        Duration::from_millis(80),
        MockOutcome::summary(3, 0),
    ));
    let service = service(&driver, 2).await?;

    let slot = service.query_handle("UPDATE t SET x = 1", &[]).await?;
    let outcome = service
        .poll(slot, false, Some(Duration::from_millis(10)))
        .await?;
    assert!(outcome.is_timed_out());
    assert_eq!(service.pool().occupied(), 1);

    let outcome = service
        .poll(slot, false, Some(Duration::from_millis(500)))
        .await?;
    assert!(matches!(outcome, PollOutcome::Ready(ref r) if r.affected_rows == 3));
    service.remove_query_handle(slot)?;
    assert_eq!(driver.live_handles(), 0);
    Ok(())
}

#[tokio::test]
async fn close_drains_outstanding_slots_once() -> Result<(), SqlHandlesError> {
    let driver = MockDriver::new();
    driver
        .on_query("SLEEP", MockOutcome::Hang)
        .on_query("broken", MockOutcome::fail(1064, "syntax error"));
    let service = service(&driver, 8).await?;

    for _ in 0..5 {
        service.query_handle("SELECT SLEEP(1)", &[]).await?;
    }
    // timeout and error paths already reclaimed their own slots
    assert!(service.rows("SELECT SLEEP(2)", &[]).await.is_err());
    assert!(service.rows("broken", &[]).await.is_err());
    assert_eq!(service.pool().occupied(), 5);

    service.close().await;
    assert!(service.pool().is_empty());
    assert_eq!(driver.live_handles(), 0);
    assert_eq!(driver.double_frees(), 0);
    assert_eq!(driver.live_connections(), 0);

    service.close().await;
    assert_eq!(driver.double_frees(), 0);
    Ok(())
}
