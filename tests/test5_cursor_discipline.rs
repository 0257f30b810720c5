use sql_emulation::error::codes;
use sql_emulation::prelude::*;
use sql_emulation::test_utils::{connect_fake, people_server};

fn modes() -> [ConnectionOptions; 2] {
    [
        ConnectionOptions::default(),
        ConnectionOptions::builder().server_prepare(true).finish(),
    ]
}

#[tokio::test]
async fn fetch_requires_an_open_result() -> Result<(), SqlEmulationError> {
    for options in modes() {
        let server = people_server();
        let mut conn = connect_fake(&server, options).await?;
        let mut stmt = conn
            .prepare("SELECT id FROM people WHERE score = ?", StatementOptions::default())
            .await?;

        let err = stmt.fetch(&mut conn).await.expect_err("not executed");
        assert_eq!(err.code(), codes::JW_ERR_SEQUENCE);
        assert_eq!(err.to_string(), "Sequence error: fetch() without execute()");
        assert_eq!(stmt.last_error().map(|e| e.code), Some(codes::JW_ERR_SEQUENCE));

        stmt.bind(1, RowValues::Float(9.5), None)?;
        stmt.execute(&mut conn).await?;
        assert!(stmt.is_active());
        assert!(stmt.fetch(&mut conn).await?.is_some());
        assert!(stmt.fetch(&mut conn).await?.is_none());
        assert!(stmt.fetch_done());
        assert!(!stmt.is_active());

        let err = stmt.fetch(&mut conn).await.expect_err("already done");
        assert_eq!(err.to_string(), "Sequence error: fetch() but fetch already done");
        assert_eq!(server.live_results(), 0);
    }
    Ok(())
}

#[tokio::test]
async fn re_execute_releases_the_previous_result() -> Result<(), SqlEmulationError> {
    for options in modes() {
        let server = people_server();
        let mut conn = connect_fake(&server, options).await?;
        let mut stmt = conn
            .prepare("SELECT name FROM people ORDER BY id", StatementOptions::default())
            .await?;

        stmt.execute(&mut conn).await?;
        assert!(stmt.fetch(&mut conn).await?.is_some());
        assert_eq!(server.live_results(), 1);

        stmt.execute(&mut conn).await?;
        assert_eq!(server.live_results(), 1);
        let first = stmt.fetch(&mut conn).await?.expect("first row again");
        assert_eq!(first.get("name").and_then(RowValues::as_text), Some("alice"));

        stmt.finish(&mut conn).await?;
        assert_eq!(server.live_results(), 0);
        stmt.destroy(&mut conn).await?;
    }
    Ok(())
}

#[tokio::test]
async fn finish_twice_is_a_sequence_error() -> Result<(), SqlEmulationError> {
    let server = people_server();
    let mut conn = connect_fake(&server, ConnectionOptions::default()).await?;
    let mut stmt = conn
        .prepare("SELECT name FROM people", StatementOptions::default())
        .await?;
    stmt.execute(&mut conn).await?;

    stmt.finish(&mut conn).await?;
    let err = stmt.finish(&mut conn).await.expect_err("second finish");
    assert_eq!(err.to_string(), "Sequence error: finish() called twice");
    assert_eq!(stmt.last_error().map(|e| e.code), Some(codes::JW_ERR_SEQUENCE));

    let err = stmt.fetch(&mut conn).await.expect_err("finished");
    assert_eq!(err.to_string(), "Sequence error: no statement executing");

    // A new execute starts the cycle over.
    stmt.execute(&mut conn).await?;
    assert!(stmt.last_error().is_none());
    assert_eq!(stmt.fetch_all(&mut conn).await?.results.len(), 3);
    Ok(())
}

#[tokio::test]
async fn statements_without_results_cannot_be_fetched() -> Result<(), SqlEmulationError> {
    let server = people_server();
    let mut conn = connect_fake(&server, ConnectionOptions::default()).await?;
    let mut stmt = conn
        .prepare("DELETE FROM people WHERE id = ?", StatementOptions::default())
        .await?;
    stmt.bind(1, RowValues::Int(2), None)?;
    let outcome = stmt.execute(&mut conn).await?;
    assert_eq!(outcome.rows, RowCount::Known(1));

    let err = stmt.fetch(&mut conn).await.expect_err("no result set");
    assert_eq!(err.code(), codes::JW_ERR_SEQUENCE);
    let err = stmt.columns().expect_err("no result set");
    assert_eq!(err.code(), codes::JW_ERR_NOT_ACTIVE);
    assert_eq!(stmt.num_fields(), 0);
    Ok(())
}

#[tokio::test]
async fn bind_positions_are_checked() -> Result<(), SqlEmulationError> {
    let server = people_server();
    let mut conn = connect_fake(&server, ConnectionOptions::default()).await?;
    let mut stmt = conn
        .prepare("SELECT name FROM people WHERE id = ?", StatementOptions::default())
        .await?;

    for position in [0, 2] {
        let err = stmt
            .bind(position, RowValues::Int(1), None)
            .expect_err("out of range");
        assert!(matches!(err, SqlEmulationError::IllegalParam { .. }));
        assert_eq!(stmt.last_error().map(|e| e.code), Some(codes::JW_ERR_ILLEGAL_PARAM_NUM));
    }

    let err = stmt.bind_inout(1).expect_err("unsupported");
    assert_eq!(err.code(), codes::JW_ERR_NOT_IMPLEMENTED);

    stmt.bind(1, RowValues::Int(1), None)?;
    assert!(stmt.last_error().is_none());
    Ok(())
}

#[tokio::test]
async fn dropping_the_statement_frees_server_resources() -> Result<(), SqlEmulationError> {
    let server = people_server();
    let options = ConnectionOptions::builder().server_prepare(true).finish();
    let mut conn = connect_fake(&server, options).await?;

    let mut stmt = conn
        .prepare("SELECT name FROM people", StatementOptions::default())
        .await?;
    stmt.execute(&mut conn).await?;
    assert!(stmt.fetch(&mut conn).await?.is_some());
    assert_eq!(server.open_statements(), 1);
    assert_eq!(server.live_results(), 1);

    stmt.destroy(&mut conn).await?;
    assert_eq!(server.open_statements(), 0);
    assert_eq!(server.live_results(), 0);
    Ok(())
}
