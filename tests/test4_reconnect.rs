use sql_emulation::error::codes;
use sql_emulation::prelude::*;
use sql_emulation::test_utils::{connect_fake, people_server};

fn reconnecting() -> ConnectionOptionsBuilder {
    ConnectionOptions::builder().auto_reconnect(true)
}

#[tokio::test]
async fn no_reconnect_while_autocommit_is_off() -> Result<(), SqlEmulationError> {
    let server = people_server();
    let mut conn = connect_fake(&server, reconnecting().autocommit(false).finish()).await?;
    assert!(!conn.autocommit());
    server.kill_sessions();

    let err = conn
        .do_statement("DELETE FROM people WHERE id = ?", &[RowValues::Int(1)])
        .await
        .expect_err("connection is gone");
    assert_eq!(err.code(), codes::CR_SERVER_GONE_ERROR);
    assert_eq!(conn.stats(), ReconnectStats::default());
    assert_eq!(server.connects(), 1);
    Ok(())
}

#[tokio::test]
async fn no_reconnect_without_the_option() -> Result<(), SqlEmulationError> {
    let server = people_server();
    let mut conn = connect_fake(&server, ConnectionOptions::default()).await?;
    server.kill_sessions();

    let err = conn
        .do_statement("SELECT name FROM people", &[])
        .await
        .expect_err("connection is gone");
    assert!(err.is_gone_away());
    assert_eq!(conn.stats(), ReconnectStats::default());
    Ok(())
}

#[tokio::test]
async fn emulated_statement_retries_after_reconnect() -> Result<(), SqlEmulationError> {
    let server = people_server();
    let mut conn = connect_fake(&server, reconnecting().finish()).await?;
    let first_thread = conn.thread_id();
    server.kill_sessions();

    let mut stmt = conn
        .prepare("SELECT name FROM people WHERE id = ?", StatementOptions::default())
        .await?;
    stmt.bind(1, RowValues::Int(3), None)?;
    stmt.execute(&mut conn).await?;
    let row = stmt.fetch(&mut conn).await?.expect("o'brien");
    assert_eq!(row.get("name").and_then(RowValues::as_text), Some("o'brien"));

    assert_eq!(
        conn.stats(),
        ReconnectStats {
            auto_reconnects_ok: 1,
            auto_reconnects_failed: 0,
        }
    );
    assert_ne!(conn.thread_id(), first_thread);
    assert_eq!(server.live_sessions(), 1);
    Ok(())
}

#[tokio::test]
async fn native_statement_is_prepared_again_after_reconnect() -> Result<(), SqlEmulationError> {
    let server = people_server();
    let mut conn = connect_fake(&server, reconnecting().server_prepare(true).finish()).await?;

    let mut stmt = conn
        .prepare("SELECT name FROM people WHERE id = ?", StatementOptions::default())
        .await?;
    assert!(stmt.mode().is_native());
    stmt.bind(1, RowValues::Int(1), None)?;
    stmt.execute(&mut conn).await?;
    stmt.finish(&mut conn).await?;

    server.kill_sessions();
    stmt.execute(&mut conn).await?;
    let row = stmt.fetch(&mut conn).await?.expect("alice");
    assert_eq!(row.get("name").and_then(RowValues::as_text), Some("alice"));

    assert_eq!(conn.stats().auto_reconnects_ok, 1);
    assert_eq!(server.prepare_calls(), 2);
    // The parameters were sent again to the new server-side statement.
    assert_eq!(server.bind_param_calls(), 2);

    stmt.destroy(&mut conn).await?;
    assert_eq!(server.open_statements(), 0);
    Ok(())
}

#[tokio::test]
async fn refused_reconnect_counts_as_failure() -> Result<(), SqlEmulationError> {
    let server = people_server();
    let mut conn = connect_fake(&server, reconnecting().finish()).await?;
    server.kill_sessions();
    server.refuse_connections(1);

    let err = conn
        .do_statement("SELECT name FROM people", &[])
        .await
        .expect_err("reconnect refused");
    assert!(err.is_gone_away());
    assert_eq!(
        conn.stats(),
        ReconnectStats {
            auto_reconnects_ok: 0,
            auto_reconnects_failed: 1,
        }
    );

    // The next gone-away triggers a fresh attempt, which now succeeds.
    let rows = conn.do_statement("SELECT name FROM people", &[]).await?;
    assert_eq!(rows, RowCount::Known(3));
    assert_eq!(conn.stats().auto_reconnects_ok, 1);
    assert_eq!(conn.stats().auto_reconnects_failed, 1);
    assert!(conn.last_error().is_none());
    Ok(())
}

#[tokio::test]
async fn cursors_from_before_a_reconnect_are_invalid() -> Result<(), SqlEmulationError> {
    let server = people_server();
    let mut conn = connect_fake(&server, reconnecting().finish()).await?;

    let mut old = conn
        .prepare("SELECT name FROM people", StatementOptions::default())
        .await?;
    old.execute(&mut conn).await?;
    assert!(old.fetch(&mut conn).await?.is_some());

    server.kill_sessions();
    conn.do_statement("SELECT name FROM people", &[]).await?;
    assert_eq!(conn.stats().auto_reconnects_ok, 1);

    let err = old.fetch(&mut conn).await.expect_err("stale cursor");
    assert!(matches!(err, SqlEmulationError::ConnectionError(_)));
    assert!(!old.is_active());

    // A fresh execute works on the new connection.
    old.execute(&mut conn).await?;
    assert_eq!(old.fetch_all(&mut conn).await?.results.len(), 3);
    Ok(())
}

#[tokio::test]
async fn open_native_cursor_does_not_block_the_retry() -> Result<(), SqlEmulationError> {
    let server = people_server();
    let mut conn = connect_fake(&server, reconnecting().server_prepare(true).finish()).await?;

    let mut stmt = conn
        .prepare("SELECT name FROM people ORDER BY id", StatementOptions::default())
        .await?;
    stmt.execute(&mut conn).await?;
    assert!(stmt.fetch(&mut conn).await?.is_some());

    server.kill_sessions();
    stmt.execute(&mut conn).await?;
    assert_eq!(stmt.fetch_all(&mut conn).await?.results.len(), 3);
    assert_eq!(conn.stats().auto_reconnects_ok, 1);

    // A statement left behind on the dead session can still be dropped.
    let mut stale = conn
        .prepare("SELECT id FROM people", StatementOptions::default())
        .await?;
    stale.execute(&mut conn).await?;
    server.kill_sessions();
    stale.destroy(&mut conn).await?;
    stmt.destroy(&mut conn).await?;
    Ok(())
}

#[tokio::test]
async fn switching_autocommit_off_reconnects_first() -> Result<(), SqlEmulationError> {
    let server = people_server();
    let mut conn = connect_fake(&server, reconnecting().finish()).await?;
    server.kill_sessions();

    conn.set_autocommit(false).await?;
    assert!(!conn.autocommit());
    assert_eq!(conn.stats().auto_reconnects_ok, 1);

    // Now inside a transaction: the next loss is final.
    server.kill_sessions();
    let err = conn.commit().await.expect_err("connection is gone");
    assert!(err.is_gone_away());
    assert_eq!(conn.stats().auto_reconnects_ok, 1);
    Ok(())
}
