use sql_emulation::error::codes;
use sql_emulation::prelude::*;
use sql_emulation::test_utils::{connect_fake, people_server};

#[tokio::test]
async fn select_with_bound_parameters() -> Result<(), SqlEmulationError> {
    let server = people_server();
    let mut conn = connect_fake(&server, ConnectionOptions::default()).await?;

    let mut stmt = conn
        .prepare(
            "SELECT id, name, score FROM people WHERE name = ?",
            StatementOptions::default(),
        )
        .await?;
    assert_eq!(stmt.mode(), &ExecutionMode::Emulated);
    assert_eq!(stmt.num_params(), 1);

    stmt.bind(1, RowValues::Text("o'brien".into()), None)?;
    let outcome = stmt.execute(&mut conn).await?;
    assert!(outcome.has_result_set);
    assert_eq!(outcome.rows, RowCount::Known(1));

    let row = stmt.fetch(&mut conn).await?.expect("one row");
    assert_eq!(row.get("id"), Some(&RowValues::Int(3)));
    assert_eq!(row.get("name").and_then(RowValues::as_text), Some("o'brien"));
    assert_eq!(row.get("score").and_then(RowValues::as_float), Some(8.25));
    assert!(stmt.fetch(&mut conn).await?.is_none());
    assert!(stmt.fetch_done());

    assert!(
        server
            .statement_log()
            .iter()
            .any(|sql| sql == r"SELECT id, name, score FROM people WHERE name = 'o\'brien'")
    );
    stmt.destroy(&mut conn).await?;
    Ok(())
}

#[tokio::test]
async fn insert_reports_affected_rows_and_insert_id() -> Result<(), SqlEmulationError> {
    let server = people_server();
    let mut conn = connect_fake(&server, ConnectionOptions::default()).await?;

    let affected = conn
        .do_statement(
            "INSERT INTO people (name, score) VALUES (?, ?), (?, ?)",
            &[
                RowValues::Text("dave".into()),
                RowValues::Float(6.5),
                RowValues::Text("erin".into()),
                RowValues::Null,
            ],
        )
        .await?;
    assert_eq!(affected, RowCount::Known(2));
    assert_eq!(conn.last_insert_id(), 4);
    assert_eq!(
        conn.info().as_deref(),
        Some("Records: 2  Duplicates: 0  Warnings: 0")
    );

    let mut stmt = conn
        .prepare("SELECT score FROM people WHERE name = ?", StatementOptions::default())
        .await?;
    stmt.bind(1, "erin".into(), None)?;
    stmt.execute(&mut conn).await?;
    let rows = stmt.fetch_all(&mut conn).await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows.results[0].get("score"), Some(&RowValues::Null));
    Ok(())
}

#[tokio::test]
async fn update_counts_follow_found_rows_option() -> Result<(), SqlEmulationError> {
    // bob already scores 7: three rows match, two change
    for (found_rows, expected) in [(false, 2), (true, 3)] {
        let server = people_server();
        let options = ConnectionOptions::builder()
            .client_found_rows(found_rows)
            .finish();
        let mut conn = connect_fake(&server, options).await?;
        let affected = conn
            .do_statement("UPDATE people SET score = ?", &[RowValues::Int(7)])
            .await?;
        assert_eq!(affected, RowCount::Known(expected), "found_rows={found_rows}");
        assert_eq!(
            conn.info().as_deref(),
            Some("Rows matched: 3  Changed: 2  Warnings: 0")
        );
    }
    Ok(())
}

#[tokio::test]
async fn chop_blanks_trims_text_columns() -> Result<(), SqlEmulationError> {
    let server = people_server();
    let mut conn = connect_fake(&server, ConnectionOptions::default()).await?;

    for (chop, expected) in [(false, "al  "), (true, "al")] {
        let mut stmt = conn
            .prepare(
                "SELECT nick FROM people WHERE id = 1",
                StatementOptions::default().with_chop_blanks(chop),
            )
            .await?;
        stmt.execute(&mut conn).await?;
        let row = stmt.fetch(&mut conn).await?.expect("row");
        assert_eq!(row.get("nick").and_then(RowValues::as_text), Some(expected));
        stmt.finish(&mut conn).await?;
    }
    Ok(())
}

#[tokio::test]
async fn streaming_row_count_known_after_exhaustion() -> Result<(), SqlEmulationError> {
    let server = people_server();
    let options = ConnectionOptions::builder().use_result(true).finish();
    let mut conn = connect_fake(&server, options).await?;

    let mut stmt = conn
        .prepare("SELECT name FROM people ORDER BY id", StatementOptions::default())
        .await?;
    let outcome = stmt.execute(&mut conn).await?;
    assert_eq!(outcome.rows, RowCount::Unknown);
    assert_eq!(stmt.row_count(), RowCount::Unknown);

    let names: Vec<String> = stmt
        .fetch_all(&mut conn)
        .await?
        .results
        .iter()
        .filter_map(|row| row.get("name").and_then(RowValues::as_text).map(str::to_string))
        .collect();
    assert_eq!(names, ["alice", "bob", "o'brien"]);
    assert_eq!(stmt.row_count(), RowCount::Known(3));
    Ok(())
}

#[tokio::test]
async fn listfields_returns_metadata_only() -> Result<(), SqlEmulationError> {
    let server = people_server();
    let mut conn = connect_fake(&server, ConnectionOptions::default()).await?;

    let mut stmt = conn
        .prepare("LISTFIELDS people", StatementOptions::default())
        .await?;
    assert!(stmt.shape().is_listfields);
    let outcome = stmt.execute(&mut conn).await?;
    assert!(outcome.has_result_set);
    assert_eq!(outcome.rows, RowCount::Known(0));

    let info = stmt.columns()?;
    assert_eq!(info.names(), ["id", "name", "nick", "score"]);
    assert!(info.is_pri_key[0]);
    assert!(info.is_auto_increment[0]);
    assert!(!info.nullable[1]);
    assert!(info.nullable[2]);
    assert!(info.is_num[3]);
    assert!(stmt.fetch(&mut conn).await?.is_none());

    let mut missing = conn
        .prepare("LISTFIELDS   ", StatementOptions::default())
        .await?;
    let err = missing.execute(&mut conn).await.expect_err("no table");
    assert!(matches!(err, SqlEmulationError::Query(ref m) if m == "Missing table name"));
    assert_eq!(missing.last_error().map(|e| e.code), Some(codes::JW_ERR_QUERY));
    Ok(())
}

#[tokio::test]
async fn limit_suffix_is_discarded_with_warning() -> Result<(), SqlEmulationError> {
    let server = people_server();
    let mut conn = connect_fake(&server, ConnectionOptions::default()).await?;

    let mut stmt = conn
        .prepare(
            "SELECT name FROM people ORDER BY id LIMIT ?",
            StatementOptions::default(),
        )
        .await?;
    stmt.bind(1, RowValues::Text("2; DROP TABLE people".into()), None)?;
    let outcome = stmt.execute(&mut conn).await?;
    assert_eq!(outcome.rows, RowCount::Known(2));

    let warning = stmt.last_error().expect("warning recorded");
    assert!(warning.warning);
    assert_eq!(warning.code, codes::JW_ERR_QUERY);
    assert!(
        server
            .statement_log()
            .contains(&"SELECT name FROM people ORDER BY id LIMIT 2".to_string())
    );
    Ok(())
}

#[tokio::test]
async fn bind_errors_are_recorded_on_the_statement() -> Result<(), SqlEmulationError> {
    let server = people_server();
    let mut conn = connect_fake(&server, ConnectionOptions::default()).await?;
    let mut stmt = conn
        .prepare("SELECT name FROM people WHERE id = ?", StatementOptions::default())
        .await?;

    let err = stmt.bind(2, RowValues::Int(1), None).expect_err("out of range");
    assert!(matches!(err, SqlEmulationError::IllegalParam { position: 2 }));
    assert_eq!(
        stmt.last_error().map(|e| e.code),
        Some(codes::JW_ERR_ILLEGAL_PARAM_NUM)
    );
    assert!(stmt.bind(0, RowValues::Int(1), None).is_err());

    // accepted with a warning; the value is quoted because it has no digits
    stmt.bind(1, RowValues::Text("abc".into()), Some(SqlType::Integer))?;
    let warning = stmt.last_error().expect("warning");
    assert!(warning.warning);
    assert!(warning.message.contains("Binding non-numeric field 1"));
    stmt.execute(&mut conn).await?;
    assert!(
        server
            .statement_log()
            .contains(&"SELECT name FROM people WHERE id = 'abc'".to_string())
    );

    assert!(matches!(
        stmt.bind_inout(1),
        Err(SqlEmulationError::NotImplemented(_))
    ));
    Ok(())
}

#[tokio::test]
async fn server_errors_keep_code_and_message() -> Result<(), SqlEmulationError> {
    let server = people_server();
    let mut conn = connect_fake(&server, ConnectionOptions::default()).await?;

    let mut stmt = conn
        .prepare("SELECT * FROM nowhere", StatementOptions::default())
        .await?;
    let err = stmt.execute(&mut conn).await.expect_err("missing table");
    assert_eq!(err.code(), 1146);
    let last = stmt.last_error().expect("recorded");
    assert_eq!(last.code, 1146);
    assert!(last.message.contains("doesn't exist"));
    assert!(!last.warning);

    // the connection is still usable
    let count = conn.do_statement("DELETE FROM people WHERE id = ?", &[RowValues::Int(2)]).await?;
    assert_eq!(count, RowCount::Known(1));
    Ok(())
}

#[tokio::test]
async fn show_statements_run_emulated() -> Result<(), SqlEmulationError> {
    let server = people_server();
    let options = ConnectionOptions::builder().server_prepare(true).finish();
    let mut conn = connect_fake(&server, options).await?;

    let mut stmt = conn
        .prepare("SHOW TABLES", StatementOptions::default())
        .await?;
    assert_eq!(stmt.mode(), &ExecutionMode::Emulated);
    stmt.execute(&mut conn).await?;
    let tables = stmt.fetch_all(&mut conn).await?;
    assert_eq!(tables.results[0].get_by_index(0).and_then(RowValues::as_text), Some("people"));
    Ok(())
}
