use sql_emulation::prelude::*;
use sql_emulation::test_utils::{FakeServer, connect_fake};

fn docs_server() -> FakeServer {
    let server = FakeServer::new();
    server
        .execute_script("CREATE TABLE docs (id INT, title VARCHAR(40), body TEXT, data BLOB)")
        .expect("seed docs");
    server
}

fn long_body() -> String {
    "lorem ipsum dolor sit amet ".repeat(300)
}

fn blob_bytes() -> Vec<u8> {
    (0..2000u32).map(|i| b'a' + u8::try_from(i % 26).unwrap_or(0)).collect()
}

async fn load(conn: &mut Connection<sql_emulation::test_utils::FakeConnector>) -> Result<(), SqlEmulationError> {
    conn.do_statement(
        "INSERT INTO docs (id, title, body, data) VALUES (?, ?, ?, ?)",
        &[
            RowValues::Int(1),
            RowValues::Text("a title well past sixteen bytes".into()),
            RowValues::Text(long_body()),
            RowValues::Blob(blob_bytes()),
        ],
    )
    .await?;
    conn.do_statement(
        "INSERT INTO docs (id, title, body, data) VALUES (?, ?, ?, ?)",
        &[
            RowValues::Int(2),
            RowValues::Text("short".into()),
            RowValues::Null,
            RowValues::Null,
        ],
    )
    .await?;
    Ok(())
}

#[tokio::test]
async fn truncated_columns_are_fetched_in_full() -> Result<(), SqlEmulationError> {
    let server = docs_server();
    let options = ConnectionOptions::builder()
        .server_prepare(true)
        .fetch_buffer_cap(16)
        .finish();
    let mut conn = connect_fake(&server, options).await?;
    load(&mut conn).await?;

    let mut stmt = conn
        .prepare(
            "SELECT id, title, body, data FROM docs ORDER BY id",
            StatementOptions::default(),
        )
        .await?;
    assert!(stmt.mode().is_native());
    stmt.execute(&mut conn).await?;

    let first = stmt.fetch(&mut conn).await?.expect("first doc");
    assert_eq!(
        first.get("title").and_then(RowValues::as_text),
        Some("a title well past sixteen bytes")
    );
    assert_eq!(
        first.get("body").and_then(RowValues::as_text),
        Some(long_body().as_str())
    );
    assert_eq!(
        first.get("data").and_then(RowValues::as_blob),
        Some(blob_bytes().as_slice())
    );

    // Buffers grown for the first row still hold short values exactly.
    let second = stmt.fetch(&mut conn).await?.expect("second doc");
    assert_eq!(second.get("title").and_then(RowValues::as_text), Some("short"));
    assert_eq!(second.get("body"), Some(&RowValues::Null));
    assert_eq!(second.get("data"), Some(&RowValues::Null));

    assert!(stmt.fetch(&mut conn).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn both_paths_agree_on_large_values() -> Result<(), SqlEmulationError> {
    let server = docs_server();
    let options = ConnectionOptions::builder()
        .server_prepare(true)
        .fetch_buffer_cap(16)
        .finish();
    let mut conn = connect_fake(&server, options).await?;
    load(&mut conn).await?;

    let mut collected = Vec::new();
    for server_prepare in [true, false] {
        let mut stmt = conn
            .prepare(
                "SELECT body, data FROM docs WHERE id = ?",
                StatementOptions::default().with_server_prepare(server_prepare),
            )
            .await?;
        assert_eq!(stmt.mode().is_native(), server_prepare);
        stmt.bind(1, RowValues::Int(1), None)?;
        stmt.execute(&mut conn).await?;
        let rows = stmt.fetch_all(&mut conn).await?;
        collected.push(rows.results.into_iter().map(|r| r.rows).collect::<Vec<_>>());
        stmt.destroy(&mut conn).await?;
    }
    assert_eq!(collected[0], collected[1]);
    assert_eq!(collected[0].len(), 1);
    Ok(())
}
