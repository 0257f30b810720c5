use sql_emulation::catalog::{self, NativeType};
use sql_emulation::error::codes;
use sql_emulation::prelude::*;
use sql_emulation::test_utils::{CR_CONN_HOST_ERROR, connect_fake, people_server};

#[test]
fn catalog_lookup_is_total() {
    for code in 0..=u16::MAX {
        let descriptor = catalog::lookup_code(code);
        match NativeType::from_code(code) {
            Some(native) => assert!(std::ptr::eq(descriptor, catalog::lookup(native))),
            None => assert_eq!(descriptor.type_name, "varchar"),
        }
    }
    assert_eq!(catalog::lookup(NativeType::Double).data_type, SqlType::Double);
    assert_eq!(catalog::lookup(NativeType::NewDecimal).type_name, "decimal");
    assert_eq!(catalog::type_info_all().count(), 55);
}

#[tokio::test]
async fn quoting_follows_the_catalog() -> Result<(), SqlEmulationError> {
    let server = people_server();
    let conn = connect_fake(&server, ConnectionOptions::default()).await?;

    assert_eq!(conn.quote(&RowValues::Null, None).as_deref(), Some("NULL"));
    assert_eq!(
        conn.quote(&RowValues::Text("o'brien".into()), None).as_deref(),
        Some(r"'o\'brien'")
    );
    assert_eq!(conn.quote(&RowValues::Int(5), None).as_deref(), Some("'5'"));
    assert_eq!(conn.quote(&RowValues::Int(5), Some(SqlType::Integer)), None);
    assert_eq!(
        conn.quote(&RowValues::Text("5".into()), Some(SqlType::Varchar)).as_deref(),
        Some("'5'")
    );
    assert_eq!(
        conn.quote(&RowValues::Blob(vec![0xff, 0x00]), None).as_deref(),
        Some("0xFF00")
    );
    assert_eq!(conn.type_info_all().count(), 55);
    Ok(())
}

#[tokio::test]
async fn column_metadata_describes_the_result() -> Result<(), SqlEmulationError> {
    let server = people_server();
    let mut conn = connect_fake(&server, ConnectionOptions::default()).await?;
    let mut stmt = conn
        .prepare("SELECT id, name, nick, score FROM people", StatementOptions::default())
        .await?;
    let err = stmt.columns().expect_err("not executed");
    assert_eq!(err.code(), codes::JW_ERR_NOT_ACTIVE);

    stmt.execute(&mut conn).await?;
    assert_eq!(stmt.num_fields(), 4);
    let info = stmt.columns()?;
    assert_eq!(info.position("nick"), Some(2));
    assert_eq!(info.tables[0], "people");
    assert_eq!(
        info.sql_types,
        vec![SqlType::Integer, SqlType::Varchar, SqlType::Char, SqlType::Double]
    );
    assert_eq!(info.type_names[0], "integer");
    assert_eq!(info.is_pri_key, vec![true, false, false, false]);
    assert_eq!(info.is_auto_increment, vec![true, false, false, false]);
    assert_eq!(info.is_num, vec![true, false, false, true]);
    assert!(!info.nullable[1]);
    assert!(info.nullable[2]);
    assert_eq!(info.lengths[1], 32);
    // Buffered results know the widest value: "o'brien".
    assert_eq!(info.max_lengths[1], 7);
    assert_eq!(info.precision[1], 32);
    Ok(())
}

#[tokio::test]
async fn commit_and_rollback_respect_autocommit() -> Result<(), SqlEmulationError> {
    let server = people_server();
    let mut conn = connect_fake(&server, ConnectionOptions::default()).await?;
    assert!(conn.autocommit());

    assert_eq!(conn.commit().await?, TxOutcome::IneffectiveAutocommit);
    let warning = conn.last_error().expect("warning recorded");
    assert_eq!(warning.code, codes::TX_ERR_AUTOCOMMIT);
    assert!(warning.warning);
    assert_eq!(conn.rollback().await?, TxOutcome::IneffectiveAutocommit);
    assert_eq!(server.transactions(), (0, 0));

    conn.set_autocommit(false).await?;
    assert!(!conn.autocommit());
    assert!(server.statement_log().contains(&"SET autocommit=0".to_string()));
    assert_eq!(conn.commit().await?, TxOutcome::Applied);
    assert!(conn.last_error().is_none());
    assert_eq!(conn.rollback().await?, TxOutcome::Applied);
    assert_eq!(server.transactions(), (1, 1));
    Ok(())
}

#[tokio::test]
async fn session_information() -> Result<(), SqlEmulationError> {
    let server = people_server();
    let mut conn = connect_fake(&server, ConnectionOptions::default()).await?;
    assert_eq!(conn.server_info(), "8.0.36-fake");
    assert_eq!(conn.host_info(), "fakehost via fake transport");
    assert_eq!(conn.proto_info(), 10);
    assert!(conn.thread_id() > 0);
    assert!(conn.stat().await?.starts_with("Uptime:"));
    Ok(())
}

#[tokio::test]
async fn refused_login_reports_the_client_error() {
    let server = people_server();
    server.refuse_connections(1);
    let err = connect_fake(&server, ConnectionOptions::default())
        .await
        .expect_err("refused");
    assert_eq!(err.code(), CR_CONN_HOST_ERROR);
}

#[test]
fn options_parse_by_attribute_name() -> Result<(), SqlEmulationError> {
    let mut options = ConnectionOptions::default();
    options.set_named("mysql_server_prepare", "1")?;
    options.set_named("mysql_bind_type_guessing", "2")?;
    options.set_named("ChopBlanks", "on")?;
    options.set_named("mysql_fetch_buffer_cap", "64")?;
    assert!(options.server_prepare);
    assert_eq!(options.bind_type_guessing, TypeInference::Strict);
    assert!(options.chop_blanks);
    assert_eq!(options.fetch_buffer_cap, 64);

    let err = options.set_named("mysql_bogus", "1").expect_err("unknown");
    assert!(matches!(err, SqlEmulationError::ConfigError(_)));
    let err = options.set(OptionKey::UseResult, "maybe").expect_err("not a flag");
    assert!(matches!(err, SqlEmulationError::ConfigError(_)));

    let parsed = ConnectionOptions::from_json(r#"{"use_result": true, "auto_reconnect": true}"#)?;
    assert!(parsed.use_result);
    assert!(parsed.auto_reconnect);
    assert!(parsed.autocommit);
    assert_eq!(parsed.fetch_buffer_cap, 8192);
    Ok(())
}
