use std::sync::Arc;

use tracing::{trace, warn};

use crate::client::{MysqlClient, MysqlConnector};
use crate::connection::Connection;
use crate::error::{SqlEmulationError, codes};
use crate::placeholders::listfields_table;
use crate::results::Cursor;
use crate::rewrite::rewrite;
use crate::statement::{ColumnCache, Phase, Statement};
use crate::types::{ExecuteOutcome, RowCount};

pub(super) async fn execute<K: MysqlConnector>(
    stmt: &mut Statement,
    conn: &mut Connection<K>,
) -> Result<ExecuteOutcome, SqlEmulationError> {
    if stmt.shape.is_listfields {
        return list_fields(stmt, conn).await;
    }

    let client = &conn.client;
    let rewritten = rewrite(
        &stmt.sql,
        stmt.params.params(),
        conn.options.bind_type_guessing,
        |bytes| client.escape_string(bytes),
    );
    for dropped in &rewritten.discarded {
        let message = format!(
            "parameter {} bound as numeric: discarded trailing {:?}",
            dropped.position,
            String::from_utf8_lossy(&dropped.suffix)
        );
        warn!("{message}");
        stmt.last_error.warn(codes::JW_ERR_QUERY, message);
    }
    trace!(sql = %rewritten.to_string_lossy(), "emulated execute");

    if let Err(err) = conn.client.query(&rewritten.sql).await {
        let err = SqlEmulationError::from(err);
        if !conn.try_reconnect(&err).await {
            return Err(err);
        }
        conn.client.query(&rewritten.sql).await?;
    }

    let streaming = stmt.options.use_result;
    let result = if streaming {
        conn.client.use_result().await?
    } else {
        conn.client.store_result().await?
    };

    let Some(result) = result else {
        let affected = conn.client.affected_rows();
        stmt.insert_id = conn.client.insert_id();
        stmt.phase = Phase::NoResultSet;
        return Ok(ExecuteOutcome {
            rows: RowCount::Known(affected),
            has_result_set: false,
        });
    };

    let rows = if streaming {
        RowCount::Unknown
    } else {
        RowCount::Known(conn.client.num_rows(result))
    };
    stmt.columns = Some(Arc::new(ColumnCache::new(conn.client.fetch_fields(result))));
    stmt.phase = Phase::Active(Cursor::text(result, conn.generation, streaming));
    Ok(ExecuteOutcome {
        rows,
        has_result_set: true,
    })
}

/// `LISTFIELDS <table>`: column metadata without running a query.
async fn list_fields<K: MysqlConnector>(
    stmt: &mut Statement,
    conn: &mut Connection<K>,
) -> Result<ExecuteOutcome, SqlEmulationError> {
    let table = listfields_table(&stmt.sql)
        .ok_or_else(|| SqlEmulationError::Query("Missing table name".into()))?;
    let result = conn.client.list_fields(table).await?;
    stmt.columns = Some(Arc::new(ColumnCache::new(conn.client.fetch_fields(result))));
    stmt.phase = Phase::Active(Cursor::text(result, conn.generation, false));
    Ok(ExecuteOutcome {
        rows: RowCount::Known(0),
        has_result_set: true,
    })
}
