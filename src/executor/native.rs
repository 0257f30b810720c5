use std::sync::Arc;

use tracing::{debug, trace};

use super::{ExecutionMode, NativeStatement};
use crate::client::{MysqlClient, MysqlConnector, StmtId};
use crate::connection::Connection;
use crate::error::SqlEmulationError;
use crate::results::Cursor;
use crate::statement::{ColumnCache, Phase, Statement};
use crate::types::{ExecuteOutcome, RowCount};

/// Server-side prepare, retried once on a fresh connection if the server went
/// away.
pub(super) async fn prepare<K: MysqlConnector>(
    conn: &mut Connection<K>,
    sql: &str,
) -> Result<NativeStatement, SqlEmulationError> {
    let id = match conn.client.stmt_prepare(sql).await {
        Ok(id) => id,
        Err(err) => {
            let err = SqlEmulationError::from(err);
            if !conn.try_reconnect(&err).await {
                return Err(err);
            }
            conn.client.stmt_prepare(sql).await?
        }
    };
    trace!(?id, "server-side prepare");
    Ok(NativeStatement {
        id,
        generation: conn.generation,
    })
}

pub(super) async fn execute<K: MysqlConnector>(
    stmt: &mut Statement,
    conn: &mut Connection<K>,
) -> Result<ExecuteOutcome, SqlEmulationError> {
    let mut id = ensure_prepared(stmt, conn).await?;
    if let Err(err) = run(stmt, conn, id).await {
        if !conn.try_reconnect(&err).await {
            return Err(err);
        }
        id = ensure_prepared(stmt, conn).await?;
        run(stmt, conn, id).await?;
    }

    let Some(fields) = conn.client.stmt_result_metadata(id) else {
        stmt.insert_id = conn.client.stmt_insert_id(id);
        stmt.phase = Phase::NoResultSet;
        return Ok(ExecuteOutcome {
            rows: RowCount::Known(conn.client.stmt_affected_rows(id)),
            has_result_set: false,
        });
    };

    let streaming = stmt.options.use_result;
    let rows = if streaming {
        RowCount::Unknown
    } else {
        conn.client.stmt_store_result(id).await?;
        RowCount::Known(conn.client.stmt_num_rows(id))
    };
    stmt.columns = Some(Arc::new(ColumnCache::new(fields)));
    stmt.phase = Phase::Active(Cursor::binary(id, conn.generation, streaming));
    Ok(ExecuteOutcome {
        rows,
        has_result_set: true,
    })
}

/// Handle valid on the current connection, preparing the statement again if
/// it was created before a reconnect.
async fn ensure_prepared<K: MysqlConnector>(
    stmt: &mut Statement,
    conn: &mut Connection<K>,
) -> Result<StmtId, SqlEmulationError> {
    let ExecutionMode::Native(native) = &mut stmt.mode else {
        return Err(SqlEmulationError::sequence("statement was not prepared on the server"));
    };
    if native.generation == conn.generation {
        return Ok(native.id);
    }
    debug!(
        stale = native.generation,
        current = conn.generation,
        "re-preparing statement after reconnect"
    );
    native.id = conn.client.stmt_prepare(&stmt.sql).await?;
    native.generation = conn.generation;
    let id = native.id;
    stmt.params.invalidate();
    Ok(id)
}

/// Bind (when the parameter set changed) and execute.
async fn run<K: MysqlConnector>(
    stmt: &mut Statement,
    conn: &mut Connection<K>,
    id: StmtId,
) -> Result<(), SqlEmulationError> {
    if stmt.params.needs_bind() && !stmt.params.is_empty() {
        conn.client.stmt_bind_param(id, stmt.params.buffers())?;
        stmt.params.mark_bound();
    }
    conn.client.stmt_execute(id).await?;
    Ok(())
}
