use tracing::debug;

use super::{ExecutionMode, emulated, native};
use crate::client::{MysqlClient, MysqlConnector};
use crate::config::StatementOptions;
use crate::connection::Connection;
use crate::error::SqlEmulationError;
use crate::params::ParamStore;
use crate::placeholders;
use crate::results;
use crate::statement::{Phase, Statement};
use crate::types::{ExecuteOutcome, RowCount};

/// Analyze `sql` and decide its execution mode.
///
/// Native prepare is only attempted when the server supports it, the
/// statement options ask for it, and the statement is not LISTFIELDS, SHOW,
/// or parameterized inside `LIMIT`. A server that rejects the statement as
/// unpreparable sends it down the emulated path instead.
pub(crate) async fn prepare<K: MysqlConnector>(
    conn: &mut Connection<K>,
    sql: &str,
    options: StatementOptions,
) -> Result<Statement, SqlEmulationError> {
    let shape = placeholders::analyze(sql);
    let resolved = options.resolve(&conn.options);
    let mut mode = ExecutionMode::Emulated;
    let mut num_params = shape.placeholders;

    if resolved.server_prepare && conn.capability.native_prepare && shape.supports_native() {
        match native::prepare(conn, sql).await {
            Ok(handle) => {
                num_params = conn.client.stmt_param_count(handle.id);
                mode = ExecutionMode::Native(handle);
            }
            Err(err) if matches!(&err, SqlEmulationError::Server(e) if e.is_unsupported_prepare()) => {
                debug!("server cannot prepare statement, emulating: {err}");
            }
            Err(err) => return Err(err),
        }
    } else if resolved.server_prepare {
        debug!(
            native_prepare = conn.capability.native_prepare,
            is_show = shape.is_show,
            limit_placeholder = shape.limit_placeholder,
            is_listfields = shape.is_listfields,
            "native prepare disabled for statement"
        );
    }

    debug!(num_params, native = mode.is_native(), "prepared");
    Ok(Statement::new(
        sql,
        resolved,
        shape,
        mode,
        ParamStore::new(num_params),
    ))
}

/// Run `stmt` on its execution path.
pub(crate) async fn execute<K: MysqlConnector>(
    stmt: &mut Statement,
    conn: &mut Connection<K>,
) -> Result<ExecuteOutcome, SqlEmulationError> {
    results::release(stmt, conn).await?;
    stmt.phase = Phase::Prepared;
    stmt.columns = None;
    stmt.row_count = RowCount::Known(0);

    let outcome = match stmt.mode {
        ExecutionMode::Emulated => emulated::execute(stmt, conn).await?,
        ExecutionMode::Native(_) => native::execute(stmt, conn).await?,
    };

    if !outcome.has_result_set {
        conn.last_insert_id = stmt.insert_id;
        debug!(affected = ?outcome.rows, insert_id = stmt.insert_id, "statement executed");
    }
    stmt.row_count = outcome.rows;
    Ok(outcome)
}
