//! Row materialization for both execution paths.

mod fetch;
mod result_set;
mod row;

pub use result_set::ResultSet;
pub use row::CustomDbRow;

use tracing::debug;

use crate::client::{FetchBuffer, MysqlClient, MysqlConnector, ResultId, StmtId};
use crate::connection::Connection;
use crate::error::SqlEmulationError;
use crate::statement::{Phase, Statement};
use crate::types::RowCount;

/// An open result set owned by a statement.
#[derive(Debug)]
pub(crate) struct Cursor {
    /// Connection generation the result was opened on.
    pub(crate) generation: u64,
    pub(crate) streaming: bool,
    pub(crate) fetched: u64,
    pub(crate) source: CursorSource,
}

#[derive(Debug)]
pub(crate) enum CursorSource {
    Text(ResultId),
    Binary {
        stmt: StmtId,
        /// Receive buffers, allocated by the first fetch.
        buffers: Option<Vec<FetchBuffer>>,
    },
}

impl Cursor {
    pub(crate) fn text(result: ResultId, generation: u64, streaming: bool) -> Self {
        Self {
            generation,
            streaming,
            fetched: 0,
            source: CursorSource::Text(result),
        }
    }

    pub(crate) fn binary(stmt: StmtId, generation: u64, streaming: bool) -> Self {
        Self {
            generation,
            streaming,
            fetched: 0,
            source: CursorSource::Binary { stmt, buffers: None },
        }
    }
}

pub(crate) async fn fetch<K: MysqlConnector>(
    stmt: &mut Statement,
    conn: &mut Connection<K>,
) -> Result<Option<CustomDbRow>, SqlEmulationError> {
    let cursor = match &mut stmt.phase {
        Phase::Active(cursor) => cursor,
        Phase::Prepared => return Err(SqlEmulationError::sequence("fetch() without execute()")),
        Phase::Exhausted => {
            return Err(SqlEmulationError::sequence("fetch() but fetch already done"));
        }
        Phase::NoResultSet | Phase::Finished => {
            return Err(SqlEmulationError::sequence("no statement executing"));
        }
    };
    if cursor.generation != conn.generation {
        stmt.phase = Phase::Finished;
        return Err(SqlEmulationError::ConnectionError(
            "result set was lost when the connection was re-established".into(),
        ));
    }
    let Some(cache) = stmt.columns.as_ref() else {
        return Err(SqlEmulationError::sequence("no metadata information"));
    };
    let chop_blanks = stmt.options.chop_blanks;

    let fetched = match &mut cursor.source {
        CursorSource::Text(result) => {
            fetch::next_text_row(&mut conn.client, *result, cache.fields(), chop_blanks).await
        }
        CursorSource::Binary { stmt: id, buffers } => {
            fetch::next_binary_row(
                &mut conn.client,
                *id,
                buffers,
                cache.fields(),
                chop_blanks,
                conn.options.fetch_buffer_cap,
            )
            .await
        }
    };
    let values = match fetched {
        Ok(values) => values,
        Err(err) => {
            // A failed fetch ends the result set.
            if let Err(release_err) = release(stmt, conn).await {
                debug!(code = release_err.code(), "releasing failed result: {release_err}");
            }
            return Err(err);
        }
    };

    if let Some(values) = values {
        cursor.fetched += 1;
        let info = cache.info();
        return Ok(Some(CustomDbRow::with_index(
            info.names_arc(),
            values,
            info.index_arc(),
        )));
    }

    // End of rows: settle the row count, then release the result.
    let final_count = match &cursor.source {
        CursorSource::Text(_) if cursor.streaming => Some(RowCount::Known(cursor.fetched)),
        CursorSource::Text(_) => None,
        CursorSource::Binary { stmt: id, .. } => {
            Some(RowCount::Known(conn.client.stmt_affected_rows(*id)))
        }
    };
    if let Some(count) = final_count {
        stmt.row_count = count;
    }
    release(stmt, conn).await?;
    stmt.phase = Phase::Exhausted;
    Ok(None)
}

/// Release the statement's open result, if any, leaving it finished.
pub(crate) async fn release<K: MysqlConnector>(
    stmt: &mut Statement,
    conn: &mut Connection<K>,
) -> Result<(), SqlEmulationError> {
    let previous = std::mem::replace(&mut stmt.phase, Phase::Finished);
    if let Phase::Active(cursor) = previous
        && cursor.generation == conn.generation
    {
        match cursor.source {
            CursorSource::Text(result) => conn.client.free_result(result),
            CursorSource::Binary { stmt: id, .. } => match conn.client.stmt_free_result(id).await {
                // The server dropped the result along with the session.
                Err(err) if err.is_gone_away() => debug!("result already gone: {}", err.message),
                other => other?,
            },
        }
    }
    Ok(())
}
