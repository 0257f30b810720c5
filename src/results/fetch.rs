use tracing::{debug, trace};

use super::row::{decode_binary, decode_text};
use crate::catalog::buffer_type_for;
use crate::client::{FetchBuffer, FetchStatus, Field, MysqlClient, ResultId, StmtId};
use crate::error::SqlEmulationError;
use crate::types::RowValues;

/// Next row of a text-protocol result.
pub(super) async fn next_text_row<C: MysqlClient>(
    client: &mut C,
    result: ResultId,
    fields: &[Field],
    chop_blanks: bool,
) -> Result<Option<Vec<RowValues>>, SqlEmulationError> {
    let Some(raw) = client.fetch_row(result).await? else {
        return Ok(None);
    };
    let values = raw
        .into_iter()
        .zip(fields)
        .map(|(cell, field)| match cell {
            Some(bytes) => decode_text(field, bytes, chop_blanks),
            None => RowValues::Null,
        })
        .collect();
    Ok(Some(values))
}

/// Next row of a binary-protocol result, describing it on first use.
pub(super) async fn next_binary_row<C: MysqlClient>(
    client: &mut C,
    stmt: StmtId,
    slot: &mut Option<Vec<FetchBuffer>>,
    fields: &[Field],
    chop_blanks: bool,
    buffer_cap: usize,
) -> Result<Option<Vec<RowValues>>, SqlEmulationError> {
    if slot.is_none() {
        *slot = Some(describe(client, stmt, fields, buffer_cap)?);
    }
    let Some(buffers) = slot.as_mut() else {
        return Err(SqlEmulationError::sequence("fetch() before describe"));
    };

    if client.stmt_fetch(stmt, buffers).await? == FetchStatus::NoData {
        return Ok(None);
    }

    for (column, buffer) in buffers.iter_mut().enumerate() {
        if buffer.is_truncated() {
            debug!(
                column,
                length = buffer.length,
                capacity = buffer.capacity(),
                "refetching truncated column"
            );
            buffer.grow_to_length()?;
            client.stmt_fetch_column(stmt, column, 0, buffer).await?;
        }
    }

    Ok(Some(
        buffers
            .iter()
            .zip(fields)
            .map(|(buffer, field)| decode_binary(field, buffer, chop_blanks))
            .collect(),
    ))
}

/// Allocate one receive buffer per column and bind them.
fn describe<C: MysqlClient>(
    client: &mut C,
    stmt: StmtId,
    fields: &[Field],
    buffer_cap: usize,
) -> Result<Vec<FetchBuffer>, SqlEmulationError> {
    if fields.is_empty() {
        return Err(SqlEmulationError::sequence("no metadata information"));
    }
    let buffers: Vec<FetchBuffer> = fields
        .iter()
        .map(|field| {
            let declared = usize::try_from(field.length.max(field.max_length)).unwrap_or(usize::MAX);
            FetchBuffer::new(buffer_type_for(field.native_type), declared.min(buffer_cap))
        })
        .collect();
    let types: Vec<_> = buffers.iter().map(|b| b.buffer_type).collect();
    trace!(?types, "binding result buffers");
    client.stmt_bind_result(stmt, &types)?;
    Ok(buffers)
}
