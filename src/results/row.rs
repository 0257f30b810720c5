use std::collections::HashMap;
use std::sync::Arc;

use crate::catalog::buffer_type_for;
use crate::client::{BufferType, ColumnFlags, FetchBuffer, Field};
use crate::types::RowValues;

/// A row from a query result
///
/// This struct represents a single row from a query result,
/// with access to both the column names and the values.
#[derive(Debug, Clone)]
pub struct CustomDbRow {
    /// The column names for this row (shared across all rows in a result set)
    pub column_names: Arc<Vec<String>>,
    /// The values for this row
    pub rows: Vec<RowValues>,
    // Shared name -> position map, built once per result
    #[doc(hidden)]
    pub(crate) column_index_cache: Arc<HashMap<String, usize>>,
}

impl CustomDbRow {
    /// Create a new row, building its own column index.
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, rows: Vec<RowValues>) -> Self {
        let cache = Arc::new(
            column_names
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), i))
                .collect::<HashMap<_, _>>(),
        );
        Self::with_index(column_names, rows, cache)
    }

    pub(crate) fn with_index(
        column_names: Arc<Vec<String>>,
        rows: Vec<RowValues>,
        column_index_cache: Arc<HashMap<String, usize>>,
    ) -> Self {
        Self {
            column_names,
            rows,
            column_index_cache,
        }
    }

    /// Get the index of a column by name
    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        if let Some(&idx) = self.column_index_cache.get(column_name) {
            return Some(idx);
        }
        self.column_names.iter().position(|col| col == column_name)
    }

    /// Get a value from the row by column name
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.get_column_index(column_name)
            .and_then(|idx| self.rows.get(idx))
    }

    /// Get a value from the row by column index
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.rows.get(index)
    }
}

/// Decode one text-protocol cell.
pub(crate) fn decode_text(field: &Field, mut bytes: Vec<u8>, chop_blanks: bool) -> RowValues {
    match buffer_type_for(field.native_type) {
        BufferType::Long | BufferType::LongLong => {
            let parsed = std::str::from_utf8(&bytes)
                .ok()
                .and_then(|s| s.trim().parse::<i64>().ok());
            match parsed {
                Some(v) => RowValues::Int(v),
                None => text_or_blob(field, bytes),
            }
        }
        BufferType::Double => {
            let parsed = std::str::from_utf8(&bytes)
                .ok()
                .and_then(|s| s.trim().parse::<f64>().ok());
            match parsed {
                Some(v) => RowValues::Float(v),
                None => text_or_blob(field, bytes),
            }
        }
        _ => {
            if chop_blanks && !is_binary(field) {
                chop(&mut bytes);
            }
            text_or_blob(field, bytes)
        }
    }
}

/// Decode one bound binary-protocol buffer.
pub(crate) fn decode_binary(field: &Field, buffer: &FetchBuffer, chop_blanks: bool) -> RowValues {
    if buffer.is_null {
        return RowValues::Null;
    }
    match buffer.buffer_type {
        BufferType::String | BufferType::Blob => {
            let mut bytes = buffer.data.clone();
            if chop_blanks && !is_binary(field) {
                chop(&mut bytes);
            }
            text_or_blob(field, bytes)
        }
        _ if field.flags.contains(ColumnFlags::UNSIGNED) => buffer.unsigned_value(),
        _ => buffer.value(),
    }
}

fn is_binary(field: &Field) -> bool {
    field.flags.contains(ColumnFlags::BINARY)
}

fn text_or_blob(field: &Field, bytes: Vec<u8>) -> RowValues {
    if is_binary(field) {
        return RowValues::Blob(bytes);
    }
    match String::from_utf8(bytes) {
        Ok(s) => RowValues::Text(s),
        Err(e) => RowValues::Blob(e.into_bytes()),
    }
}

fn chop(bytes: &mut Vec<u8>) {
    while bytes.last() == Some(&b' ') {
        bytes.pop();
    }
}
