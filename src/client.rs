//! Interface to the underlying MySQL client library.
//!
//! The emulation layer never speaks the wire protocol itself. Everything it
//! needs from a connection (text queries, the binary prepared-statement API,
//! metadata, transactions) goes through [`MysqlClient`]; new connections come
//! from a [`MysqlConnector`].

use async_trait::async_trait;

use crate::catalog::NativeType;
use crate::config::{ConnectParams, ConnectionOptions};
use crate::error::{ServerError, SqlEmulationError};
use crate::rewrite::escape::escape_string;
use crate::types::RowValues;

/// Handle to a result set owned by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultId(pub u64);

/// Handle to a server-side prepared statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StmtId(pub u64);

/// Column flag bits as reported in field metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColumnFlags(pub u32);

impl ColumnFlags {
    pub const NOT_NULL: u32 = 1;
    pub const PRI_KEY: u32 = 2;
    pub const UNIQUE_KEY: u32 = 4;
    pub const MULTIPLE_KEY: u32 = 8;
    pub const BLOB: u32 = 16;
    pub const UNSIGNED: u32 = 32;
    pub const ZEROFILL: u32 = 64;
    pub const BINARY: u32 = 128;
    pub const ENUM: u32 = 256;
    pub const AUTO_INCREMENT: u32 = 512;
    pub const TIMESTAMP: u32 = 1024;
    pub const SET: u32 = 2048;
    pub const NUM: u32 = 32768;

    #[must_use]
    pub fn contains(self, bit: u32) -> bool {
        self.0 & bit != 0
    }
}

/// Metadata for one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub table: String,
    pub native_type: NativeType,
    pub flags: ColumnFlags,
    /// Declared display width.
    pub length: u64,
    /// Widest value actually present in a buffered result.
    pub max_length: u64,
    pub decimals: u8,
}

impl Field {
    pub fn new(name: impl Into<String>, native_type: NativeType) -> Self {
        Self {
            name: name.into(),
            table: String::new(),
            native_type,
            flags: ColumnFlags::default(),
            length: 0,
            max_length: 0,
            decimals: 0,
        }
    }

    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = ColumnFlags(flags);
        self
    }

    #[must_use]
    pub fn with_length(mut self, length: u64) -> Self {
        self.length = length;
        self
    }

    #[must_use]
    pub fn with_decimals(mut self, decimals: u8) -> Self {
        self.decimals = decimals;
        self
    }
}

/// One row of the text protocol; `None` is SQL NULL.
pub type TextRow = Vec<Option<Vec<u8>>>;

/// Binary-protocol buffer layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferType {
    Null,
    /// Little-endian `i64` in an 8-byte buffer.
    Long,
    LongLong,
    /// Little-endian `f64` in an 8-byte buffer.
    Double,
    String,
    Blob,
}

impl BufferType {
    #[must_use]
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            BufferType::Long | BufferType::LongLong | BufferType::Double => Some(8),
            BufferType::Null => Some(0),
            BufferType::String | BufferType::Blob => None,
        }
    }
}

/// Parameter buffer handed to `stmt_bind_param`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamBuffer {
    pub buffer_type: BufferType,
    pub data: Vec<u8>,
    pub is_null: bool,
}

impl ParamBuffer {
    #[must_use]
    pub fn null() -> Self {
        Self {
            buffer_type: BufferType::Null,
            data: Vec::new(),
            is_null: true,
        }
    }

    #[must_use]
    pub fn length(&self) -> usize {
        self.data.len()
    }
}

/// Receive buffer for one column of a binary-protocol row.
///
/// `length` is what the server reports for the current row and may exceed the
/// allocated capacity; in that case `data` holds a truncated prefix until the
/// column is re-fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchBuffer {
    pub buffer_type: BufferType,
    pub data: Vec<u8>,
    pub length: u64,
    pub is_null: bool,
    capacity: usize,
}

impl FetchBuffer {
    #[must_use]
    pub fn new(buffer_type: BufferType, capacity: usize) -> Self {
        let capacity = buffer_type.fixed_width().unwrap_or(capacity);
        Self {
            buffer_type,
            data: Vec::with_capacity(capacity),
            length: 0,
            is_null: false,
            capacity,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the current value did not fit.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        !self.is_null && self.length > self.capacity as u64
    }

    /// Store `bytes` the way the client library fills a bound buffer.
    pub fn fill(&mut self, bytes: &[u8]) {
        self.is_null = false;
        self.length = bytes.len() as u64;
        self.data.clear();
        let take = bytes.len().min(self.capacity);
        self.data.extend_from_slice(&bytes[..take]);
    }

    pub fn fill_null(&mut self) {
        self.is_null = true;
        self.length = 0;
        self.data.clear();
    }

    /// Grow to hold the full reported length.
    ///
    /// # Errors
    /// Returns `SqlEmulationError::OutOfMemory` when the allocation fails.
    pub fn grow_to_length(&mut self) -> Result<(), SqlEmulationError> {
        let wanted = usize::try_from(self.length).map_err(|_| {
            SqlEmulationError::OutOfMemory(format!("column of {} bytes", self.length))
        })?;
        if wanted > self.capacity {
            self.data
                .try_reserve_exact(wanted.saturating_sub(self.data.len()))
                .map_err(|e| SqlEmulationError::OutOfMemory(e.to_string()))?;
            self.capacity = wanted;
        }
        Ok(())
    }

    /// Portable value for the buffer's current contents.
    #[must_use]
    pub fn value(&self) -> RowValues {
        if self.is_null {
            return RowValues::Null;
        }
        match self.buffer_type {
            BufferType::Null => RowValues::Null,
            BufferType::Long | BufferType::LongLong => {
                RowValues::Int(i64::from_le_bytes(fixed8(&self.data)))
            }
            BufferType::Double => RowValues::Float(f64::from_le_bytes(fixed8(&self.data))),
            BufferType::String => match String::from_utf8(self.data.clone()) {
                Ok(s) => RowValues::Text(s),
                Err(e) => RowValues::Blob(e.into_bytes()),
            },
            BufferType::Blob => RowValues::Blob(self.data.clone()),
        }
    }

    /// Like [`FetchBuffer::value`], reading an integer buffer as `u64`.
    /// Values above `i64::MAX` come back as decimal text.
    #[must_use]
    pub fn unsigned_value(&self) -> RowValues {
        match self.buffer_type {
            BufferType::Long | BufferType::LongLong if !self.is_null => {
                let v = u64::from_le_bytes(fixed8(&self.data));
                i64::try_from(v).map_or_else(|_| RowValues::Text(v.to_string()), RowValues::Int)
            }
            _ => self.value(),
        }
    }
}

fn fixed8(data: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    let take = data.len().min(8);
    out[..take].copy_from_slice(&data[..take]);
    out
}

/// Outcome of `stmt_fetch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Row,
    NoData,
}

/// Opens client connections.
#[async_trait]
pub trait MysqlConnector: Send + Sync {
    type Client: MysqlClient;

    async fn connect(
        &self,
        params: &ConnectParams,
        options: &ConnectionOptions,
    ) -> Result<Self::Client, ServerError>;
}

/// One live client connection.
#[async_trait]
pub trait MysqlClient: Send {
    // --- text protocol ---

    async fn query(&mut self, sql: &[u8]) -> Result<(), ServerError>;

    /// Buffer the whole result client-side. `None` when the last query
    /// produced no result set.
    async fn store_result(&mut self) -> Result<Option<ResultId>, ServerError>;

    /// Stream the result row by row.
    async fn use_result(&mut self) -> Result<Option<ResultId>, ServerError>;

    async fn fetch_row(&mut self, result: ResultId) -> Result<Option<TextRow>, ServerError>;

    fn num_rows(&self, result: ResultId) -> u64;

    fn fetch_fields(&self, result: ResultId) -> Vec<Field>;

    fn free_result(&mut self, result: ResultId);

    /// Column metadata for `table` as an empty result.
    async fn list_fields(&mut self, table: &str) -> Result<ResultId, ServerError>;

    fn affected_rows(&self) -> u64;

    fn insert_id(&self) -> u64;

    /// Server info string for the last statement, e.g. `Records: 3 Duplicates: 0`.
    fn info(&self) -> Option<String> {
        None
    }

    fn escape_string(&self, input: &[u8]) -> Vec<u8> {
        escape_string(input)
    }

    // --- binary protocol ---

    async fn stmt_prepare(&mut self, sql: &str) -> Result<StmtId, ServerError>;

    fn stmt_param_count(&self, stmt: StmtId) -> usize;

    fn stmt_bind_param(&mut self, stmt: StmtId, params: &[ParamBuffer]) -> Result<(), ServerError>;

    async fn stmt_execute(&mut self, stmt: StmtId) -> Result<(), ServerError>;

    /// `None` for statements that produce no result set.
    fn stmt_result_metadata(&self, stmt: StmtId) -> Option<Vec<Field>>;

    async fn stmt_store_result(&mut self, stmt: StmtId) -> Result<(), ServerError>;

    fn stmt_num_rows(&self, stmt: StmtId) -> u64;

    fn stmt_affected_rows(&self, stmt: StmtId) -> u64;

    fn stmt_insert_id(&self, stmt: StmtId) -> u64;

    fn stmt_bind_result(&mut self, stmt: StmtId, types: &[BufferType]) -> Result<(), ServerError>;

    /// Fill `buffers` with the next row. Values longer than a buffer's
    /// capacity are truncated and flagged through the buffer's length.
    async fn stmt_fetch(
        &mut self,
        stmt: StmtId,
        buffers: &mut [FetchBuffer],
    ) -> Result<FetchStatus, ServerError>;

    /// Re-read one column of the current row starting at `offset`.
    async fn stmt_fetch_column(
        &mut self,
        stmt: StmtId,
        column: usize,
        offset: u64,
        buffer: &mut FetchBuffer,
    ) -> Result<(), ServerError>;

    async fn stmt_free_result(&mut self, stmt: StmtId) -> Result<(), ServerError>;

    async fn stmt_close(&mut self, stmt: StmtId) -> Result<(), ServerError>;

    // --- session ---

    async fn commit(&mut self) -> Result<(), ServerError>;

    async fn rollback(&mut self) -> Result<(), ServerError>;

    async fn set_autocommit(&mut self, on: bool) -> Result<(), ServerError>;

    /// Server version as `major * 10000 + minor * 100 + patch`.
    fn server_version(&self) -> u32;

    fn server_info(&self) -> String;

    fn host_info(&self) -> String;

    fn proto_info(&self) -> u32;

    fn thread_id(&self) -> u64;

    /// Server status line (uptime, threads, questions...).
    async fn stat(&mut self) -> Result<String, ServerError>;

    async fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_buffer_truncates_and_grows() {
        let mut buffer = FetchBuffer::new(BufferType::Blob, 4);
        buffer.fill(b"abcdefgh");
        assert!(buffer.is_truncated());
        assert_eq!(buffer.data, b"abcd");
        buffer.grow_to_length().expect("grow");
        assert_eq!(buffer.capacity(), 8);
        buffer.fill(b"abcdefgh");
        assert!(!buffer.is_truncated());
        assert_eq!(buffer.value(), RowValues::Blob(b"abcdefgh".to_vec()));
    }

    #[test]
    fn fixed_width_buffers_decode() {
        let mut long = FetchBuffer::new(BufferType::Long, 1);
        assert_eq!(long.capacity(), 8);
        long.fill(&(-7i64).to_le_bytes());
        assert_eq!(long.value(), RowValues::Int(-7));

        let mut double = FetchBuffer::new(BufferType::Double, 0);
        double.fill(&2.5f64.to_le_bytes());
        assert_eq!(double.value(), RowValues::Float(2.5));

        double.fill_null();
        assert_eq!(double.value(), RowValues::Null);
    }

    #[test]
    fn flags_test_bits() {
        let flags = ColumnFlags(ColumnFlags::PRI_KEY | ColumnFlags::NOT_NULL);
        assert!(flags.contains(ColumnFlags::PRI_KEY));
        assert!(!flags.contains(ColumnFlags::BLOB));
    }
}
