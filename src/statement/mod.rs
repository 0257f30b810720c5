//! Prepared statement handles.
//!
//! A [`Statement`] is created by [`Connection::prepare`] and driven through
//! `bind` → `execute` → `fetch`* → `finish`. Every method that talks to the
//! server borrows the owning connection mutably for the duration of the call.

mod columns;

pub use columns::ColumnInfo;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::client::{MysqlClient, MysqlConnector};
use crate::config::ResolvedStatementOptions;
use crate::connection::Connection;
use crate::error::{ErrorSlot, LastError, SqlEmulationError, codes};
use crate::executor::{self, ExecutionMode};
use crate::params::ParamStore;
use crate::placeholders::StatementShape;
use crate::results::{self, CustomDbRow, Cursor, ResultSet};
use crate::types::{ExecuteOutcome, RowCount, RowValues, SqlType};

pub(crate) use columns::ColumnCache;

/// Where a statement is in its life cycle.
#[derive(Debug)]
pub(crate) enum Phase {
    /// Prepared, never executed.
    Prepared,
    /// Executed a statement that produced no result set.
    NoResultSet,
    /// A result set is open.
    Active(Cursor),
    /// All rows were fetched; the result has been released.
    Exhausted,
    /// The caller finished the statement.
    Finished,
}

#[derive(Debug)]
pub struct Statement {
    pub(crate) sql: String,
    pub(crate) options: ResolvedStatementOptions,
    pub(crate) shape: StatementShape,
    pub(crate) mode: ExecutionMode,
    pub(crate) params: ParamStore,
    pub(crate) phase: Phase,
    pub(crate) columns: Option<Arc<ColumnCache>>,
    pub(crate) row_count: RowCount,
    pub(crate) insert_id: u64,
    pub(crate) last_error: ErrorSlot,
}

impl Statement {
    pub(crate) fn new(
        sql: &str,
        options: ResolvedStatementOptions,
        shape: StatementShape,
        mode: ExecutionMode,
        params: ParamStore,
    ) -> Self {
        Self {
            sql: sql.to_string(),
            options,
            shape,
            mode,
            params,
            phase: Phase::Prepared,
            columns: None,
            row_count: RowCount::Known(0),
            insert_id: 0,
            last_error: ErrorSlot::default(),
        }
    }

    /// Bind `value` to the 1-based `position`.
    ///
    /// A non-numeric value declared with a numeric type is accepted but
    /// leaves a warning on the statement.
    ///
    /// # Errors
    /// Returns `SqlEmulationError::IllegalParam` for positions outside
    /// `1..=num_params()`.
    pub fn bind(
        &mut self,
        position: usize,
        value: RowValues,
        declared: Option<SqlType>,
    ) -> Result<(), SqlEmulationError> {
        self.last_error.clear();
        let result = self.params.bind(position, value, declared);
        match result {
            Ok(report) => {
                if let Some(message) = report.warning {
                    warn!("{message}");
                    self.last_error.warn(codes::JW_ERR_ILLEGAL_PARAM_NUM, message);
                }
                Ok(())
            }
            Err(err) => {
                self.last_error.record(&err);
                Err(err)
            }
        }
    }

    /// In/out parameters are not supported.
    ///
    /// # Errors
    /// Always returns `SqlEmulationError::NotImplemented`.
    pub fn bind_inout(&mut self, _position: usize) -> Result<(), SqlEmulationError> {
        self.last_error.clear();
        let err = SqlEmulationError::NotImplemented("Output parameters not implemented".into());
        self.last_error.record(&err);
        Err(err)
    }

    /// Run the statement with the currently bound parameters.
    ///
    /// Any result still open from a previous execute is released first.
    ///
    /// # Errors
    /// Returns the server's error (after at most one reconnect-and-retry for
    /// "server has gone away"), or a query error for a malformed LISTFIELDS.
    pub async fn execute<K: MysqlConnector>(
        &mut self,
        conn: &mut Connection<K>,
    ) -> Result<ExecuteOutcome, SqlEmulationError> {
        self.last_error.clear();
        let result = executor::execute(self, conn).await;
        self.last_error.track(result)
    }

    /// Next row, or `None` once the result is exhausted.
    ///
    /// # Errors
    /// Returns `SqlEmulationError::Sequence` when there is no open result
    /// (never executed, no result set, already exhausted, or finished).
    pub async fn fetch<K: MysqlConnector>(
        &mut self,
        conn: &mut Connection<K>,
    ) -> Result<Option<CustomDbRow>, SqlEmulationError> {
        self.last_error.clear();
        let result = results::fetch(self, conn).await;
        self.last_error.track(result)
    }

    /// Drain the remaining rows into a [`ResultSet`].
    ///
    /// # Errors
    /// Same as [`Statement::fetch`].
    pub async fn fetch_all<K: MysqlConnector>(
        &mut self,
        conn: &mut Connection<K>,
    ) -> Result<ResultSet, SqlEmulationError> {
        let expected = self.row_count.known().unwrap_or(0);
        let mut set = ResultSet::with_capacity(usize::try_from(expected).unwrap_or(0));
        if let Ok(info) = self.columns() {
            set.set_column_names(info.names_arc());
        }
        while let Some(row) = self.fetch(conn).await? {
            set.add_row(row);
        }
        Ok(set)
    }

    /// Release the open result, if any.
    ///
    /// # Errors
    /// Returns `SqlEmulationError::Sequence` when called twice in a row, or the
    /// server's error if releasing the result fails.
    pub async fn finish<K: MysqlConnector>(
        &mut self,
        conn: &mut Connection<K>,
    ) -> Result<(), SqlEmulationError> {
        self.last_error.clear();
        let result = if matches!(self.phase, Phase::Finished) {
            Err(SqlEmulationError::sequence("finish() called twice"))
        } else {
            results::release(self, conn).await
        };
        self.last_error.track(result)
    }

    /// Release everything the statement holds, including the server-side
    /// prepared statement.
    ///
    /// A connection that has gone away took the server-side statement with
    /// it, so that case is not an error.
    ///
    /// # Errors
    /// Returns the server's error if closing the prepared statement fails.
    pub async fn destroy<K: MysqlConnector>(
        mut self,
        conn: &mut Connection<K>,
    ) -> Result<(), SqlEmulationError> {
        if !matches!(self.phase, Phase::Finished) {
            results::release(&mut self, conn).await?;
        }
        if let ExecutionMode::Native(native) = &self.mode
            && native.generation == conn.generation
        {
            match conn.client.stmt_close(native.id).await {
                Err(err) if err.is_gone_away() => {
                    debug!("prepared statement already gone: {}", err.message);
                }
                other => other?,
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn mode(&self) -> &ExecutionMode {
        &self.mode
    }

    #[must_use]
    pub fn num_params(&self) -> usize {
        self.params.len()
    }

    #[must_use]
    pub fn shape(&self) -> StatementShape {
        self.shape
    }

    /// Rows affected, or rows in the result set once known.
    #[must_use]
    pub fn row_count(&self) -> RowCount {
        self.row_count
    }

    #[must_use]
    pub fn insert_id(&self) -> u64 {
        self.insert_id
    }

    /// Whether a result set is currently open.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.phase, Phase::Active(_))
    }

    #[must_use]
    pub fn fetch_done(&self) -> bool {
        matches!(self.phase, Phase::Exhausted)
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&LastError> {
        self.last_error.get()
    }

    /// Column metadata of the current result, computed on first use and
    /// cached until the next execute.
    ///
    /// # Errors
    /// Returns `SqlEmulationError::NotActive` when the last execute produced
    /// no result set.
    pub fn columns(&self) -> Result<&ColumnInfo, SqlEmulationError> {
        self.columns
            .as_ref()
            .map(|cache| cache.info())
            .ok_or_else(|| SqlEmulationError::NotActive("statement contains no result".into()))
    }

    #[must_use]
    pub fn num_fields(&self) -> usize {
        self.columns.as_ref().map_or(0, |cache| cache.fields().len())
    }
}
