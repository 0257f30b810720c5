//! Client-side SQL statement emulation for MySQL-protocol drivers.
//!
//! Statements are prepared through a [`Connection`] and run either by
//! rewriting `?` placeholders into literal SQL (the text protocol) or through
//! server-side prepared statements (the binary protocol). The mode is picked
//! once per statement; results come back as [`CustomDbRow`]s either way.
//!
//! ```no_run
//! use sql_emulation::prelude::*;
//!
//! # async fn demo<K: MysqlConnector>(conn: &mut Connection<K>) -> Result<(), SqlEmulationError> {
//! let mut stmt = conn
//!     .prepare("SELECT name FROM people WHERE id = ?", StatementOptions::default())
//!     .await?;
//! stmt.bind(1, RowValues::Int(3), None)?;
//! stmt.execute(conn).await?;
//! while let Some(row) = stmt.fetch(conn).await? {
//!     println!("{:?}", row.get("name"));
//! }
//! stmt.destroy(conn).await?;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod executor;
pub mod params;
pub mod placeholders;
pub mod prelude;
pub mod results;
pub mod rewrite;
pub mod statement;
pub mod tx_outcome;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use client::{MysqlClient, MysqlConnector};
pub use config::{
    ConnectParams, ConnectionOptions, ConnectionOptionsBuilder, OptionKey, StatementOptions,
};
pub use connection::{Capability, Connection, ReconnectStats};
pub use error::{LastError, ServerError, SqlEmulationError};
pub use executor::ExecutionMode;
pub use params::BoundParam;
pub use results::{CustomDbRow, ResultSet};
pub use rewrite::TypeInference;
pub use statement::{ColumnInfo, Statement};
pub use tx_outcome::TxOutcome;
pub use types::{ExecuteOutcome, RowCount, RowValues, SqlType};
