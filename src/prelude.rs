//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::client::{MysqlClient, MysqlConnector};
pub use crate::config::{
    ConnectParams, ConnectionOptions, ConnectionOptionsBuilder, OptionKey, StatementOptions,
};
pub use crate::connection::{Connection, ReconnectStats};
pub use crate::error::{ServerError, SqlEmulationError};
pub use crate::executor::ExecutionMode;
pub use crate::params::BoundParam;
pub use crate::placeholders::count_placeholders;
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::rewrite::{TypeInference, rewrite};
pub use crate::statement::Statement;
pub use crate::tx_outcome::TxOutcome;
pub use crate::types::{ExecuteOutcome, RowCount, RowValues, SqlType};
