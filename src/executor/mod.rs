//! Statement execution.
//!
//! The execution mode is fixed at prepare time: [`ExecutionMode::Emulated`]
//! rewrites placeholders client-side and uses the text protocol,
//! [`ExecutionMode::Native`] binds parameter buffers to a server-side
//! prepared statement.

mod dispatch;
mod emulated;
mod native;

pub(crate) use dispatch::{execute, prepare};

use crate::client::StmtId;

/// How a statement runs for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionMode {
    Emulated,
    Native(NativeStatement),
}

impl ExecutionMode {
    #[must_use]
    pub fn is_native(&self) -> bool {
        matches!(self, ExecutionMode::Native(_))
    }
}

/// Server-side prepared statement handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeStatement {
    pub id: StmtId,
    /// Connection generation `id` belongs to. After a reconnect the handle is
    /// prepared again before the next execute.
    pub generation: u64,
}
