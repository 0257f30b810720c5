//! Test doubles shared by unit tests, integration tests, and the simulator.

mod fake_server;
mod fake_sql;
pub mod test_helpers;

pub use fake_server::{
    CR_COMMANDS_OUT_OF_SYNC, CR_CONN_HOST_ERROR, DEFAULT_SERVER_VERSION, ER_UNKNOWN_STMT_HANDLER,
    FakeClient, FakeConnector, FakeServer,
};
pub use test_helpers::*;
