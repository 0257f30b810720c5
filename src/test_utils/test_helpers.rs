//! Helper utilities for testing and development.

use super::{FakeConnector, FakeServer};
use crate::config::{ConnectParams, ConnectionOptions};
use crate::connection::Connection;
use crate::error::SqlEmulationError;

/// Open a connection to `server` with `options`.
///
/// # Errors
/// Returns the connect error when the server refuses the login.
pub async fn connect_fake(
    server: &FakeServer,
    options: ConnectionOptions,
) -> Result<Connection<FakeConnector>, SqlEmulationError> {
    Connection::connect(
        server.connector(),
        ConnectParams::new("fakehost").with_user("test", "test").with_database("test"),
        options,
    )
    .await
}

/// Server with a small `people` table:
///
/// | id | name    | nick       | score |
/// |----|---------|------------|-------|
/// | 1  | alice   | `'al  '`   | 9.5   |
/// | 2  | bob     | NULL       | 7     |
/// | 3  | o'brien | `'ob'`     | 8.25  |
#[must_use]
pub fn people_server() -> FakeServer {
    let server = FakeServer::new();
    let seeded = server.execute_script(
        "CREATE TABLE people (id INT PRIMARY KEY AUTO_INCREMENT, name VARCHAR(32) NOT NULL, \
         nick CHAR(8), score DOUBLE);
         INSERT INTO people (name, nick, score) VALUES ('alice', 'al  ', 9.5), ('bob', NULL, 7), \
         ('o\\'brien', 'ob', 8.25)",
    );
    debug_assert!(seeded.is_ok(), "seed script failed: {seeded:?}");
    server
}
