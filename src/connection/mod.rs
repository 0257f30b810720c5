//! A single client connection plus the state the emulation layer keeps for it.

mod reconnect;
mod tx;

pub use reconnect::ReconnectStats;

use tracing::{debug, warn};

use crate::catalog::{self, TypeDescriptor};
use crate::client::{MysqlClient, MysqlConnector};
use crate::config::{ConnectParams, ConnectionOptions, StatementOptions};
use crate::error::{ErrorSlot, LastError, SqlEmulationError};
use crate::executor;
use crate::statement::Statement;
use crate::types::{RowCount, RowValues, SqlType};

/// First server version with usable binary-protocol prepared statements (4.1.3).
pub const SERVER_PREPARE_VERSION: u32 = 40103;

/// What the connected server can do, negotiated once per login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    pub server_version: u32,
    pub native_prepare: bool,
}

impl Capability {
    #[must_use]
    pub fn negotiate(server_version: u32) -> Self {
        Self {
            server_version,
            native_prepare: server_version >= SERVER_PREPARE_VERSION,
        }
    }
}

/// One live connection. Every operation takes `&mut self`, so at most one
/// statement is in flight at a time.
pub struct Connection<K: MysqlConnector> {
    connector: K,
    pub(crate) client: K::Client,
    params: ConnectParams,
    pub(crate) options: ConnectionOptions,
    pub(crate) autocommit: bool,
    pub(crate) capability: Capability,
    /// Bumped on every successful reconnect; server-side handles from an
    /// older generation are gone.
    pub(crate) generation: u64,
    pub(crate) stats: ReconnectStats,
    pub(crate) last_error: ErrorSlot,
    pub(crate) last_insert_id: u64,
}

impl<K: MysqlConnector> std::fmt::Debug for Connection<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("params", &self.params)
            .field("options", &self.options)
            .field("autocommit", &self.autocommit)
            .field("capability", &self.capability)
            .field("generation", &self.generation)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<K: MysqlConnector> Connection<K> {
    /// Log in and negotiate capabilities.
    ///
    /// # Errors
    /// Returns the client library's error when login fails, or when the
    /// initial auto-commit mode cannot be applied.
    pub async fn connect(
        connector: K,
        params: ConnectParams,
        options: ConnectionOptions,
    ) -> Result<Self, SqlEmulationError> {
        let mut client = connector.connect(&params, &options).await?;
        if !options.autocommit {
            client.set_autocommit(false).await?;
        }
        let capability = Capability::negotiate(client.server_version());
        debug!(
            server_version = capability.server_version,
            native_prepare = capability.native_prepare,
            "connected"
        );
        Ok(Self {
            connector,
            client,
            autocommit: options.autocommit,
            params,
            options,
            capability,
            generation: 0,
            stats: ReconnectStats::default(),
            last_error: ErrorSlot::default(),
            last_insert_id: 0,
        })
    }

    /// Prepare `sql`, choosing the execution mode for its lifetime.
    ///
    /// # Errors
    /// Returns the server's error if native prepare fails for any reason other
    /// than the statement being unsupported by the binary protocol.
    pub async fn prepare(
        &mut self,
        sql: &str,
        options: StatementOptions,
    ) -> Result<Statement, SqlEmulationError> {
        self.last_error.clear();
        let result = executor::prepare(self, sql, options).await;
        self.last_error.track(result)
    }

    /// Prepare, bind `params` positionally, execute, and finish in one call.
    /// Returns the affected-row count (or row count for a SELECT).
    ///
    /// # Errors
    /// Propagates any prepare, bind, or execute failure.
    pub async fn do_statement(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<RowCount, SqlEmulationError> {
        let mut stmt = self.prepare(sql, StatementOptions::default()).await?;
        let result = self.run_bound(&mut stmt, params).await;
        let destroyed = stmt.destroy(self).await;
        match (result, destroyed) {
            (Err(err), destroyed) => {
                if let Err(close) = destroyed {
                    warn!(code = close.code(), "releasing failed statement: {close}");
                }
                self.last_error.record(&err);
                Err(err)
            }
            (Ok(_), Err(close)) => {
                self.last_error.record(&close);
                Err(close)
            }
            (Ok(count), Ok(())) => Ok(count),
        }
    }

    async fn run_bound(
        &mut self,
        stmt: &mut Statement,
        params: &[RowValues],
    ) -> Result<RowCount, SqlEmulationError> {
        for (idx, value) in params.iter().enumerate() {
            stmt.bind(idx + 1, value.clone(), None)?;
        }
        let outcome = stmt.execute(self).await?;
        if outcome.has_result_set {
            stmt.finish(self).await?;
        }
        Ok(outcome.rows)
    }

    /// Render `value` as a SQL literal.
    ///
    /// NULL becomes `NULL`. With a type hint whose catalog entry has no
    /// literal prefix (numbers), the value is never quoted and `None` is
    /// returned so the caller uses it as-is. Text that is not valid UTF-8 after
    /// escaping is rendered as a `0x` hex literal.
    #[must_use]
    pub fn quote(&self, value: &RowValues, type_hint: Option<SqlType>) -> Option<String> {
        let Some(text) = value.to_text() else {
            return Some("NULL".to_string());
        };
        if let Some(hint) = type_hint
            && let Some(descriptor) = catalog::descriptor_for_sql_type(hint)
            && descriptor.literal_prefix.is_none()
        {
            return None;
        }
        let escaped = self.client.escape_string(&text);
        match String::from_utf8(escaped) {
            Ok(s) => Some(format!("'{s}'")),
            Err(_) => Some(hex_literal(&text)),
        }
    }

    pub async fn disconnect(mut self) {
        self.client.close().await;
    }

    #[must_use]
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    #[must_use]
    pub fn capability(&self) -> Capability {
        self.capability
    }

    #[must_use]
    pub fn autocommit(&self) -> bool {
        self.autocommit
    }

    #[must_use]
    pub fn stats(&self) -> ReconnectStats {
        self.stats
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&LastError> {
        self.last_error.get()
    }

    /// Id generated by the most recent INSERT on this connection.
    #[must_use]
    pub fn last_insert_id(&self) -> u64 {
        self.last_insert_id
    }

    #[must_use]
    pub fn server_info(&self) -> String {
        self.client.server_info()
    }

    #[must_use]
    pub fn host_info(&self) -> String {
        self.client.host_info()
    }

    #[must_use]
    pub fn proto_info(&self) -> u32 {
        self.client.proto_info()
    }

    #[must_use]
    pub fn thread_id(&self) -> u64 {
        self.client.thread_id()
    }

    #[must_use]
    pub fn info(&self) -> Option<String> {
        self.client.info()
    }

    /// Server status line.
    ///
    /// # Errors
    /// Returns the server's error if the status request fails.
    pub async fn stat(&mut self) -> Result<String, SqlEmulationError> {
        self.last_error.clear();
        let result = self.client.stat().await.map_err(SqlEmulationError::from);
        self.last_error.track(result)
    }

    pub fn type_info_all(&self) -> impl Iterator<Item = &'static TypeDescriptor> {
        catalog::type_info_all()
    }

    /// Mutable access to the connection options for attribute-style updates.
    pub fn options_mut(&mut self) -> &mut ConnectionOptions {
        &mut self.options
    }
}

fn hex_literal(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("0x");
    for b in bytes {
        let _ = write!(out, "{b:02X}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_threshold() {
        assert!(!Capability::negotiate(40102).native_prepare);
        assert!(Capability::negotiate(40103).native_prepare);
        assert!(Capability::negotiate(80036).native_prepare);
    }

    #[test]
    fn hex_literals() {
        assert_eq!(hex_literal(&[0xff, 0x00, 0x1a]), "0xFF001A");
        assert_eq!(hex_literal(&[]), "0x");
    }
}
