use serde::Serialize;
use tracing::{debug, warn};

use super::{Capability, Connection};
use crate::client::{MysqlClient, MysqlConnector};
use crate::error::SqlEmulationError;

/// Cumulative outcomes of automatic reconnects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconnectStats {
    pub auto_reconnects_ok: u64,
    pub auto_reconnects_failed: u64,
}

impl<K: MysqlConnector> Connection<K> {
    /// Re-establish a connection that failed with "server has gone away".
    ///
    /// Only attempted while auto-commit is on and `auto_reconnect` is set;
    /// otherwise returns `false` with the counters untouched. A failed login
    /// leaves the existing client in place.
    pub async fn try_reconnect(&mut self, cause: &SqlEmulationError) -> bool {
        if !cause.is_gone_away() {
            return false;
        }
        if !self.autocommit || !self.options.auto_reconnect {
            debug!(
                autocommit = self.autocommit,
                auto_reconnect = self.options.auto_reconnect,
                "not reconnecting"
            );
            return false;
        }

        match self.connector.connect(&self.params, &self.options).await {
            Ok(client) => {
                let mut stale = std::mem::replace(&mut self.client, client);
                stale.close().await;
                self.capability = Capability::negotiate(self.client.server_version());
                self.generation += 1;
                self.stats.auto_reconnects_ok += 1;
                debug!(generation = self.generation, "reconnected");
                true
            }
            Err(err) => {
                self.stats.auto_reconnects_failed += 1;
                warn!(code = err.code, "reconnect failed: {}", err.message);
                self.last_error.record(&err.into());
                false
            }
        }
    }
}
