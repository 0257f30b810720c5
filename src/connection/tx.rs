use super::Connection;
use crate::client::{MysqlClient, MysqlConnector};
use crate::error::{ServerError, SqlEmulationError, codes};
use crate::tx_outcome::TxOutcome;

impl<K: MysqlConnector> Connection<K> {
    /// Commit the current transaction.
    ///
    /// Under auto-commit nothing is sent; a warning is recorded instead.
    ///
    /// # Errors
    /// Returns the server's error if the commit fails.
    pub async fn commit(&mut self) -> Result<TxOutcome, SqlEmulationError> {
        self.last_error.clear();
        if self.autocommit {
            self.last_error.warn(
                codes::TX_ERR_AUTOCOMMIT,
                "Commit ineffective while AutoCommit is on",
            );
            return Ok(TxOutcome::IneffectiveAutocommit);
        }
        let result = self
            .client
            .commit()
            .await
            .map(|()| TxOutcome::Applied)
            .map_err(SqlEmulationError::from);
        self.last_error.track(result)
    }

    /// Roll back the current transaction.
    ///
    /// # Errors
    /// Returns the server's error if the rollback fails.
    pub async fn rollback(&mut self) -> Result<TxOutcome, SqlEmulationError> {
        self.last_error.clear();
        if self.autocommit {
            self.last_error.warn(
                codes::TX_ERR_AUTOCOMMIT,
                "Rollback ineffective while AutoCommit is on",
            );
            return Ok(TxOutcome::IneffectiveAutocommit);
        }
        let result = self
            .client
            .rollback()
            .await
            .map(|()| TxOutcome::Applied)
            .map_err(SqlEmulationError::from);
        self.last_error.track(result)
    }

    /// Switch auto-commit. Turning it off also disables automatic reconnects
    /// until it is turned back on.
    ///
    /// A connection lost while auto-commit is still on is re-established
    /// before the switch, as for any other statement.
    ///
    /// # Errors
    /// Returns [`SqlEmulationError::Autocommit`] if the server refuses the
    /// switch, or the connection error if the session is gone.
    pub async fn set_autocommit(&mut self, on: bool) -> Result<(), SqlEmulationError> {
        self.last_error.clear();
        if on == self.autocommit {
            return Ok(());
        }
        let mut result = self.client.set_autocommit(on).await.map_err(SqlEmulationError::from);
        if let Err(err) = &result
            && self.try_reconnect(err).await
        {
            result = self.client.set_autocommit(on).await.map_err(SqlEmulationError::from);
        }
        if result.is_ok() {
            self.autocommit = on;
        }
        self.last_error.track(result.map_err(autocommit_failure))
    }
}

/// Connection loss stays a server error so callers still see it as such.
fn autocommit_failure(err: SqlEmulationError) -> SqlEmulationError {
    match err {
        SqlEmulationError::Server(server) if !is_connection_loss(&server) => {
            SqlEmulationError::Autocommit(format!("Turning on/off AutoCommit failed: {}", server.message))
        }
        other => other,
    }
}

fn is_connection_loss(err: &ServerError) -> bool {
    err.is_gone_away() || err.code == codes::CR_SERVER_LOST
}
