use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::SqlEmulationError;
use crate::rewrite::TypeInference;

/// Login parameters, reused verbatim when reconnecting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectParams {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    /// Unix socket path; takes precedence over host/port when set.
    pub socket: Option<String>,
}

impl ConnectParams {
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    #[must_use]
    pub fn with_socket(mut self, socket: impl Into<String>) -> Self {
        self.socket = Some(socket.into());
        self
    }
}

/// Connection-wide behavior switches.
///
/// Passed explicitly to [`Connection::connect`](crate::connection::Connection::connect);
/// there is no process-wide default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    /// Use binary-protocol prepared statements when the server supports them.
    pub server_prepare: bool,
    /// Stream results instead of buffering them client-side.
    pub use_result: bool,
    pub bind_type_guessing: TypeInference,
    /// Reconnect after "server has gone away" while auto-commit is on.
    pub auto_reconnect: bool,
    /// Trim trailing spaces from fetched text columns.
    pub chop_blanks: bool,
    /// Initial auto-commit mode.
    pub autocommit: bool,
    pub client_found_rows: bool,
    pub compression: bool,
    pub connect_timeout_secs: Option<u64>,
    /// Largest receive buffer allocated up front for a native result column.
    pub fetch_buffer_cap: usize,
}

pub const DEFAULT_FETCH_BUFFER_CAP: usize = 8192;

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            server_prepare: false,
            use_result: false,
            bind_type_guessing: TypeInference::Off,
            auto_reconnect: false,
            chop_blanks: false,
            autocommit: true,
            client_found_rows: false,
            compression: false,
            connect_timeout_secs: None,
            fetch_buffer_cap: DEFAULT_FETCH_BUFFER_CAP,
        }
    }
}

impl ConnectionOptions {
    #[must_use]
    pub fn builder() -> ConnectionOptionsBuilder {
        ConnectionOptionsBuilder::default()
    }

    /// Parse options from a JSON object; missing keys keep their defaults.
    ///
    /// # Errors
    /// Returns `SqlEmulationError::ConfigError` on malformed JSON.
    pub fn from_json(json: &str) -> Result<Self, SqlEmulationError> {
        serde_json::from_str(json)
            .map_err(|e| SqlEmulationError::ConfigError(format!("invalid options: {e}")))
    }

    /// Apply one option by key.
    ///
    /// # Errors
    /// Returns `SqlEmulationError::ConfigError` when `value` is not valid for `key`.
    pub fn set(&mut self, key: OptionKey, value: &str) -> Result<(), SqlEmulationError> {
        match key {
            OptionKey::ServerPrepare => self.server_prepare = parse_flag(key, value)?,
            OptionKey::UseResult => self.use_result = parse_flag(key, value)?,
            OptionKey::BindTypeGuessing => self.bind_type_guessing = parse_inference(value)?,
            OptionKey::AutoReconnect => self.auto_reconnect = parse_flag(key, value)?,
            OptionKey::ChopBlanks => self.chop_blanks = parse_flag(key, value)?,
            OptionKey::ClientFoundRows => self.client_found_rows = parse_flag(key, value)?,
            OptionKey::Compression => self.compression = parse_flag(key, value)?,
            OptionKey::ConnectTimeout => {
                self.connect_timeout_secs = Some(parse_number(key, value)?);
            }
            OptionKey::FetchBufferCap => {
                let cap = parse_number(key, value)?;
                self.fetch_buffer_cap = usize::try_from(cap).map_err(|_| {
                    SqlEmulationError::ConfigError(format!("{key}: {value} out of range"))
                })?;
            }
        }
        Ok(())
    }

    /// Apply an option given by its attribute name, e.g. `mysql_server_prepare`.
    ///
    /// # Errors
    /// Returns `SqlEmulationError::ConfigError` for unknown names or bad values.
    pub fn set_named(&mut self, name: &str, value: &str) -> Result<(), SqlEmulationError> {
        self.set(name.parse()?, value)
    }
}

/// Fluent builder for [`ConnectionOptions`].
#[derive(Debug, Clone, Default)]
pub struct ConnectionOptionsBuilder {
    opts: ConnectionOptions,
}

impl ConnectionOptionsBuilder {
    #[must_use]
    pub fn server_prepare(mut self, on: bool) -> Self {
        self.opts.server_prepare = on;
        self
    }

    #[must_use]
    pub fn use_result(mut self, on: bool) -> Self {
        self.opts.use_result = on;
        self
    }

    #[must_use]
    pub fn bind_type_guessing(mut self, inference: TypeInference) -> Self {
        self.opts.bind_type_guessing = inference;
        self
    }

    #[must_use]
    pub fn auto_reconnect(mut self, on: bool) -> Self {
        self.opts.auto_reconnect = on;
        self
    }

    #[must_use]
    pub fn chop_blanks(mut self, on: bool) -> Self {
        self.opts.chop_blanks = on;
        self
    }

    #[must_use]
    pub fn autocommit(mut self, on: bool) -> Self {
        self.opts.autocommit = on;
        self
    }

    #[must_use]
    pub fn client_found_rows(mut self, on: bool) -> Self {
        self.opts.client_found_rows = on;
        self
    }

    #[must_use]
    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.opts.connect_timeout_secs = Some(secs);
        self
    }

    #[must_use]
    pub fn fetch_buffer_cap(mut self, cap: usize) -> Self {
        self.opts.fetch_buffer_cap = cap;
        self
    }

    #[must_use]
    pub fn finish(self) -> ConnectionOptions {
        self.opts
    }
}

/// The closed set of recognized option names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionKey {
    ServerPrepare,
    UseResult,
    BindTypeGuessing,
    AutoReconnect,
    ChopBlanks,
    ClientFoundRows,
    Compression,
    ConnectTimeout,
    FetchBufferCap,
}

impl OptionKey {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            OptionKey::ServerPrepare => "mysql_server_prepare",
            OptionKey::UseResult => "mysql_use_result",
            OptionKey::BindTypeGuessing => "mysql_bind_type_guessing",
            OptionKey::AutoReconnect => "mysql_auto_reconnect",
            OptionKey::ChopBlanks => "ChopBlanks",
            OptionKey::ClientFoundRows => "mysql_client_found_rows",
            OptionKey::Compression => "mysql_compression",
            OptionKey::ConnectTimeout => "mysql_connect_timeout",
            OptionKey::FetchBufferCap => "mysql_fetch_buffer_cap",
        }
    }
}

impl std::fmt::Display for OptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OptionKey {
    type Err = SqlEmulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = match s {
            "mysql_server_prepare" => OptionKey::ServerPrepare,
            "mysql_use_result" => OptionKey::UseResult,
            "mysql_bind_type_guessing" | "mysql_unsafe_bind_type_guessing" => {
                OptionKey::BindTypeGuessing
            }
            "mysql_auto_reconnect" => OptionKey::AutoReconnect,
            "ChopBlanks" | "chop_blanks" => OptionKey::ChopBlanks,
            "mysql_client_found_rows" => OptionKey::ClientFoundRows,
            "mysql_compression" => OptionKey::Compression,
            "mysql_connect_timeout" => OptionKey::ConnectTimeout,
            "mysql_fetch_buffer_cap" => OptionKey::FetchBufferCap,
            other => {
                return Err(SqlEmulationError::ConfigError(format!(
                    "unknown option: {other}"
                )));
            }
        };
        Ok(key)
    }
}

fn parse_flag(key: OptionKey, value: &str) -> Result<bool, SqlEmulationError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" | "" => Ok(false),
        other => Err(SqlEmulationError::ConfigError(format!(
            "{key}: expected a boolean, got {other:?}"
        ))),
    }
}

fn parse_number(key: OptionKey, value: &str) -> Result<u64, SqlEmulationError> {
    value.trim().parse().map_err(|_| {
        SqlEmulationError::ConfigError(format!("{key}: expected a number, got {value:?}"))
    })
}

fn parse_inference(value: &str) -> Result<TypeInference, SqlEmulationError> {
    match value.trim() {
        "0" => Ok(TypeInference::Off),
        "1" => Ok(TypeInference::Lenient),
        "2" => Ok(TypeInference::Strict),
        other => <TypeInference as ValueEnum>::from_str(other, true).map_err(|e| {
            SqlEmulationError::ConfigError(format!("{}: {e}", OptionKey::BindTypeGuessing))
        }),
    }
}

/// Per-statement overrides of the connection options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatementOptions {
    pub server_prepare: Option<bool>,
    pub use_result: Option<bool>,
    pub chop_blanks: Option<bool>,
}

impl StatementOptions {
    #[must_use]
    pub fn with_server_prepare(mut self, on: bool) -> Self {
        self.server_prepare = Some(on);
        self
    }

    #[must_use]
    pub fn with_use_result(mut self, on: bool) -> Self {
        self.use_result = Some(on);
        self
    }

    #[must_use]
    pub fn with_chop_blanks(mut self, on: bool) -> Self {
        self.chop_blanks = Some(on);
        self
    }

    /// Effective settings relative to the connection defaults.
    #[must_use]
    pub fn resolve(self, defaults: &ConnectionOptions) -> ResolvedStatementOptions {
        ResolvedStatementOptions {
            server_prepare: self.server_prepare.unwrap_or(defaults.server_prepare),
            use_result: self.use_result.unwrap_or(defaults.use_result),
            chop_blanks: self.chop_blanks.unwrap_or(defaults.chop_blanks),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedStatementOptions {
    pub server_prepare: bool,
    pub use_result: bool,
    pub chop_blanks: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = ConnectionOptions::default();
        assert!(opts.autocommit);
        assert!(!opts.server_prepare);
        assert_eq!(opts.fetch_buffer_cap, DEFAULT_FETCH_BUFFER_CAP);
    }

    #[test]
    fn named_options_validate_values() {
        let mut opts = ConnectionOptions::default();
        opts.set_named("mysql_server_prepare", "1").expect("flag");
        opts.set_named("mysql_bind_type_guessing", "strict").expect("inference");
        opts.set_named("mysql_unsafe_bind_type_guessing", "1").expect("alias");
        opts.set_named("ChopBlanks", "on").expect("chop");
        assert!(opts.server_prepare);
        assert!(opts.chop_blanks);
        assert_eq!(opts.bind_type_guessing, TypeInference::Lenient);

        assert!(matches!(
            opts.set_named("mysql_auto_reconnect", "maybe"),
            Err(SqlEmulationError::ConfigError(_))
        ));
        opts.set_named("mysql_bind_type_guessing", "STRICT").expect("case-insensitive name");
        assert_eq!(opts.bind_type_guessing, TypeInference::Strict);
        assert!(matches!(
            opts.set_named("mysql_bind_type_guessing", "sometimes"),
            Err(SqlEmulationError::ConfigError(_))
        ));
        assert!(matches!(
            opts.set_named("mysql_no_such_thing", "1"),
            Err(SqlEmulationError::ConfigError(_))
        ));
    }

    #[test]
    fn json_round_trip_keeps_defaults() {
        let opts = ConnectionOptions::from_json(r#"{"auto_reconnect": true, "bind_type_guessing": "strict"}"#)
            .expect("json");
        assert!(opts.auto_reconnect);
        assert_eq!(opts.bind_type_guessing, TypeInference::Strict);
        assert!(opts.autocommit);
        assert!(ConnectionOptions::from_json("{").is_err());
    }

    #[test]
    fn statement_overrides() {
        let defaults = ConnectionOptions::builder().server_prepare(true).finish();
        let resolved = StatementOptions::default().with_use_result(true).resolve(&defaults);
        assert!(resolved.server_prepare);
        assert!(resolved.use_result);
        assert!(!resolved.chop_blanks);
    }
}
