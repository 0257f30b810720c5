use thiserror::Error;

/// Numeric codes recorded on a handle's last-error slot.
///
/// Driver-detected conditions use the small `JW_ERR_*` / `TX_ERR_*` range; the
/// client-library codes below are the ones the engine reacts to.
pub mod codes {
    pub const JW_ERR_CONNECT: u32 = 1;
    pub const JW_ERR_NOT_ACTIVE: u32 = 4;
    pub const JW_ERR_QUERY: u32 = 5;
    pub const JW_ERR_NOT_IMPLEMENTED: u32 = 15;
    pub const JW_ERR_ILLEGAL_PARAM_NUM: u32 = 16;
    pub const JW_ERR_MEM: u32 = 17;
    pub const JW_ERR_SEQUENCE: u32 = 19;
    pub const TX_ERR_AUTOCOMMIT: u32 = 20;

    /// Server has gone away; the only condition that triggers reconnect.
    pub const CR_SERVER_GONE_ERROR: u32 = 2006;
    pub const CR_SERVER_LOST: u32 = 2013;
    /// The server cannot prepare this statement through the binary protocol.
    pub const ER_UNSUPPORTED_PS: u32 = 1295;
}

/// A failure reported by the client library as a `(code, message)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("server error {code}: {message}")]
pub struct ServerError {
    pub code: u32,
    pub message: String,
}

impl ServerError {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn gone_away() -> Self {
        Self::new(codes::CR_SERVER_GONE_ERROR, "MySQL server has gone away")
    }

    #[must_use]
    pub fn is_gone_away(&self) -> bool {
        self.code == codes::CR_SERVER_GONE_ERROR
    }

    #[must_use]
    pub fn is_unsupported_prepare(&self) -> bool {
        self.code == codes::ER_UNSUPPORTED_PS
    }
}

#[derive(Debug, Error)]
pub enum SqlEmulationError {
    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("Sequence error: {0}")]
    Sequence(String),

    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    #[error("Illegal parameter number: {position}")]
    IllegalParam { position: usize },

    #[error("Statement not active: {0}")]
    NotActive(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Unimplemented feature: {0}")]
    NotImplemented(String),

    #[error("Autocommit error: {0}")]
    Autocommit(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),
}

impl SqlEmulationError {
    /// Numeric code recorded on the handle for this failure.
    #[must_use]
    pub fn code(&self) -> u32 {
        match self {
            SqlEmulationError::Server(err) => err.code,
            SqlEmulationError::Sequence(_) => codes::JW_ERR_SEQUENCE,
            SqlEmulationError::OutOfMemory(_) => codes::JW_ERR_MEM,
            SqlEmulationError::IllegalParam { .. } => codes::JW_ERR_ILLEGAL_PARAM_NUM,
            SqlEmulationError::NotActive(_) => codes::JW_ERR_NOT_ACTIVE,
            SqlEmulationError::Query(_) => codes::JW_ERR_QUERY,
            SqlEmulationError::NotImplemented(_) => codes::JW_ERR_NOT_IMPLEMENTED,
            SqlEmulationError::Autocommit(_) => codes::TX_ERR_AUTOCOMMIT,
            SqlEmulationError::ConfigError(_) | SqlEmulationError::ConnectionError(_) => {
                codes::JW_ERR_CONNECT
            }
        }
    }

    #[must_use]
    pub fn is_gone_away(&self) -> bool {
        matches!(self, SqlEmulationError::Server(err) if err.is_gone_away())
    }

    pub(crate) fn sequence(message: impl Into<String>) -> Self {
        SqlEmulationError::Sequence(message.into())
    }
}

/// Two-tier error state persisted on a handle until the next operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastError {
    pub code: u32,
    pub message: String,
    /// Recorded without failing the operation.
    pub warning: bool,
}

/// Per-handle "last error" slot.
///
/// Every operation clears the slot on entry and records its failure (or
/// warning) before returning, so the state always describes the most recent
/// call on that handle.
#[derive(Debug, Clone, Default)]
pub struct ErrorSlot {
    last: Option<LastError>,
}

impl ErrorSlot {
    pub fn clear(&mut self) {
        self.last = None;
    }

    pub fn record(&mut self, err: &SqlEmulationError) {
        self.last = Some(LastError {
            code: err.code(),
            message: err.to_string(),
            warning: false,
        });
    }

    pub fn warn(&mut self, code: u32, message: impl Into<String>) {
        self.last = Some(LastError {
            code,
            message: message.into(),
            warning: true,
        });
    }

    /// Record the error side of `result`, passing it through unchanged.
    ///
    /// # Errors
    /// Returns `result`'s error after recording it.
    pub fn track<T>(&mut self, result: Result<T, SqlEmulationError>) -> Result<T, SqlEmulationError> {
        if let Err(err) = &result {
            self.record(err);
        }
        result
    }

    #[must_use]
    pub fn get(&self) -> Option<&LastError> {
        self.last.as_ref()
    }

    /// `0` when the last operation succeeded without warnings.
    #[must_use]
    pub fn code(&self) -> u32 {
        self.last.as_ref().map_or(0, |e| e.code)
    }

    #[must_use]
    pub fn message(&self) -> &str {
        self.last.as_ref().map_or("", |e| e.message.as_str())
    }
}
