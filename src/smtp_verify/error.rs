use thiserror::Error;

use super::types::SessionState;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("connection to {host} failed: {source}")]
    Connect {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("connection to {host} timed out")]
    ConnectTimeout { host: String },
    #[error("timed out waiting for the server in state {state:?}")]
    Timeout { state: SessionState },
    #[error("I/O error: {source}")]
    Io {
        #[source]
        source: std::io::Error,
    },
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl SessionError {
    pub(crate) fn io(source: std::io::Error) -> Self {
        Self::Io { source }
    }
}
