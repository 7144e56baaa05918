use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("HTTP {status} while fetching {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Playback session not found: {0}")]
    SessionNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Returns `true` when the error means the target simply does not exist.
    ///
    /// Callers performing idempotent cleanup use this to treat a missing file
    /// or an already-released session as success.
    pub fn is_not_found(&self) -> bool {
        match self {
            BridgeError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            BridgeError::SessionNotFound(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
