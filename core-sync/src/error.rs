use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server rejected submission with HTTP {status}")]
    Server { status: u16 },

    #[error("Submission {id} not found")]
    NotFound { id: String },

    #[error("Invalid submission status: {0}")]
    InvalidStatus(String),

    #[error("Invalid submission ID: {0}")]
    InvalidId(String),
}

impl SyncError {
    /// Transient errors leave the record queued and are resolved by a later
    /// sync run; everything else is surfaced to the caller.
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Network(_) | SyncError::Server { .. })
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
