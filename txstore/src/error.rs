use serde::{Deserialize, Serialize};

/// The two uniqueness constraints declared on the transaction collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UniqueIndex {
    TxId,
    NonceSigner,
}

impl std::fmt::Display for UniqueIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UniqueIndex::TxId => write!(f, "txId"),
            UniqueIndex::NonceSigner => write!(f, "nonceSigner"),
        }
    }
}

#[derive(Debug, thiserror::Error, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "errorCode")]
pub enum TxStoreError {
    #[error("Invalid transaction record: {message}")]
    ValidationError { message: String },

    #[error("Unique constraint on {index} violated for key {key}")]
    DuplicateKey { index: UniqueIndex, key: String },

    #[error("Storage error - durable tracking compromised: {message}")]
    StorageIoError { message: String },

    #[error("Serialization error: {message}")]
    SerializationError { message: String },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl TxStoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        TxStoreError::ValidationError {
            message: message.into(),
        }
    }

    /// Errors after which the store can no longer vouch for what it has recorded.
    ///
    /// Callers should stop submitting for the affected signers rather than retry.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TxStoreError::StorageIoError { .. }
                | TxStoreError::SerializationError { .. }
                | TxStoreError::InternalError { .. }
        )
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, TxStoreError::DuplicateKey { .. })
    }
}

impl From<sled::Error> for TxStoreError {
    fn from(error: sled::Error) -> Self {
        TxStoreError::StorageIoError {
            message: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for TxStoreError {
    fn from(error: serde_json::Error) -> Self {
        TxStoreError::SerializationError {
            message: error.to_string(),
        }
    }
}

impl From<tokio::task::JoinError> for TxStoreError {
    fn from(error: tokio::task::JoinError) -> Self {
        TxStoreError::InternalError {
            message: format!("storage task failed: {error}"),
        }
    }
}

impl From<sled::transaction::TransactionError<TxStoreError>> for TxStoreError {
    fn from(error: sled::transaction::TransactionError<TxStoreError>) -> Self {
        match error {
            sled::transaction::TransactionError::Abort(inner) => inner,
            sled::transaction::TransactionError::Storage(e) => e.into(),
        }
    }
}
