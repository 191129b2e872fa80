use thiserror::Error;

use super::types::{Status, TransactionId};

/// Errors raised by a ledger client.
///
/// A receipt carrying a non-success status is *not* an error at this level;
/// callers inspect `TransactionReceipt::status` themselves.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("transaction {transaction_id} failed precheck with status {status}")]
    Precheck {
        transaction_id: TransactionId,
        status: Status,
    },

    #[error("no receipt found for transaction {0}")]
    ReceiptNotFound(TransactionId),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("invalid entity id '{0}', expected shard.realm.num")]
    InvalidEntityId(String),

    #[error("invalid solidity address '{0}'")]
    InvalidAddress(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("unknown network '{0}', expected testnet, previewnet, mainnet or local")]
    UnknownNetwork(String),

    #[error("network '{0}' has no transport in this build; use the local network")]
    UnsupportedNetwork(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("ledger state I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LedgerError {
    /// Status code reported by the network, when the failure carries one.
    pub fn status(&self) -> Option<Status> {
        match self {
            LedgerError::Precheck { status, .. } => Some(*status),
            _ => None,
        }
    }
}
