//! Ledger collaborator: the types the workflow exchanges with the network,
//! the client trait it talks through, and the local simulated ledger.

pub mod abi;
pub mod client;
pub mod errors;
pub mod network;
pub mod session;
pub mod simulated;
pub mod throttle;
pub mod transaction;
pub mod types;

pub use abi::ContractFunctionParameters;
pub use client::LedgerClient;
pub use errors::LedgerError;
pub use network::{connect, ConnectOptions, Network};
pub use session::LedgerSession;
pub use simulated::SimulatedLedger;
pub use throttle::ThrottledClient;
pub use transaction::{Transaction, TransactionData};
pub use types::{
    AccountBalance, AccountCredentials, AccountId, ContractId, FileId, Hbar, Key, PrivateKey, PublicKey,
    Status, TokenId, TokenInfo, TransactionId, TransactionReceipt, TransactionResponse,
};
