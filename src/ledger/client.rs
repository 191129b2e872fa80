use std::sync::Arc;

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::errors::LedgerError;
use super::transaction::Transaction;
use super::types::{AccountBalance, AccountId, FileId, TokenId, TokenInfo, TransactionId, TransactionReceipt, TransactionResponse};

/// The ledger network as seen by the workflow.
///
/// Queries are idempotent. State changes follow submit-then-fetch-receipt:
/// `submit` returns once the transaction passed precheck, `get_receipt`
/// returns the finalized outcome. A receipt with a non-success status is
/// returned as `Ok`; deciding what that means is the caller's job.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn submit(&self, transaction: Transaction) -> Result<TransactionResponse, LedgerError>;

    async fn get_receipt(&self, transaction_id: &TransactionId) -> Result<TransactionReceipt, LedgerError>;

    async fn token_info(&self, token_id: TokenId) -> Result<TokenInfo, LedgerError>;

    async fn account_balance(&self, account_id: AccountId) -> Result<AccountBalance, LedgerError>;

    async fn file_contents(&self, file_id: FileId) -> Result<Vec<u8>, LedgerError>;
}

#[async_trait]
impl<T: LedgerClient + ?Sized> LedgerClient for Arc<T> {
    async fn submit(&self, transaction: Transaction) -> Result<TransactionResponse, LedgerError> {
        (**self).submit(transaction).await
    }

    async fn get_receipt(&self, transaction_id: &TransactionId) -> Result<TransactionReceipt, LedgerError> {
        (**self).get_receipt(transaction_id).await
    }

    async fn token_info(&self, token_id: TokenId) -> Result<TokenInfo, LedgerError> {
        (**self).token_info(token_id).await
    }

    async fn account_balance(&self, account_id: AccountId) -> Result<AccountBalance, LedgerError> {
        (**self).account_balance(account_id).await
    }

    async fn file_contents(&self, file_id: FileId) -> Result<Vec<u8>, LedgerError> {
        (**self).file_contents(file_id).await
    }
}
