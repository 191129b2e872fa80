use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::client::LedgerClient;
use super::errors::LedgerError;
use super::transaction::{Transaction, TransactionBody, TransactionData};
use super::types::{
    AccountBalance, AccountCredentials, AccountId, FileId, Hbar, PublicKey, TokenId, TokenInfo,
    TransactionId, TransactionReceipt, TransactionResponse,
};
use crate::observability::ledger_metrics;

/// Fee ceiling applied when an operation does not set its own.
pub const DEFAULT_MAX_TRANSACTION_FEE: Hbar = Hbar::new(20);

/// The one connection the workflow uses: a client plus the operator that
/// pays for and co-signs every transaction.
pub struct LedgerSession<C> {
    client: C,
    operator: AccountCredentials,
    default_max_fee: Hbar,
    last_valid_start_nanos: AtomicI64,
}

impl<C: LedgerClient> LedgerSession<C> {
    pub fn new(client: C, operator: AccountCredentials) -> Self {
        Self {
            client,
            operator,
            default_max_fee: DEFAULT_MAX_TRANSACTION_FEE,
            last_valid_start_nanos: AtomicI64::new(0),
        }
    }

    pub fn with_default_max_fee(mut self, fee: Hbar) -> Self {
        self.default_max_fee = fee;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn operator_id(&self) -> AccountId {
        self.operator.account_id
    }

    pub fn operator_public_key(&self) -> PublicKey {
        self.operator.public_key()
    }

    /// Strictly increasing valid-start so two transactions never share an id.
    fn next_transaction_id(&self) -> TransactionId {
        let now = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let previous = self
            .last_valid_start_nanos
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last.saturating_add(1)))
            })
            .unwrap_or(now);
        let nanos = now.max(previous.saturating_add(1));
        TransactionId::new(self.operator.account_id, DateTime::from_timestamp_nanos(nanos))
    }

    /// Assigns a transaction id and fee ceiling; after this the body is fixed
    /// and additional signatures can be attached.
    pub fn freeze(&self, data: TransactionData, max_fee: Option<Hbar>) -> Transaction {
        Transaction::new(TransactionBody {
            transaction_id: self.next_transaction_id(),
            max_transaction_fee: max_fee.unwrap_or(self.default_max_fee),
            data,
        })
    }

    /// Signs as operator and submits. Returns once precheck passed.
    pub async fn execute(&self, transaction: Transaction) -> Result<TransactionResponse, LedgerError> {
        let transaction = transaction.sign(&self.operator.private_key)?;
        let kind = transaction.body.data.kind();
        debug!(
            transaction_id = %transaction.transaction_id(),
            kind,
            signatures = transaction.signatures.len(),
            "Submitting transaction"
        );

        ledger_metrics().record_submission();
        match self.client.submit(transaction).await {
            Ok(response) => Ok(response),
            Err(e) => {
                ledger_metrics().record_failure();
                warn!(kind, error = %e, "Transaction submission rejected");
                Err(e)
            }
        }
    }

    pub async fn receipt(&self, response: &TransactionResponse) -> Result<TransactionReceipt, LedgerError> {
        ledger_metrics().record_receipt();
        let receipt = self.client.get_receipt(&response.transaction_id).await.inspect_err(|_| {
            ledger_metrics().record_failure();
        })?;
        if !receipt.status.is_success() {
            ledger_metrics().record_failure();
        }
        Ok(receipt)
    }

    pub async fn token_info(&self, token_id: TokenId) -> Result<TokenInfo, LedgerError> {
        ledger_metrics().record_query();
        self.client.token_info(token_id).await
    }

    pub async fn account_balance(&self, account_id: AccountId) -> Result<AccountBalance, LedgerError> {
        ledger_metrics().record_query();
        self.client.account_balance(account_id).await
    }

    pub async fn file_contents(&self, file_id: FileId) -> Result<Vec<u8>, LedgerError> {
        ledger_metrics().record_query();
        self.client.file_contents(file_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::client::MockLedgerClient;
    use crate::ledger::transaction::TokenUpdateTransaction;
    use crate::ledger::types::{PrivateKey, Status};

    fn operator() -> AccountCredentials {
        AccountCredentials::new(AccountId::new(0, 0, 2), PrivateKey::generate())
    }

    fn update() -> TransactionData {
        TransactionData::TokenUpdate(TokenUpdateTransaction {
            token_id: TokenId::new(0, 0, 1001),
            supply_key: None,
        })
    }

    #[test]
    fn test_transaction_ids_are_unique_and_increasing() {
        let session = LedgerSession::new(MockLedgerClient::new(), operator());
        let first = session.freeze(update(), None);
        let second = session.freeze(update(), None);

        assert_eq!(first.transaction_id().account_id, AccountId::new(0, 0, 2));
        assert!(second.transaction_id().valid_start > first.transaction_id().valid_start);
        assert_eq!(first.body.max_transaction_fee, DEFAULT_MAX_TRANSACTION_FEE);
    }

    #[tokio::test]
    async fn test_execute_adds_operator_signature() {
        let operator = operator();
        let operator_key = operator.public_key();

        let mut client = MockLedgerClient::new();
        client
            .expect_submit()
            .withf(move |tx| tx.is_signed_by(&operator_key))
            .times(1)
            .returning(|tx| {
                Ok(TransactionResponse {
                    transaction_id: tx.body.transaction_id.clone(),
                    transaction_hash: "00".to_string(),
                })
            });

        let session = LedgerSession::new(client, operator);
        let tx = session.freeze(update(), Some(Hbar::new(2)));
        let response = session.execute(tx).await.unwrap();
        assert_eq!(response.transaction_hash, "00");
    }

    #[tokio::test]
    async fn test_receipt_with_failure_status_is_returned_not_raised() {
        let mut client = MockLedgerClient::new();
        client.expect_get_receipt().returning(|id| {
            Ok(TransactionReceipt::with_status(id.clone(), Status::InsufficientGas))
        });

        let session = LedgerSession::new(client, operator());
        let response = TransactionResponse {
            transaction_id: TransactionId::new(AccountId::new(0, 0, 2), Utc::now()),
            transaction_hash: String::new(),
        };
        let receipt = session.receipt(&response).await.unwrap();
        assert_eq!(receipt.status, Status::InsufficientGas);
    }
}
