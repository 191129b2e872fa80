use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};
use tracing::debug;

use super::client::LedgerClient;
use super::errors::LedgerError;
use super::transaction::Transaction;
use super::types::{AccountBalance, AccountId, FileId, TokenId, TokenInfo, TransactionId, TransactionReceipt, TransactionResponse};

/// Paces every request to the wrapped client. Public networks throttle
/// per-account submissions; waiting here keeps the workflow under that
/// quota without reordering anything.
pub struct ThrottledClient<C> {
    inner: C,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl<C: LedgerClient> ThrottledClient<C> {
    pub fn new(inner: C, requests_per_second: NonZeroU32) -> Self {
        let quota = Quota::per_second(requests_per_second);
        Self {
            inner,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    async fn wait_turn(&self) {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(50)))
            .await;
        debug!("Ledger request admitted by rate limiter");
    }
}

#[async_trait]
impl<C: LedgerClient> LedgerClient for ThrottledClient<C> {
    async fn submit(&self, transaction: Transaction) -> Result<TransactionResponse, LedgerError> {
        self.wait_turn().await;
        self.inner.submit(transaction).await
    }

    async fn get_receipt(&self, transaction_id: &TransactionId) -> Result<TransactionReceipt, LedgerError> {
        self.wait_turn().await;
        self.inner.get_receipt(transaction_id).await
    }

    async fn token_info(&self, token_id: TokenId) -> Result<TokenInfo, LedgerError> {
        self.wait_turn().await;
        self.inner.token_info(token_id).await
    }

    async fn account_balance(&self, account_id: AccountId) -> Result<AccountBalance, LedgerError> {
        self.wait_turn().await;
        self.inner.account_balance(account_id).await
    }

    async fn file_contents(&self, file_id: FileId) -> Result<Vec<u8>, LedgerError> {
        self.wait_turn().await;
        self.inner.file_contents(file_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::client::MockLedgerClient;

    #[tokio::test]
    async fn test_requests_pass_through_in_order() {
        let mut inner = MockLedgerClient::new();
        let mut sequence = mockall::Sequence::new();
        inner
            .expect_file_contents()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Ok(vec![1]));
        inner
            .expect_file_contents()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Ok(vec![2]));

        let client = ThrottledClient::new(inner, NonZeroU32::new(1000).unwrap());
        let file = FileId::new(0, 0, 1001);
        assert_eq!(client.file_contents(file).await.unwrap(), vec![1]);
        assert_eq!(client.file_contents(file).await.unwrap(), vec![2]);
    }
}
