//! In-process ledger for the `local` network.
//!
//! Honours the `LedgerClient` contract: prechecks at submission, immediate
//! finalization, receipts with status codes, and the per-entity signing
//! rules the workflow depends on. Deployed contracts all behave as the
//! mint/associate/transfer token manager; no bytecode is interpreted.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::abi::{AbiWords, ASSOCIATE_FUNCTION, MINT_FUNCTION, TRANSFER_FUNCTION};
use super::client::LedgerClient;
use super::errors::LedgerError;
use super::transaction::{
    ContractCreateTransaction, ContractExecuteTransaction, FileAppendTransaction, FileCreateTransaction,
    TokenCreateTransaction, TokenUpdateTransaction, Transaction, TransactionData,
};
use super::types::{
    AccountBalance, AccountId, ContractId, FileId, Hbar, Key, PublicKey, Status, TokenId, TokenInfo,
    TransactionId, TransactionReceipt, TransactionResponse,
};

/// Largest variable-length payload one transaction may carry.
pub const MAX_TRANSACTION_PAYLOAD_BYTES: usize = 6144;

pub const FIRST_ENTITY_NUM: u64 = 1001;

/// Deploy cost is priced so that the largest uploadable bytecode (10 chunks
/// of 4096 bytes) deploys within the default 3,000,000 gas ceiling.
pub const DEPLOY_BASE_GAS: u64 = 100_000;
pub const DEPLOY_GAS_PER_BYTE: u64 = 64;
pub const TOKEN_SERVICE_CALL_GAS: u64 = 100_000;

fn required_fee(data: &TransactionData) -> Hbar {
    match data {
        TransactionData::TokenCreate(_) => Hbar::new(1),
        TransactionData::ContractCreate(_) => Hbar::new(1),
        TransactionData::FileCreate(_) | TransactionData::FileAppend(_) => Hbar::from_tinybars(5_000_000),
        TransactionData::ContractExecute(_) => Hbar::from_tinybars(5_000_000),
        TransactionData::TokenUpdate(_) => Hbar::from_tinybars(100_000),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AccountRecord {
    key: PublicKey,
    balance: Hbar,
    tokens: BTreeMap<TokenId, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenRecord {
    name: String,
    symbol: String,
    decimals: u32,
    total_supply: u64,
    treasury: AccountId,
    admin_key: Option<Key>,
    supply_key: Option<Key>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileRecord {
    keys: Vec<Key>,
    #[serde(with = "hex")]
    contents: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ContractRecord {
    bytecode_file: FileId,
    bytecode_hash: String,
    token: TokenId,
}

/// Entity ids produced by a successful operation, copied onto its receipt.
#[derive(Debug, Default)]
struct Outcome {
    token_id: Option<TokenId>,
    file_id: Option<FileId>,
    contract_id: Option<ContractId>,
    total_supply: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LedgerState {
    network: String,
    next_entity_num: u64,
    accounts: BTreeMap<AccountId, AccountRecord>,
    tokens: BTreeMap<TokenId, TokenRecord>,
    files: BTreeMap<FileId, FileRecord>,
    contracts: BTreeMap<ContractId, ContractRecord>,
    receipts: BTreeMap<String, TransactionReceipt>,
}

impl LedgerState {
    fn new(network: &str) -> Self {
        Self {
            network: network.to_string(),
            next_entity_num: FIRST_ENTITY_NUM,
            accounts: BTreeMap::new(),
            tokens: BTreeMap::new(),
            files: BTreeMap::new(),
            contracts: BTreeMap::new(),
            receipts: BTreeMap::new(),
        }
    }

    fn allocate_num(&mut self) -> u64 {
        let num = self.next_entity_num;
        self.next_entity_num += 1;
        num
    }

    fn insert_account(&mut self, account_id: AccountId, key: PublicKey, balance: Hbar) -> bool {
        if self.accounts.contains_key(&account_id) {
            return false;
        }
        self.accounts.insert(
            account_id,
            AccountRecord {
                key,
                balance,
                tokens: BTreeMap::new(),
            },
        );
        if account_id.num >= self.next_entity_num {
            self.next_entity_num = account_id.num + 1;
        }
        true
    }

    fn precheck(&self, transaction: &Transaction) -> Result<(), Status> {
        let body = &transaction.body;
        let payer = self
            .accounts
            .get(&body.transaction_id.account_id)
            .ok_or(Status::PayerAccountNotFound)?;

        if !transaction.verify_signatures().unwrap_or(false) || !transaction.is_signed_by(&payer.key) {
            return Err(Status::InvalidSignature);
        }
        if self.receipts.contains_key(&body.transaction_id.to_string()) {
            return Err(Status::DuplicateTransaction);
        }
        if body.data.payload_len() > MAX_TRANSACTION_PAYLOAD_BYTES {
            return Err(Status::TransactionOversize);
        }

        let fee = required_fee(&body.data);
        if body.max_transaction_fee < fee {
            return Err(Status::InsufficientTxFee);
        }
        if payer.balance < fee {
            return Err(Status::InsufficientPayerBalance);
        }
        Ok(())
    }

    fn charge_fee(&mut self, transaction: &Transaction) {
        let fee = required_fee(&transaction.body.data);
        if let Some(payer) = self.accounts.get_mut(&transaction.body.transaction_id.account_id) {
            payer.balance = payer.balance.checked_sub(fee).unwrap_or(Hbar::ZERO);
        }
    }

    fn apply(&mut self, transaction: &Transaction) -> TransactionReceipt {
        let transaction_id = transaction.transaction_id().clone();
        let signers: BTreeSet<PublicKey> = transaction.signers().copied().collect();

        let outcome = match &transaction.body.data {
            TransactionData::TokenCreate(tx) => self.token_create(tx, &signers),
            TransactionData::FileCreate(tx) => self.file_create(tx, &signers),
            TransactionData::FileAppend(tx) => self.file_append(tx, &signers),
            TransactionData::ContractCreate(tx) => self.contract_create(tx),
            TransactionData::TokenUpdate(tx) => self.token_update(tx, &signers),
            TransactionData::ContractExecute(tx) => self.contract_execute(tx, &signers),
        };

        match outcome {
            Ok(outcome) => TransactionReceipt {
                transaction_id,
                status: Status::Success,
                token_id: outcome.token_id,
                file_id: outcome.file_id,
                contract_id: outcome.contract_id,
                total_supply: outcome.total_supply,
            },
            Err(status) => TransactionReceipt::with_status(transaction_id, status),
        }
    }

    fn require_signature(key: &Key, signers: &BTreeSet<PublicKey>) -> Result<(), Status> {
        if key.is_satisfied_by(signers) {
            Ok(())
        } else {
            Err(Status::InvalidSignature)
        }
    }

    fn token_create(
        &mut self,
        tx: &TokenCreateTransaction,
        signers: &BTreeSet<PublicKey>,
    ) -> Result<Outcome, Status> {
        if tx.name.trim().is_empty() {
            return Err(Status::MissingTokenName);
        }
        if tx.symbol.trim().is_empty() {
            return Err(Status::MissingTokenSymbol);
        }
        let treasury_id = tx
            .treasury_account_id
            .ok_or(Status::InvalidTreasuryAccountForToken)?;
        let treasury = self
            .accounts
            .get(&treasury_id)
            .ok_or(Status::InvalidTreasuryAccountForToken)?;

        Self::require_signature(&Key::Ed25519(treasury.key), signers)?;
        if let Some(admin_key) = &tx.admin_key {
            Self::require_signature(admin_key, signers)?;
        }

        let token_id = TokenId::new(0, 0, self.allocate_num());
        self.tokens.insert(
            token_id,
            TokenRecord {
                name: tx.name.clone(),
                symbol: tx.symbol.clone(),
                decimals: tx.decimals,
                total_supply: tx.initial_supply,
                treasury: treasury_id,
                admin_key: tx.admin_key.clone(),
                supply_key: tx.supply_key.clone(),
            },
        );
        if let Some(treasury) = self.accounts.get_mut(&treasury_id) {
            treasury.tokens.insert(token_id, tx.initial_supply);
        }

        Ok(Outcome {
            token_id: Some(token_id),
            total_supply: Some(tx.initial_supply),
            ..Outcome::default()
        })
    }

    fn file_create(
        &mut self,
        tx: &FileCreateTransaction,
        signers: &BTreeSet<PublicKey>,
    ) -> Result<Outcome, Status> {
        for key in &tx.keys {
            Self::require_signature(key, signers)?;
        }

        let file_id = FileId::new(0, 0, self.allocate_num());
        self.files.insert(
            file_id,
            FileRecord {
                keys: tx.keys.clone(),
                contents: tx.contents.clone(),
            },
        );

        Ok(Outcome {
            file_id: Some(file_id),
            ..Outcome::default()
        })
    }

    fn file_append(
        &mut self,
        tx: &FileAppendTransaction,
        signers: &BTreeSet<PublicKey>,
    ) -> Result<Outcome, Status> {
        let file = self.files.get_mut(&tx.file_id).ok_or(Status::InvalidFileId)?;
        for key in &file.keys {
            Self::require_signature(key, signers)?;
        }
        file.contents.extend_from_slice(&tx.contents);

        Ok(Outcome {
            file_id: Some(tx.file_id),
            ..Outcome::default()
        })
    }

    fn contract_create(&mut self, tx: &ContractCreateTransaction) -> Result<Outcome, Status> {
        let file = self.files.get(&tx.bytecode_file_id).ok_or(Status::InvalidFileId)?;
        if file.contents.is_empty() {
            return Err(Status::ContractBytecodeEmpty);
        }
        let deploy_gas = DEPLOY_BASE_GAS + DEPLOY_GAS_PER_BYTE * file.contents.len() as u64;
        if tx.gas < deploy_gas {
            return Err(Status::InsufficientGas);
        }

        // constructor(address token)
        let token = AbiWords::new(&tx.constructor_parameters)
            .and_then(|words| words.address(0))
            .ok()
            .and_then(|address| TokenId::from_solidity_address(&address).ok())
            .ok_or(Status::ContractRevertExecuted)?;

        let bytecode_hash = hex::encode(Sha256::digest(&file.contents));
        let contract_id = ContractId::new(0, 0, self.allocate_num());
        self.contracts.insert(
            contract_id,
            ContractRecord {
                bytecode_file: tx.bytecode_file_id,
                bytecode_hash,
                token,
            },
        );

        Ok(Outcome {
            contract_id: Some(contract_id),
            ..Outcome::default()
        })
    }

    fn token_update(
        &mut self,
        tx: &TokenUpdateTransaction,
        signers: &BTreeSet<PublicKey>,
    ) -> Result<Outcome, Status> {
        let token = self.tokens.get_mut(&tx.token_id).ok_or(Status::InvalidTokenId)?;
        let admin_key = token.admin_key.as_ref().ok_or(Status::TokenIsImmutable)?;
        Self::require_signature(admin_key, signers)?;

        if let Some(supply_key) = &tx.supply_key {
            if token.supply_key.is_none() {
                return Err(Status::TokenHasNoSupplyKey);
            }
            token.supply_key = Some(supply_key.clone());
        }

        Ok(Outcome {
            token_id: Some(tx.token_id),
            ..Outcome::default()
        })
    }

    fn contract_execute(
        &mut self,
        tx: &ContractExecuteTransaction,
        signers: &BTreeSet<PublicKey>,
    ) -> Result<Outcome, Status> {
        let contract = self
            .contracts
            .get(&tx.contract_id)
            .ok_or(Status::InvalidContractId)?
            .clone();
        if tx.gas < TOKEN_SERVICE_CALL_GAS {
            return Err(Status::InsufficientGas);
        }
        let words = AbiWords::new(&tx.function_parameters).map_err(|_| Status::ContractRevertExecuted)?;

        match tx.function_name.as_str() {
            MINT_FUNCTION => {
                let amount = words.uint64(0).map_err(|_| Status::ContractRevertExecuted)?;
                self.mint(tx.contract_id, contract.token, amount, signers)
            }
            ASSOCIATE_FUNCTION => {
                let account = decode_account(&words, 0)?;
                self.associate(contract.token, account, signers)
            }
            TRANSFER_FUNCTION => {
                let from = decode_account(&words, 0)?;
                let to = decode_account(&words, 1)?;
                let amount = words.int64(2).map_err(|_| Status::ContractRevertExecuted)?;
                self.transfer(contract.token, from, to, amount, signers)
            }
            _ => Err(Status::ContractRevertExecuted),
        }
    }

    /// Minted units land in the treasury, so the treasury has to countersign.
    fn mint(
        &mut self,
        caller: ContractId,
        token_id: TokenId,
        amount: u64,
        signers: &BTreeSet<PublicKey>,
    ) -> Result<Outcome, Status> {
        let treasury_key = {
            let token = self.tokens.get(&token_id).ok_or(Status::InvalidTokenId)?;
            if token.supply_key != Some(Key::Contract(caller)) {
                return Err(Status::ContractRevertExecuted);
            }
            self.accounts
                .get(&token.treasury)
                .map(|account| account.key)
                .ok_or(Status::InvalidTreasuryAccountForToken)?
        };
        Self::require_signature(&Key::Ed25519(treasury_key), signers)?;

        let token = self.tokens.get_mut(&token_id).ok_or(Status::InvalidTokenId)?;
        if amount == 0 {
            return Err(Status::InvalidTokenMintAmount);
        }

        token.total_supply = token
            .total_supply
            .checked_add(amount)
            .ok_or(Status::InvalidTokenMintAmount)?;
        let total_supply = token.total_supply;
        let treasury = token.treasury;
        if let Some(account) = self.accounts.get_mut(&treasury) {
            *account.tokens.entry(token_id).or_insert(0) += amount;
        }

        Ok(Outcome {
            total_supply: Some(total_supply),
            ..Outcome::default()
        })
    }

    fn associate(
        &mut self,
        token_id: TokenId,
        account_id: AccountId,
        signers: &BTreeSet<PublicKey>,
    ) -> Result<Outcome, Status> {
        if !self.tokens.contains_key(&token_id) {
            return Err(Status::InvalidTokenId);
        }
        let account = self.accounts.get_mut(&account_id).ok_or(Status::InvalidAccountId)?;
        Self::require_signature(&Key::Ed25519(account.key), signers)?;
        if account.tokens.contains_key(&token_id) {
            return Err(Status::TokenAlreadyAssociatedToAccount);
        }
        account.tokens.insert(token_id, 0);
        Ok(Outcome::default())
    }

    fn transfer(
        &mut self,
        token_id: TokenId,
        from: AccountId,
        to: AccountId,
        amount: i64,
        signers: &BTreeSet<PublicKey>,
    ) -> Result<Outcome, Status> {
        if !self.tokens.contains_key(&token_id) {
            return Err(Status::InvalidTokenId);
        }
        let amount = u64::try_from(amount)
            .ok()
            .filter(|amount| *amount > 0)
            .ok_or(Status::InvalidAccountAmounts)?;

        let sender = self.accounts.get(&from).ok_or(Status::InvalidAccountId)?;
        Self::require_signature(&Key::Ed25519(sender.key), signers)?;
        let sender_balance = *sender
            .tokens
            .get(&token_id)
            .ok_or(Status::TokenNotAssociatedToAccount)?;
        let receiver = self.accounts.get(&to).ok_or(Status::InvalidAccountId)?;
        if !receiver.tokens.contains_key(&token_id) {
            return Err(Status::TokenNotAssociatedToAccount);
        }
        if sender_balance < amount {
            return Err(Status::InsufficientTokenBalance);
        }

        if let Some(sender) = self.accounts.get_mut(&from) {
            sender.tokens.insert(token_id, sender_balance - amount);
        }
        if let Some(receiver) = self.accounts.get_mut(&to) {
            *receiver.tokens.entry(token_id).or_insert(0) += amount;
        }
        Ok(Outcome::default())
    }
}

fn decode_account(words: &AbiWords<'_>, index: usize) -> Result<AccountId, Status> {
    words
        .address(index)
        .ok()
        .and_then(|address| AccountId::from_solidity_address(&address).ok())
        .ok_or(Status::ContractRevertExecuted)
}

pub struct SimulatedLedger {
    state: Mutex<LedgerState>,
    snapshot_path: Option<PathBuf>,
}

impl SimulatedLedger {
    pub fn new(network: &str) -> Self {
        Self {
            state: Mutex::new(LedgerState::new(network)),
            snapshot_path: None,
        }
    }

    /// Opens the snapshot at `path` if it exists, starting empty otherwise.
    /// Every finalized transaction is written back to the same file.
    pub async fn open(network: &str, path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        let state = if tokio::fs::try_exists(&path).await? {
            let contents = tokio::fs::read_to_string(&path).await?;
            let state: LedgerState = serde_json::from_str(&contents)?;
            info!(
                file = ?path,
                accounts = state.accounts.len(),
                tokens = state.tokens.len(),
                "Loaded simulated ledger snapshot"
            );
            state
        } else {
            LedgerState::new(network)
        };

        Ok(Self {
            state: Mutex::new(state),
            snapshot_path: Some(path),
        })
    }

    /// Registers an account unless one with the same id already exists.
    pub async fn ensure_account(&self, account_id: AccountId, key: PublicKey, balance: Hbar) -> Result<bool, LedgerError> {
        let inserted = self.state.lock().await.insert_account(account_id, key, balance);
        if inserted {
            debug!(account_id = %account_id, "Registered simulated account");
            self.persist().await?;
        }
        Ok(inserted)
    }

    /// Creates a funded account with the next free id.
    pub async fn create_account(&self, key: PublicKey, balance: Hbar) -> Result<AccountId, LedgerError> {
        let account_id = {
            let mut state = self.state.lock().await;
            let account_id = AccountId::new(0, 0, state.allocate_num());
            state.insert_account(account_id, key, balance);
            account_id
        };
        self.persist().await?;
        Ok(account_id)
    }

    async fn persist(&self) -> Result<(), LedgerError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let serialized = serde_json::to_string_pretty(&*self.state.lock().await)?;
        let temp_file = format!("{}.tmp", path.display());
        tokio::fs::write(&temp_file, serialized).await?;
        tokio::fs::rename(&temp_file, path).await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerClient for SimulatedLedger {
    async fn submit(&self, transaction: Transaction) -> Result<TransactionResponse, LedgerError> {
        let transaction_id = transaction.transaction_id().clone();
        let transaction_hash = transaction.hash()?;

        {
            let mut state = self.state.lock().await;
            if let Err(status) = state.precheck(&transaction) {
                debug!(transaction_id = %transaction_id, %status, "Precheck failed");
                return Err(LedgerError::Precheck {
                    transaction_id,
                    status,
                });
            }

            state.charge_fee(&transaction);
            let receipt = state.apply(&transaction);
            debug!(
                transaction_id = %transaction_id,
                kind = transaction.body.data.kind(),
                status = %receipt.status,
                network = %state.network,
                "Transaction finalized"
            );
            state.receipts.insert(transaction_id.to_string(), receipt);
        }
        self.persist().await?;

        Ok(TransactionResponse {
            transaction_id,
            transaction_hash,
        })
    }

    async fn get_receipt(&self, transaction_id: &TransactionId) -> Result<TransactionReceipt, LedgerError> {
        self.state
            .lock()
            .await
            .receipts
            .get(&transaction_id.to_string())
            .cloned()
            .ok_or_else(|| LedgerError::ReceiptNotFound(transaction_id.clone()))
    }

    async fn token_info(&self, token_id: TokenId) -> Result<TokenInfo, LedgerError> {
        let state = self.state.lock().await;
        let token = state.tokens.get(&token_id).ok_or_else(|| LedgerError::NotFound {
            kind: "token",
            id: token_id.to_string(),
        })?;
        Ok(TokenInfo {
            token_id,
            name: token.name.clone(),
            symbol: token.symbol.clone(),
            decimals: token.decimals,
            total_supply: token.total_supply,
            treasury_account_id: token.treasury,
            admin_key: token.admin_key.clone(),
            supply_key: token.supply_key.clone(),
        })
    }

    async fn account_balance(&self, account_id: AccountId) -> Result<AccountBalance, LedgerError> {
        let state = self.state.lock().await;
        let account = state.accounts.get(&account_id).ok_or_else(|| LedgerError::NotFound {
            kind: "account",
            id: account_id.to_string(),
        })?;
        Ok(AccountBalance {
            account_id,
            hbars: account.balance,
            tokens: account.tokens.clone(),
        })
    }

    async fn file_contents(&self, file_id: FileId) -> Result<Vec<u8>, LedgerError> {
        let state = self.state.lock().await;
        state
            .files
            .get(&file_id)
            .map(|file| file.contents.clone())
            .ok_or_else(|| LedgerError::NotFound {
                kind: "file",
                id: file_id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::abi::ContractFunctionParameters;
    use crate::ledger::transaction::TransactionBody;
    use crate::ledger::types::PrivateKey;
    use chrono::Utc;

    struct Fixture {
        ledger: SimulatedLedger,
        operator: (AccountId, PrivateKey),
        treasury: (AccountId, PrivateKey),
        alice: (AccountId, PrivateKey),
        sequence: std::sync::atomic::AtomicI64,
    }

    impl Fixture {
        async fn new() -> Self {
            let ledger = SimulatedLedger::new("local");
            let operator_key = PrivateKey::generate();
            let treasury_key = PrivateKey::generate();
            let alice_key = PrivateKey::generate();
            let operator = ledger.create_account(operator_key.public_key(), Hbar::new(1000)).await.unwrap();
            let treasury = ledger.create_account(treasury_key.public_key(), Hbar::new(100)).await.unwrap();
            let alice = ledger.create_account(alice_key.public_key(), Hbar::new(100)).await.unwrap();
            Self {
                ledger,
                operator: (operator, operator_key),
                treasury: (treasury, treasury_key),
                alice: (alice, alice_key),
                sequence: std::sync::atomic::AtomicI64::new(0),
            }
        }

        fn tx(&self, data: TransactionData) -> Transaction {
            let offset = self.sequence.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let valid_start = Utc::now() + chrono::Duration::nanoseconds(offset);
            Transaction::new(TransactionBody {
                transaction_id: TransactionId::new(self.operator.0, valid_start),
                max_transaction_fee: Hbar::new(20),
                data,
            })
            .sign(&self.operator.1)
            .unwrap()
        }

        async fn execute(&self, tx: Transaction) -> TransactionReceipt {
            let response = self.ledger.submit(tx).await.unwrap();
            self.ledger.get_receipt(&response.transaction_id).await.unwrap()
        }

        async fn token_with_contract(&self) -> (TokenId, ContractId) {
            let create = TokenCreateTransaction::new("hbarRocks", "HROK")
                .initial_supply(100)
                .treasury(self.treasury.0)
                .admin_key(self.treasury.1.public_key())
                .supply_key(self.treasury.1.public_key());
            let receipt = self
                .execute(self.tx(TransactionData::TokenCreate(create)).sign(&self.treasury.1).unwrap())
                .await;
            let token_id = receipt.token_id.unwrap();

            let file = self
                .execute(self.tx(TransactionData::FileCreate(FileCreateTransaction {
                    keys: vec![Key::Ed25519(self.operator.1.public_key())],
                    contents: vec![0x60; 64],
                })))
                .await;
            let params = ContractFunctionParameters::new()
                .add_address(&token_id.to_solidity_address())
                .unwrap();
            let contract = self
                .execute(self.tx(TransactionData::ContractCreate(ContractCreateTransaction {
                    bytecode_file_id: file.file_id.unwrap(),
                    gas: 3_000_000,
                    constructor_parameters: params.to_bytes(),
                })))
                .await;
            (token_id, contract.contract_id.unwrap())
        }
    }

    #[tokio::test]
    async fn test_precheck_rejects_missing_payer_signature() {
        let fx = Fixture::new().await;
        let unsigned = Transaction::new(TransactionBody {
            transaction_id: TransactionId::new(fx.operator.0, Utc::now()),
            max_transaction_fee: Hbar::new(2),
            data: TransactionData::FileCreate(FileCreateTransaction {
                keys: vec![],
                contents: vec![],
            }),
        });

        let err = fx.ledger.submit(unsigned).await.unwrap_err();
        assert_eq!(err.status(), Some(Status::InvalidSignature));
    }

    #[tokio::test]
    async fn test_precheck_rejects_duplicates_and_oversize() {
        let fx = Fixture::new().await;
        let tx = fx.tx(TransactionData::FileCreate(FileCreateTransaction {
            keys: vec![],
            contents: vec![1; 16],
        }));
        fx.ledger.submit(tx.clone()).await.unwrap();
        let err = fx.ledger.submit(tx).await.unwrap_err();
        assert_eq!(err.status(), Some(Status::DuplicateTransaction));

        let oversize = fx.tx(TransactionData::FileCreate(FileCreateTransaction {
            keys: vec![],
            contents: vec![1; MAX_TRANSACTION_PAYLOAD_BYTES + 1],
        }));
        let err = fx.ledger.submit(oversize).await.unwrap_err();
        assert_eq!(err.status(), Some(Status::TransactionOversize));
    }

    #[tokio::test]
    async fn test_token_create_requires_treasury_signature() {
        let fx = Fixture::new().await;
        let create = TokenCreateTransaction::new("hbarRocks", "HROK")
            .initial_supply(100)
            .treasury(fx.treasury.0)
            .admin_key(fx.treasury.1.public_key());

        let receipt = fx.execute(fx.tx(TransactionData::TokenCreate(create))).await;
        assert_eq!(receipt.status, Status::InvalidSignature);
        assert!(receipt.token_id.is_none());
    }

    #[tokio::test]
    async fn test_mint_requires_contract_supply_authority() {
        let fx = Fixture::new().await;
        let (token_id, contract_id) = fx.token_with_contract().await;
        let mint = ContractExecuteTransaction::new(
            contract_id,
            3_000_000,
            MINT_FUNCTION,
            &ContractFunctionParameters::new().add_uint64(150),
        );

        let before = fx.execute(fx.tx(TransactionData::ContractExecute(mint.clone()))).await;
        assert_eq!(before.status, Status::ContractRevertExecuted);

        let update = TokenUpdateTransaction {
            token_id,
            supply_key: Some(Key::Contract(contract_id)),
        };
        let updated = fx
            .execute(fx.tx(TransactionData::TokenUpdate(update)).sign(&fx.treasury.1).unwrap())
            .await;
        assert_eq!(updated.status, Status::Success);

        let unsigned = fx.execute(fx.tx(TransactionData::ContractExecute(mint.clone()))).await;
        assert_eq!(unsigned.status, Status::InvalidSignature);
        assert_eq!(fx.ledger.token_info(token_id).await.unwrap().total_supply, 100);

        let after = fx
            .execute(fx.tx(TransactionData::ContractExecute(mint)).sign(&fx.treasury.1).unwrap())
            .await;
        assert_eq!(after.status, Status::Success);
        assert_eq!(after.total_supply, Some(250));
        assert_eq!(fx.ledger.token_info(token_id).await.unwrap().total_supply, 250);
    }

    #[tokio::test]
    async fn test_association_needs_owner_signature_and_happens_once() {
        let fx = Fixture::new().await;
        let (_, contract_id) = fx.token_with_contract().await;
        let associate = ContractExecuteTransaction::new(
            contract_id,
            3_000_000,
            ASSOCIATE_FUNCTION,
            &ContractFunctionParameters::new()
                .add_address(&fx.alice.0.to_solidity_address())
                .unwrap(),
        );

        let unsigned = fx.execute(fx.tx(TransactionData::ContractExecute(associate.clone()))).await;
        assert_eq!(unsigned.status, Status::InvalidSignature);

        let first = fx
            .execute(fx.tx(TransactionData::ContractExecute(associate.clone())).sign(&fx.alice.1).unwrap())
            .await;
        assert_eq!(first.status, Status::Success);

        let second = fx
            .execute(fx.tx(TransactionData::ContractExecute(associate)).sign(&fx.alice.1).unwrap())
            .await;
        assert_eq!(second.status, Status::TokenAlreadyAssociatedToAccount);
    }

    #[tokio::test]
    async fn test_transfer_to_unassociated_account_fails() {
        let fx = Fixture::new().await;
        let (token_id, contract_id) = fx.token_with_contract().await;
        let transfer = ContractExecuteTransaction::new(
            contract_id,
            3_000_000,
            TRANSFER_FUNCTION,
            &ContractFunctionParameters::new()
                .add_address(&fx.treasury.0.to_solidity_address())
                .unwrap()
                .add_address(&fx.alice.0.to_solidity_address())
                .unwrap()
                .add_int64(50),
        );

        let receipt = fx
            .execute(fx.tx(TransactionData::ContractExecute(transfer)).sign(&fx.treasury.1).unwrap())
            .await;
        assert_eq!(receipt.status, Status::TokenNotAssociatedToAccount);

        let balance = fx.ledger.account_balance(fx.treasury.0).await.unwrap();
        assert_eq!(balance.token_balance(token_id), Some(100));
    }

    #[tokio::test]
    async fn test_low_gas_is_a_receipt_failure() {
        let fx = Fixture::new().await;
        let (_, contract_id) = fx.token_with_contract().await;
        let mint = ContractExecuteTransaction::new(
            contract_id,
            TOKEN_SERVICE_CALL_GAS - 1,
            MINT_FUNCTION,
            &ContractFunctionParameters::new().add_uint64(1),
        );
        let receipt = fx.execute(fx.tx(TransactionData::ContractExecute(mint))).await;
        assert_eq!(receipt.status, Status::InsufficientGas);
    }

    #[tokio::test]
    async fn test_largest_uploadable_bytecode_deploys_within_default_gas() {
        let fx = Fixture::new().await;
        let (token_id, _) = fx.token_with_contract().await;
        let file = fx
            .execute(fx.tx(TransactionData::FileCreate(FileCreateTransaction {
                keys: vec![Key::Ed25519(fx.operator.1.public_key())],
                contents: vec![],
            })))
            .await;
        let file_id = file.file_id.unwrap();
        for _ in 0..10 {
            let appended = fx
                .execute(fx.tx(TransactionData::FileAppend(FileAppendTransaction {
                    file_id,
                    contents: vec![0x60; 4096],
                })))
                .await;
            assert_eq!(appended.status, Status::Success);
        }

        let params = ContractFunctionParameters::new()
            .add_address(&token_id.to_solidity_address())
            .unwrap();
        let deploy = |gas| {
            fx.tx(TransactionData::ContractCreate(ContractCreateTransaction {
                bytecode_file_id: file_id,
                gas,
                constructor_parameters: params.to_bytes(),
            }))
        };
        let deployed = fx.execute(deploy(3_000_000)).await;
        assert_eq!(deployed.status, Status::Success);

        let required = DEPLOY_BASE_GAS + DEPLOY_GAS_PER_BYTE * 40_960;
        let starved = fx.execute(deploy(required - 1)).await;
        assert_eq!(starved.status, Status::InsufficientGas);
    }

    #[tokio::test]
    async fn test_fees_are_charged_to_the_payer() {
        let fx = Fixture::new().await;
        fx.execute(fx.tx(TransactionData::FileCreate(FileCreateTransaction {
            keys: vec![],
            contents: vec![],
        })))
        .await;

        let balance = fx.ledger.account_balance(fx.operator.0).await.unwrap();
        assert_eq!(
            balance.hbars,
            Hbar::from_tinybars(Hbar::new(1000).to_tinybars() - 5_000_000)
        );
    }
}
