//! State-changing operations and the signing envelope around them.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::abi::ContractFunctionParameters;
use super::errors::LedgerError;
use super::types::{AccountId, ContractId, FileId, Hbar, Key, PrivateKey, PublicKey, TokenId, TransactionId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCreateTransaction {
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    pub initial_supply: u64,
    pub treasury_account_id: Option<AccountId>,
    pub admin_key: Option<Key>,
    pub supply_key: Option<Key>,
}

impl TokenCreateTransaction {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            decimals: 0,
            initial_supply: 0,
            treasury_account_id: None,
            admin_key: None,
            supply_key: None,
        }
    }

    pub fn decimals(mut self, decimals: u32) -> Self {
        self.decimals = decimals;
        self
    }

    pub fn initial_supply(mut self, supply: u64) -> Self {
        self.initial_supply = supply;
        self
    }

    pub fn treasury(mut self, account_id: AccountId) -> Self {
        self.treasury_account_id = Some(account_id);
        self
    }

    pub fn admin_key(mut self, key: impl Into<Key>) -> Self {
        self.admin_key = Some(key.into());
        self
    }

    pub fn supply_key(mut self, key: impl Into<Key>) -> Self {
        self.supply_key = Some(key.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCreateTransaction {
    pub keys: Vec<Key>,
    #[serde(with = "hex")]
    pub contents: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAppendTransaction {
    pub file_id: FileId,
    #[serde(with = "hex")]
    pub contents: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCreateTransaction {
    pub bytecode_file_id: FileId,
    pub gas: u64,
    #[serde(with = "hex")]
    pub constructor_parameters: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUpdateTransaction {
    pub token_id: TokenId,
    pub supply_key: Option<Key>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractExecuteTransaction {
    pub contract_id: ContractId,
    pub gas: u64,
    pub function_name: String,
    #[serde(with = "hex")]
    pub function_parameters: Vec<u8>,
}

impl ContractExecuteTransaction {
    pub fn new(
        contract_id: ContractId,
        gas: u64,
        function_name: impl Into<String>,
        parameters: &ContractFunctionParameters,
    ) -> Self {
        Self {
            contract_id,
            gas,
            function_name: function_name.into(),
            function_parameters: parameters.to_bytes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionData {
    TokenCreate(TokenCreateTransaction),
    FileCreate(FileCreateTransaction),
    FileAppend(FileAppendTransaction),
    ContractCreate(ContractCreateTransaction),
    TokenUpdate(TokenUpdateTransaction),
    ContractExecute(ContractExecuteTransaction),
}

impl TransactionData {
    pub fn kind(&self) -> &'static str {
        match self {
            TransactionData::TokenCreate(_) => "token_create",
            TransactionData::FileCreate(_) => "file_create",
            TransactionData::FileAppend(_) => "file_append",
            TransactionData::ContractCreate(_) => "contract_create",
            TransactionData::TokenUpdate(_) => "token_update",
            TransactionData::ContractExecute(_) => "contract_execute",
        }
    }

    /// Bytes of variable-length content carried by the operation.
    pub fn payload_len(&self) -> usize {
        match self {
            TransactionData::FileCreate(tx) => tx.contents.len(),
            TransactionData::FileAppend(tx) => tx.contents.len(),
            TransactionData::ContractCreate(tx) => tx.constructor_parameters.len(),
            TransactionData::ContractExecute(tx) => tx.function_parameters.len(),
            TransactionData::TokenCreate(_) | TransactionData::TokenUpdate(_) => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionBody {
    pub transaction_id: TransactionId,
    pub max_transaction_fee: Hbar,
    pub data: TransactionData,
}

impl TransactionBody {
    /// Canonical bytes covered by signatures.
    pub fn to_bytes(&self) -> Result<Vec<u8>, LedgerError> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignaturePair {
    pub public_key: PublicKey,
    #[serde(with = "hex")]
    pub signature: Vec<u8>,
}

/// A frozen body plus the signatures collected so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub body: TransactionBody,
    pub signatures: Vec<SignaturePair>,
}

impl Transaction {
    pub fn new(body: TransactionBody) -> Self {
        Self {
            body,
            signatures: Vec::new(),
        }
    }

    pub fn transaction_id(&self) -> &TransactionId {
        &self.body.transaction_id
    }

    /// Adds a signature; signing twice with the same key is a no-op.
    pub fn sign(mut self, key: &PrivateKey) -> Result<Self, LedgerError> {
        let public_key = key.public_key();
        if self.is_signed_by(&public_key) {
            return Ok(self);
        }
        let signature = key.sign(&self.body.to_bytes()?);
        self.signatures.push(SignaturePair {
            public_key,
            signature,
        });
        Ok(self)
    }

    pub fn is_signed_by(&self, public_key: &PublicKey) -> bool {
        self.signatures.iter().any(|pair| &pair.public_key == public_key)
    }

    pub fn signers(&self) -> impl Iterator<Item = &PublicKey> {
        self.signatures.iter().map(|pair| &pair.public_key)
    }

    /// True when every attached signature verifies against the body.
    pub fn verify_signatures(&self) -> Result<bool, LedgerError> {
        let bytes = self.body.to_bytes()?;
        Ok(self
            .signatures
            .iter()
            .all(|pair| pair.public_key.verify(&bytes, &pair.signature)))
    }

    pub fn hash(&self) -> Result<String, LedgerError> {
        let bytes = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }
}
