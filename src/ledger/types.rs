//! Ledger-side references: entity ids, keys, fee amounts and status codes.
//!
//! These types describe objects owned by the ledger. The workflow only ever
//! holds their identifiers or handles.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use super::errors::LedgerError;

const ED25519_PRIVATE_DER_PREFIX: &str = "302e020100300506032b657004220420";
const ED25519_PUBLIC_DER_PREFIX: &str = "302a300506032b6570032100";

/// Length of a solidity address in bytes.
pub const SOLIDITY_ADDRESS_LEN: usize = 20;

fn encode_solidity_address(shard: u32, realm: u64, num: u64) -> String {
    let mut bytes = [0u8; SOLIDITY_ADDRESS_LEN];
    bytes[..4].copy_from_slice(&shard.to_be_bytes());
    bytes[4..12].copy_from_slice(&realm.to_be_bytes());
    bytes[12..].copy_from_slice(&num.to_be_bytes());
    hex::encode(bytes)
}

fn decode_solidity_address(address: &str) -> Result<(u32, u64, u64), LedgerError> {
    let trimmed = address.trim().trim_start_matches("0x");
    let bytes = hex::decode(trimmed).map_err(|_| LedgerError::InvalidAddress(address.to_string()))?;
    if bytes.len() != SOLIDITY_ADDRESS_LEN {
        return Err(LedgerError::InvalidAddress(address.to_string()));
    }

    let mut shard = [0u8; 4];
    let mut realm = [0u8; 8];
    let mut num = [0u8; 8];
    shard.copy_from_slice(&bytes[..4]);
    realm.copy_from_slice(&bytes[4..12]);
    num.copy_from_slice(&bytes[12..]);
    Ok((
        u32::from_be_bytes(shard),
        u64::from_be_bytes(realm),
        u64::from_be_bytes(num),
    ))
}

/// Shards are 32 bits wide in the solidity address layout, so wider values are rejected.
fn parse_entity_id(value: &str) -> Result<(u32, u64, u64), LedgerError> {
    let invalid = || LedgerError::InvalidEntityId(value.to_string());
    let mut parts = value.trim().split('.');
    let (Some(shard), Some(realm), Some(num), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };
    Ok((
        shard.parse().map_err(|_| invalid())?,
        realm.parse().map_err(|_| invalid())?,
        num.parse().map_err(|_| invalid())?,
    ))
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(into = "String", try_from = "String")]
        pub struct $name {
            pub shard: u32,
            pub realm: u64,
            pub num: u64,
        }

        impl $name {
            pub const fn new(shard: u32, realm: u64, num: u64) -> Self {
                Self { shard, realm, num }
            }

            /// 20-byte address used when passing this entity to a contract.
            pub fn to_solidity_address(&self) -> String {
                encode_solidity_address(self.shard, self.realm, self.num)
            }

            pub fn from_solidity_address(address: &str) -> Result<Self, LedgerError> {
                let (shard, realm, num) = decode_solidity_address(address)?;
                Ok(Self::new(shard, realm, num))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
            }
        }

        impl FromStr for $name {
            type Err = LedgerError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let (shard, realm, num) = parse_entity_id(s)?;
                Ok(Self::new(shard, realm, num))
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.to_string()
            }
        }

        impl TryFrom<String> for $name {
            type Error = LedgerError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

entity_id!(
    /// A ledger account.
    AccountId
);
entity_id!(
    /// A ledger-native fungible token.
    TokenId
);
entity_id!(
    /// A file in ledger storage.
    FileId
);
entity_id!(
    /// A deployed smart contract.
    ContractId
);

/// Ed25519 signing key held by an account owner.
#[derive(Clone)]
pub struct PrivateKey(SigningKey);

impl PrivateKey {
    pub fn generate() -> Self {
        let seed: [u8; 32] = rand::random();
        Self(SigningKey::from_bytes(&seed))
    }

    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self(SigningKey::from_bytes(bytes))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.0.sign(message).to_bytes().to_vec()
    }

    /// DER-prefixed hex, the format account owners usually keep in `.env` files.
    pub fn to_der_string(&self) -> String {
        format!("{}{}", ED25519_PRIVATE_DER_PREFIX, hex::encode(self.0.to_bytes()))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PrivateKey")
            .field(&self.public_key().to_string())
            .finish()
    }
}

impl FromStr for PrivateKey {
    type Err = LedgerError;

    /// Accepts raw 32-byte hex or the DER-prefixed form, with or without `0x`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().trim_start_matches("0x").to_ascii_lowercase();
        let raw = lowered
            .strip_prefix(ED25519_PRIVATE_DER_PREFIX)
            .unwrap_or(&lowered);
        let bytes = hex::decode(raw).map_err(|e| LedgerError::InvalidKey(e.to_string()))?;
        let seed: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            LedgerError::InvalidKey(format!("expected 32 key bytes, found {}", bytes.len()))
        })?;
        Ok(Self::from_bytes(&seed))
    }
}

/// Ed25519 public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let Ok(signature) = ed25519_dalek::Signature::from_slice(signature) else {
            return false;
        };
        key.verify(message, &signature).is_ok()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", ED25519_PUBLIC_DER_PREFIX, hex::encode(self.0))
    }
}

impl FromStr for PublicKey {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().trim_start_matches("0x").to_ascii_lowercase();
        let raw = lowered
            .strip_prefix(ED25519_PUBLIC_DER_PREFIX)
            .unwrap_or(&lowered);
        let bytes = hex::decode(raw).map_err(|e| LedgerError::InvalidKey(e.to_string()))?;
        let key: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            LedgerError::InvalidKey(format!("expected 32 key bytes, found {}", bytes.len()))
        })?;
        Ok(Self(key))
    }
}

impl From<PublicKey> for String {
    fn from(key: PublicKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for PublicKey {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// An authority slot on a ledger entity (admin key, supply key, file key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Key {
    Ed25519(PublicKey),
    /// Authority delegated to a contract; it acts through its own calls, never by signing.
    Contract(ContractId),
}

impl Key {
    pub fn is_satisfied_by<'a>(&self, signers: impl IntoIterator<Item = &'a PublicKey>) -> bool {
        match self {
            Key::Ed25519(key) => signers.into_iter().any(|signer| signer == key),
            Key::Contract(_) => false,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Ed25519(key) => write!(f, "{key}"),
            Key::Contract(id) => write!(f, "{id}"),
        }
    }
}

impl From<PublicKey> for Key {
    fn from(key: PublicKey) -> Self {
        Key::Ed25519(key)
    }
}

impl From<ContractId> for Key {
    fn from(id: ContractId) -> Self {
        Key::Contract(id)
    }
}

/// An account id paired with the key that signs for it.
#[derive(Debug, Clone)]
pub struct AccountCredentials {
    pub account_id: AccountId,
    pub private_key: PrivateKey,
}

impl AccountCredentials {
    pub fn new(account_id: AccountId, private_key: PrivateKey) -> Self {
        Self {
            account_id,
            private_key,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.private_key.public_key()
    }
}

pub const TINYBARS_PER_HBAR: i64 = 100_000_000;

/// Native currency amount, held in tinybars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Hbar(i64);

impl Hbar {
    pub const ZERO: Hbar = Hbar(0);

    pub const fn new(hbars: i64) -> Self {
        Self(hbars * TINYBARS_PER_HBAR)
    }

    /// `None` when the amount does not fit in tinybars.
    pub const fn checked_new(hbars: i64) -> Option<Self> {
        match hbars.checked_mul(TINYBARS_PER_HBAR) {
            Some(tinybars) => Some(Self(tinybars)),
            None => None,
        }
    }

    pub const fn from_tinybars(tinybars: i64) -> Self {
        Self(tinybars)
    }

    pub const fn to_tinybars(self) -> i64 {
        self.0
    }

    pub fn checked_sub(self, other: Hbar) -> Option<Hbar> {
        self.0.checked_sub(other.0).map(Hbar)
    }
}

impl fmt::Display for Hbar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % TINYBARS_PER_HBAR == 0 {
            write!(f, "{} ℏ", self.0 / TINYBARS_PER_HBAR)
        } else {
            write!(f, "{:.8} ℏ", self.0 as f64 / TINYBARS_PER_HBAR as f64)
        }
    }
}

/// Status codes returned at precheck and on receipts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Success,
    InvalidSignature,
    DuplicateTransaction,
    TransactionOversize,
    InsufficientTxFee,
    InsufficientPayerBalance,
    PayerAccountNotFound,
    InvalidAccountId,
    InvalidTokenId,
    InvalidFileId,
    InvalidContractId,
    MissingTokenName,
    MissingTokenSymbol,
    InvalidTreasuryAccountForToken,
    TokenIsImmutable,
    TokenHasNoSupplyKey,
    ContractBytecodeEmpty,
    InsufficientGas,
    ContractRevertExecuted,
    InvalidTokenMintAmount,
    InvalidAccountAmounts,
    TokenAlreadyAssociatedToAccount,
    TokenNotAssociatedToAccount,
    InsufficientTokenBalance,
}

impl Status {
    pub fn is_success(self) -> bool {
        self == Status::Success
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Success => "SUCCESS",
            Status::InvalidSignature => "INVALID_SIGNATURE",
            Status::DuplicateTransaction => "DUPLICATE_TRANSACTION",
            Status::TransactionOversize => "TRANSACTION_OVERSIZE",
            Status::InsufficientTxFee => "INSUFFICIENT_TX_FEE",
            Status::InsufficientPayerBalance => "INSUFFICIENT_PAYER_BALANCE",
            Status::PayerAccountNotFound => "PAYER_ACCOUNT_NOT_FOUND",
            Status::InvalidAccountId => "INVALID_ACCOUNT_ID",
            Status::InvalidTokenId => "INVALID_TOKEN_ID",
            Status::InvalidFileId => "INVALID_FILE_ID",
            Status::InvalidContractId => "INVALID_CONTRACT_ID",
            Status::MissingTokenName => "MISSING_TOKEN_NAME",
            Status::MissingTokenSymbol => "MISSING_TOKEN_SYMBOL",
            Status::InvalidTreasuryAccountForToken => "INVALID_TREASURY_ACCOUNT_FOR_TOKEN",
            Status::TokenIsImmutable => "TOKEN_IS_IMMUTABLE",
            Status::TokenHasNoSupplyKey => "TOKEN_HAS_NO_SUPPLY_KEY",
            Status::ContractBytecodeEmpty => "CONTRACT_BYTECODE_EMPTY",
            Status::InsufficientGas => "INSUFFICIENT_GAS",
            Status::ContractRevertExecuted => "CONTRACT_REVERT_EXECUTED",
            Status::InvalidTokenMintAmount => "INVALID_TOKEN_MINT_AMOUNT",
            Status::InvalidAccountAmounts => "INVALID_ACCOUNT_AMOUNTS",
            Status::TokenAlreadyAssociatedToAccount => "TOKEN_ALREADY_ASSOCIATED_TO_ACCOUNT",
            Status::TokenNotAssociatedToAccount => "TOKEN_NOT_ASSOCIATED_TO_ACCOUNT",
            Status::InsufficientTokenBalance => "INSUFFICIENT_TOKEN_BALANCE",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payer account plus valid-start timestamp; unique per submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId {
    pub account_id: AccountId,
    pub valid_start: DateTime<Utc>,
}

impl TransactionId {
    pub fn new(account_id: AccountId, valid_start: DateTime<Utc>) -> Self {
        Self {
            account_id,
            valid_start,
        }
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}.{:09}",
            self.account_id,
            self.valid_start.timestamp(),
            self.valid_start.timestamp_subsec_nanos()
        )
    }
}

/// Acknowledgment returned when a transaction passes precheck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub transaction_id: TransactionId,
    pub transaction_hash: String,
}

/// Finalized outcome of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub transaction_id: TransactionId,
    pub status: Status,
    pub token_id: Option<TokenId>,
    pub file_id: Option<FileId>,
    pub contract_id: Option<ContractId>,
    pub total_supply: Option<u64>,
}

impl TransactionReceipt {
    pub fn with_status(transaction_id: TransactionId, status: Status) -> Self {
        Self {
            transaction_id,
            status,
            token_id: None,
            file_id: None,
            contract_id: None,
            total_supply: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub token_id: TokenId,
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    pub total_supply: u64,
    pub treasury_account_id: AccountId,
    pub admin_key: Option<Key>,
    pub supply_key: Option<Key>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account_id: AccountId,
    pub hbars: Hbar,
    pub tokens: BTreeMap<TokenId, u64>,
}

impl AccountBalance {
    /// `None` when the account is not associated with the token.
    pub fn token_balance(&self, token_id: TokenId) -> Option<u64> {
        self.tokens.get(&token_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_round_trips_through_display_and_parse() {
        let id: AccountId = "0.0.1234".parse().unwrap();
        assert_eq!(id, AccountId::new(0, 0, 1234));
        assert_eq!(id.to_string(), "0.0.1234");

        assert!("0.0".parse::<AccountId>().is_err());
        assert!("0.0.1.2".parse::<TokenId>().is_err());
        assert!("a.b.c".parse::<FileId>().is_err());
    }

    #[test]
    fn test_shard_wider_than_address_layout_is_rejected() {
        let widest = AccountId::new(u32::MAX, 0, 7);
        let parsed: AccountId = "4294967295.0.7".parse().unwrap();
        assert_eq!(parsed, widest);
        assert_eq!(
            AccountId::from_solidity_address(&parsed.to_solidity_address()).unwrap(),
            widest
        );

        assert!(matches!(
            "4294967296.0.7".parse::<AccountId>(),
            Err(LedgerError::InvalidEntityId(_))
        ));
        assert!(serde_json::from_str::<TokenId>("\"4294967296.0.1\"").is_err());
    }

    #[test]
    fn test_solidity_address_layout() {
        let token = TokenId::new(0, 0, 1001);
        let address = token.to_solidity_address();
        assert_eq!(address.len(), 40);
        assert_eq!(address, "00000000000000000000000000000000000003e9");
        assert_eq!(TokenId::from_solidity_address(&address).unwrap(), token);
        assert_eq!(
            TokenId::from_solidity_address(&format!("0x{address}")).unwrap(),
            token
        );
        assert!(ContractId::from_solidity_address("abcd").is_err());
    }

    #[test]
    fn test_private_key_accepts_der_and_raw_hex() {
        let key = PrivateKey::generate();
        let der = key.to_der_string();
        let raw = der.trim_start_matches(ED25519_PRIVATE_DER_PREFIX).to_string();

        let from_der: PrivateKey = der.parse().unwrap();
        let from_raw: PrivateKey = raw.parse().unwrap();
        assert_eq!(from_der.public_key(), key.public_key());
        assert_eq!(from_raw.public_key(), key.public_key());
        assert!("302e0201".parse::<PrivateKey>().is_err());
    }

    #[test]
    fn test_signature_verification() {
        let key = PrivateKey::generate();
        let other = PrivateKey::generate();
        let signature = key.sign(b"payload");

        assert!(key.public_key().verify(b"payload", &signature));
        assert!(!key.public_key().verify(b"tampered", &signature));
        assert!(!other.public_key().verify(b"payload", &signature));
    }

    #[test]
    fn test_contract_key_is_never_satisfied_by_signatures() {
        let signer = PrivateKey::generate().public_key();
        assert!(Key::Ed25519(signer).is_satisfied_by([&signer]));
        assert!(!Key::Contract(ContractId::new(0, 0, 7)).is_satisfied_by([&signer]));
    }

    #[test]
    fn test_key_serde_keeps_variant() {
        let key = Key::Contract(ContractId::new(0, 0, 42));
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(serde_json::from_str::<Key>(&json).unwrap(), key);
    }

    #[test]
    fn test_hbar_display() {
        assert_eq!(Hbar::new(2).to_string(), "2 ℏ");
        assert_eq!(Hbar::from_tinybars(5_000_000).to_string(), "0.05000000 ℏ");
        assert_eq!(Status::TokenAlreadyAssociatedToAccount.to_string(), "TOKEN_ALREADY_ASSOCIATED_TO_ACCOUNT");
    }
}
