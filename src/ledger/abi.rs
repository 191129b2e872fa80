//! Contract call parameters, encoded as consecutive 32-byte ABI words.

use serde::{Deserialize, Serialize};

use super::errors::LedgerError;
use super::types::SOLIDITY_ADDRESS_LEN;

pub const WORD_LEN: usize = 32;

/// Functions exposed by the mint/associate/transfer token manager contract.
pub const MINT_FUNCTION: &str = "mintFungibleToken";
pub const ASSOCIATE_FUNCTION: &str = "tokenAssociate";
pub const TRANSFER_FUNCTION: &str = "tokenTransfer";

type Word = [u8; WORD_LEN];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractFunctionParameters {
    words: Vec<Word>,
}

impl ContractFunctionParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a solidity address given as 40 hex characters (optionally `0x`-prefixed).
    pub fn add_address(mut self, address: &str) -> Result<Self, LedgerError> {
        let trimmed = address.trim().trim_start_matches("0x");
        let bytes =
            hex::decode(trimmed).map_err(|_| LedgerError::InvalidAddress(address.to_string()))?;
        if bytes.len() != SOLIDITY_ADDRESS_LEN {
            return Err(LedgerError::InvalidAddress(address.to_string()));
        }

        let mut word = [0u8; WORD_LEN];
        word[WORD_LEN - SOLIDITY_ADDRESS_LEN..].copy_from_slice(&bytes);
        self.words.push(word);
        Ok(self)
    }

    pub fn add_uint64(mut self, value: u64) -> Self {
        let mut word = [0u8; WORD_LEN];
        word[WORD_LEN - 8..].copy_from_slice(&value.to_be_bytes());
        self.words.push(word);
        self
    }

    pub fn add_int64(mut self, value: i64) -> Self {
        // two's complement, sign-extended across the whole word
        let fill = if value < 0 { 0xff } else { 0x00 };
        let mut word = [fill; WORD_LEN];
        word[WORD_LEN - 8..].copy_from_slice(&value.to_be_bytes());
        self.words.push(word);
        self
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.words.concat()
    }
}

/// Read-side view over encoded parameters.
#[derive(Debug)]
pub struct AbiWords<'a> {
    bytes: &'a [u8],
}

impl<'a> AbiWords<'a> {
    pub fn new(bytes: &'a [u8]) -> Result<Self, AbiDecodeError> {
        if bytes.len() % WORD_LEN != 0 {
            return Err(AbiDecodeError::Misaligned(bytes.len()));
        }
        Ok(Self { bytes })
    }

    pub fn len(&self) -> usize {
        self.bytes.len() / WORD_LEN
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn word(&self, index: usize) -> Result<&'a [u8], AbiDecodeError> {
        let start = index * WORD_LEN;
        self.bytes
            .get(start..start + WORD_LEN)
            .ok_or(AbiDecodeError::MissingWord(index))
    }

    pub fn address(&self, index: usize) -> Result<String, AbiDecodeError> {
        let word = self.word(index)?;
        let (padding, address) = word.split_at(WORD_LEN - SOLIDITY_ADDRESS_LEN);
        if padding.iter().any(|b| *b != 0) {
            return Err(AbiDecodeError::OutOfRange(index));
        }
        Ok(hex::encode(address))
    }

    pub fn uint64(&self, index: usize) -> Result<u64, AbiDecodeError> {
        let word = self.word(index)?;
        let (high, low) = word.split_at(WORD_LEN - 8);
        if high.iter().any(|b| *b != 0) {
            return Err(AbiDecodeError::OutOfRange(index));
        }
        let mut buf = [0u8; 8];
        buf.copy_from_slice(low);
        Ok(u64::from_be_bytes(buf))
    }

    pub fn int64(&self, index: usize) -> Result<i64, AbiDecodeError> {
        let word = self.word(index)?;
        let (high, low) = word.split_at(WORD_LEN - 8);
        let mut buf = [0u8; 8];
        buf.copy_from_slice(low);
        let value = i64::from_be_bytes(buf);
        let fill = if value < 0 { 0xff } else { 0x00 };
        if high.iter().any(|b| *b != fill) {
            return Err(AbiDecodeError::OutOfRange(index));
        }
        Ok(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AbiDecodeError {
    #[error("parameter data of {0} bytes is not word aligned")]
    Misaligned(usize),
    #[error("parameter {0} is missing")]
    MissingWord(usize),
    #[error("parameter {0} does not fit the requested type")]
    OutOfRange(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_parameters_decode_in_order() {
        let from = "00000000000000000000000000000000000003e9";
        let to = "00000000000000000000000000000000000003ea";
        let params = ContractFunctionParameters::new()
            .add_address(from)
            .unwrap()
            .add_address(&format!("0x{to}"))
            .unwrap()
            .add_int64(50);

        let bytes = params.to_bytes();
        assert_eq!(bytes.len(), 3 * WORD_LEN);

        let words = AbiWords::new(&bytes).unwrap();
        assert_eq!(words.len(), 3);
        assert_eq!(words.address(0).unwrap(), from);
        assert_eq!(words.address(1).unwrap(), to);
        assert_eq!(words.int64(2).unwrap(), 50);
        assert_eq!(words.int64(3), Err(AbiDecodeError::MissingWord(3)));
    }

    #[test]
    fn test_negative_int64_is_sign_extended() {
        let bytes = ContractFunctionParameters::new().add_int64(-5).to_bytes();
        assert!(bytes[..24].iter().all(|b| *b == 0xff));

        let words = AbiWords::new(&bytes).unwrap();
        assert_eq!(words.int64(0).unwrap(), -5);
        assert_eq!(words.uint64(0), Err(AbiDecodeError::OutOfRange(0)));
    }

    #[test]
    fn test_rejects_short_address() {
        assert!(ContractFunctionParameters::new().add_address("1234").is_err());
        assert_eq!(AbiWords::new(&[0u8; 31]).unwrap_err(), AbiDecodeError::Misaligned(31));
    }
}
