use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::WorkflowError;
use crate::ledger::{ContractId, FileId, Key, Status, TokenId, TransactionId};

/// The provisioning steps, in the only order they may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    LoadBytecode,
    CreateToken,
    UploadBytecode,
    DeployContract,
    TransferSupplyAuthority,
    MintViaContract,
    AssociateBeneficiary,
    TransferToBeneficiary,
    VerifyBalances,
}

impl WorkflowStep {
    pub const ALL: [WorkflowStep; 9] = [
        WorkflowStep::LoadBytecode,
        WorkflowStep::CreateToken,
        WorkflowStep::UploadBytecode,
        WorkflowStep::DeployContract,
        WorkflowStep::TransferSupplyAuthority,
        WorkflowStep::MintViaContract,
        WorkflowStep::AssociateBeneficiary,
        WorkflowStep::TransferToBeneficiary,
        WorkflowStep::VerifyBalances,
    ];

    /// 1-based position in the sequence.
    pub fn number(self) -> usize {
        self as usize + 1
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowStep::LoadBytecode => "load_bytecode",
            WorkflowStep::CreateToken => "create_token",
            WorkflowStep::UploadBytecode => "upload_bytecode",
            WorkflowStep::DeployContract => "deploy_contract",
            WorkflowStep::TransferSupplyAuthority => "transfer_supply_authority",
            WorkflowStep::MintViaContract => "mint_via_contract",
            WorkflowStep::AssociateBeneficiary => "associate_beneficiary",
            WorkflowStep::TransferToBeneficiary => "transfer_to_beneficiary",
            WorkflowStep::VerifyBalances => "verify_balances",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            WorkflowStep::LoadBytecode => "Load contract bytecode",
            WorkflowStep::CreateToken => "Create fungible token",
            WorkflowStep::UploadBytecode => "Upload bytecode to file storage",
            WorkflowStep::DeployContract => "Deploy contract",
            WorkflowStep::TransferSupplyAuthority => "Transfer supply key to contract",
            WorkflowStep::MintViaContract => "Mint through contract",
            WorkflowStep::AssociateBeneficiary => "Associate beneficiary with token",
            WorkflowStep::TransferToBeneficiary => "Transfer tokens to beneficiary",
            WorkflowStep::VerifyBalances => "Verify balances",
        }
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} ({})", self.number(), self.as_str())
    }
}

/// One finalized transaction, kept for reporting and checkpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: WorkflowStep,
    pub kind: String,
    pub transaction_id: TransactionId,
    pub status: Status,
}

/// Outputs accumulated as the steps run. Each step reads what earlier steps
/// produced and fills in its own fields.
///
/// The bytecode itself is never serialized; a resumed run re-reads it from
/// disk if the upload has not happened yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowContext {
    #[serde(skip)]
    pub bytecode: Option<Vec<u8>>,
    pub bytecode_len: Option<usize>,
    pub bytecode_sha256: Option<String>,
    pub token_id: Option<TokenId>,
    pub token_address: Option<String>,
    pub initial_supply: Option<u64>,
    pub bytecode_file_id: Option<FileId>,
    pub contract_id: Option<ContractId>,
    pub contract_address: Option<String>,
    pub supply_key_before: Option<Key>,
    pub supply_key_after: Option<Key>,
    pub total_supply: Option<u64>,
    pub treasury_balance: Option<u64>,
    pub beneficiary_balance: Option<u64>,
    pub completed: Vec<WorkflowStep>,
    pub transactions: Vec<StepRecord>,
}

impl WorkflowContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_completed(&self, step: WorkflowStep) -> bool {
        self.completed.contains(&step)
    }

    pub fn mark_completed(&mut self, step: WorkflowStep) {
        if !self.is_completed(step) {
            self.completed.push(step);
        }
    }

    /// First step that has not completed yet.
    pub fn next_step(&self) -> Option<WorkflowStep> {
        WorkflowStep::ALL.into_iter().find(|step| !self.is_completed(*step))
    }

    pub fn last_completed(&self) -> Option<WorkflowStep> {
        self.completed.iter().max().copied()
    }

    pub fn is_finished(&self) -> bool {
        self.next_step().is_none()
    }
}

/// Take an output an earlier step should have produced.
pub(crate) fn required<T: Clone>(
    value: &Option<T>,
    step: WorkflowStep,
    output: &'static str,
) -> Result<T, WorkflowError> {
    value.clone().ok_or(WorkflowError::MissingOutput { step, output })
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub correlation_id: String,
    pub token_id: TokenId,
    pub token_address: String,
    pub bytecode_file_id: FileId,
    pub contract_id: ContractId,
    pub contract_address: String,
    pub initial_supply: Option<u64>,
    pub total_supply: Option<u64>,
    pub supply_key_before: Option<Key>,
    pub supply_key_after: Option<Key>,
    /// `None` when the account is not associated with the token.
    pub treasury_balance: Option<u64>,
    pub beneficiary_balance: Option<u64>,
    pub transactions: Vec<StepRecord>,
}

impl WorkflowResult {
    pub fn from_context(context: &WorkflowContext, correlation_id: &str) -> Result<Self, WorkflowError> {
        let step = WorkflowStep::VerifyBalances;
        Ok(Self {
            correlation_id: correlation_id.to_string(),
            token_id: required(&context.token_id, step, "token id")?,
            token_address: required(&context.token_address, step, "token address")?,
            bytecode_file_id: required(&context.bytecode_file_id, step, "bytecode file id")?,
            contract_id: required(&context.contract_id, step, "contract id")?,
            contract_address: required(&context.contract_address, step, "contract address")?,
            initial_supply: context.initial_supply,
            total_supply: context.total_supply,
            supply_key_before: context.supply_key_before.clone(),
            supply_key_after: context.supply_key_after.clone(),
            treasury_balance: context.treasury_balance,
            beneficiary_balance: context.beneficiary_balance,
            transactions: context.transactions.clone(),
        })
    }

    /// The supply key changed during the run and now names the contract.
    pub fn supply_authority_transferred(&self) -> bool {
        self.supply_key_before != self.supply_key_after
            && self.supply_key_after == Some(Key::Contract(self.contract_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_are_numbered_in_order() {
        let numbers: Vec<usize> = WorkflowStep::ALL.iter().map(|s| s.number()).collect();
        assert_eq!(numbers, (1..=9).collect::<Vec<_>>());
        assert_eq!(WorkflowStep::DeployContract.to_string(), "step 4 (deploy_contract)");
    }

    #[test]
    fn test_next_step_follows_completion() {
        let mut context = WorkflowContext::new();
        assert_eq!(context.next_step(), Some(WorkflowStep::LoadBytecode));

        context.mark_completed(WorkflowStep::LoadBytecode);
        context.mark_completed(WorkflowStep::CreateToken);
        context.mark_completed(WorkflowStep::CreateToken);
        assert_eq!(context.completed.len(), 2);
        assert_eq!(context.next_step(), Some(WorkflowStep::UploadBytecode));
        assert_eq!(context.last_completed(), Some(WorkflowStep::CreateToken));
        assert!(!context.is_finished());
    }

    #[test]
    fn test_bytecode_is_not_serialized() {
        let context = WorkflowContext {
            bytecode: Some(vec![1, 2, 3]),
            bytecode_len: Some(3),
            token_id: Some(TokenId::new(0, 0, 1001)),
            ..Default::default()
        };
        let json = serde_json::to_string(&context).unwrap();
        let restored: WorkflowContext = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.bytecode, None);
        assert_eq!(restored.bytecode_len, Some(3));
        assert_eq!(restored.token_id, context.token_id);
    }

    #[test]
    fn test_result_requires_deployment_outputs() {
        let context = WorkflowContext {
            token_id: Some(TokenId::new(0, 0, 1001)),
            token_address: Some(TokenId::new(0, 0, 1001).to_solidity_address()),
            ..Default::default()
        };
        let err = WorkflowResult::from_context(&context, "run").unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::MissingOutput {
                output: "bytecode file id",
                ..
            }
        ));
    }

    #[test]
    fn test_supply_authority_transfer_detection() {
        let contract_id = ContractId::new(0, 0, 1003);
        let human_key = Key::Ed25519(crate::ledger::PrivateKey::generate().public_key());
        let mut result = WorkflowResult {
            correlation_id: "run".to_string(),
            token_id: TokenId::new(0, 0, 1001),
            token_address: String::new(),
            bytecode_file_id: FileId::new(0, 0, 1002),
            contract_id,
            contract_address: String::new(),
            initial_supply: Some(100),
            total_supply: Some(250),
            supply_key_before: Some(human_key.clone()),
            supply_key_after: Some(Key::Contract(contract_id)),
            treasury_balance: Some(200),
            beneficiary_balance: Some(50),
            transactions: Vec::new(),
        };
        assert!(result.supply_authority_transferred());

        result.supply_key_after = Some(human_key);
        assert!(!result.supply_authority_transferred());
    }
}
