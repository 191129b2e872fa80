//! The provisioning steps. Each one reads the outputs of earlier steps from
//! the [`WorkflowContext`], talks to the ledger through the session, and
//! writes its own outputs back.

use std::io::ErrorKind;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::chunked::{chunk_count, upload_chunks, Chunk, ChunkAck, ChunkSink, ChunkUploadError};
use super::context::{required, StepRecord, WorkflowContext, WorkflowStep};
use super::errors::WorkflowError;
use super::report::ProgressReporter;
use crate::config::WorkflowConfig;
use crate::ledger::abi::{ASSOCIATE_FUNCTION, MINT_FUNCTION, TRANSFER_FUNCTION};
use crate::ledger::transaction::{
    ContractCreateTransaction, ContractExecuteTransaction, FileAppendTransaction, FileCreateTransaction,
    TokenCreateTransaction, TokenUpdateTransaction,
};
use crate::ledger::{
    AccountId, ContractFunctionParameters, FileId, Hbar, Key, LedgerClient, LedgerError, LedgerSession, PrivateKey,
    TokenId, TokenInfo, Transaction, TransactionData, TransactionReceipt,
};

/// What every step runs against.
pub struct StepEnv<'a, C> {
    pub session: &'a LedgerSession<C>,
    pub config: &'a WorkflowConfig,
    pub reporter: &'a dyn ProgressReporter,
}

pub async fn run_step<C: LedgerClient>(
    env: &StepEnv<'_, C>,
    step: WorkflowStep,
    context: &mut WorkflowContext,
) -> Result<(), WorkflowError> {
    match step {
        WorkflowStep::LoadBytecode => load_bytecode(env, context).await,
        WorkflowStep::CreateToken => create_token(env, context).await,
        WorkflowStep::UploadBytecode => upload_bytecode(env, context).await,
        WorkflowStep::DeployContract => deploy_contract(env, context).await,
        WorkflowStep::TransferSupplyAuthority => transfer_supply_authority(env, context).await,
        WorkflowStep::MintViaContract => mint_via_contract(env, context).await,
        WorkflowStep::AssociateBeneficiary => associate_beneficiary(env, context).await,
        WorkflowStep::TransferToBeneficiary => transfer_to_beneficiary(env, context).await,
        WorkflowStep::VerifyBalances => verify_balances(env, context).await,
    }
}

/// Submit, fetch the receipt, and fail on any status other than SUCCESS.
async fn confirm<C: LedgerClient>(
    session: &LedgerSession<C>,
    step: WorkflowStep,
    transaction: Transaction,
    records: &mut Vec<StepRecord>,
) -> Result<TransactionReceipt, WorkflowError> {
    let kind = transaction.body.data.kind();
    let response = session
        .execute(transaction)
        .await
        .map_err(|source| WorkflowError::SubmissionFailure { step, source })?;
    let receipt = session
        .receipt(&response)
        .await
        .map_err(|source| WorkflowError::SubmissionFailure { step, source })?;

    records.push(StepRecord {
        step,
        kind: kind.to_string(),
        transaction_id: receipt.transaction_id.clone(),
        status: receipt.status,
    });

    if !receipt.status.is_success() {
        error!(
            step = %step,
            kind,
            transaction_id = %receipt.transaction_id,
            status = %receipt.status,
            "Transaction finalized with failure status"
        );
        return Err(WorkflowError::ReceiptFailure {
            step,
            status: receipt.status,
            transaction_id: receipt.transaction_id,
        });
    }

    debug!(step = %step, kind, transaction_id = %receipt.transaction_id, "Transaction confirmed");
    Ok(receipt)
}

fn countersign(
    step: WorkflowStep,
    transaction: Transaction,
    key: &PrivateKey,
) -> Result<Transaction, WorkflowError> {
    transaction
        .sign(key)
        .map_err(|source| WorkflowError::SubmissionFailure { step, source })
}

fn encoding_failure(step: WorkflowStep) -> impl FnOnce(LedgerError) -> WorkflowError {
    move |source| WorkflowError::SubmissionFailure { step, source }
}

/// Token query after a state change. The change is already final, so a
/// failed query only leaves the observed value unknown.
async fn observe_token<C: LedgerClient>(
    env: &StepEnv<'_, C>,
    step: WorkflowStep,
    token_id: TokenId,
) -> Option<TokenInfo> {
    match env.session.token_info(token_id).await {
        Ok(info) => Some(info),
        Err(e) => {
            warn!(
                step = %step,
                token_id = %token_id,
                error = %e,
                "Token query failed; continuing without the observed value"
            );
            None
        }
    }
}

async fn query_token_balance<C: LedgerClient>(
    env: &StepEnv<'_, C>,
    step: WorkflowStep,
    account_id: AccountId,
    token_id: TokenId,
) -> Result<Option<u64>, WorkflowError> {
    let balance = env
        .session
        .account_balance(account_id)
        .await
        .map_err(|source| WorkflowError::QueryFailure { step, source })?;
    Ok(balance.token_balance(token_id))
}

fn describe_key(key: &Option<Key>) -> String {
    key.as_ref().map_or_else(|| "none".to_string(), Key::to_string)
}

fn describe_observed(value: Option<u64>) -> String {
    value.map_or_else(|| "unknown".to_string(), |units| units.to_string())
}

fn describe_balance(balance: Option<u64>) -> String {
    balance.map_or_else(|| "not associated".to_string(), |units| units.to_string())
}

async fn read_bytecode(env: &StepEnv<'_, impl LedgerClient>) -> Result<Vec<u8>, WorkflowError> {
    let path = &env.config.bytecode_path;
    match tokio::fs::read(path).await {
        Ok(bytecode) => Ok(bytecode),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(WorkflowError::ResourceNotFound { path: path.clone() }),
        Err(source) => Err(WorkflowError::ResourceUnreadable {
            path: path.clone(),
            source,
        }),
    }
}

pub async fn load_bytecode<C: LedgerClient>(
    env: &StepEnv<'_, C>,
    context: &mut WorkflowContext,
) -> Result<(), WorkflowError> {
    let bytecode = read_bytecode(env).await?;
    let digest = hex::encode(Sha256::digest(&bytecode));

    info!(
        path = ?env.config.bytecode_path,
        bytes = bytecode.len(),
        sha256 = %digest,
        "Loaded contract bytecode"
    );
    env.reporter.detail(&format!("Bytecode loaded: {} bytes", bytecode.len()));

    context.bytecode_len = Some(bytecode.len());
    context.bytecode_sha256 = Some(digest);
    context.bytecode = Some(bytecode);
    Ok(())
}

/// Re-read the bytecode for a resumed run that still has to upload it.
pub async fn reload_bytecode<C: LedgerClient>(
    env: &StepEnv<'_, C>,
    context: &mut WorkflowContext,
) -> Result<(), WorkflowError> {
    let bytecode = read_bytecode(env).await?;
    let digest = hex::encode(Sha256::digest(&bytecode));
    if context.bytecode_sha256.as_deref().is_some_and(|saved| saved != digest) {
        warn!(
            path = ?env.config.bytecode_path,
            saved = ?context.bytecode_sha256,
            current = %digest,
            "Bytecode changed since the checkpoint was written; uploading the current file"
        );
    }

    context.bytecode_len = Some(bytecode.len());
    context.bytecode_sha256 = Some(digest);
    context.bytecode = Some(bytecode);
    Ok(())
}

pub async fn create_token<C: LedgerClient>(
    env: &StepEnv<'_, C>,
    context: &mut WorkflowContext,
) -> Result<(), WorkflowError> {
    let step = WorkflowStep::CreateToken;
    let treasury = &env.config.treasury;
    let token = &env.config.token;

    let data = TransactionData::TokenCreate(
        TokenCreateTransaction::new(&token.name, &token.symbol)
            .decimals(token.decimals)
            .initial_supply(token.initial_supply)
            .treasury(treasury.account_id)
            .admin_key(treasury.public_key())
            .supply_key(treasury.public_key()),
    );
    let transaction = countersign(step, env.session.freeze(data, None), &treasury.private_key)?;
    let receipt = confirm(env.session, step, transaction, &mut context.transactions).await?;

    let token_id = required(&receipt.token_id, step, "token id in receipt")?;
    let token_address = token_id.to_solidity_address();
    context.token_id = Some(token_id);
    context.token_address = Some(token_address.clone());
    env.reporter.detail(&format!("Token ID: {token_id}"));
    env.reporter.detail(&format!("Token ID in Solidity format: {token_address}"));

    let supply = observe_token(env, step, token_id).await.map(|info| info.total_supply);
    if supply.is_some_and(|supply| supply != token.initial_supply) {
        warn!(
            token_id = %token_id,
            expected = token.initial_supply,
            actual = ?supply,
            "Initial supply differs from the configured value"
        );
    }
    env.reporter.detail(&format!("Initial token supply: {}", describe_observed(supply)));
    info!(token_id = %token_id, supply = ?supply, "Token created");

    context.initial_supply = supply;
    Ok(())
}

/// Appends bytecode chunks to one file, each as its own confirmed
/// transaction.
struct FileAppendSink<'a, C> {
    session: &'a LedgerSession<C>,
    file_id: FileId,
    max_fee: Hbar,
    records: Mutex<Vec<StepRecord>>,
}

#[async_trait]
impl<'a, C: LedgerClient> ChunkSink for FileAppendSink<'a, C> {
    type Error = WorkflowError;

    async fn append(&self, chunk: Chunk<'_>) -> Result<ChunkAck, WorkflowError> {
        let data = TransactionData::FileAppend(FileAppendTransaction {
            file_id: self.file_id,
            contents: chunk.bytes.to_vec(),
        });
        let transaction = self.session.freeze(data, Some(self.max_fee));

        let mut records = self.records.lock().await;
        confirm(self.session, WorkflowStep::UploadBytecode, transaction, &mut records).await?;
        debug!(
            file_id = %self.file_id,
            chunk = chunk.index + 1,
            total = chunk.total,
            offset = chunk.offset,
            bytes = chunk.bytes.len(),
            "Appended bytecode chunk"
        );
        Ok(ChunkAck {
            bytes: chunk.bytes.len(),
        })
    }
}

pub async fn upload_bytecode<C: LedgerClient>(
    env: &StepEnv<'_, C>,
    context: &mut WorkflowContext,
) -> Result<(), WorkflowError> {
    let step = WorkflowStep::UploadBytecode;
    let chunk_size = env.config.chunk_size;
    let max_chunks = env.config.max_chunks;

    let payload_len = context
        .bytecode
        .as_ref()
        .map(Vec::len)
        .ok_or(WorkflowError::MissingOutput { step, output: "bytecode" })?;
    let required_chunks = chunk_count(payload_len, chunk_size);
    if required_chunks > max_chunks {
        return Err(WorkflowError::ChunkLimitExceeded {
            payload_len,
            chunk_size: chunk_size.get(),
            required: required_chunks,
            max_chunks,
        });
    }

    let data = TransactionData::FileCreate(FileCreateTransaction {
        keys: vec![Key::from(env.session.operator_public_key())],
        contents: Vec::new(),
    });
    let transaction = env.session.freeze(data, None);
    let receipt = confirm(env.session, step, transaction, &mut context.transactions).await?;
    let file_id = required(&receipt.file_id, step, "file id in receipt")?;
    env.reporter
        .detail(&format!("The smart contract bytecode file ID is: {file_id}"));

    let sink = FileAppendSink {
        session: env.session,
        file_id,
        max_fee: env.config.max_transaction_fee,
        records: Mutex::new(Vec::new()),
    };
    let bytecode = context.bytecode.as_deref().unwrap_or_default();
    let uploaded = upload_chunks(&sink, bytecode, chunk_size, max_chunks).await;
    context.transactions.extend(sink.records.into_inner());

    let summary = uploaded.map_err(|e| match e {
        ChunkUploadError::TooManyChunks {
            payload_len,
            chunk_size,
            required,
            max_chunks,
        } => WorkflowError::ChunkLimitExceeded {
            payload_len,
            chunk_size,
            required,
            max_chunks,
        },
        ChunkUploadError::ChunkFailed {
            chunk_index,
            total_chunks,
            bytes_acknowledged,
            source,
        } => WorkflowError::PartialChunkFailure {
            file_id,
            chunk_index,
            total_chunks,
            bytes_acknowledged,
            status: source.status(),
            reason: source.to_string(),
        },
        ChunkUploadError::ShortAcknowledgment {
            chunk_index,
            total_chunks,
            expected,
            acknowledged,
            bytes_acknowledged,
        } => WorkflowError::PartialChunkFailure {
            file_id,
            chunk_index,
            total_chunks,
            bytes_acknowledged,
            status: None,
            reason: format!("acknowledged {acknowledged} of {expected} bytes"),
        },
    })?;

    context.bytecode_file_id = Some(file_id);

    match env.session.file_contents(file_id).await {
        Ok(stored) if stored.len() != payload_len => warn!(
            file_id = %file_id,
            expected = payload_len,
            actual = stored.len(),
            "Stored bytecode length differs from the uploaded payload"
        ),
        Ok(_) => {}
        Err(e) => warn!(
            file_id = %file_id,
            error = %e,
            "File contents query failed; stored length not checked"
        ),
    }

    env.reporter.detail(&format!(
        "Content added: SUCCESS ({} bytes in {} chunks)",
        summary.bytes, summary.chunks
    ));
    info!(file_id = %file_id, bytes = summary.bytes, chunks = summary.chunks, "Bytecode uploaded");
    Ok(())
}

pub async fn deploy_contract<C: LedgerClient>(
    env: &StepEnv<'_, C>,
    context: &mut WorkflowContext,
) -> Result<(), WorkflowError> {
    let step = WorkflowStep::DeployContract;
    let token_id = required(&context.token_id, step, "token id")?;
    let file_id = required(&context.bytecode_file_id, step, "bytecode file id")?;

    let constructor = ContractFunctionParameters::new()
        .add_address(&token_id.to_solidity_address())
        .map_err(encoding_failure(step))?;
    let data = TransactionData::ContractCreate(ContractCreateTransaction {
        bytecode_file_id: file_id,
        gas: env.config.gas,
        constructor_parameters: constructor.to_bytes(),
    });
    let transaction = env.session.freeze(data, None);
    let receipt = confirm(env.session, step, transaction, &mut context.transactions).await?;

    let contract_id = required(&receipt.contract_id, step, "contract id in receipt")?;
    let contract_address = contract_id.to_solidity_address();
    env.reporter.detail(&format!("The smart contract ID is: {contract_id}"));
    env.reporter
        .detail(&format!("The smart contract ID in Solidity format is: {contract_address}"));
    info!(contract_id = %contract_id, token_id = %token_id, "Contract deployed");

    context.contract_id = Some(contract_id);
    context.contract_address = Some(contract_address);
    Ok(())
}

pub async fn transfer_supply_authority<C: LedgerClient>(
    env: &StepEnv<'_, C>,
    context: &mut WorkflowContext,
) -> Result<(), WorkflowError> {
    let step = WorkflowStep::TransferSupplyAuthority;
    let token_id = required(&context.token_id, step, "token id")?;
    let contract_id = required(&context.contract_id, step, "contract id")?;

    let before = observe_token(env, step, token_id).await.and_then(|info| info.supply_key);
    env.reporter.detail(&format!("Token supply key: {}", describe_key(&before)));

    let data = TransactionData::TokenUpdate(TokenUpdateTransaction {
        token_id,
        supply_key: Some(Key::Contract(contract_id)),
    });
    let transaction = countersign(step, env.session.freeze(data, None), &env.config.treasury.private_key)?;
    let receipt = confirm(env.session, step, transaction, &mut context.transactions).await?;
    context.supply_key_before = before.clone();
    env.reporter.detail(&format!("Token update status: {}", receipt.status));

    let after = observe_token(env, step, token_id).await.and_then(|info| info.supply_key);
    env.reporter.detail(&format!("New token supply key: {}", describe_key(&after)));

    if before == after || after != Some(Key::Contract(contract_id)) {
        warn!(
            token_id = %token_id,
            contract_id = %contract_id,
            before = %describe_key(&before),
            after = %describe_key(&after),
            "Supply key does not show the contract as new authority"
        );
    } else {
        info!(token_id = %token_id, contract_id = %contract_id, "Supply authority moved to contract");
    }

    context.supply_key_after = after;
    Ok(())
}

pub async fn mint_via_contract<C: LedgerClient>(
    env: &StepEnv<'_, C>,
    context: &mut WorkflowContext,
) -> Result<(), WorkflowError> {
    let step = WorkflowStep::MintViaContract;
    let token_id = required(&context.token_id, step, "token id")?;
    let contract_id = required(&context.contract_id, step, "contract id")?;
    let amount = env.config.mint_amount;

    let parameters = ContractFunctionParameters::new().add_uint64(amount);
    let data = TransactionData::ContractExecute(ContractExecuteTransaction::new(
        contract_id,
        env.config.gas,
        MINT_FUNCTION,
        &parameters,
    ));
    let transaction = countersign(
        step,
        env.session.freeze(data, Some(env.config.max_transaction_fee)),
        &env.config.treasury.private_key,
    )?;
    let receipt = confirm(env.session, step, transaction, &mut context.transactions).await?;
    env.reporter.detail(&format!("New tokens minted: {}", receipt.status));

    let supply = observe_token(env, step, token_id)
        .await
        .map(|info| info.total_supply)
        .or(receipt.total_supply);
    let expected = context
        .initial_supply
        .unwrap_or(env.config.token.initial_supply)
        .saturating_add(amount);
    if supply.is_some_and(|supply| supply != expected) {
        warn!(token_id = %token_id, expected, actual = ?supply, "Supply after mint differs from expectation");
    }
    env.reporter.detail(&format!("New token supply: {}", describe_observed(supply)));
    info!(token_id = %token_id, minted = amount, supply = ?supply, "Minted through contract");

    context.total_supply = supply;
    Ok(())
}

pub async fn associate_beneficiary<C: LedgerClient>(
    env: &StepEnv<'_, C>,
    context: &mut WorkflowContext,
) -> Result<(), WorkflowError> {
    let step = WorkflowStep::AssociateBeneficiary;
    let contract_id = required(&context.contract_id, step, "contract id")?;
    let beneficiary = &env.config.beneficiary;

    let parameters = ContractFunctionParameters::new()
        .add_address(&beneficiary.account_id.to_solidity_address())
        .map_err(encoding_failure(step))?;
    let data = TransactionData::ContractExecute(ContractExecuteTransaction::new(
        contract_id,
        env.config.gas,
        ASSOCIATE_FUNCTION,
        &parameters,
    ));
    let transaction = countersign(
        step,
        env.session.freeze(data, Some(env.config.max_transaction_fee)),
        &beneficiary.private_key,
    )?;
    let receipt = confirm(env.session, step, transaction, &mut context.transactions).await?;

    env.reporter
        .detail(&format!("Token association with beneficiary account: {}", receipt.status));
    info!(account_id = %beneficiary.account_id, contract_id = %contract_id, "Beneficiary associated");
    Ok(())
}

pub async fn transfer_to_beneficiary<C: LedgerClient>(
    env: &StepEnv<'_, C>,
    context: &mut WorkflowContext,
) -> Result<(), WorkflowError> {
    let step = WorkflowStep::TransferToBeneficiary;
    let contract_id = required(&context.contract_id, step, "contract id")?;
    let treasury = &env.config.treasury;
    let beneficiary = &env.config.beneficiary;
    let amount = env.config.transfer_amount;

    let parameters = ContractFunctionParameters::new()
        .add_address(&treasury.account_id.to_solidity_address())
        .and_then(|p| p.add_address(&beneficiary.account_id.to_solidity_address()))
        .map_err(encoding_failure(step))?
        .add_int64(amount);
    let data = TransactionData::ContractExecute(ContractExecuteTransaction::new(
        contract_id,
        env.config.gas,
        TRANSFER_FUNCTION,
        &parameters,
    ));
    let transaction = countersign(
        step,
        env.session.freeze(data, Some(env.config.max_transaction_fee)),
        &treasury.private_key,
    )?;
    let receipt = confirm(env.session, step, transaction, &mut context.transactions).await?;

    env.reporter
        .detail(&format!("Token transfer from treasury to beneficiary: {}", receipt.status));
    info!(
        from = %treasury.account_id,
        to = %beneficiary.account_id,
        amount,
        "Transferred through contract"
    );
    Ok(())
}

pub async fn verify_balances<C: LedgerClient>(
    env: &StepEnv<'_, C>,
    context: &mut WorkflowContext,
) -> Result<(), WorkflowError> {
    let step = WorkflowStep::VerifyBalances;
    let token_id = required(&context.token_id, step, "token id")?;

    let treasury = query_token_balance(env, step, env.config.treasury.account_id, token_id).await?;
    let beneficiary = query_token_balance(env, step, env.config.beneficiary.account_id, token_id).await?;

    env.reporter.detail(&format!(
        "Treasury balance: {} units of token: {token_id}",
        describe_balance(treasury)
    ));
    env.reporter.detail(&format!(
        "Beneficiary balance: {} units of token: {token_id}",
        describe_balance(beneficiary)
    ));

    let expected = u64::try_from(env.config.transfer_amount).ok();
    if beneficiary != expected {
        warn!(
            token_id = %token_id,
            expected = ?expected,
            actual = ?beneficiary,
            "Beneficiary balance differs from the transferred amount"
        );
    }
    info!(token_id = %token_id, treasury = ?treasury, beneficiary = ?beneficiary, "Balances verified");

    context.treasury_balance = treasury;
    context.beneficiary_balance = beneficiary;
    Ok(())
}
