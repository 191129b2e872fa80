use std::path::PathBuf;

use thiserror::Error;

use super::checkpoint::CheckpointError;
use super::context::WorkflowStep;
use crate::ledger::{FileId, LedgerError, Status, TransactionId};

/// Errors that abort a provisioning run.
///
/// None of these are retried. The step that failed is carried so an operator
/// can inspect the partial ledger state and resume from a checkpoint.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("contract bytecode not found at {}", .path.display())]
    ResourceNotFound { path: PathBuf },

    #[error("contract bytecode at {} could not be read: {source}", .path.display())]
    ResourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{step}: submission failed: {source}")]
    SubmissionFailure {
        step: WorkflowStep,
        #[source]
        source: LedgerError,
    },

    #[error("{step}: transaction {transaction_id} finalized with status {status}")]
    ReceiptFailure {
        step: WorkflowStep,
        status: Status,
        transaction_id: TransactionId,
    },

    #[error(
        "bytecode upload to file {file_id} incomplete: chunk index {chunk_index} of {total_chunks} failed \
         after {bytes_acknowledged} bytes were acknowledged: {reason}"
    )]
    PartialChunkFailure {
        file_id: FileId,
        chunk_index: usize,
        total_chunks: usize,
        bytes_acknowledged: usize,
        status: Option<Status>,
        reason: String,
    },

    #[error("bytecode of {payload_len} bytes needs {required} chunks of {chunk_size} bytes, at most {max_chunks} allowed")]
    ChunkLimitExceeded {
        payload_len: usize,
        chunk_size: usize,
        required: usize,
        max_chunks: usize,
    },

    #[error("{step}: query failed: {source}")]
    QueryFailure {
        step: WorkflowStep,
        #[source]
        source: LedgerError,
    },

    #[error("{step}: missing {output} from an earlier step")]
    MissingOutput {
        step: WorkflowStep,
        output: &'static str,
    },

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

impl WorkflowError {
    /// Status code reported by the ledger, when the failure carries one.
    pub fn status(&self) -> Option<Status> {
        match self {
            WorkflowError::SubmissionFailure { source, .. } | WorkflowError::QueryFailure { source, .. } => {
                source.status()
            }
            WorkflowError::ReceiptFailure { status, .. } => Some(*status),
            WorkflowError::PartialChunkFailure { status, .. } => *status,
            _ => None,
        }
    }

    /// The step that was running when the workflow aborted. `None` when
    /// the failure happened while saving or loading progress.
    pub fn step(&self) -> Option<WorkflowStep> {
        match self {
            WorkflowError::ResourceNotFound { .. } | WorkflowError::ResourceUnreadable { .. } => {
                Some(WorkflowStep::LoadBytecode)
            }
            WorkflowError::PartialChunkFailure { .. } | WorkflowError::ChunkLimitExceeded { .. } => {
                Some(WorkflowStep::UploadBytecode)
            }
            WorkflowError::SubmissionFailure { step, .. }
            | WorkflowError::ReceiptFailure { step, .. }
            | WorkflowError::QueryFailure { step, .. }
            | WorkflowError::MissingOutput { step, .. } => Some(*step),
            WorkflowError::Checkpoint(_) => None,
        }
    }
}
