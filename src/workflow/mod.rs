//! Token provisioning workflow: create a token, deploy the contract that
//! manages it, hand it supply authority, then mint, associate and transfer
//! through it.

pub mod checkpoint;
pub mod chunked;
pub mod context;
pub mod errors;
pub mod orchestrator;
pub mod report;
pub mod steps;

pub use checkpoint::{Checkpoint, CheckpointError, CheckpointStore};
pub use context::{StepRecord, WorkflowContext, WorkflowResult, WorkflowStep};
pub use errors::WorkflowError;
pub use orchestrator::{run_provisioning_workflow, ProvisioningWorkflow};
pub use report::{ConsoleReporter, ProgressReporter, RecordingReporter, SilentReporter};
