// Token Provisioner Library - contract-managed fungible token setup
// This exposes the core components for testing and integration

pub mod cli;
pub mod config;
pub mod fs;
pub mod ledger;
pub mod observability;
pub mod telemetry;
pub mod workflow;

// Re-export key types for easy access
pub use config::{ConfigError, ProvisionerConfig, WorkflowConfig};
pub use ledger::{LedgerClient, LedgerError, LedgerSession, SimulatedLedger};
pub use observability::{create_workflow_span, ledger_metrics, LedgerApiMetrics, OperationTimer};
pub use telemetry::{generate_correlation_id, init_telemetry, shutdown_telemetry};
pub use workflow::{
    run_provisioning_workflow, Checkpoint, CheckpointStore, ProvisioningWorkflow, WorkflowContext,
    WorkflowError, WorkflowResult, WorkflowStep,
};
