use tracing::{error, info, Instrument};

use super::checkpoint::{Checkpoint, CheckpointStore};
use super::context::{WorkflowContext, WorkflowResult, WorkflowStep};
use super::errors::WorkflowError;
use super::report::ProgressReporter;
use super::steps::{self, StepEnv};
use crate::config::WorkflowConfig;
use crate::ledger::{LedgerClient, LedgerSession};
use crate::observability::{create_workflow_span, OperationTimer};
use crate::telemetry::{create_step_span, generate_correlation_id};

const WORKFLOW_NAME: &str = "token_provisioning";

/// Runs the provisioning steps in order against one ledger session,
/// aborting on the first failure.
pub struct ProvisioningWorkflow<'a, C> {
    session: &'a LedgerSession<C>,
    config: &'a WorkflowConfig,
    reporter: &'a dyn ProgressReporter,
    checkpoints: Option<CheckpointStore>,
    correlation_id: String,
}

impl<'a, C: LedgerClient> ProvisioningWorkflow<'a, C> {
    pub fn new(session: &'a LedgerSession<C>, config: &'a WorkflowConfig, reporter: &'a dyn ProgressReporter) -> Self {
        Self {
            session,
            config,
            reporter,
            checkpoints: None,
            correlation_id: generate_correlation_id(),
        }
    }

    /// Save progress after every completed step.
    pub fn with_checkpoints(mut self, store: CheckpointStore) -> Self {
        self.checkpoints = Some(store);
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    fn env(&self) -> StepEnv<'a, C> {
        StepEnv {
            session: self.session,
            config: self.config,
            reporter: self.reporter,
        }
    }

    pub async fn run(&self) -> Result<WorkflowResult, WorkflowError> {
        self.drive(WorkflowContext::new()).await
    }

    /// Continue from a saved checkpoint. Completed steps are skipped, never
    /// re-submitted.
    pub async fn resume(&self, checkpoint: Checkpoint) -> Result<WorkflowResult, WorkflowError> {
        checkpoint.verify()?;
        checkpoint.ensure_network(self.config.network)?;
        info!(
            checkpoint_id = %checkpoint.metadata.checkpoint_id,
            previous_correlation_id = %checkpoint.metadata.correlation_id,
            next_step = ?checkpoint.context.next_step(),
            "Resuming provisioning workflow"
        );
        self.drive(checkpoint.context).await
    }

    async fn drive(&self, mut context: WorkflowContext) -> Result<WorkflowResult, WorkflowError> {
        let span = create_workflow_span(WORKFLOW_NAME, &self.correlation_id);
        async move {
            let timer = OperationTimer::new(WORKFLOW_NAME);
            info!(
                network = %self.config.network,
                operator = %self.session.operator_id(),
                treasury = %self.config.treasury.account_id,
                beneficiary = %self.config.beneficiary.account_id,
                "Starting provisioning workflow"
            );

            if context.bytecode.is_none()
                && context.is_completed(WorkflowStep::LoadBytecode)
                && !context.is_completed(WorkflowStep::UploadBytecode)
            {
                steps::reload_bytecode(&self.env(), &mut context).await?;
            }

            for step in WorkflowStep::ALL {
                if context.is_completed(step) {
                    self.reporter.step_skipped(step);
                    continue;
                }
                self.run_step(step, &mut context).await?;
            }

            timer.finish();
            let result = WorkflowResult::from_context(&context, &self.correlation_id)?;
            info!(
                token_id = %result.token_id,
                contract_id = %result.contract_id,
                total_supply = ?result.total_supply,
                transactions = result.transactions.len(),
                "Provisioning workflow completed"
            );
            Ok(result)
        }
        .instrument(span)
        .await
    }

    /// Run one step, mark it completed and save a checkpoint.
    pub async fn run_step(&self, step: WorkflowStep, context: &mut WorkflowContext) -> Result<(), WorkflowError> {
        let span = create_step_span(step.as_str(), step.number(), &self.correlation_id);
        async move {
            self.reporter.step_started(step);
            let timer = OperationTimer::new(step.as_str());

            if let Err(e) = steps::run_step(&self.env(), step, context).await {
                error!(
                    step = %step,
                    status = ?e.status(),
                    error = %e,
                    "Workflow step failed; no further steps will run"
                );
                return Err(e);
            }

            context.mark_completed(step);
            timer.finish();
            self.reporter.step_finished(step);

            if let Some(store) = &self.checkpoints {
                let checkpoint = Checkpoint::new(context.clone(), self.config.network, &self.correlation_id)?;
                store.save(&checkpoint).await?;
            }
            Ok(())
        }
        .instrument(span)
        .await
    }
}

/// Run every step from the beginning with no checkpointing.
pub async fn run_provisioning_workflow<C: LedgerClient>(
    session: &LedgerSession<C>,
    config: &WorkflowConfig,
    reporter: &dyn ProgressReporter,
) -> Result<WorkflowResult, WorkflowError> {
    ProvisioningWorkflow::new(session, config, reporter).run().await
}
