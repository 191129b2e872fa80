use anyhow::Result;
use tracing::info;

use super::{checkpoint_path, connect_session, print_summary, report_failure};
use crate::config::ProvisionerConfig;
use crate::workflow::{CheckpointStore, ConsoleReporter, ProvisioningWorkflow, WorkflowResult};

pub struct ResumeCommand {
    pub checkpoint: Option<String>,
    config: ProvisionerConfig,
}

impl ResumeCommand {
    pub fn new(config: ProvisionerConfig) -> Self {
        Self {
            checkpoint: None,
            config,
        }
    }

    pub fn with_checkpoint(mut self, checkpoint: Option<String>) -> Self {
        self.checkpoint = checkpoint;
        self
    }

    pub async fn execute(&self) -> Result<WorkflowResult> {
        let path = checkpoint_path(self.checkpoint.as_deref(), &self.config)?;
        let store = CheckpointStore::new(&path);
        let checkpoint = store.load().await?;

        let workflow_config = self.config.resolve()?;
        match checkpoint.context.next_step() {
            Some(step) => println!(
                "🔁 Resuming from {} ({}), checkpoint {}",
                step,
                step.description(),
                checkpoint.metadata.checkpoint_id
            ),
            None => println!("ℹ️  Checkpoint {} already covers every step", checkpoint.metadata.checkpoint_id),
        }

        let session = connect_session(&self.config, &workflow_config).await?;
        println!();

        let reporter = ConsoleReporter;
        let workflow = ProvisioningWorkflow::new(&session, &workflow_config, &reporter).with_checkpoints(store);
        info!(
            correlation_id = %workflow.correlation_id(),
            checkpoint = ?path,
            "Provisioning resume started"
        );

        match workflow.resume(checkpoint).await {
            Ok(result) => {
                print_summary(&result);
                Ok(result)
            }
            Err(e) => {
                report_failure(&e);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_checkpoint_file_is_reported() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("checkpoint.json");
        let command = ResumeCommand::new(ProvisionerConfig::default())
            .with_checkpoint(Some(path.to_string_lossy().to_string()));

        let err = command.execute().await.unwrap_err();
        assert!(err.to_string().contains("no checkpoint found"));
    }
}
