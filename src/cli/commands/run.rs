use anyhow::Result;
use tracing::info;

use super::{connect_session, print_summary, report_failure};
use crate::config::ProvisionerConfig;
use crate::ledger::Network;
use crate::workflow::{CheckpointStore, ConsoleReporter, ProvisioningWorkflow, WorkflowResult};

pub struct RunCommand {
    pub bytecode: Option<String>,
    pub network: Option<String>,
    pub checkpoint: Option<String>,
    config: ProvisionerConfig,
}

impl RunCommand {
    pub fn new(config: ProvisionerConfig) -> Self {
        Self {
            bytecode: None,
            network: None,
            checkpoint: None,
            config,
        }
    }

    pub fn with_bytecode(mut self, bytecode: Option<String>) -> Self {
        self.bytecode = bytecode;
        self
    }

    pub fn with_network(mut self, network: Option<String>) -> Self {
        self.network = network;
        self
    }

    pub fn with_checkpoint(mut self, checkpoint: Option<String>) -> Self {
        self.checkpoint = checkpoint;
        self
    }

    /// Configuration with command line flags applied on top.
    fn effective_config(&self) -> Result<ProvisionerConfig> {
        let mut config = self.config.clone();
        if let Some(bytecode) = &self.bytecode {
            config.contract.bytecode_path = bytecode.clone();
        }
        if let Some(network) = &self.network {
            config.network.name = network.parse::<Network>()?;
        }
        if let Some(checkpoint) = &self.checkpoint {
            config.checkpoint.path = Some(checkpoint.clone());
        }
        Ok(config)
    }

    pub async fn execute(&self) -> Result<WorkflowResult> {
        let config = self.effective_config()?;
        let workflow_config = config.resolve()?;
        let session = connect_session(&config, &workflow_config).await?;
        println!();

        let reporter = ConsoleReporter;
        let mut workflow = ProvisioningWorkflow::new(&session, &workflow_config, &reporter);
        if let Some(path) = &config.checkpoint.path {
            workflow = workflow.with_checkpoints(CheckpointStore::new(path));
        }
        info!(correlation_id = %workflow.correlation_id(), "Provisioning run started");

        match workflow.run().await {
            Ok(result) => {
                print_summary(&result);
                Ok(result)
            }
            Err(e) => {
                report_failure(&e);
                if let Some(path) = &config.checkpoint.path {
                    println!("   Progress saved in {path}; continue with 'token-provisioner resume'.");
                }
                Err(e.into())
            }
        }
    }
}
