use anyhow::Result;
use clap::Parser;
use std::sync::Arc;

use token_provisioner::cli::commands::{
    init::InitCommand, resume::ResumeCommand, run::RunCommand, status::StatusCommand,
};
use token_provisioner::cli::{Cli, Commands};
use token_provisioner::config::ProvisionerConfig;
use token_provisioner::fs::StandardFileSystem;
use token_provisioner::observability::ledger_metrics;
use token_provisioner::telemetry::{init_telemetry, shutdown_telemetry};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        tracing::error!(error = %e, "token-provisioner failed");
        eprintln!("Error: {e:#}");
        shutdown_telemetry();
        std::process::exit(1);
    }
    shutdown_telemetry();
}

fn run(cli: Cli) -> Result<()> {
    ProvisionerConfig::load_env_file()?;
    let config = ProvisionerConfig::load()?;
    init_telemetry(&config.observability.log_level, config.observability.json_logs)?;

    let runtime = tokio::runtime::Runtime::new()?;
    let outcome = runtime.block_on(async {
        match cli.command.unwrap_or_default() {
            Commands::Run {
                bytecode,
                network,
                checkpoint,
            } => RunCommand::new(config)
                .with_bytecode(bytecode)
                .with_network(network)
                .with_checkpoint(checkpoint)
                .execute()
                .await
                .map(|_| ()),
            Commands::Resume { checkpoint } => ResumeCommand::new(config)
                .with_checkpoint(checkpoint)
                .execute()
                .await
                .map(|_| ()),
            Commands::Status { checkpoint } => {
                StatusCommand::new(config).with_checkpoint(checkpoint).execute().await
            }
            Commands::Init { force, dry_run } => {
                InitCommand::new(force, dry_run, Arc::new(StandardFileSystem))
                    .execute()
                    .await
            }
        }
    });

    ledger_metrics().log_stats();
    outcome
}
