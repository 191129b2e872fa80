use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::config::{ProvisionerConfig, WorkflowConfig};
use crate::ledger::{connect, ConnectOptions, LedgerClient, LedgerSession};
use crate::workflow::{WorkflowError, WorkflowResult};

pub mod init;
pub mod resume;
pub mod run;
pub mod status;

/// Session over the configured network, with every configured account known
/// to it.
pub async fn connect_session(
    config: &ProvisionerConfig,
    workflow: &WorkflowConfig,
) -> Result<LedgerSession<Arc<dyn LedgerClient>>> {
    let options = ConnectOptions {
        network: workflow.network,
        accounts: [&workflow.operator, &workflow.treasury, &workflow.beneficiary]
            .into_iter()
            .map(|account| (account.account_id, account.public_key()))
            .collect(),
        state_path: config.network.state_path.as_ref().map(PathBuf::from),
        requests_per_second: config.requests_per_second(),
    };

    print!("🔄 Connecting to {}... ", workflow.network);
    std::io::Write::flush(&mut std::io::stdout())?;

    match connect(&options).await {
        Ok(client) => {
            println!("✅");
            Ok(LedgerSession::new(client, workflow.operator.clone()))
        }
        Err(e) => {
            println!("❌");
            Err(e.into())
        }
    }
}

pub fn checkpoint_path(flag: Option<&str>, config: &ProvisionerConfig) -> Result<PathBuf> {
    flag.map(str::to_string)
        .or_else(|| config.checkpoint.path.clone())
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("no checkpoint file given; pass --checkpoint or set checkpoint.path"))
}

/// Status line printed when a run aborts.
pub fn report_failure(error: &WorkflowError) {
    println!();
    match error.step() {
        Some(step) => println!("❌ STEP {} failed ({}): {error}", step.number(), step.description()),
        None => println!("❌ Provisioning failed: {error}"),
    }
    if let Some(status) = error.status() {
        println!("   Status: {status}");
    }
    println!("   No further steps were run and nothing was rolled back.");
}

pub fn print_summary(result: &WorkflowResult) {
    println!("✅ PROVISIONING COMPLETE");
    println!("========================");
    println!("   Token:     {} ({})", result.token_id, result.token_address);
    println!("   Contract:  {} ({})", result.contract_id, result.contract_address);
    println!("   Bytecode:  {}", result.bytecode_file_id);
    if let Some(supply) = result.total_supply {
        println!("   Supply:    {supply}");
    }
    println!(
        "   Supply key held by contract: {}",
        if result.supply_authority_transferred() { "yes" } else { "no" }
    );
    println!("   Transactions: {}", result.transactions.len());
    println!("   Correlation ID: {}", result.correlation_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_path_prefers_flag() {
        let mut config = ProvisionerConfig::default();
        config.checkpoint.path = Some("from-config.json".to_string());

        assert_eq!(
            checkpoint_path(Some("from-flag.json"), &config).unwrap(),
            PathBuf::from("from-flag.json")
        );
        assert_eq!(
            checkpoint_path(None, &config).unwrap(),
            PathBuf::from("from-config.json")
        );
        assert!(checkpoint_path(None, &ProvisionerConfig::default()).is_err());
    }
}
