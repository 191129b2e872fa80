//! `init`: prepare a working directory for a local sandbox run.
//!
//! Writes `provisioner.toml` with the default workflow settings and a `.env`
//! holding freshly generated Ed25519 keys for the operator, treasury and
//! beneficiary accounts. Existing files are only replaced with `--force`.

use crate::config::{CheckpointConfig, NetworkConfig, ProvisionerConfig, CONFIG_FILE};
use crate::fs::FileSystemOperations;
use crate::ledger::{AccountId, Network, PrivateKey};
use anyhow::{anyhow, Result};
use std::sync::Arc;

pub const ENV_FILE: &str = ".env";
pub const STATE_DIR: &str = ".provisioner";

/// Account ids the sandbox keys are registered under.
const SANDBOX_ACCOUNTS: [(&str, &str, AccountId); 3] = [
    ("OPERATOR", "operator", AccountId::new(0, 0, 2)),
    ("TREASURY", "treasury", AccountId::new(0, 0, 1001)),
    ("ALICE", "beneficiary", AccountId::new(0, 0, 1002)),
];

pub struct InitCommand {
    pub force: bool,
    pub dry_run: bool,
    fs_ops: Arc<dyn FileSystemOperations>,
}

impl InitCommand {
    pub fn new(force: bool, dry_run: bool, fs_ops: Arc<dyn FileSystemOperations>) -> Self {
        Self {
            force,
            dry_run,
            fs_ops,
        }
    }

    pub async fn execute(&self) -> Result<()> {
        if self.dry_run {
            println!("🚀 TOKEN PROVISIONER INIT - Sandbox Setup (DRY RUN)");
        } else {
            println!("🚀 TOKEN PROVISIONER INIT - Sandbox Setup");
        }
        println!("==========================================");
        println!();

        for path in [CONFIG_FILE, ENV_FILE] {
            if self.fs_ops.exists(path) && !self.force {
                return Err(anyhow!("{path} already exists. Use --force to overwrite."));
            }
        }

        let config = sandbox_config();
        let config_toml = config.to_toml()?;
        let env_file = sandbox_env_file();

        if self.dry_run {
            println!("Would create directory: {STATE_DIR}/");
            println!("Would create configuration file: {CONFIG_FILE}");
            println!("Would create {ENV_FILE} with keys for:");
            for (_, role, account_id) in SANDBOX_ACCOUNTS {
                println!("   • {role} {account_id}");
            }
            return Ok(());
        }

        print!("📁 Creating {STATE_DIR} directory... ");
        std::io::Write::flush(&mut std::io::stdout())?;
        self.fs_ops
            .create_dir_all(STATE_DIR)
            .await
            .map_err(|e| anyhow!("Failed to create {STATE_DIR} directory: {e}"))?;
        println!("✅");

        print!("⚙️  Writing {CONFIG_FILE}... ");
        std::io::Write::flush(&mut std::io::stdout())?;
        self.fs_ops
            .write(CONFIG_FILE, config_toml.as_bytes())
            .await
            .map_err(|e| anyhow!("Failed to save configuration: {e}"))?;
        println!("✅");

        print!("🔑 Generating sandbox keys into {ENV_FILE}... ");
        std::io::Write::flush(&mut std::io::stdout())?;
        self.fs_ops
            .write(ENV_FILE, env_file.as_bytes())
            .await
            .map_err(|e| anyhow!("Failed to write {ENV_FILE}: {e}"))?;
        println!("✅");

        println!();
        println!("✅ Initialization completed successfully!");
        println!();
        println!("🚀 Next steps:");
        println!("   • Place the compiled contract at {}", config.contract.bytecode_path);
        println!("   • token-provisioner run       # Provision the token");
        println!("   • token-provisioner status    # Inspect saved progress");
        Ok(())
    }
}

fn sandbox_config() -> ProvisionerConfig {
    ProvisionerConfig {
        network: NetworkConfig {
            name: Network::Local,
            requests_per_second: 0,
            state_path: Some(format!("{STATE_DIR}/ledger.json")),
        },
        checkpoint: CheckpointConfig {
            path: Some(format!("{STATE_DIR}/checkpoint.json")),
        },
        ..ProvisionerConfig::default()
    }
}

fn sandbox_env_file() -> String {
    let mut contents = String::from("# Sandbox accounts for the local network\nHEDERA_NETWORK=local\n");
    for (prefix, _, account_id) in SANDBOX_ACCOUNTS {
        let key = PrivateKey::generate();
        contents.push_str(&format!("{prefix}_ID={account_id}\n"));
        contents.push_str(&format!("{prefix}_PVKEY={}\n", key.to_der_string()));
    }
    contents
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystemOperations;
    use mockall::predicate::*;

    #[tokio::test]
    async fn test_init_fails_when_config_exists_without_force() {
        let mut mock_fs = MockFileSystemOperations::new();
        mock_fs.expect_exists().with(eq(CONFIG_FILE)).return_const(true);
        mock_fs.expect_write().never();

        let init_command = InitCommand::new(false, false, Arc::new(mock_fs));
        let result = init_command.execute().await;
        assert!(result.unwrap_err().to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let mut mock_fs = MockFileSystemOperations::new();
        mock_fs.expect_exists().return_const(false);
        mock_fs.expect_create_dir_all().never();
        mock_fs.expect_write().never();

        let init_command = InitCommand::new(false, true, Arc::new(mock_fs));
        assert!(init_command.execute().await.is_ok());
    }

    #[tokio::test]
    async fn test_force_overwrites_config_and_env() {
        let mut mock_fs = MockFileSystemOperations::new();
        mock_fs.expect_exists().return_const(true);
        mock_fs
            .expect_create_dir_all()
            .with(eq(STATE_DIR))
            .times(1)
            .returning(|_| Ok(()));
        mock_fs
            .expect_write()
            .withf(|path, contents| {
                path == CONFIG_FILE && String::from_utf8_lossy(contents).contains("checkpoint.json")
            })
            .times(1)
            .returning(|_, _| Ok(()));
        mock_fs
            .expect_write()
            .withf(|path, contents| path == ENV_FILE && String::from_utf8_lossy(contents).contains("ALICE_PVKEY="))
            .times(1)
            .returning(|_, _| Ok(()));

        let init_command = InitCommand::new(true, false, Arc::new(mock_fs));
        assert!(init_command.execute().await.is_ok());
    }

    #[test]
    fn test_generated_env_file_parses_into_credentials() {
        let contents = sandbox_env_file();
        let mut config = ProvisionerConfig::default();

        for line in contents.lines().filter(|l| !l.starts_with('#')) {
            let Some((name, value)) = line.split_once('=') else { continue };
            let value = Some(value.to_string());
            match name {
                "OPERATOR_ID" => config.accounts.operator.id = value,
                "OPERATOR_PVKEY" => config.accounts.operator.private_key = value,
                "TREASURY_ID" => config.accounts.treasury.id = value,
                "TREASURY_PVKEY" => config.accounts.treasury.private_key = value,
                "ALICE_ID" => config.accounts.beneficiary.id = value,
                "ALICE_PVKEY" => config.accounts.beneficiary.private_key = value,
                _ => {}
            }
        }

        let workflow = config.resolve().unwrap();
        assert_eq!(workflow.treasury.account_id, AccountId::new(0, 0, 1001));
        assert_eq!(workflow.beneficiary.account_id, AccountId::new(0, 0, 1002));
    }

    #[test]
    fn test_sandbox_config_round_trips_through_toml() {
        let toml_text = sandbox_config().to_toml().unwrap();
        let parsed: ProvisionerConfig = toml::from_str(&toml_text).unwrap();
        assert_eq!(parsed.network.state_path.as_deref(), Some(".provisioner/ledger.json"));
        assert_eq!(parsed.token.symbol, "HROK");
    }
}
