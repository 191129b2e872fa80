use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::num::{NonZeroU32, NonZeroUsize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::ledger::{AccountCredentials, AccountId, Hbar, LedgerError, Network, PrivateKey};

pub const CONFIG_FILE: &str = "provisioner.toml";
pub const DEFAULT_BYTECODE_PATH: &str = "./MintAssociateTransferHTS_sol_MintAssoTransHTS.bin";

/// Main configuration structure for the provisioner
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProvisionerConfig {
    /// Target network and client pacing
    pub network: NetworkConfig,
    /// Operator, treasury and beneficiary credentials
    pub accounts: AccountsConfig,
    /// Metadata of the token to create
    pub token: TokenConfig,
    /// Contract deployment and call settings
    pub contract: ContractConfig,
    /// Bytecode upload chunking
    pub upload: UploadConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
    /// Progress checkpointing
    pub checkpoint: CheckpointConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    pub name: Network,
    /// Client-side request pacing; 0 disables it
    pub requests_per_second: u32,
    /// Snapshot file for the local simulated ledger
    pub state_path: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: Network::Local,
            requests_per_second: 0,
            state_path: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AccountsConfig {
    pub operator: AccountConfig,
    pub treasury: AccountConfig,
    pub beneficiary: AccountConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AccountConfig {
    /// Account id as shard.realm.num (can be set via env var)
    pub id: Option<String>,
    /// Ed25519 private key, raw or DER hex (can be set via env var)
    pub private_key: Option<String>,
}

impl AccountConfig {
    fn resolve(&self, role: &'static str) -> Result<AccountCredentials, ConfigError> {
        let id = self
            .id
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing { role, field: "account id" })?;
        let key = self
            .private_key
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing { role, field: "private key" })?;

        let account_id: AccountId = id
            .parse()
            .map_err(|source| ConfigError::Invalid { role, source })?;
        let private_key: PrivateKey = key
            .parse()
            .map_err(|source| ConfigError::Invalid { role, source })?;
        Ok(AccountCredentials::new(account_id, private_key))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenConfig {
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    pub initial_supply: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            name: "hbarRocks".to_string(),
            symbol: "HROK".to_string(),
            decimals: 0,
            initial_supply: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContractConfig {
    /// Compiled contract bytecode
    pub bytecode_path: String,
    /// Gas ceiling for deployment and every contract call
    pub gas: u64,
    pub mint_amount: u64,
    pub transfer_amount: i64,
    /// Fee ceiling for bytecode appends and contract calls
    pub max_transaction_fee_hbar: i64,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            bytecode_path: DEFAULT_BYTECODE_PATH.to_string(),
            gas: 3_000_000,
            mint_amount: 150,
            transfer_amount: 50,
            max_transaction_fee_hbar: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    /// Bytes per append transaction
    pub chunk_size: usize,
    /// Upper bound on append transactions for one file
    pub max_chunks: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: 4096,
            max_chunks: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level
    pub log_level: String,
    /// Emit JSON log lines instead of plain text
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CheckpointConfig {
    /// Where progress is saved after each step; unset disables checkpoints
    pub path: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing {role} {field}; set it in .env, {CONFIG_FILE} or the environment")]
    Missing {
        role: &'static str,
        field: &'static str,
    },

    #[error("invalid {role} credentials: {source}")]
    Invalid {
        role: &'static str,
        #[source]
        source: LedgerError,
    },

    #[error("invalid value for {field}: {reason}")]
    Value {
        field: &'static str,
        reason: String,
    },
}

/// Everything one workflow run needs, parsed and validated
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub operator: AccountCredentials,
    pub treasury: AccountCredentials,
    pub beneficiary: AccountCredentials,
    pub network: Network,
    pub bytecode_path: PathBuf,
    pub token: TokenConfig,
    pub gas: u64,
    pub mint_amount: u64,
    pub transfer_amount: i64,
    pub max_transaction_fee: Hbar,
    pub chunk_size: NonZeroUsize,
    pub max_chunks: usize,
}

impl ProvisionerConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (provisioner.toml)
    /// 3. Environment variables (prefixed with PROVISIONER_, `__` between levels)
    /// 4. The plain OPERATOR_ID / TREASURY_ID / ALICE_ID style variables, for
    ///    fields still empty after the above
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&ProvisionerConfig::default())?);

        if path.exists() {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("PROVISIONER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let mut provisioner_config: ProvisionerConfig = config.try_deserialize()?;
        provisioner_config.apply_plain_env();
        Ok(provisioner_config)
    }

    fn apply_plain_env(&mut self) {
        fn fill(slot: &mut Option<String>, var: &str) {
            if slot.is_none() {
                if let Ok(value) = std::env::var(var) {
                    *slot = Some(value);
                }
            }
        }

        fill(&mut self.accounts.operator.id, "OPERATOR_ID");
        fill(&mut self.accounts.operator.private_key, "OPERATOR_PVKEY");
        fill(&mut self.accounts.treasury.id, "TREASURY_ID");
        fill(&mut self.accounts.treasury.private_key, "TREASURY_PVKEY");
        fill(&mut self.accounts.beneficiary.id, "ALICE_ID");
        fill(&mut self.accounts.beneficiary.private_key, "ALICE_PVKEY");

        if std::env::var("PROVISIONER_NETWORK__NAME").is_err() {
            if let Some(network) = std::env::var("HEDERA_NETWORK").ok().and_then(|n| n.parse().ok()) {
                self.network.name = network;
            }
        }
    }

    /// Parse credentials and limits into the typed run configuration
    pub fn resolve(&self) -> Result<WorkflowConfig, ConfigError> {
        let chunk_size = NonZeroUsize::new(self.upload.chunk_size).ok_or(ConfigError::Value {
            field: "upload.chunk_size",
            reason: "must be greater than zero".to_string(),
        })?;
        if self.upload.max_chunks == 0 {
            return Err(ConfigError::Value {
                field: "upload.max_chunks",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.contract.transfer_amount <= 0 {
            return Err(ConfigError::Value {
                field: "contract.transfer_amount",
                reason: "must be positive".to_string(),
            });
        }
        let max_transaction_fee = match Hbar::checked_new(self.contract.max_transaction_fee_hbar) {
            Some(fee) if fee > Hbar::ZERO => fee,
            _ => {
                return Err(ConfigError::Value {
                    field: "contract.max_transaction_fee_hbar",
                    reason: format!(
                        "must be positive and at most {} hbar",
                        i64::MAX / crate::ledger::types::TINYBARS_PER_HBAR
                    ),
                })
            }
        };

        Ok(WorkflowConfig {
            operator: self.accounts.operator.resolve("operator")?,
            treasury: self.accounts.treasury.resolve("treasury")?,
            beneficiary: self.accounts.beneficiary.resolve("beneficiary")?,
            network: self.network.name,
            bytecode_path: PathBuf::from(&self.contract.bytecode_path),
            token: self.token.clone(),
            gas: self.contract.gas,
            mint_amount: self.contract.mint_amount,
            transfer_amount: self.contract.transfer_amount,
            max_transaction_fee,
            chunk_size,
            max_chunks: self.upload.max_chunks,
        })
    }

    pub fn requests_per_second(&self) -> Option<NonZeroU32> {
        NonZeroU32::new(self.network.requests_per_second)
    }

    /// Render the configuration as a `provisioner.toml` document
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}
