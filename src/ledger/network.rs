use std::fmt;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::client::LedgerClient;
use super::errors::LedgerError;
use super::simulated::SimulatedLedger;
use super::throttle::ThrottledClient;
use super::types::{AccountId, Hbar, PublicKey};

/// Balance given to each configured account when the local ledger first sees it.
pub const LOCAL_ACCOUNT_BALANCE: Hbar = Hbar::new(10_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Testnet,
    Previewnet,
    Mainnet,
    #[default]
    Local,
}

impl Network {
    pub fn as_str(self) -> &'static str {
        match self {
            Network::Testnet => "testnet",
            Network::Previewnet => "previewnet",
            Network::Mainnet => "mainnet",
            Network::Local => "local",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "testnet" => Ok(Network::Testnet),
            "previewnet" => Ok(Network::Previewnet),
            "mainnet" => Ok(Network::Mainnet),
            "local" | "localhost" | "sandbox" => Ok(Network::Local),
            other => Err(LedgerError::UnknownNetwork(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub network: Network,
    /// Accounts the local ledger must know about before the first transaction.
    pub accounts: Vec<(AccountId, PublicKey)>,
    pub state_path: Option<PathBuf>,
    pub requests_per_second: Option<NonZeroU32>,
}

/// Builds the process-wide client handle for the selected network.
pub async fn connect(options: &ConnectOptions) -> Result<Arc<dyn LedgerClient>, LedgerError> {
    let ledger = match options.network {
        Network::Local => {
            let ledger = match &options.state_path {
                Some(path) => SimulatedLedger::open(options.network.as_str(), path).await?,
                None => SimulatedLedger::new(options.network.as_str()),
            };
            for (account_id, key) in &options.accounts {
                ledger.ensure_account(*account_id, *key, LOCAL_ACCOUNT_BALANCE).await?;
            }
            info!(
                network = %options.network,
                accounts = options.accounts.len(),
                snapshot = ?options.state_path,
                "Connected to simulated ledger"
            );
            ledger
        }
        remote => return Err(LedgerError::UnsupportedNetwork(remote.to_string())),
    };

    Ok(match options.requests_per_second {
        Some(rps) => Arc::new(ThrottledClient::new(ledger, rps)),
        None => Arc::new(ledger),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::types::PrivateKey;

    #[test]
    fn test_network_parsing() {
        assert_eq!("TESTNET".parse::<Network>().unwrap(), Network::Testnet);
        assert_eq!("sandbox".parse::<Network>().unwrap(), Network::Local);
        assert!("devnet".parse::<Network>().is_err());
        assert_eq!(Network::Previewnet.to_string(), "previewnet");
    }

    #[tokio::test]
    async fn test_local_connect_seeds_accounts() {
        let key = PrivateKey::generate().public_key();
        let account = AccountId::new(0, 0, 2);
        let client = connect(&ConnectOptions {
            network: Network::Local,
            accounts: vec![(account, key)],
            state_path: None,
            requests_per_second: None,
        })
        .await
        .unwrap();

        let balance = client.account_balance(account).await.unwrap();
        assert_eq!(balance.hbars, LOCAL_ACCOUNT_BALANCE);
    }

    #[tokio::test]
    async fn test_remote_networks_have_no_transport() {
        let result = connect(&ConnectOptions {
            network: Network::Testnet,
            accounts: vec![],
            state_path: None,
            requests_per_second: None,
        })
        .await;
        assert!(matches!(result, Err(LedgerError::UnsupportedNetwork(name)) if name == "testnet"));
    }
}
