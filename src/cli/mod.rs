use clap::{Parser, Subcommand};

pub mod commands;

#[derive(Parser)]
#[command(name = "token-provisioner")]
#[command(about = "Provision a fungible token whose supply is managed by a smart contract")]
#[command(long_about = "Creates a fungible token, uploads and deploys the token manager contract, \
                       hands the token's supply key to the contract, then mints, associates and \
                       transfers through it. Run 'token-provisioner init' to create a sandbox setup.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the provisioning workflow from the first step (default command)
    Run {
        /// Compiled contract bytecode
        #[arg(long, help = "Path to the compiled contract bytecode file")]
        bytecode: Option<String>,
        /// Target network
        #[arg(long, help = "Network to provision on: testnet, previewnet, mainnet or local")]
        network: Option<String>,
        /// Checkpoint file written after every step
        #[arg(long, help = "Save progress to this file after every completed step")]
        checkpoint: Option<String>,
    },
    /// Continue a failed or interrupted run from its checkpoint
    Resume {
        #[arg(long, help = "Checkpoint file to resume from (defaults to checkpoint.path)")]
        checkpoint: Option<String>,
    },
    /// Show what a saved checkpoint has completed
    Status {
        #[arg(long, help = "Checkpoint file to inspect (defaults to checkpoint.path)")]
        checkpoint: Option<String>,
    },
    /// Write a provisioner.toml and a .env with fresh sandbox keys
    Init {
        /// Overwrite existing files
        #[arg(long, help = "Overwrite an existing provisioner.toml and .env")]
        force: bool,
        /// Show what would be created without making changes
        #[arg(long, help = "Show what would be created without making changes")]
        dry_run: bool,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Run {
            bytecode: None,
            network: None,
            checkpoint: None,
        }
    }
}
