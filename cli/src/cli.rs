use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{CliConfig, Environment};

/// Inspect and maintain the relay's in-flight transaction store.
#[derive(Parser, Debug)]
#[command(name = "txstore", version, propagate_version = true)]
pub struct TxStoreCli {
    /// Directory holding `txstore_base.yaml` and per-environment overrides
    #[arg(long, env = "TXSTORE_CONFIG_DIR", default_value = "configuration")]
    pub config_dir: PathBuf,

    /// Selects the `txstore_<environment>.yaml` layered over the base file
    #[arg(
        long,
        env = "APP_ENVIRONMENT",
        value_enum,
        ignore_case = true,
        default_value_t = Environment::Local
    )]
    pub environment: Environment,

    /// Overrides `store.workdir` from configuration
    #[arg(long)]
    pub workdir: Option<PathBuf>,

    /// Keep the store in memory for this run, ignoring `store.in_memory`
    #[arg(long)]
    pub in_memory: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl TxStoreCli {
    /// Command-line flags win over every configuration layer
    pub fn apply_overrides(&self, config: &mut CliConfig) {
        if let Some(workdir) = &self.workdir {
            config.store.workdir = workdir.clone();
        }
        if self.in_memory {
            config.store.in_memory = true;
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List tracked transactions, ascending by nonce
    List {
        #[arg(long)]
        signer: Option<String>,
    },
    /// Look up a transaction by hash
    Get {
        #[arg(long)]
        tx_id: String,
    },
    /// Look up the transaction occupying a signer's nonce
    GetSlot(SlotArgs),
    /// Forget the transaction occupying a signer's nonce
    RemoveNonce(SlotArgs),
    /// Forget every transaction of a signer at or below a nonce
    Prune(SlotArgs),
    /// Forget every tracked transaction
    Clear,
}

#[derive(Args, Debug)]
pub struct SlotArgs {
    #[arg(long)]
    pub signer: String,
    /// Decimal or 0x-prefixed hex
    #[arg(long)]
    pub nonce: String,
}
