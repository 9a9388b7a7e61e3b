use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use tonytoken_core::Address;
use tonytoken_infra::StoragePaths;
use tonytoken_infra::config::DEFAULT_DATA_DIR;
use tonytoken_ledger::metadata::{DEFAULT_DECIMALS, DEFAULT_NAME, DEFAULT_SYMBOL};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "tonytoken",
    version,
    about = "TonyToken ledger",
    long_about = "Deploy a TonyToken ledger and run token tasks against it"
)]
pub struct Config {
    #[arg(
        long,
        global = true,
        env = "TONYTOKEN_DATA_DIR",
        default_value = DEFAULT_DATA_DIR,
        help = "Directory holding ledger streams and the deployment record"
    )]
    pub data_dir: PathBuf,

    #[arg(
        long,
        global = true,
        env = "TONYTOKEN_SIGNER",
        help = "Address acting as the caller (e.g. 0x1111111111111111111111111111111111111111)"
    )]
    pub signer: Option<Address>,

    #[arg(
        long,
        global = true,
        env = "TONYTOKEN_ADDRESS_FILE",
        help = "Deployment record path (default: <data-dir>/contract-address.json)"
    )]
    pub address_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Config {
    pub fn storage(&self) -> StoragePaths {
        StoragePaths::new(&self.data_dir)
    }

    pub fn address_file(&self) -> PathBuf {
        self.address_file
            .clone()
            .unwrap_or_else(|| self.storage().default_address_file())
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create a new ledger owned by the signer and record its address
    Deploy(DeployArgs),

    /// Move tokens from the signer to another account
    Transfer {
        #[arg(long, help = "Receiver address")]
        to: Address,
        #[arg(long, help = "Value of tokens (human units)")]
        value: String,
    },

    /// Give permission for a third side to spend the signer's tokens
    Approve {
        #[arg(long, help = "Third side address")]
        spender: Address,
        #[arg(long, help = "Value of tokens (human units)")]
        value: String,
    },

    /// Transfer value from sender to receiver using the signer's allowance
    TransferFrom {
        #[arg(long, help = "Sender address")]
        sender: Address,
        #[arg(long, help = "Receiver address")]
        receiver: Address,
        #[arg(long, help = "Value of tokens (human units)")]
        value: String,
    },

    /// Mint new tokens to an account (ledger owner only)
    Mint {
        #[arg(long, help = "Receiving address")]
        owner: Address,
        #[arg(long, help = "Minting amount (human units)")]
        amount: String,
    },

    /// Burn tokens held by an account (ledger owner only)
    Burn {
        #[arg(long, help = "Address to burn from")]
        owner: Address,
        #[arg(long, help = "Burning amount (human units)")]
        amount: String,
    },

    /// Show the balance of an account
    Balance {
        #[arg(long)]
        account: Address,
    },

    /// Show how much a spender may still move for an owner
    Allowance {
        #[arg(long)]
        owner: Address,
        #[arg(long)]
        spender: Address,
    },

    /// Show token metadata, owner and total supply
    Info,

    /// List accounts with a non-zero balance
    Holders,

    /// Print the ledger's Transfer and Approval records in order
    Events,

    /// List every ledger stored in the data directory
    Ledgers,
}

#[derive(Debug, Clone, Args)]
pub struct DeployArgs {
    #[arg(long, default_value = "1000", help = "Initial supply in human units")]
    pub initial_supply: String,

    #[arg(long, default_value = DEFAULT_NAME)]
    pub name: String,

    #[arg(long, default_value = DEFAULT_SYMBOL)]
    pub symbol: String,

    #[arg(long, default_value_t = DEFAULT_DECIMALS)]
    pub decimals: u8,
}
