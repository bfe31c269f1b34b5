use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rusty-safe-ledger")]
#[command(about = "Hash, queue and co-sign Safe transactions", long_about = None)]
pub struct Cli {
    /// Safe contract address
    #[arg(long, env = "SAFE_ADDRESS")]
    pub safe: String,

    /// Chain the Safe is deployed on
    #[arg(long, env = "CHAIN_ID", default_value_t = 1)]
    pub chain_id: u64,

    /// Safe contract version, e.g. 1.3.0 (defaults to RUSTY_SAFE_LEDGER_SAFE_VERSION or 1.4.1)
    #[arg(long)]
    pub safe_version: Option<String>,

    /// Directory holding the queue files
    #[arg(long)]
    pub storage_dir: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compute the SafeTx domain, message and signing hashes
    HashTx(HashTxArgs),

    /// Compute the SafeMessage hashes for a personal-sign message
    HashMessage(HashMessageArgs),

    /// Compute EIP-712 hashes for an eth_signTypedData_v4 JSON document
    HashTypedData(HashTypedDataArgs),

    /// Show queued transactions and their signers
    List,

    /// Merge an exported queue (or a single legacy transaction) from a file
    Import(ImportArgs),

    /// Write the queue as JSON
    Export(ExportArgs),

    /// Print a share link carrying a queued transaction
    ShareTx(ShareTxArgs),

    /// Print a share link carrying one owner's signature
    ShareSignature(ShareSignatureArgs),

    /// Apply a transaction or signature share link
    ApplyShare(ApplyShareArgs),

    /// Sign a queued transaction with a local private key
    Sign(SignArgs),

    /// Compare collected signatures with the on-chain threshold
    Status(NonceArgs),

    /// Submit a fully signed transaction and drop it from the queue
    Broadcast(NonceArgs),

    /// Drop one queued transaction, or the whole queue
    Remove(RemoveArgs),
}

#[derive(Args, Clone)]
pub struct HashTxArgs {
    /// Target address
    #[arg(long)]
    pub to: String,

    /// Value in wei (decimal or 0x hex)
    #[arg(long, default_value = "0")]
    pub value: String,

    /// Calldata as hex
    #[arg(long, default_value = "0x")]
    pub data: String,

    /// 0 = Call, 1 = DelegateCall
    #[arg(long, default_value_t = 0)]
    pub operation: u8,

    #[arg(long, default_value = "0")]
    pub safe_tx_gas: String,

    #[arg(long, default_value = "0")]
    pub base_gas: String,

    #[arg(long, default_value = "0")]
    pub gas_price: String,

    #[arg(long)]
    pub gas_token: Option<String>,

    #[arg(long)]
    pub refund_receiver: Option<String>,

    #[arg(long)]
    pub nonce: u64,

    /// Also add the transaction to the queue
    #[arg(long)]
    pub queue: bool,
}

#[derive(Args, Clone)]
pub struct HashMessageArgs {
    /// Message text, or 0x-prefixed hex bytes
    pub message: String,
}

#[derive(Args, Clone)]
pub struct HashTypedDataArgs {
    /// JSON file, or - for stdin
    pub file: PathBuf,

    /// Wrap the EIP-712 digest in a SafeMessage
    #[arg(long)]
    pub safe_message: bool,
}

#[derive(Args, Clone)]
pub struct ImportArgs {
    /// JSON file, or - for stdin
    pub file: PathBuf,
}

#[derive(Args, Clone)]
pub struct ExportArgs {
    /// Write to a file instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Clone)]
pub struct ShareTxArgs {
    #[arg(long)]
    pub nonce: u64,

    /// Prefix the query with this URL
    #[arg(long)]
    pub base_url: Option<String>,
}

#[derive(Args, Clone)]
pub struct ShareSignatureArgs {
    #[arg(long)]
    pub nonce: u64,

    /// Owner whose signature to share
    #[arg(long)]
    pub signer: String,

    #[arg(long)]
    pub base_url: Option<String>,
}

#[derive(Args, Clone)]
pub struct ApplyShareArgs {
    /// Full share URL or its query string
    pub link: String,
}

#[derive(Args, Clone)]
pub struct SignArgs {
    #[arg(long)]
    pub nonce: u64,

    /// Owner private key (hex)
    #[arg(long, env = "RUSTY_SAFE_LEDGER_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: String,
}

#[derive(Args, Clone)]
pub struct NonceArgs {
    #[arg(long)]
    pub nonce: u64,
}

#[derive(Args, Clone)]
pub struct RemoveArgs {
    /// Nonce to drop
    #[arg(long, required_unless_present = "all")]
    pub nonce: Option<u64>,

    /// Clear the whole queue
    #[arg(long, conflicts_with = "nonce")]
    pub all: bool,
}
