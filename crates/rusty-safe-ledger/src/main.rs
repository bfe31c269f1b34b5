//! rusty-safe-ledger: hash, queue and co-sign Safe multisig transactions from the shell

mod cli;
mod commands;
mod output;

use clap::Parser;
use eyre::{eyre, Result};

use cli::{Cli, Commands};
use commands::Context;
use rusty_safe_ledger_adapters::LedgerAdapterConfig;
use rusty_safe_ledger_core::serde_compat::parse_address;
use rusty_safe_ledger_core::LedgerKey;

fn main() -> Result<()> {
    // Logs go to stderr so --json output stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = LedgerAdapterConfig::from_env();
    if let Some(dir) = cli.storage_dir {
        config.storage_dir = dir;
    }
    if let Some(version) = cli.safe_version {
        config.default_safe_version = version;
    }

    let safe = parse_address(&cli.safe).map_err(|e| eyre!("--safe: {e}"))?;
    let ctx = Context::new(LedgerKey::new(safe, cli.chain_id), config)?;
    let json = cli.json;

    match cli.command {
        Commands::HashTx(args) => commands::hash_tx(&ctx, args, json),
        Commands::HashMessage(args) => commands::hash_message(&ctx, args, json),
        Commands::HashTypedData(args) => commands::hash_typed_data(&ctx, args, json),
        Commands::List => commands::list(&ctx, json),
        Commands::Import(args) => commands::import(&ctx, args, json),
        Commands::Export(args) => commands::export(&ctx, args),
        Commands::ShareTx(args) => commands::share_tx(&ctx, args, json),
        Commands::ShareSignature(args) => commands::share_signature(&ctx, args, json),
        Commands::ApplyShare(args) => commands::apply_share(&ctx, args, json),
        Commands::Sign(args) => commands::sign(&ctx, args, json),
        Commands::Status(args) => commands::status(&ctx, args, json),
        Commands::Broadcast(args) => commands::broadcast(&ctx, args, json),
        Commands::Remove(args) => commands::remove(&ctx, args, json),
    }
}
