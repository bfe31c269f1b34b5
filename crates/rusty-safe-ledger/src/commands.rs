use std::io::Read;
use std::path::Path;

use alloy::primitives::{Address, Bytes, U256};
use eyre::{bail, eyre, Result, WrapErr};
use serde_json::Value;

use rusty_safe_ledger_adapters::{
    co_sign, Broadcaster, ChainClientAdapter, FileStorageAdapter, LedgerAdapterConfig,
    LocalSignerAdapter,
};
use rusty_safe_ledger_core::serde_compat::{parse_address, parse_u256};
use rusty_safe_ledger_core::{
    hash_safe_personal_message, hash_safe_tx_for_version, hash_safe_typed_message,
    hash_typed_data_json, parse_share_query, LedgerKey, Operation, SafeTransactionData,
    SafeVersion, SaveOutcome, ShareOutcome, SharePayload, SignatureMerge, TransactionLedger,
};

use crate::cli::{
    ApplyShareArgs, ExportArgs, HashMessageArgs, HashTxArgs, HashTypedDataArgs, ImportArgs,
    NonceArgs, RemoveArgs, ShareSignatureArgs, ShareTxArgs, SignArgs,
};
use crate::output::{
    print_import_summary, print_readiness, BroadcastOutput, HashOutput, QueueEntry, QueueOutput,
    RemovedOutput, SavedOutput, ShareLinkOutput, SignatureOutput,
};

/// Everything a subcommand needs: the selected Safe, its queue and the
/// adapter configuration.
pub struct Context {
    pub key: LedgerKey,
    pub config: LedgerAdapterConfig,
    pub ledger: TransactionLedger<FileStorageAdapter>,
}

impl Context {
    pub fn new(key: LedgerKey, config: LedgerAdapterConfig) -> Result<Self> {
        let options = config.ledger_options()?;
        let storage = FileStorageAdapter::new(config.storage_dir.clone());
        tracing::debug!(%key, dir = %storage.dir().display(), "opening ledger");
        Ok(Self {
            key,
            config,
            ledger: TransactionLedger::with_options(storage, options),
        })
    }

    fn version(&self) -> &SafeVersion {
        &self.ledger.options().safe_version
    }

    fn chain(&self) -> ChainClientAdapter {
        ChainClientAdapter::with_config(self.config.clone())
    }
}

pub fn hash_tx(ctx: &Context, args: HashTxArgs, json: bool) -> Result<()> {
    let tx = transaction_from_args(&args)?;
    let hashes = hash_safe_tx_for_version(ctx.key.safe_address, ctx.key.chain_id, &tx, ctx.version());
    HashOutput {
        safe_version: ctx.version().to_string(),
        hashes,
    }
    .print(json)?;

    if args.queue {
        let nonce = tx.nonce;
        // re-queueing identical data would reset the collected signatures
        let already_queued = ctx
            .ledger
            .get(ctx.key, nonce)?
            .is_some_and(|queued| queued.data == tx);
        let outcome = if already_queued {
            "already queued"
        } else {
            match ctx.ledger.save(ctx.key, tx, Vec::new())? {
                SaveOutcome::Inserted => "inserted",
                SaveOutcome::Replaced { .. } => "replaced, signatures cleared",
            }
        };
        SavedOutput {
            nonce,
            safe_tx_hash: hashes.digest_hash,
            outcome: outcome.to_owned(),
        }
        .print(json)?;
    }
    Ok(())
}

pub fn hash_message(ctx: &Context, args: HashMessageArgs, json: bool) -> Result<()> {
    let hashes =
        hash_safe_personal_message(ctx.key.safe_address, ctx.key.chain_id, &args.message, ctx.version());
    HashOutput {
        safe_version: ctx.version().to_string(),
        hashes,
    }
    .print(json)
}

pub fn hash_typed_data(ctx: &Context, args: HashTypedDataArgs, json: bool) -> Result<()> {
    let raw = read_input(&args.file)?;
    let value: Value = serde_json::from_str(&raw).wrap_err("typed data is not valid JSON")?;
    let hashes = if args.safe_message {
        hash_safe_typed_message(ctx.key.safe_address, ctx.key.chain_id, &value, ctx.version())?
    } else {
        hash_typed_data_json(&value)?
    };
    HashOutput {
        safe_version: ctx.version().to_string(),
        hashes,
    }
    .print(json)
}

pub fn list(ctx: &Context, json: bool) -> Result<()> {
    let transactions = ctx
        .ledger
        .get_all(ctx.key)?
        .iter()
        .map(|tx| QueueEntry::new(tx, ctx.ledger.safe_tx_hash(ctx.key, &tx.data)))
        .collect();
    QueueOutput { transactions }.print(json)
}

pub fn import(ctx: &Context, args: ImportArgs, json: bool) -> Result<()> {
    let raw = read_input(&args.file)?;
    let summary = ctx.ledger.import(ctx.key, &raw)?;
    print_import_summary(&summary, json)
}

pub fn export(ctx: &Context, args: ExportArgs) -> Result<()> {
    let document = ctx.ledger.export_json(ctx.key)?;
    match args.out {
        Some(path) => {
            std::fs::write(&path, document)
                .wrap_err_with(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "queue exported");
        }
        None => println!("{document}"),
    }
    Ok(())
}

pub fn share_tx(ctx: &Context, args: ShareTxArgs, json: bool) -> Result<()> {
    let payload = ctx.ledger.share_transaction(ctx.key, args.nonce)?;
    ShareLinkOutput {
        nonce: args.nonce,
        link: share_link(args.base_url.as_deref(), &payload)?,
    }
    .print(json)
}

pub fn share_signature(ctx: &Context, args: ShareSignatureArgs, json: bool) -> Result<()> {
    let signer = parse_address(&args.signer).map_err(|e| eyre!("--signer: {e}"))?;
    let payload = ctx.ledger.share_signature(ctx.key, args.nonce, signer)?;
    ShareLinkOutput {
        nonce: args.nonce,
        link: share_link(args.base_url.as_deref(), &payload)?,
    }
    .print(json)
}

pub fn apply_share(ctx: &Context, args: ApplyShareArgs, json: bool) -> Result<()> {
    if args.link.len() > ctx.config.share_link_max_bytes {
        bail!(
            "share link is {} bytes, limit is {}",
            args.link.len(),
            ctx.config.share_link_max_bytes
        );
    }
    let Some(payload) = parse_share_query(&args.link)? else {
        bail!("link carries neither a transaction nor a signature");
    };
    let shared_signer = match &payload {
        SharePayload::Signature { signature, .. } => signature.signer,
        SharePayload::Transaction { .. } => Address::ZERO,
    };

    match ctx.ledger.apply_share_payload(ctx.key, payload)? {
        ShareOutcome::Transaction(summary) => print_import_summary(&summary, json),
        ShareOutcome::Signature { nonce, merge } => {
            let tx = ctx.ledger.get(ctx.key, nonce)?;
            SignatureOutput {
                nonce,
                signer: shared_signer,
                outcome: merge_label(merge).to_owned(),
                signatures: tx.as_ref().map_or(0, |t| t.signature_count()),
                lifecycle: None,
            }
            .print(json)
        }
    }
}

pub fn sign(ctx: &Context, args: SignArgs, json: bool) -> Result<()> {
    let mut signer = LocalSignerAdapter::default();
    let owner = signer.add_private_key(&args.private_key)?;
    let merge = co_sign(&ctx.ledger, &signer, ctx.key, args.nonce, owner)?;

    let tx = ctx
        .ledger
        .get(ctx.key, args.nonce)?
        .ok_or_else(|| eyre!("transaction {} disappeared from the queue", args.nonce))?;
    let chain = ctx.chain();
    let lifecycle = match Broadcaster::new(&ctx.ledger, &chain).readiness(ctx.key, args.nonce) {
        Ok(readiness) => Some(readiness.lifecycle),
        Err(e) => {
            tracing::warn!(error = %e, "threshold unavailable");
            None
        }
    };

    SignatureOutput {
        nonce: args.nonce,
        signer: owner,
        outcome: merge_label(merge).to_owned(),
        signatures: tx.signature_count(),
        lifecycle,
    }
    .print(json)
}

pub fn status(ctx: &Context, args: NonceArgs, json: bool) -> Result<()> {
    let chain = ctx.chain();
    let readiness = Broadcaster::new(&ctx.ledger, &chain).readiness(ctx.key, args.nonce)?;
    print_readiness(&readiness, json)
}

pub fn broadcast(ctx: &Context, args: NonceArgs, json: bool) -> Result<()> {
    let chain = ctx.chain();
    let receipt = Broadcaster::new(&ctx.ledger, &chain).broadcast(ctx.key, args.nonce)?;
    BroadcastOutput::from(&receipt).print(json)
}

pub fn remove(ctx: &Context, args: RemoveArgs, json: bool) -> Result<()> {
    let nonce = if args.all { None } else { args.nonce };
    let outcome = ctx.ledger.remove(ctx.key, nonce)?;
    RemovedOutput {
        removed: outcome.removed(),
    }
    .print(json)
}

fn transaction_from_args(args: &HashTxArgs) -> Result<SafeTransactionData> {
    let amount = |flag: &str, raw: &str| -> Result<U256> {
        parse_u256(raw).map_err(|e| eyre!("--{flag}: {e}"))
    };
    let optional_address = |flag: &str, raw: &Option<String>| -> Result<Address> {
        raw.as_deref()
            .map_or(Ok(Address::ZERO), parse_address)
            .map_err(|e| eyre!("--{flag}: {e}"))
    };

    let operation = Operation::from_u8(args.operation)
        .ok_or_else(|| eyre!("--operation must be 0 (Call) or 1 (DelegateCall)"))?;
    let data: Bytes = args
        .data
        .parse()
        .map_err(|e| eyre!("--data is not hex: {e}"))?;

    Ok(SafeTransactionData {
        to: parse_address(&args.to).map_err(|e| eyre!("--to: {e}"))?,
        value: amount("value", &args.value)?,
        data,
        operation,
        safe_tx_gas: amount("safe-tx-gas", &args.safe_tx_gas)?,
        base_gas: amount("base-gas", &args.base_gas)?,
        gas_price: amount("gas-price", &args.gas_price)?,
        gas_token: optional_address("gas-token", &args.gas_token)?,
        refund_receiver: optional_address("refund-receiver", &args.refund_receiver)?,
        nonce: args.nonce,
    })
}

fn share_link(base_url: Option<&str>, payload: &SharePayload) -> Result<String> {
    let query = payload.to_query()?;
    Ok(match base_url {
        Some(base) if base.contains('?') => format!("{base}&{query}"),
        Some(base) => format!("{base}?{query}"),
        None => format!("?{query}"),
    })
}

fn merge_label(merge: SignatureMerge) -> &'static str {
    match merge {
        SignatureMerge::Added => "added",
        SignatureMerge::Replaced => "replaced",
        SignatureMerge::Unchanged => "already present",
    }
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .wrap_err("failed to read stdin")?;
        return Ok(raw);
    }
    std::fs::read_to_string(path).wrap_err_with(|| format!("failed to read {}", path.display()))
}
