use alloy::primitives::{Address, B256};
use eyre::Result;
use serde::Serialize;

use rusty_safe_ledger_adapters::{BroadcastReceipt, Readiness};
use rusty_safe_ledger_core::{HashResult, ImportSummary, QueuedTransaction, TxLifecycle};

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HashOutput {
    pub safe_version: String,
    #[serde(flatten)]
    pub hashes: HashResult,
}

impl HashOutput {
    pub fn print(&self, json: bool) -> Result<()> {
        if json {
            return print_json(self);
        }
        println!("Safe Version: {}", self.safe_version);
        if let Some(inner) = self.hashes.inner_message {
            println!("  Message:      {inner}");
        }
        println!("  Domain Hash:  {}", self.hashes.domain_hash);
        println!("  Message Hash: {}", self.hashes.message_hash);
        println!("  Digest:       {}", self.hashes.digest_hash);
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub nonce: u64,
    pub safe_tx_hash: B256,
    pub to: Address,
    pub value: String,
    pub signers: Vec<Address>,
}

impl QueueEntry {
    pub fn new(tx: &QueuedTransaction, safe_tx_hash: B256) -> Self {
        Self {
            nonce: tx.nonce(),
            safe_tx_hash,
            to: tx.data.to,
            value: tx.data.value.to_string(),
            signers: tx.signers(),
        }
    }
}

#[derive(Serialize)]
pub struct QueueOutput {
    pub transactions: Vec<QueueEntry>,
}

impl QueueOutput {
    pub fn print(&self, json: bool) -> Result<()> {
        if json {
            return print_json(self);
        }
        if self.transactions.is_empty() {
            println!("Queue is empty");
            return Ok(());
        }
        for entry in &self.transactions {
            println!("Nonce {}: {}", entry.nonce, entry.safe_tx_hash);
            println!("  To: {} (value {})", entry.to, entry.value);
            println!("  Signatures: {}", entry.signers.len());
            for signer in &entry.signers {
                println!("    {signer}");
            }
        }
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedOutput {
    pub nonce: u64,
    pub safe_tx_hash: B256,
    pub outcome: String,
}

impl SavedOutput {
    pub fn print(&self, json: bool) -> Result<()> {
        if json {
            return print_json(self);
        }
        println!("Queued nonce {} ({}): {}", self.nonce, self.outcome, self.safe_tx_hash);
        Ok(())
    }
}

pub fn print_import_summary(summary: &ImportSummary, json: bool) -> Result<()> {
    if json {
        return print_json(summary);
    }
    println!("Import Result:");
    println!("  Added:     {}", summary.added);
    println!("  Replaced:  {}", summary.replaced);
    println!("  Merged:    {}", summary.merged);
    println!("  Unchanged: {}", summary.unchanged);
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareLinkOutput {
    pub nonce: u64,
    pub link: String,
}

impl ShareLinkOutput {
    pub fn print(&self, json: bool) -> Result<()> {
        if json {
            return print_json(self);
        }
        println!("{}", self.link);
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureOutput {
    pub nonce: u64,
    pub signer: Address,
    pub outcome: String,
    pub signatures: usize,
    pub lifecycle: Option<TxLifecycle>,
}

impl SignatureOutput {
    pub fn print(&self, json: bool) -> Result<()> {
        if json {
            return print_json(self);
        }
        println!("Signature from {} on nonce {}: {}", self.signer, self.nonce, self.outcome);
        println!("  Signatures: {}", self.signatures);
        if let Some(lifecycle) = self.lifecycle {
            println!("  Status: {lifecycle:?}");
        }
        Ok(())
    }
}

pub fn print_readiness(readiness: &Readiness, json: bool) -> Result<()> {
    if json {
        return print_json(readiness);
    }
    println!("Nonce {}: {}", readiness.nonce, readiness.safe_tx_hash);
    println!("  Signatures: {}/{}", readiness.signatures, readiness.threshold);
    println!("  On-chain Nonce: {}", readiness.onchain_nonce);
    println!("  Status: {:?}", readiness.lifecycle);
    println!("  Executable: {}", readiness.is_executable());
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastOutput {
    pub nonce: u64,
    pub safe_tx_hash: B256,
    pub tx_hash: B256,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_cleanup_error: Option<String>,
}

impl From<&BroadcastReceipt> for BroadcastOutput {
    fn from(receipt: &BroadcastReceipt) -> Self {
        Self {
            nonce: receipt.nonce,
            safe_tx_hash: receipt.safe_tx_hash,
            tx_hash: receipt.chain_tx_hash,
            queue_cleanup_error: receipt.queue_cleanup.clone().err(),
        }
    }
}

impl BroadcastOutput {
    pub fn print(&self, json: bool) -> Result<()> {
        if json {
            return print_json(self);
        }
        println!("Transaction Broadcast:");
        println!("  Nonce: {}", self.nonce);
        println!("  Safe Tx Hash: {}", self.safe_tx_hash);
        println!("  Tx Hash: {}", self.tx_hash);
        if let Some(error) = &self.queue_cleanup_error {
            println!("  Warning: still queued, remove it with `remove --nonce {}` ({error})", self.nonce);
        }
        Ok(())
    }
}

#[derive(Serialize)]
pub struct RemovedOutput {
    pub removed: usize,
}

impl RemovedOutput {
    pub fn print(&self, json: bool) -> Result<()> {
        if json {
            return print_json(self);
        }
        match self.removed {
            0 => println!("Nothing to remove"),
            1 => println!("Removed 1 transaction"),
            n => println!("Removed {n} transactions"),
        }
        Ok(())
    }
}
