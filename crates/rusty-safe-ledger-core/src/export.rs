//! Export documents and import parsing.
//!
//! Exports are always written as [`LedgerExport`]. Imports additionally accept
//! a bare array of transactions and the single-transaction shapes older
//! front-ends produced (`{"tx": {...}}` and a bare `{data, signatures}`).

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{LedgerKey, QueuedTransaction};
use crate::error::CoreError;
use crate::serde_compat;
use crate::signatures::validate_signature;

pub const EXPORT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerExport {
    pub version: u32,
    #[serde(with = "serde_compat::address")]
    pub safe_address: Address,
    #[serde(with = "serde_compat::nonce")]
    pub chain_id: u64,
    pub transactions: Vec<QueuedTransaction>,
}

impl LedgerExport {
    pub fn new(key: LedgerKey, transactions: Vec<QueuedTransaction>) -> Self {
        Self {
            version: EXPORT_SCHEMA_VERSION,
            safe_address: key.safe_address,
            chain_id: key.chain_id,
            transactions,
        }
    }

    pub fn key(&self) -> LedgerKey {
        LedgerKey::new(self.safe_address, self.chain_id)
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string_pretty(self).map_err(|e| CoreError::Import(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportLimits {
    pub max_payload_bytes: usize,
    pub max_transactions: usize,
}

impl Default for ImportLimits {
    fn default() -> Self {
        Self {
            max_payload_bytes: 4 * 1024 * 1024,
            max_transactions: 2_000,
        }
    }
}

/// Per-transaction accounting of an applied import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub added: usize,
    pub replaced: usize,
    pub merged: usize,
    pub unchanged: usize,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.added + self.replaced + self.merged + self.unchanged
    }

    pub fn changed(&self) -> bool {
        self.added + self.replaced + self.merged > 0
    }
}

/// A validated import: transactions sorted by nonce, one entry per nonce.
#[derive(Debug)]
pub(crate) struct ImportDocument {
    pub transactions: Vec<QueuedTransaction>,
}

pub(crate) fn parse_import(
    raw: &str,
    key: &LedgerKey,
    limits: &ImportLimits,
) -> Result<ImportDocument, CoreError> {
    if raw.len() > limits.max_payload_bytes {
        return Err(CoreError::Import(format!(
            "payload is {} bytes, limit is {}",
            raw.len(),
            limits.max_payload_bytes
        )));
    }
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| CoreError::Import(format!("malformed JSON: {e}")))?;

    let entries = match value {
        Value::Array(items) => items,
        Value::Object(map) => entries_from_object(map, key)?,
        _ => {
            return Err(CoreError::Import(
                "expected a JSON object or array".to_owned(),
            ))
        }
    };

    if entries.len() > limits.max_transactions {
        return Err(CoreError::Import(format!(
            "{} transactions exceed the limit of {}",
            entries.len(),
            limits.max_transactions
        )));
    }

    let mut transactions: Vec<QueuedTransaction> = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let tx = parse_transaction(entry, index)?;
        match transactions.iter_mut().find(|t| t.nonce() == tx.nonce()) {
            Some(existing) if existing.data == tx.data => {
                for signature in tx.signatures {
                    existing.upsert_signature(signature);
                }
            }
            Some(_) => {
                return Err(CoreError::Import(format!(
                    "transaction {index}: conflicting transactions for nonce {}",
                    tx.nonce()
                )))
            }
            None => transactions.push(tx),
        }
    }
    transactions.sort_by_key(QueuedTransaction::nonce);

    Ok(ImportDocument { transactions })
}

fn entries_from_object(mut map: Map<String, Value>, key: &LedgerKey) -> Result<Vec<Value>, CoreError> {
    if let Some(transactions) = map.remove("transactions") {
        check_header(&map, key)?;
        return match transactions {
            Value::Array(items) => Ok(items),
            _ => Err(CoreError::Import(
                "`transactions` must be an array".to_owned(),
            )),
        };
    }
    if let Some(tx) = map.remove("tx") {
        return Ok(vec![tx]);
    }
    if map.contains_key("data") {
        return Ok(vec![Value::Object(map)]);
    }
    Err(CoreError::Import(
        "unrecognized document: expected `transactions`, `tx` or `data`".to_owned(),
    ))
}

/// Rejects a ledger export addressed to a different Safe or chain.
fn check_header(map: &Map<String, Value>, key: &LedgerKey) -> Result<(), CoreError> {
    if let Some(version) = map.get("version").and_then(Value::as_u64) {
        if version > u64::from(EXPORT_SCHEMA_VERSION) {
            return Err(CoreError::Import(format!(
                "unsupported export version {version}"
            )));
        }
    }
    if let Some(raw) = map.get("safeAddress").and_then(Value::as_str) {
        let safe = serde_compat::parse_address(raw).map_err(CoreError::Import)?;
        if safe != key.safe_address {
            return Err(CoreError::Import(format!(
                "export belongs to Safe {safe}, not {}",
                key.safe_address
            )));
        }
    }
    if let Some(raw) = map.get("chainId") {
        let chain_id = match raw {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => serde_compat::parse_u256(s)
                .ok()
                .and_then(|v| u64::try_from(v).ok()),
            _ => None,
        }
        .ok_or_else(|| CoreError::Import(format!("invalid chainId {raw}")))?;
        if chain_id != key.chain_id {
            return Err(CoreError::Import(format!(
                "export belongs to chain {chain_id}, not {}",
                key.chain_id
            )));
        }
    }
    Ok(())
}

fn parse_transaction(entry: Value, index: usize) -> Result<QueuedTransaction, CoreError> {
    let parsed: QueuedTransaction = serde_json::from_value(entry)
        .map_err(|e| CoreError::Import(format!("transaction {index}: {e}")))?;

    let mut tx = QueuedTransaction::new(parsed.data);
    for signature in parsed.signatures {
        let signature = signature.normalized();
        validate_signature(&signature).map_err(|e| {
            CoreError::Import(format!(
                "transaction {index}: signature from {}: {e}",
                signature.signer
            ))
        })?;
        tx.upsert_signature(signature);
    }
    Ok(tx)
}
