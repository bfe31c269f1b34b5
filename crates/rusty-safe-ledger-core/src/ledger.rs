//! Per-Safe, per-chain queue of pending transactions and their signatures.
//!
//! The in-memory view is authoritative at runtime. A key is read from storage
//! only the first time it is touched, and every mutation is written through
//! before it becomes visible: a mutation edits a copy of the list, stores it,
//! and only then swaps it in. A storage failure therefore leaves both memory
//! and storage at the previous state.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use alloy::primitives::{Address, B256};

use crate::domain::{
    LedgerKey, QueuedTransaction, RemoveOutcome, SafeTransactionData, SaveOutcome, Signature,
    SignatureMerge,
};
use crate::error::CoreError;
use crate::export::{parse_import, ImportLimits, ImportSummary, LedgerExport};
use crate::hash_engine::{hash_safe_tx_for_version, SafeVersion};
use crate::ports::{PortError, StoragePort};
use crate::share_link::SharePayload;
use crate::signatures::{validate_signature, verify_signature};
use crate::state_machine::{lifecycle_for, TxLifecycle};

pub const DEFAULT_STORAGE_PREFIX: &str = "safe-txs";

#[derive(Debug, Clone)]
pub struct LedgerOptions {
    pub storage_prefix: String,
    pub limits: ImportLimits,
    /// Version used to derive the `safeTxHash` that identifies transactions.
    pub safe_version: SafeVersion,
}

impl Default for LedgerOptions {
    fn default() -> Self {
        Self {
            storage_prefix: DEFAULT_STORAGE_PREFIX.to_owned(),
            limits: ImportLimits::default(),
            safe_version: SafeVersion::latest(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareOutcome {
    Transaction(ImportSummary),
    Signature { nonce: u64, merge: SignatureMerge },
}

#[derive(Debug, Default)]
struct LedgerState {
    entries: BTreeMap<LedgerKey, Vec<QueuedTransaction>>,
}

pub struct TransactionLedger<S: StoragePort> {
    storage: S,
    options: LedgerOptions,
    state: Mutex<LedgerState>,
}

impl<S: StoragePort> TransactionLedger<S> {
    pub fn new(storage: S) -> Self {
        Self::with_options(storage, LedgerOptions::default())
    }

    pub fn with_options(storage: S, options: LedgerOptions) -> Self {
        Self {
            storage,
            options,
            state: Mutex::new(LedgerState::default()),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn options(&self) -> &LedgerOptions {
        &self.options
    }

    /// The `safeTxHash` a transaction is identified by.
    pub fn safe_tx_hash(&self, key: LedgerKey, data: &SafeTransactionData) -> B256 {
        hash_safe_tx_for_version(
            key.safe_address,
            key.chain_id,
            data,
            &self.options.safe_version,
        )
        .digest_hash
    }

    /// Inserts `tx`, or replaces the transaction already queued at its nonce
    /// together with its signatures. The stored signature set afterwards is
    /// exactly `signatures`.
    pub fn save(
        &self,
        key: LedgerKey,
        tx: SafeTransactionData,
        signatures: Vec<Signature>,
    ) -> Result<SaveOutcome, CoreError> {
        let mut incoming = QueuedTransaction::new(tx);
        for signature in signatures {
            let signature = signature.normalized();
            validate_signature(&signature)?;
            incoming.upsert_signature(signature);
        }
        let nonce = incoming.nonce();

        let outcome = self.mutate(key, |list| {
            match list.iter_mut().find(|t| t.nonce() == nonce) {
                Some(existing) => {
                    let data_changed = existing.data != incoming.data;
                    let dropped = existing.signature_count();
                    let changed = *existing != incoming;
                    *existing = incoming;
                    if data_changed {
                        tracing::info!(%key, nonce, dropped, "queued transaction overwritten");
                    }
                    Ok((SaveOutcome::Replaced { data_changed }, changed))
                }
                None => {
                    list.push(incoming);
                    Ok((SaveOutcome::Inserted, true))
                }
            }
        })?;

        tracing::debug!(%key, nonce, ?outcome, "transaction saved");
        Ok(outcome)
    }

    /// Merges one owner's signature into the transaction at `nonce`. Never
    /// creates a transaction.
    pub fn add_signature(
        &self,
        key: LedgerKey,
        nonce: u64,
        signature: Signature,
    ) -> Result<SignatureMerge, CoreError> {
        let signature = signature.normalized();
        validate_signature(&signature)?;
        let signer = signature.signer;

        let merge = self.mutate(key, |list| {
            let tx = list
                .iter_mut()
                .find(|t| t.nonce() == nonce)
                .ok_or_else(|| CoreError::NotFound(format!("transaction {nonce} for {key}")))?;
            let merge = tx.upsert_signature(signature);
            Ok((merge, merge != SignatureMerge::Unchanged))
        })?;

        tracing::debug!(%key, nonce, %signer, ?merge, "signature merged");
        Ok(merge)
    }

    /// Like [`Self::add_signature`], locating the transaction by `safeTxHash`.
    pub fn add_signature_by_hash(
        &self,
        key: LedgerKey,
        safe_tx_hash: B256,
        signature: Signature,
    ) -> Result<(u64, SignatureMerge), CoreError> {
        let signature = signature.normalized();
        validate_signature(&signature)?;

        self.mutate(key, |list| {
            let tx = list
                .iter_mut()
                .find(|t| self.safe_tx_hash(key, &t.data) == safe_tx_hash)
                .ok_or_else(|| CoreError::NotFound(format!("transaction {safe_tx_hash} for {key}")))?;
            let merge = tx.upsert_signature(signature);
            Ok(((tx.nonce(), merge), merge != SignatureMerge::Unchanged))
        })
    }

    /// Snapshot of the queue, ascending by nonce.
    pub fn get_all(&self, key: LedgerKey) -> Result<Vec<QueuedTransaction>, CoreError> {
        let mut state = self.lock()?;
        Ok(self.hydrate(&mut state, key)?.clone())
    }

    pub fn get(&self, key: LedgerKey, nonce: u64) -> Result<Option<QueuedTransaction>, CoreError> {
        let mut state = self.lock()?;
        Ok(self
            .hydrate(&mut state, key)?
            .iter()
            .find(|t| t.nonce() == nonce)
            .cloned())
    }

    pub fn find_by_hash(
        &self,
        key: LedgerKey,
        safe_tx_hash: B256,
    ) -> Result<Option<QueuedTransaction>, CoreError> {
        let mut state = self.lock()?;
        Ok(self
            .hydrate(&mut state, key)?
            .iter()
            .find(|t| self.safe_tx_hash(key, &t.data) == safe_tx_hash)
            .cloned())
    }

    /// Keys loaded so far that still hold transactions.
    pub fn keys(&self) -> Result<Vec<LedgerKey>, CoreError> {
        let state = self.lock()?;
        Ok(state
            .entries
            .iter()
            .filter(|(_, list)| !list.is_empty())
            .map(|(key, _)| *key)
            .collect())
    }

    /// Removes the transaction at `nonce`, or the whole queue when `nonce` is
    /// `None`.
    pub fn remove(&self, key: LedgerKey, nonce: Option<u64>) -> Result<RemoveOutcome, CoreError> {
        let outcome = self.mutate(key, |list| {
            let before = list.len();
            match nonce {
                Some(nonce) => list.retain(|t| t.nonce() != nonce),
                None => list.clear(),
            }
            Ok(removal(before - list.len()))
        })?;

        if let RemoveOutcome::Removed(count) = outcome {
            tracing::info!(%key, ?nonce, count, "transactions removed");
        }
        Ok(outcome)
    }

    pub fn remove_by_hash(&self, key: LedgerKey, safe_tx_hash: B256) -> Result<RemoveOutcome, CoreError> {
        self.mutate(key, |list| {
            let before = list.len();
            list.retain(|t| self.safe_tx_hash(key, &t.data) != safe_tx_hash);
            Ok(removal(before - list.len()))
        })
    }

    pub fn export(&self, key: LedgerKey) -> Result<LedgerExport, CoreError> {
        Ok(LedgerExport::new(key, self.get_all(key)?))
    }

    pub fn export_json(&self, key: LedgerKey) -> Result<String, CoreError> {
        self.export(key)?.to_json()
    }

    /// Applies an export document. The whole document is validated before
    /// anything is merged, so a rejected import changes nothing.
    pub fn import(&self, key: LedgerKey, serialized: &str) -> Result<ImportSummary, CoreError> {
        let document = parse_import(serialized, &key, &self.options.limits)?;
        let summary = self.merge_all(key, document.transactions)?;
        tracing::info!(
            %key,
            added = summary.added,
            replaced = summary.replaced,
            merged = summary.merged,
            unchanged = summary.unchanged,
            "import applied"
        );
        Ok(summary)
    }

    /// Applies a decoded share link. EOA signatures must recover to their
    /// claimed signer over the transaction's `safeTxHash`.
    pub fn apply_share_payload(
        &self,
        key: LedgerKey,
        payload: SharePayload,
    ) -> Result<ShareOutcome, CoreError> {
        match payload {
            SharePayload::Transaction { tx } => {
                let digest = self.safe_tx_hash(key, &tx.data);
                let mut incoming = QueuedTransaction::new(tx.data);
                for signature in tx.signatures {
                    let signature = signature.normalized();
                    verify_signature(digest, &signature)?;
                    incoming.upsert_signature(signature);
                }
                Ok(ShareOutcome::Transaction(
                    self.merge_all(key, vec![incoming])?,
                ))
            }
            SharePayload::Signature { signature, tx_hash } => {
                let signature = signature.normalized();
                verify_signature(tx_hash, &signature)?;
                let (nonce, merge) = self.add_signature_by_hash(key, tx_hash, signature)?;
                Ok(ShareOutcome::Signature { nonce, merge })
            }
        }
    }

    pub fn share_transaction(&self, key: LedgerKey, nonce: u64) -> Result<SharePayload, CoreError> {
        let tx = self
            .get(key, nonce)?
            .ok_or_else(|| CoreError::NotFound(format!("transaction {nonce} for {key}")))?;
        Ok(SharePayload::Transaction { tx })
    }

    pub fn share_signature(
        &self,
        key: LedgerKey,
        nonce: u64,
        signer: Address,
    ) -> Result<SharePayload, CoreError> {
        let tx = self
            .get(key, nonce)?
            .ok_or_else(|| CoreError::NotFound(format!("transaction {nonce} for {key}")))?;
        let tx_hash = self.safe_tx_hash(key, &tx.data);
        let signature = tx
            .signatures
            .into_iter()
            .find(|s| s.signer == signer)
            .ok_or_else(|| CoreError::NotFound(format!("signature from {signer} on transaction {nonce}")))?;
        Ok(SharePayload::Signature { signature, tx_hash })
    }

    pub fn status(&self, key: LedgerKey, nonce: u64, threshold: u64) -> Result<TxLifecycle, CoreError> {
        let tx = self
            .get(key, nonce)?
            .ok_or_else(|| CoreError::NotFound(format!("transaction {nonce} for {key}")))?;
        Ok(lifecycle_for(tx.signature_count(), threshold))
    }

    fn merge_all(
        &self,
        key: LedgerKey,
        incoming: Vec<QueuedTransaction>,
    ) -> Result<ImportSummary, CoreError> {
        self.mutate(key, |list| {
            let mut summary = ImportSummary::default();
            for tx in incoming {
                let incoming_hash = self.safe_tx_hash(key, &tx.data);
                match list.iter_mut().find(|t| t.nonce() == tx.nonce()) {
                    Some(existing) if self.safe_tx_hash(key, &existing.data) == incoming_hash => {
                        let mut changed = false;
                        for signature in tx.signatures {
                            changed |= existing.upsert_signature(signature) != SignatureMerge::Unchanged;
                        }
                        if changed {
                            summary.merged += 1;
                        } else {
                            summary.unchanged += 1;
                        }
                    }
                    Some(existing) => {
                        *existing = tx;
                        summary.replaced += 1;
                    }
                    None => {
                        list.push(tx);
                        summary.added += 1;
                    }
                }
            }
            let changed = summary.changed();
            Ok((summary, changed))
        })
    }

    /// Runs `apply` on a copy of the key's list. When it reports a change the
    /// copy is persisted and then replaces the in-memory list.
    fn mutate<T>(
        &self,
        key: LedgerKey,
        apply: impl FnOnce(&mut Vec<QueuedTransaction>) -> Result<(T, bool), CoreError>,
    ) -> Result<T, CoreError> {
        let mut state = self.lock()?;
        let mut next = self.hydrate(&mut state, key)?.clone();
        let (output, changed) = apply(&mut next)?;
        if changed {
            next.sort_by_key(QueuedTransaction::nonce);
            self.persist(key, &next)?;
            state.entries.insert(key, next);
        }
        Ok(output)
    }

    fn lock(&self) -> Result<MutexGuard<'_, LedgerState>, CoreError> {
        self.state
            .lock()
            .map_err(|e| CoreError::State(format!("ledger lock poisoned: {e}")))
    }

    fn hydrate<'a>(
        &self,
        state: &'a mut LedgerState,
        key: LedgerKey,
    ) -> Result<&'a mut Vec<QueuedTransaction>, CoreError> {
        match state.entries.entry(key) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let loaded = self.load(key)?;
                tracing::debug!(%key, count = loaded.len(), "ledger hydrated from storage");
                Ok(entry.insert(loaded))
            }
        }
    }

    fn load(&self, key: LedgerKey) -> Result<Vec<QueuedTransaction>, CoreError> {
        let storage_key = key.storage_key(&self.options.storage_prefix);
        let Some(raw) = self.storage.load(&storage_key).map_err(CoreError::Persistence)? else {
            return Ok(Vec::new());
        };
        let unbounded = ImportLimits {
            max_payload_bytes: usize::MAX,
            max_transactions: usize::MAX,
        };
        parse_import(&raw, &key, &unbounded)
            .map(|document| document.transactions)
            .map_err(|e| {
                CoreError::Persistence(PortError::Validation(format!(
                    "stored queue {storage_key} is unreadable: {e}"
                )))
            })
    }

    fn persist(&self, key: LedgerKey, list: &[QueuedTransaction]) -> Result<(), CoreError> {
        let storage_key = key.storage_key(&self.options.storage_prefix);
        let result = if list.is_empty() {
            self.storage.delete(&storage_key)
        } else {
            let blob = serde_json::to_string(&LedgerExport::new(key, list.to_vec()))
                .map_err(|e| PortError::Validation(e.to_string()))
                .map_err(CoreError::Persistence)?;
            self.storage.store(&storage_key, &blob)
        };
        result.map_err(|e| {
            tracing::warn!(%key, error = %e, "ledger write-through failed");
            CoreError::Persistence(e)
        })
    }
}

fn removal(count: usize) -> (RemoveOutcome, bool) {
    if count == 0 {
        (RemoveOutcome::NothingToRemove, false)
    } else {
        (RemoveOutcome::Removed(count), true)
    }
}
