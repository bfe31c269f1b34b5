use alloy::primitives::B256;
use serde::Serialize;

use rusty_safe_ledger_core::{
    lifecycle_for, pack_signatures, tx_transition, ChainClientPort, CoreError, LedgerKey,
    RemoveOutcome, StateTransition, StoragePort, TransactionLedger, TxAction, TxLifecycle,
};

/// Signature count against the live on-chain threshold and nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Readiness {
    pub nonce: u64,
    pub safe_tx_hash: B256,
    pub signatures: usize,
    pub threshold: u64,
    pub onchain_nonce: u64,
    pub lifecycle: TxLifecycle,
}

impl Readiness {
    /// Enough signatures and next in line on-chain.
    pub fn is_executable(&self) -> bool {
        self.lifecycle == TxLifecycle::ReadyToBroadcast && self.nonce == self.onchain_nonce
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastReceipt {
    pub nonce: u64,
    pub safe_tx_hash: B256,
    pub chain_tx_hash: B256,
    pub transition: StateTransition,
    /// Removal of the submitted transaction from the queue. An `Err` means the
    /// transaction was broadcast but is still queued and must be removed by hand.
    pub queue_cleanup: Result<RemoveOutcome, String>,
}

/// Final step of the lifecycle: submits a fully signed transaction and drops
/// it from the queue.
pub struct Broadcaster<'a, S: StoragePort, C: ChainClientPort> {
    ledger: &'a TransactionLedger<S>,
    chain: &'a C,
}

impl<'a, S: StoragePort, C: ChainClientPort> Broadcaster<'a, S, C> {
    pub fn new(ledger: &'a TransactionLedger<S>, chain: &'a C) -> Self {
        Self { ledger, chain }
    }

    pub fn readiness(&self, key: LedgerKey, nonce: u64) -> Result<Readiness, CoreError> {
        let tx = self
            .ledger
            .get(key, nonce)?
            .ok_or_else(|| CoreError::NotFound(format!("transaction {nonce} for {key}")))?;
        let threshold = self.chain.threshold(&key).map_err(CoreError::Chain)?;
        let onchain_nonce = self.chain.nonce(&key).map_err(CoreError::Chain)?;

        Ok(Readiness {
            nonce,
            safe_tx_hash: self.ledger.safe_tx_hash(key, &tx.data),
            signatures: tx.signature_count(),
            threshold,
            onchain_nonce,
            lifecycle: lifecycle_for(tx.signature_count(), threshold),
        })
    }

    /// Errors only when nothing was submitted. Once the chain accepts the
    /// transaction the receipt is returned, with any queue cleanup failure in
    /// [`BroadcastReceipt::queue_cleanup`].
    pub fn broadcast(&self, key: LedgerKey, nonce: u64) -> Result<BroadcastReceipt, CoreError> {
        let readiness = self.readiness(key, nonce)?;
        let (_, transition) = tx_transition(readiness.lifecycle, TxAction::Broadcast)?;
        if readiness.onchain_nonce != nonce {
            return Err(CoreError::validation(
                "nonce",
                format!(
                    "Safe is at nonce {}, transaction {nonce} cannot execute yet",
                    readiness.onchain_nonce
                ),
            ));
        }

        let tx = self
            .ledger
            .get(key, nonce)?
            .ok_or_else(|| CoreError::NotFound(format!("transaction {nonce} for {key}")))?;
        let packed = pack_signatures(&tx.signatures);
        let chain_tx_hash = self
            .chain
            .broadcast(&key, &tx.data, &packed)
            .map_err(CoreError::Chain)?;

        let queue_cleanup = self.ledger.remove(key, Some(nonce)).map_err(|e| {
            tracing::warn!(
                %key,
                nonce,
                chain_tx_hash = %chain_tx_hash,
                error = %e,
                "broadcast submitted but queue cleanup failed"
            );
            e.to_string()
        });
        tracing::info!(
            %key,
            nonce,
            safe_tx_hash = %readiness.safe_tx_hash,
            chain_tx_hash = %chain_tx_hash,
            "transaction broadcast"
        );

        Ok(BroadcastReceipt {
            nonce,
            safe_tx_hash: readiness.safe_tx_hash,
            chain_tx_hash,
            transition,
            queue_cleanup,
        })
    }
}
