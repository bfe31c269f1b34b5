use alloy::primitives::{Address, Bytes, B256};
use thiserror::Error;

use crate::domain::{LedgerKey, SafeTransactionData};

#[derive(Debug, Error)]
pub enum PortError {
    #[error("port not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("policy error: {0}")]
    Policy(String),
}

/// Durable key-value persistence. Values are opaque string blobs.
pub trait StoragePort {
    fn load(&self, key: &str) -> Result<Option<String>, PortError>;
    fn store(&self, key: &str, value: &str) -> Result<(), PortError>;
    fn delete(&self, key: &str) -> Result<(), PortError>;
}

/// Read access to the Safe contract plus final submission of a signed transaction.
pub trait ChainClientPort {
    fn nonce(&self, key: &LedgerKey) -> Result<u64, PortError>;
    fn threshold(&self, key: &LedgerKey) -> Result<u64, PortError>;
    /// Submits `execTransaction` with the packed signature blob and returns the
    /// chain transaction hash.
    fn broadcast(
        &self,
        key: &LedgerKey,
        tx: &SafeTransactionData,
        signatures: &Bytes,
    ) -> Result<B256, PortError>;
}

/// Produces an owner's signature over a 32-byte digest.
pub trait SigningPort {
    fn accounts(&self) -> Result<Vec<Address>, PortError>;
    fn sign_digest(&self, signer: Address, digest: B256) -> Result<Bytes, PortError>;
}
