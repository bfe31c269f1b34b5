#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;

use rusty_safe_ledger_core::{
    LedgerKey, PortError, SafeTransactionData, Signature, StoragePort, TransactionLedger,
};

pub const OWNER_A_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const OWNER_B_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
pub const OWNER_C_KEY: &str = "0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a";

/// In-memory storage that counts writes and can be told to fail.
#[derive(Debug, Default)]
pub struct TestStorage {
    blobs: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl TestStorage {
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn blob(&self, key: &str) -> Option<String> {
        self.blobs.lock().expect("storage lock").get(key).cloned()
    }

    pub fn seed(&self, key: &str, value: &str) {
        self.blobs
            .lock()
            .expect("storage lock")
            .insert(key.to_owned(), value.to_owned());
    }

    fn check(&self) -> Result<(), PortError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PortError::Transport("storage offline".to_owned()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl StoragePort for TestStorage {
    fn load(&self, key: &str) -> Result<Option<String>, PortError> {
        Ok(self.blob(key))
    }

    fn store(&self, key: &str, value: &str) -> Result<(), PortError> {
        self.check()?;
        self.seed(key, value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), PortError> {
        self.check()?;
        self.blobs.lock().expect("storage lock").remove(key);
        Ok(())
    }
}

pub fn new_ledger() -> TransactionLedger<TestStorage> {
    TransactionLedger::new(TestStorage::default())
}

pub fn safe_address() -> Address {
    "0x000000000000000000000000000000000000BEEF"
        .parse()
        .expect("valid safe address")
}

pub fn ledger_key() -> LedgerKey {
    LedgerKey::new(safe_address(), 1)
}

pub fn sample_tx(nonce: u64) -> SafeTransactionData {
    SafeTransactionData::call(
        "0x000000000000000000000000000000000000cafe"
            .parse()
            .expect("valid recipient"),
        U256::from(nonce) * U256::from(1_000u64),
        Bytes::new(),
        nonce,
    )
}

pub fn owner(key: &str) -> PrivateKeySigner {
    key.parse().expect("valid private key")
}

/// A real ECDSA signature by `key` over `digest`, `v` in 27/28.
pub fn sign(key: &str, digest: B256) -> Signature {
    let signer = owner(key);
    let sig = signer.sign_hash_sync(&digest).expect("sign digest");
    Signature::eoa(signer.address(), sig.as_bytes().to_vec())
}

/// Well-formed but unverifiable EOA signature bytes.
pub fn dummy_signature(signer: Address, seed: u8) -> Signature {
    let mut raw = vec![seed; 65];
    raw[64] = 27;
    Signature::eoa(signer, raw)
}
