#![allow(dead_code)]

use alloy::primitives::{Address, Bytes, U256};
use alloy::signers::local::PrivateKeySigner;

use rusty_safe_ledger_adapters::{LocalSignerAdapter, MemoryStorageAdapter};
use rusty_safe_ledger_core::{LedgerKey, SafeTransactionData, TransactionLedger};

pub const OWNER_A_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const OWNER_B_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
pub const OWNER_C_KEY: &str = "0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a";

pub fn safe_address() -> Address {
    "0x000000000000000000000000000000000000BEEF"
        .parse()
        .expect("valid safe address")
}

pub fn ledger_key() -> LedgerKey {
    LedgerKey::new(safe_address(), 1)
}

pub fn owner_address(key: &str) -> Address {
    key.parse::<PrivateKeySigner>()
        .expect("valid private key")
        .address()
}

pub fn local_signer() -> LocalSignerAdapter {
    LocalSignerAdapter::from_private_keys([OWNER_A_KEY, OWNER_B_KEY, OWNER_C_KEY])
        .expect("load owner keys")
}

pub fn memory_ledger() -> TransactionLedger<MemoryStorageAdapter> {
    TransactionLedger::new(MemoryStorageAdapter::default())
}

pub fn transfer_tx(nonce: u64) -> SafeTransactionData {
    SafeTransactionData::call(
        "0x000000000000000000000000000000000000CAFE"
            .parse()
            .expect("valid recipient"),
        U256::from(1_000_000_000_000_000_000u128),
        Bytes::new(),
        nonce,
    )
}
