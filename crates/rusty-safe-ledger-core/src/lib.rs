//! Safe transaction hashing and signature-aggregation core.
//!
//! `hash_engine` computes the EIP-191 / EIP-712 hashes owners sign, and
//! `ledger` keeps the per-Safe, per-chain queue of pending transactions with
//! their collected signatures.

pub mod domain;
pub mod error;
pub mod export;
pub mod hash_engine;
pub mod ledger;
pub mod ports;
pub mod serde_compat;
pub mod share_link;
pub mod signatures;
pub mod state_machine;

pub use domain::{
    HashResult, LedgerKey, Operation, QueuedTransaction, RemoveOutcome, SafeTransactionData,
    SaveOutcome, Signature, SignatureMerge,
};
pub use error::CoreError;
pub use export::{ImportLimits, ImportSummary, LedgerExport, EXPORT_SCHEMA_VERSION};
pub use hash_engine::{
    eip712_digest, hash_personal_sign, hash_personal_sign_bytes, hash_safe_message,
    hash_safe_personal_message, hash_safe_tx, hash_safe_tx_for_version, hash_safe_typed_message,
    hash_typed_data, hash_typed_data_json, SafeVersion, TypedDataRequest,
};
pub use ledger::{LedgerOptions, ShareOutcome, TransactionLedger};
pub use ports::{ChainClientPort, PortError, SigningPort, StoragePort};
pub use share_link::{decode_share_payload, encode_share_payload, parse_share_query, SharePayload};
pub use signatures::{pack_signatures, recover_signer, validate_signature, verify_signature};
pub use state_machine::{lifecycle_for, tx_transition, StateTransition, TxAction, TxLifecycle};
