use std::fmt;

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::serde_compat;

/// Identifies one Safe queue: the Safe contract address on a specific chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerKey {
    pub safe_address: Address,
    pub chain_id: u64,
}

impl LedgerKey {
    pub fn new(safe_address: Address, chain_id: u64) -> Self {
        Self {
            safe_address,
            chain_id,
        }
    }

    /// Stable storage key, e.g. `safe-txs:1:0x000000000000000000000000000000000000beef`.
    pub fn storage_key(&self, prefix: &str) -> String {
        format!(
            "{prefix}:{}:0x{}",
            self.chain_id,
            alloy::hex::encode(self.safe_address)
        )
    }
}

impl fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.safe_address, self.chain_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Operation {
    #[default]
    Call = 0,
    DelegateCall = 1,
}

impl Operation {
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Operation::Call),
            1 => Some(Operation::DelegateCall),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Operation {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Operation::from_u8(value).ok_or_else(|| format!("invalid operation {value}"))
    }
}

impl Serialize for Operation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for Operation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_compat::deserialize_u64_lenient(deserializer)?;
        u8::try_from(raw)
            .ok()
            .and_then(Operation::from_u8)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid operation {raw}")))
    }
}

/// One candidate multisig operation, as signed by the Safe owners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeTransactionData {
    #[serde(with = "serde_compat::address")]
    pub to: Address,
    #[serde(with = "serde_compat::u256_decimal")]
    pub value: U256,
    #[serde(default, with = "serde_compat::hex_bytes")]
    pub data: Bytes,
    #[serde(default)]
    pub operation: Operation,
    #[serde(default, with = "serde_compat::u256_decimal")]
    pub safe_tx_gas: U256,
    #[serde(default, with = "serde_compat::u256_decimal")]
    pub base_gas: U256,
    #[serde(default, with = "serde_compat::u256_decimal")]
    pub gas_price: U256,
    #[serde(default, with = "serde_compat::address_or_zero")]
    pub gas_token: Address,
    #[serde(default, with = "serde_compat::address_or_zero")]
    pub refund_receiver: Address,
    #[serde(with = "serde_compat::nonce")]
    pub nonce: u64,
}

impl SafeTransactionData {
    /// A plain call with zeroed gas and refund parameters.
    pub fn call(to: Address, value: U256, data: impl Into<Bytes>, nonce: u64) -> Self {
        Self {
            to,
            value,
            data: data.into(),
            operation: Operation::Call,
            safe_tx_gas: U256::ZERO,
            base_gas: U256::ZERO,
            gas_price: U256::ZERO,
            gas_token: Address::ZERO,
            refund_receiver: Address::ZERO,
            nonce,
        }
    }

    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = operation;
        self
    }
}

/// One owner's endorsement of a transaction digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    #[serde(with = "serde_compat::address")]
    pub signer: Address,
    #[serde(with = "serde_compat::hex_bytes")]
    pub data: Bytes,
    #[serde(default)]
    pub is_contract_signature: bool,
}

impl Signature {
    pub fn eoa(signer: Address, data: impl Into<Bytes>) -> Self {
        Self {
            signer,
            data: data.into(),
            is_contract_signature: false,
        }
    }

    pub fn contract(signer: Address, data: impl Into<Bytes>) -> Self {
        Self {
            signer,
            data: data.into(),
            is_contract_signature: true,
        }
    }

    /// Wallets that return a raw recovery id (`v` of 0/1) get it shifted to 27/28;
    /// the Safe contract reads `v == 0` and `v == 1` as contract and approved-hash
    /// signatures.
    pub fn normalized(mut self) -> Self {
        if !self.is_contract_signature && self.data.len() == 65 && self.data[64] < 2 {
            let mut raw = self.data.to_vec();
            raw[64] += 27;
            self.data = Bytes::from(raw);
        }
        self
    }
}

/// A queued transaction together with the signatures collected so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedTransaction {
    pub data: SafeTransactionData,
    #[serde(default)]
    pub signatures: Vec<Signature>,
}

impl QueuedTransaction {
    pub fn new(data: SafeTransactionData) -> Self {
        Self {
            data,
            signatures: Vec::new(),
        }
    }

    pub fn nonce(&self) -> u64 {
        self.data.nonce
    }

    pub fn signature_count(&self) -> usize {
        self.signatures.len()
    }

    pub fn has_signer(&self, signer: Address) -> bool {
        self.signatures.iter().any(|s| s.signer == signer)
    }

    pub fn signers(&self) -> Vec<Address> {
        self.signatures.iter().map(|s| s.signer).collect()
    }

    /// Merges a signature keyed by signer address. An existing entry from the
    /// same signer is overwritten in place.
    pub fn upsert_signature(&mut self, signature: Signature) -> SignatureMerge {
        match self
            .signatures
            .iter_mut()
            .find(|s| s.signer == signature.signer)
        {
            Some(existing) if *existing == signature => SignatureMerge::Unchanged,
            Some(existing) => {
                *existing = signature;
                SignatureMerge::Replaced
            }
            None => {
                self.signatures.push(signature);
                SignatureMerge::Added
            }
        }
    }
}

/// Hashes produced for one EIP-712 payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashResult {
    pub domain_hash: B256,
    pub message_hash: B256,
    pub digest_hash: B256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_message: Option<B256>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Inserted,
    /// An existing transaction at the same nonce was overwritten along with its
    /// signatures.
    Replaced { data_changed: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureMerge {
    Added,
    Replaced,
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed(usize),
    NothingToRemove,
}

impl RemoveOutcome {
    pub fn removed(&self) -> usize {
        match self {
            RemoveOutcome::Removed(n) => *n,
            RemoveOutcome::NothingToRemove => 0,
        }
    }
}
