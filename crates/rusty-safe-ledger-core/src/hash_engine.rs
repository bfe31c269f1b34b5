//! EIP-191 / EIP-712 hashing for Safe transactions and messages.
//!
//! Everything here is a pure function of its inputs. Safe-specific hashes are
//! built from `sol!` struct definitions so the type hashes come from the same
//! canonical encoding the contracts use.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use alloy::dyn_abi::TypedData;
use alloy::primitives::{eip191_hash_message, keccak256, Address, Bytes, B256, U256};
use alloy::sol_types::{Eip712Domain, SolStruct};
use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{HashResult, SafeTransactionData};
use crate::error::CoreError;
use crate::serde_compat;

mod typed {
    alloy::sol! {
        struct SafeTx {
            address to;
            uint256 value;
            bytes data;
            uint8 operation;
            uint256 safeTxGas;
            uint256 baseGas;
            uint256 gasPrice;
            address gasToken;
            address refundReceiver;
            uint256 nonce;
        }

        struct SafeMessage {
            bytes message;
        }
    }

    /// Safe releases before 1.0.0 named `baseGas` `dataGas`, which changes the
    /// type hash.
    pub mod legacy {
        alloy::sol! {
            struct SafeTx {
                address to;
                uint256 value;
                bytes data;
                uint8 operation;
                uint256 safeTxGas;
                uint256 dataGas;
                uint256 gasPrice;
                address gasToken;
                address refundReceiver;
                uint256 nonce;
            }
        }
    }
}

const DOMAIN_TYPE: &str = "EIP712Domain";

/// Safe contract version, used to pick the hashing scheme the deployed
/// singleton expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeVersion(Version);

impl SafeVersion {
    /// Accepts `1.3.0`, `v1.4.1` and suffixed forms such as `1.3.0+L2`.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let trimmed = raw.trim();
        let trimmed = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        Version::parse(trimmed)
            .map(Self)
            .map_err(|e| CoreError::validation("safeVersion", format!("invalid version {raw}: {e}")))
    }

    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(Version::new(major, minor, patch))
    }

    pub fn latest() -> Self {
        Self::new(1, 4, 1)
    }

    fn at_least(&self, major: u64, minor: u64, patch: u64) -> bool {
        (self.0.major, self.0.minor, self.0.patch) >= (major, minor, patch)
    }

    /// From 1.3.0 the domain separator binds the chain id.
    pub fn domain_includes_chain_id(&self) -> bool {
        self.at_least(1, 3, 0)
    }

    pub fn uses_base_gas(&self) -> bool {
        self.at_least(1, 0, 0)
    }
}

impl Default for SafeVersion {
    fn default() -> Self {
        Self::latest()
    }
}

impl fmt::Display for SafeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.0.major, self.0.minor, self.0.patch)
    }
}

impl FromStr for SafeVersion {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Loosely typed EIP-712 request as received from a dapp. Missing parts are
/// reported by name rather than as a generic decode failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedDataRequest {
    #[serde(default)]
    pub domain: Option<Value>,
    #[serde(default)]
    pub types: Option<Value>,
    #[serde(default)]
    pub primary_type: Option<String>,
    #[serde(default)]
    pub message: Option<Value>,
}

impl TypedDataRequest {
    pub fn new(domain: Value, types: Value, primary_type: impl Into<String>, message: Value) -> Self {
        Self {
            domain: Some(domain),
            types: Some(types),
            primary_type: Some(primary_type.into()),
            message: Some(message),
        }
    }
}

/// `keccak256(0x1901 ‖ domainHash ‖ messageHash)`.
pub fn eip712_digest(domain_hash: B256, message_hash: B256) -> B256 {
    let mut buf = [0u8; 66];
    buf[0] = 0x19;
    buf[1] = 0x01;
    buf[2..34].copy_from_slice(domain_hash.as_slice());
    buf[34..66].copy_from_slice(message_hash.as_slice());
    keccak256(buf)
}

/// EIP-191 personal-sign hash. `0x`/`0X` hex input is hashed as the decoded bytes;
/// anything that does not decode is hashed as literal text.
pub fn hash_personal_sign(message: &str) -> B256 {
    let decoded = message
        .strip_prefix("0x")
        .or_else(|| message.strip_prefix("0X"))
        .and_then(|hex| alloy::hex::decode(hex).ok());
    match decoded {
        Some(bytes) => eip191_hash_message(bytes),
        None => eip191_hash_message(message.as_bytes()),
    }
}

pub fn hash_personal_sign_bytes(message: &[u8]) -> B256 {
    eip191_hash_message(message)
}

pub fn hash_typed_data(request: &TypedDataRequest) -> Result<HashResult, CoreError> {
    let types = request
        .types
        .as_ref()
        .ok_or_else(|| CoreError::validation("types", "missing"))?;
    let domain = request
        .domain
        .as_ref()
        .ok_or_else(|| CoreError::validation("domain", "missing"))?;
    let primary_type = request
        .primary_type
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| CoreError::validation("primaryType", "missing"))?;
    let message = request
        .message
        .as_ref()
        .ok_or_else(|| CoreError::validation("message", "missing"))?;

    let mut types = types
        .as_object()
        .cloned()
        .ok_or_else(|| CoreError::validation("types", "expected an object"))?;
    let domain = normalize_domain(domain, types.get(DOMAIN_TYPE))?;
    types.remove(DOMAIN_TYPE);

    let document = serde_json::json!({
        "types": Value::Object(types),
        "primaryType": primary_type,
        "domain": domain,
        "message": message,
    });
    let typed: TypedData = serde_json::from_value(document)
        .map_err(|e| CoreError::validation("typedData", e.to_string()))?;

    let domain_hash = typed.domain.hash_struct();
    let message_hash = typed
        .hash_struct()
        .map_err(|e| CoreError::validation("message", e.to_string()))?;

    Ok(HashResult {
        domain_hash,
        message_hash,
        digest_hash: eip712_digest(domain_hash, message_hash),
        inner_message: None,
    })
}

/// Hashes a full `eth_signTypedData_v4` document, given either as an object or
/// as its JSON string encoding.
pub fn hash_typed_data_json(value: &Value) -> Result<HashResult, CoreError> {
    let request: TypedDataRequest = match value {
        Value::String(raw) => serde_json::from_str(raw),
        other => serde_json::from_value(other.clone()),
    }
    .map_err(|e| CoreError::validation("typedData", e.to_string()))?;
    hash_typed_data(&request)
}

/// Drops domain fields the caller's `EIP712Domain` type does not declare and
/// rewrites `chainId` as hex so decimal strings and JSON numbers hash alike.
fn normalize_domain(domain: &Value, declared: Option<&Value>) -> Result<Value, CoreError> {
    let mut fields: Map<String, Value> = domain
        .as_object()
        .cloned()
        .ok_or_else(|| CoreError::validation("domain", "expected an object"))?;

    fields.retain(|_, v| !v.is_null());

    if let Some(Value::Array(entries)) = declared {
        let names: HashSet<&str> = entries
            .iter()
            .filter_map(|entry| entry.get("name").and_then(Value::as_str))
            .collect();
        fields.retain(|k, _| names.contains(k.as_str()));
    }

    if let Some(chain_id) = fields.get_mut("chainId") {
        let parsed = match chain_id {
            Value::Number(n) => n
                .as_u64()
                .map(U256::from)
                .ok_or_else(|| format!("unsupported chainId {n}")),
            Value::String(s) => serde_compat::parse_u256(s),
            ref other => Err(format!("unsupported chainId {other}")),
        }
        .map_err(|reason| CoreError::validation("domain.chainId", reason))?;
        *chain_id = Value::String(format!("0x{parsed:x}"));
    }

    Ok(Value::Object(fields))
}

fn safe_domain(safe_address: Address, chain_id: u64, include_chain_id: bool) -> Eip712Domain {
    Eip712Domain::new(
        None,
        None,
        include_chain_id.then(|| U256::from(chain_id)),
        Some(safe_address),
        None,
    )
}

/// `SafeTx` hash for Safe 1.3.0 and later, identical to the contract's
/// `getTransactionHash`.
pub fn hash_safe_tx(safe_address: Address, chain_id: u64, tx: &SafeTransactionData) -> HashResult {
    hash_safe_tx_for_version(safe_address, chain_id, tx, &SafeVersion::latest())
}

pub fn hash_safe_tx_for_version(
    safe_address: Address,
    chain_id: u64,
    tx: &SafeTransactionData,
    version: &SafeVersion,
) -> HashResult {
    let domain_hash =
        safe_domain(safe_address, chain_id, version.domain_includes_chain_id()).hash_struct();

    let message_hash = if version.uses_base_gas() {
        typed::SafeTx {
            to: tx.to,
            value: tx.value,
            data: tx.data.clone(),
            operation: tx.operation.as_u8(),
            safeTxGas: tx.safe_tx_gas,
            baseGas: tx.base_gas,
            gasPrice: tx.gas_price,
            gasToken: tx.gas_token,
            refundReceiver: tx.refund_receiver,
            nonce: U256::from(tx.nonce),
        }
        .eip712_hash_struct()
    } else {
        typed::legacy::SafeTx {
            to: tx.to,
            value: tx.value,
            data: tx.data.clone(),
            operation: tx.operation.as_u8(),
            safeTxGas: tx.safe_tx_gas,
            dataGas: tx.base_gas,
            gasPrice: tx.gas_price,
            gasToken: tx.gas_token,
            refundReceiver: tx.refund_receiver,
            nonce: U256::from(tx.nonce),
        }
        .eip712_hash_struct()
    };

    HashResult {
        domain_hash,
        message_hash,
        digest_hash: eip712_digest(domain_hash, message_hash),
        inner_message: None,
    }
}

/// Wraps an already computed message hash in `SafeMessage(bytes message)`,
/// which is what owners sign for off-chain messages via `isValidSignature`.
pub fn hash_safe_message(
    safe_address: Address,
    chain_id: u64,
    inner_message: B256,
    version: &SafeVersion,
) -> HashResult {
    let domain_hash =
        safe_domain(safe_address, chain_id, version.domain_includes_chain_id()).hash_struct();
    let message_hash = typed::SafeMessage {
        message: Bytes::copy_from_slice(inner_message.as_slice()),
    }
    .eip712_hash_struct();

    HashResult {
        domain_hash,
        message_hash,
        digest_hash: eip712_digest(domain_hash, message_hash),
        inner_message: Some(inner_message),
    }
}

pub fn hash_safe_personal_message(
    safe_address: Address,
    chain_id: u64,
    message: &str,
    version: &SafeVersion,
) -> HashResult {
    hash_safe_message(safe_address, chain_id, hash_personal_sign(message), version)
}

pub fn hash_safe_typed_message(
    safe_address: Address,
    chain_id: u64,
    typed_data: &Value,
    version: &SafeVersion,
) -> Result<HashResult, CoreError> {
    let inner = hash_typed_data_json(typed_data)?;
    Ok(hash_safe_message(
        safe_address,
        chain_id,
        inner.digest_hash,
        version,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_gates() {
        let v = SafeVersion::parse("1.3.0+L2").expect("parse");
        assert!(v.domain_includes_chain_id());
        assert!(v.uses_base_gas());

        let v = SafeVersion::parse("v1.2.0").expect("parse");
        assert!(!v.domain_includes_chain_id());
        assert!(v.uses_base_gas());

        let v = SafeVersion::parse("0.1.0").expect("parse");
        assert!(!v.uses_base_gas());

        let err = SafeVersion::parse("one.three").expect_err("garbage");
        assert_eq!(err.field(), Some("safeVersion"));
    }

    #[test]
    fn safe_tx_typehash_matches_contract_constant() {
        let expected: B256 = "0xbb8310d486368db6bd6f849402fdd73ad53d316b5a4b2644ad6efe0f941286d8"
            .parse()
            .expect("hash");
        let tx = typed::SafeTx {
            to: Address::ZERO,
            value: U256::ZERO,
            data: Bytes::new(),
            operation: 0,
            safeTxGas: U256::ZERO,
            baseGas: U256::ZERO,
            gasPrice: U256::ZERO,
            gasToken: Address::ZERO,
            refundReceiver: Address::ZERO,
            nonce: U256::ZERO,
        };
        assert_eq!(tx.eip712_type_hash(), expected);
    }

    #[test]
    fn chain_id_spellings_normalize_alike() {
        let a = normalize_domain(&serde_json::json!({"chainId": 137}), None).expect("number");
        let b = normalize_domain(&serde_json::json!({"chainId": "137"}), None).expect("decimal");
        let c = normalize_domain(&serde_json::json!({"chainId": "0x89"}), None).expect("hex");
        assert_eq!(a, b);
        assert_eq!(b, c);
    }
}
