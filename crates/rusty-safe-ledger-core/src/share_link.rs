//! Base64url share links for passing a transaction or one owner's signature
//! between co-signers.
//!
//! A link carries either `?importTx=<payload>` with `{"tx": {data, signatures}}`
//! or `?importSig=<payload>` with `{"signature": {...}, "txHash": "0x.."}`.

use alloy::primitives::B256;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::domain::{QueuedTransaction, Signature};
use crate::error::CoreError;

pub const TX_QUERY_KEY: &str = "importTx";
pub const SIGNATURE_QUERY_KEY: &str = "importSig";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SharePayload {
    Transaction {
        tx: QueuedTransaction,
    },
    Signature {
        signature: Signature,
        #[serde(rename = "txHash")]
        tx_hash: B256,
    },
}

impl SharePayload {
    pub fn query_key(&self) -> &'static str {
        match self {
            SharePayload::Transaction { .. } => TX_QUERY_KEY,
            SharePayload::Signature { .. } => SIGNATURE_QUERY_KEY,
        }
    }

    /// `importTx=...` / `importSig=...`, ready to append to a URL.
    pub fn to_query(&self) -> Result<String, CoreError> {
        Ok(format!("{}={}", self.query_key(), encode_share_payload(self)?))
    }
}

pub fn encode_share_payload(payload: &SharePayload) -> Result<String, CoreError> {
    let json = serde_json::to_vec(payload)
        .map_err(|e| CoreError::Import(format!("share payload: {e}")))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Decodes a payload produced by [`encode_share_payload`]. Standard and padded
/// base64 are accepted too, as are percent-encoded `%2B`/`%2F`/`%3D` and `+`
/// turned into a space by form decoding.
pub fn decode_share_payload(encoded: &str) -> Result<SharePayload, CoreError> {
    let normalized: String = encoded
        .trim()
        .replace("%3D", "")
        .replace("%3d", "")
        .replace("%2B", "-")
        .replace("%2b", "-")
        .replace("%2F", "_")
        .replace("%2f", "_")
        .chars()
        .filter(|c| *c != '=')
        .map(|c| match c {
            '+' | ' ' => '-',
            '/' => '_',
            other => other,
        })
        .collect();

    let json = URL_SAFE_NO_PAD
        .decode(normalized.as_bytes())
        .map_err(|e| CoreError::Import(format!("share payload is not base64: {e}")))?;
    serde_json::from_slice(&json)
        .map_err(|e| CoreError::Import(format!("share payload is malformed: {e}")))
}

/// Extracts a share payload from a full URL or a bare query string. Returns
/// `None` when neither share key is present.
pub fn parse_share_query(input: &str) -> Result<Option<SharePayload>, CoreError> {
    let query = input.rsplit_once('?').map_or(input, |(_, q)| q);
    let query = query.split('#').next().unwrap_or_default();

    for pair in query.split('&') {
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };
        let payload = match name {
            TX_QUERY_KEY | SIGNATURE_QUERY_KEY => decode_share_payload(value)?,
            _ => continue,
        };
        if payload.query_key() != name {
            return Err(CoreError::Import(format!(
                "`{name}` does not carry a {} payload",
                if name == TX_QUERY_KEY {
                    "transaction"
                } else {
                    "signature"
                }
            )));
        }
        return Ok(Some(payload));
    }
    Ok(None)
}
