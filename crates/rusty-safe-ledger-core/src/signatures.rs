//! Owner signature checks and the `execTransaction` signature encoding.

use alloy::primitives::{eip191_hash_message, Address, Bytes, PrimitiveSignature, B256, U256};

use crate::domain::Signature;
use crate::error::CoreError;

const ECDSA_LEN: usize = 65;
/// `v` offset the Safe uses to mark `eth_sign` signatures.
const ETH_SIGN_V_SHIFT: u8 = 4;

/// Shape check only. EOA signatures must be 65 bytes with a `v` the Safe
/// contract accepts for ECDSA (27/28, or 31/32 for `eth_sign`).
pub fn validate_signature(signature: &Signature) -> Result<(), CoreError> {
    if signature.is_contract_signature {
        if signature.data.is_empty() {
            return Err(CoreError::validation(
                "signature.data",
                "contract signature is empty",
            ));
        }
        return Ok(());
    }
    if signature.data.len() != ECDSA_LEN {
        return Err(CoreError::validation(
            "signature.data",
            format!(
                "expected {ECDSA_LEN} bytes, got {}",
                signature.data.len()
            ),
        ));
    }
    match signature.data[64] {
        27 | 28 | 31 | 32 => Ok(()),
        v => Err(CoreError::validation(
            "signature.data",
            format!("unsupported v value {v}"),
        )),
    }
}

pub fn recover_signer(digest: B256, signature: &Signature) -> Result<Address, CoreError> {
    validate_signature(signature)?;
    if signature.is_contract_signature {
        return Err(CoreError::validation(
            "signature.isContractSignature",
            "contract signatures are checked on-chain",
        ));
    }

    let raw = &signature.data;
    let (v, prehash) = match raw[64] {
        v @ (31 | 32) => (v - ETH_SIGN_V_SHIFT, eip191_hash_message(digest)),
        v => (v, digest),
    };
    let parsed = PrimitiveSignature::new(
        U256::from_be_slice(&raw[..32]),
        U256::from_be_slice(&raw[32..64]),
        v == 28,
    );
    parsed
        .recover_address_from_prehash(&prehash)
        .map_err(|e| CoreError::validation("signature.data", format!("recovery failed: {e}")))
}

/// Confirms an EOA signature was produced by its claimed signer. Contract
/// signatures only get the shape check.
pub fn verify_signature(digest: B256, signature: &Signature) -> Result<(), CoreError> {
    if signature.is_contract_signature {
        return validate_signature(signature);
    }
    let recovered = recover_signer(digest, signature)?;
    if recovered != signature.signer {
        return Err(CoreError::validation(
            "signature.signer",
            format!(
                "signature recovers to {recovered}, not {}",
                signature.signer
            ),
        ));
    }
    Ok(())
}

/// Concatenates signatures in ascending signer order, the layout
/// `checkSignatures` expects.
///
/// Contract signatures occupy a 65-byte static slot of
/// `signer ‖ offset ‖ 0x00`, and their payload is appended after all static
/// slots as `length ‖ data`.
pub fn pack_signatures(signatures: &[Signature]) -> Bytes {
    let mut sorted: Vec<&Signature> = signatures.iter().collect();
    sorted.sort_by_key(|s| s.signer);

    let static_len = ECDSA_LEN * sorted.len();
    let mut static_part = Vec::with_capacity(static_len);
    let mut dynamic_part = Vec::new();

    for signature in sorted {
        if signature.is_contract_signature {
            let offset = U256::from(static_len + dynamic_part.len());
            static_part.extend_from_slice(signature.signer.into_word().as_slice());
            static_part.extend_from_slice(&offset.to_be_bytes::<32>());
            static_part.push(0);

            dynamic_part.extend_from_slice(&U256::from(signature.data.len()).to_be_bytes::<32>());
            dynamic_part.extend_from_slice(&signature.data);
        } else {
            static_part.extend_from_slice(&signature.data);
        }
    }

    static_part.extend_from_slice(&dynamic_part);
    Bytes::from(static_part)
}
