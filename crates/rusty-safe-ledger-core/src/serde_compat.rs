//! Lenient serde codecs for externally sourced transaction payloads.
//!
//! Exports written by different wallet front-ends disagree on number and hex
//! encodings. These helpers accept the known variants on input and always emit
//! one canonical form: decimal strings for amounts, `0x` hex for bytes, plain
//! JSON numbers for nonces.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

/// Parses a decimal or `0x`-prefixed hex integer. Empty input reads as zero.
pub fn parse_u256(raw: &str) -> Result<U256, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(U256::ZERO);
    }
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        if hex.is_empty() {
            return Ok(U256::ZERO);
        }
        return U256::from_str_radix(hex, 16).map_err(|e| format!("invalid hex integer {raw}: {e}"));
    }
    U256::from_str_radix(raw, 10).map_err(|e| format!("invalid integer {raw}: {e}"))
}

/// Parses an account reference. Input is lowercased first so that mixed-case
/// spellings of the same address always yield the same key.
pub fn parse_address(raw: &str) -> Result<Address, String> {
    raw.trim()
        .to_ascii_lowercase()
        .parse::<Address>()
        .map_err(|e| format!("invalid address {raw}: {e}"))
}

pub fn deserialize_u64_lenient<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => {
            let value = parse_u256(&s).map_err(serde::de::Error::custom)?;
            u64::try_from(value)
                .map_err(|_| serde::de::Error::custom(format!("integer {s} exceeds u64")))
        }
    }
}

pub mod u256_decimal {
    use alloy::primitives::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::NumberOrString;

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        match NumberOrString::deserialize(deserializer)? {
            NumberOrString::Number(n) => Ok(U256::from(n)),
            NumberOrString::String(s) => super::parse_u256(&s).map_err(serde::de::Error::custom),
        }
    }
}

pub mod nonce {
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(*value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        super::deserialize_u64_lenient(deserializer)
    }
}

pub mod hex_bytes {
    use alloy::primitives::Bytes;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        value.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        let raw = raw.unwrap_or_default();
        let raw = raw.trim();
        let hex = raw
            .strip_prefix("0x")
            .or_else(|| raw.strip_prefix("0X"))
            .unwrap_or(raw);
        alloy::hex::decode(hex)
            .map(Bytes::from)
            .map_err(|e| serde::de::Error::custom(format!("invalid hex bytes: {e}")))
    }
}

pub mod address {
    use alloy::primitives::Address;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Address, serializer: S) -> Result<S::Ok, S::Error> {
        value.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Address, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_address(&raw).map_err(serde::de::Error::custom)
    }
}

/// `null`, empty string and a missing field all read as the zero address.
pub mod address_or_zero {
    use alloy::primitives::Address;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Address, serializer: S) -> Result<S::Ok, S::Error> {
        value.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Address, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(Address::ZERO),
            Some(s) => super::parse_address(s).map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_u256_accepts_decimal_and_hex() {
        assert_eq!(parse_u256("10").expect("dec"), U256::from(10));
        assert_eq!(parse_u256("0x0a").expect("hex"), U256::from(10));
        assert_eq!(parse_u256(" ").expect("empty"), U256::ZERO);
        assert!(parse_u256("ten").is_err());
        let big = parse_u256("115792089237316195423570985008687907853269984665640564039457584007913129639935")
            .expect("max");
        assert_eq!(big, U256::MAX);
    }

    #[test]
    fn parse_address_ignores_case() {
        let upper = parse_address("0xABCDEFABCDEFABCDEFABCDEFABCDEFABCDEFABCD").expect("upper");
        let lower = parse_address("0xabcdefabcdefabcdefabcdefabcdefabcdefabcd").expect("lower");
        assert_eq!(upper, lower);
        assert!(parse_address("0x1234").is_err());
    }
}
