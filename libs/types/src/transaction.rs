//! Signed transaction payloads as handed to relays

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};

/// An opaque, already-signed transaction. The engine never decodes it; it only
/// needs the raw bytes for delivery and a stable identifier for tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    #[serde(serialize_with = "as_hex", deserialize_with = "from_hex")]
    raw: Vec<u8>,
    hash: String,
}

impl SignedTransaction {
    /// Wrap raw signed bytes; the identifier is the keccak256 of the payload
    pub fn new(raw: Vec<u8>) -> Self {
        let hash = keccak256_hex(&raw);
        Self { raw, hash }
    }

    /// Parse a `0x`-prefixed (or bare) hex string of signed bytes
    pub fn from_hex(raw_hex: &str) -> Result<Self, hex::FromHexError> {
        let trimmed = raw_hex.strip_prefix("0x").unwrap_or(raw_hex);
        Ok(Self::new(hex::decode(trimmed)?))
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }
}

/// `0x`-prefixed keccak256 digest
pub fn keccak256_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(Keccak256::digest(bytes)))
}

fn as_hex<S: Serializer>(raw: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("0x{}", hex::encode(raw)))
}

fn from_hex<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let value = String::deserialize(deserializer)?;
    let trimmed = value.strip_prefix("0x").unwrap_or(&value);
    hex::decode(trimmed).map_err(serde::de::Error::custom)
}
