//! 128-bit span identifiers.

use std::str::FromStr;

use interop_common::InteropError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

pub const SPAN_ID_LEN: usize = 16;

/// Opaque identifier of a node in the causal graph.
///
/// The all-zero value is reserved as "empty" and never minted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SpanId([u8; SPAN_ID_LEN]);

impl SpanId {
    pub const EMPTY: SpanId = SpanId([0; SPAN_ID_LEN]);

    pub fn from_bytes(bytes: [u8; SPAN_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Mint a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().into_bytes())
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    pub fn as_bytes(&self) -> &[u8; SPAN_ID_LEN] {
        &self.0
    }

    /// 32 lowercase hex characters, two per byte, no separators.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse the canonical form only. Whitespace and uppercase are rejected.
    pub fn from_hex(s: &str) -> Result<Self, InteropError> {
        let canonical = s.len() == SPAN_ID_LEN * 2
            && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if !canonical {
            return Err(InteropError::InvalidSpanId(format!(
                "{s:?}: expected {} lowercase hex characters",
                SPAN_ID_LEN * 2
            )));
        }
        let mut bytes = [0u8; SPAN_ID_LEN];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| InteropError::InvalidSpanId(format!("{s:?}: {e}")))?;
        Ok(Self(bytes))
    }

    /// Byte form handed to scripting surfaces.
    pub fn to_user_bytes(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    pub fn from_user_bytes(bytes: &[u8]) -> Result<Self, InteropError> {
        let bytes: [u8; SPAN_ID_LEN] = bytes.try_into().map_err(|_| {
            InteropError::InvalidSpanId(format!(
                "expected {SPAN_ID_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }
}

impl std::fmt::Display for SpanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for SpanId {
    type Err = InteropError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for SpanId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for SpanId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let bytes: [u8; 16] = [
            0x00, 0x01, 0x0a, 0x10, 0x7f, 0x80, 0xab, 0xcd, 0xef, 0xff, 0x42, 0x13, 0x37, 0x99,
            0x05, 0xfe,
        ];
        let id = SpanId::from_bytes(bytes);
        let hex = id.to_hex();
        assert_eq!(hex, "00010a107f80abcdefff4213379905fe");
        assert_eq!(SpanId::from_hex(&hex).unwrap(), id);
    }

    #[test]
    fn hex_is_lowercase_and_32_chars() {
        let hex = SpanId::generate().to_hex();
        assert_eq!(hex.len(), 32);
        assert!(hex.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn rejects_wrong_length_hex() {
        assert!(SpanId::from_hex("abcd").is_err());
        assert!(SpanId::from_hex("zz010a107f80abcdefff4213379905fe").is_err());
    }

    #[test]
    fn rejects_non_canonical_hex() {
        let canonical = "00010a107f80abcdefff4213379905fe";
        assert!(SpanId::from_hex(canonical).is_ok());
        assert!(SpanId::from_hex(&canonical.to_uppercase()).is_err());
        assert!(SpanId::from_hex(&format!(" {canonical}")).is_err());
        assert!(SpanId::from_hex(&format!("{canonical}\n")).is_err());
        assert!(canonical.to_uppercase().parse::<SpanId>().is_err());
    }

    #[test]
    fn generated_ids_are_unique_and_non_empty() {
        let a = SpanId::generate();
        let b = SpanId::generate();
        assert_ne!(a, b);
        assert!(!a.is_empty());
        assert!(SpanId::default().is_empty());
    }

    #[test]
    fn user_bytes_round_trip() {
        let id = SpanId::generate();
        assert_eq!(SpanId::from_user_bytes(&id.to_user_bytes()).unwrap(), id);
        assert!(SpanId::from_user_bytes(&[1, 2, 3]).is_err());
    }

    #[test]
    fn serializes_as_hex_string() {
        let id = SpanId::from_bytes([0xab; 16]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(16)));
        let back: SpanId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
