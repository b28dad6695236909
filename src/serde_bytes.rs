//! Serde helpers for byte fields
//!
//! Algorand tooling (WalletConnect, algod, indexer) represents hashes and
//! raw transactions as standard base64, so byte fields cross the JSON
//! boundary in that form.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serializer};

fn decode<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom)
}

/// Serialize/deserialize [u8; 32] as base64 string
pub mod base64_32 {
    use super::*;

    pub fn serialize<S>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        decode(deserializer)?
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
    }
}

/// Serialize/deserialize Option<[u8; 32]> as base64 string
pub mod base64_32_option {
    use super::*;

    pub fn serialize<S>(bytes: &Option<[u8; 32]>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(b) => serializer.serialize_some(&STANDARD.encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<[u8; 32]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        match opt {
            Some(s) => {
                let bytes = STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom)?;
                let arr: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| serde::de::Error::custom("expected 32 bytes"))?;
                Ok(Some(arr))
            }
            None => Ok(None),
        }
    }
}

/// Serialize/deserialize Vec<u8> as base64 string
pub mod base64_vec {
    use super::*;

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        decode(deserializer)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Holder {
        #[serde(with = "super::base64_32")]
        hash: [u8; 32],
        #[serde(with = "super::base64_32_option")]
        group: Option<[u8; 32]>,
        #[serde(with = "super::base64_vec")]
        blob: Vec<u8>,
    }

    #[test]
    fn test_base64_fields() {
        let holder = Holder {
            hash: [1u8; 32],
            group: None,
            blob: vec![0xde, 0xad],
        };
        let json = serde_json::to_string(&holder).unwrap();
        assert!(json.contains("\"blob\":\"3q0=\""));
        let back: Holder = serde_json::from_str(&json).unwrap();
        assert_eq!(back, holder);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let json = r#"{"hash":"AAAA","group":null,"blob":""}"#;
        assert!(serde_json::from_str::<Holder>(json).is_err());
    }
}
