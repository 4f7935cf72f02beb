//! Serde helpers for byte fields on the wire
//!
//! Envelopes travel as JSON, so raw bytes are carried as standard base64
//! strings. Use with `#[serde(with = "...")]`.

/// `Vec<u8>` as a base64 string
pub mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// `[u8; N]` as a base64 string
pub mod base64_array {
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        super::base64_bytes::serialize(bytes, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let bytes = super::base64_bytes::deserialize(deserializer)?;
        <[u8; N]>::try_from(bytes.as_slice())
            .map_err(|_| serde::de::Error::invalid_length(bytes.len(), &"a fixed-size byte array"))
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        #[serde(with = "super::base64_bytes")]
        data: Vec<u8>,
        #[serde(with = "super::base64_array")]
        seed: [u8; 4],
    }

    #[test]
    fn test_bytes_are_base64_strings() {
        let sample = Sample {
            data: b"hello".to_vec(),
            seed: [1, 2, 3, 4],
        };
        let json = serde_json::to_string(&sample).unwrap();
        assert_eq!(json, r#"{"data":"aGVsbG8=","seed":"AQIDBA=="}"#);

        let parsed: Sample = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, sample);
    }

    #[test]
    fn test_wrong_array_length_rejected() {
        let result: Result<Sample, _> = serde_json::from_str(r#"{"data":"","seed":"AQID"}"#);
        assert!(result.is_err());
    }
}
