//! Serialization seam between user code and opaque task payloads.
//!
//! The worker core treats every payload as opaque bytes; the converter
//! is what workflow and activity dispatchers use to move between typed
//! values and those bytes.

use serde::{de::DeserializeOwned, Serialize};
use std::fmt;

/// Converts typed values to and from wire payloads.
pub trait DataConverter: Send + Sync {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, EncodingError>;
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, EncodingError>;
}

/// Default JSON data converter.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDataConverter;

impl JsonDataConverter {
    pub fn new() -> Self {
        Self
    }
}

impl DataConverter for JsonDataConverter {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, EncodingError> {
        serde_json::to_vec(value).map_err(|e| EncodingError::Serialization(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, EncodingError> {
        serde_json::from_slice(data).map_err(|e| EncodingError::Deserialization(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    Serialization(String),
    Deserialization(String),
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingError::Serialization(msg) => write!(f, "serialization error: {}", msg),
            EncodingError::Deserialization(msg) => write!(f, "deserialization error: {}", msg),
        }
    }
}

impl std::error::Error for EncodingError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload {
        name: String,
        value: i32,
    }

    #[test]
    fn json_round_trip() {
        let converter = JsonDataConverter::new();
        let original = Payload {
            name: "order".into(),
            value: 7,
        };
        let bytes = converter.encode(&original).unwrap();
        let decoded: Payload = converter.decode(&bytes).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn decode_failure_reports_deserialization() {
        let converter = JsonDataConverter::new();
        let err = converter.decode::<Payload>(b"not json").unwrap_err();
        assert!(matches!(err, EncodingError::Deserialization(_)));
    }
}
