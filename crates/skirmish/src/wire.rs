//! Wire formats.
//!
//! Control, move, and war payloads travel as JSON; game-log payloads use
//! CBOR as the compact binary format. Each subscription declares its
//! format up front, so decode is never guessed from the payload.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::DecodeError;

/// Declared serialization of a subscription or publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    Json,
    Cbor,
}

impl WireFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            WireFormat::Json => "application/json",
            WireFormat::Cbor => "application/cbor",
        }
    }

    pub fn encode<T: Serialize>(self, value: &T) -> Result<Vec<u8>, String> {
        match self {
            WireFormat::Json => serde_json::to_vec(value).map_err(|e| e.to_string()),
            WireFormat::Cbor => serde_cbor::to_vec(value).map_err(|e| e.to_string()),
        }
    }

    pub fn decode<T: DeserializeOwned>(self, payload: &[u8]) -> Result<T, DecodeError> {
        match self {
            WireFormat::Json => Ok(serde_json::from_slice(payload)?),
            WireFormat::Cbor => Ok(serde_cbor::from_slice(payload)?),
        }
    }
}
