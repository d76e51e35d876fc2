//! # Operation Bodies
//!
//! Payload layouts for the operations that carry structured data. Bodies are
//! bincode-encoded serde structs; the packet header stays hand-framed.
//!
//! | operation | request body | reply |
//! |-----------|--------------|-------|
//! | `nop` | ignored | empty |
//! | `store` / `create` | [`StoreBody`] | [`Status`] |
//! | `query` | [`QueryBody`] | raw value bytes, or [`Status`] on failure |

use crate::error::{Result, StorageError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Body of `store` and `create` requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreBody {
    pub drum: String,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Body of `query` requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryBody {
    pub drum: String,
    pub key: Vec<u8>,
}

/// Outcome carried by replies with the `status` datatype
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Ok,
    Error { code: u32, message: String },
}

impl Status {
    pub fn from_error(err: &StorageError) -> Self {
        let message = match err {
            StorageError::UnknownDrum(name) => name.clone(),
            StorageError::InvalidArgument(reason) => reason.clone(),
            other => other.to_string(),
        };
        Status::Error {
            code: err.code(),
            message,
        }
    }

    /// Convert back into a result on the client side
    pub fn into_result(self) -> std::result::Result<(), StorageError> {
        match self {
            Status::Ok => Ok(()),
            Status::Error { code, message } => Err(StorageError::from_code(code, &message)
                .unwrap_or(StorageError::InvalidArgument(message))),
        }
    }
}

/// Encode a body with bincode
pub fn encode_body<T: Serialize>(body: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(body)?)
}

/// Decode a request body; malformed bodies are a client mistake, not a
/// framing violation, so they surface as `InvalidArgument`.
pub fn decode_body<T: DeserializeOwned>(payload: &[u8]) -> std::result::Result<T, StorageError> {
    bincode::deserialize(payload)
        .map_err(|e| StorageError::invalid(format!("malformed request body: {e}")))
}
