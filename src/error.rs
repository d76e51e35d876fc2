//! # Error Types
//!
//! Error handling for the daemon, the wire protocol and the storage model.
//!
//! ## Error Categories
//! - **I/O Errors**: socket and file system failures. Fatal only when the
//!   listening socket cannot be set up; per-connection I/O errors close that
//!   connection and nothing else.
//! - **Protocol Errors**: malformed headers, unknown operation or datatype
//!   codes, declared lengths above the payload ceiling. The offending
//!   connection is torn down.
//! - **Storage Errors**: [`StorageError`], reported back to the requesting
//!   client as a `status` reply and never fatal to the daemon.
//! - **Resource Exhaustion**: every connection slot is occupied; new
//!   connections are refused.
//!
//! ## Example Usage
//! ```rust
//! use odb::error::{OdbError, Result, StorageError};
//! use odb::storage::bucket::BucketKey;
//!
//! fn key(raw: &str) -> Result<BucketKey> {
//!     Ok(BucketKey::new(raw.as_bytes())?)
//! }
//!
//! assert!(key("user1").is_ok());
//! assert!(matches!(
//!     key("a-much-too-long-key"),
//!     Err(OdbError::Storage(StorageError::KeyTooLong { .. }))
//! ));
//! ```

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Error message constants shared by the client and the shell.
pub mod constants {
    pub const ERR_CONNECTION_CLOSED: &str = "Connection closed by daemon";
    pub const ERR_DAEMON_NOT_RUNNING: &str = "Did not find IPC channel";
    pub const ERR_UNEXPECTED_RESPONSE: &str = "Unexpected response packet";
}

/// Failures of the bucket store and drum catalog.
///
/// Every variant maps to a stable numeric code carried in `status` replies.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("key too long: {len} bytes (maximum {max})")]
    KeyTooLong { len: usize, max: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("key not found")]
    NotFound,

    #[error("unknown drum: {0}")]
    UnknownDrum(String),

    #[error("key already exists")]
    AlreadyExists,

    #[error("allocation of {0} bytes failed")]
    AllocationFailed(usize),
}

impl StorageError {
    /// Wire code used in `status` replies.
    pub fn code(&self) -> u32 {
        match self {
            StorageError::KeyTooLong { .. } => 1,
            StorageError::InvalidArgument(_) => 2,
            StorageError::NotFound => 3,
            StorageError::UnknownDrum(_) => 4,
            StorageError::AlreadyExists => 5,
            StorageError::AllocationFailed(_) => 6,
        }
    }

    /// Rebuild an error from a `status` reply.
    ///
    /// The message text is only used for variants that carry a string.
    pub fn from_code(code: u32, message: &str) -> Option<Self> {
        match code {
            1 => Some(StorageError::KeyTooLong {
                len: 0,
                max: crate::storage::bucket::MAX_KEY_LEN,
            }),
            2 => Some(StorageError::InvalidArgument(message.to_string())),
            3 => Some(StorageError::NotFound),
            4 => Some(StorageError::UnknownDrum(message.to_string())),
            5 => Some(StorageError::AlreadyExists),
            6 => Some(StorageError::AllocationFailed(0)),
            _ => None,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        StorageError::InvalidArgument(msg.into())
    }
}

// OdbError is the primary error type for all daemon operations
#[derive(Error, Debug)]
pub enum OdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Invalid packet header")]
    InvalidHeader,

    #[error("Unknown operation code: {0}")]
    UnknownOperation(u32),

    #[error("Unknown datatype tag: {0}")]
    UnknownDatatype(u32),

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(u64),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("All {0} connection slots are occupied")]
    ResourceExhausted(usize),

    #[error("Client is not reading replies ({0} queued)")]
    Backpressure(usize),

    #[error("No drums found under {0}")]
    NoDrums(PathBuf),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout occurred")]
    Timeout,

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl OdbError {
    /// True for framing-level violations that tear down the connection.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            OdbError::InvalidHeader
                | OdbError::UnknownOperation(_)
                | OdbError::UnknownDatatype(_)
                | OdbError::OversizedPacket(_)
        )
    }
}

/// Type alias for Results using OdbError
pub type Result<T> = std::result::Result<T, OdbError>;
