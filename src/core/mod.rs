//! # Core Protocol Components
//!
//! Packet framing, the tokio codec, and the bodies carried by operations.
//!
//! ## Components
//! - **Packet**: header layout and the streaming decode contract
//! - **Codec**: Tokio codec for framing over byte streams
//! - **Serialization**: bincode bodies for `store`, `query` and `create`
//!
//! ## Wire Format
//! ```text
//! [Op(4)] [Type(4)] [Length(8)] [Payload(N)]
//! ```
//! All integers are little-endian.
//!
//! ## Safety Limits
//! - Maximum payload size: 16MB by default (prevents memory exhaustion)
//! - Length validation happens on the header alone, before buffering

pub mod codec;
pub mod packet;
pub mod serialization;
