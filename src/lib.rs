//! # odb
//!
//! A local key-value database daemon reachable over a Unix domain socket.
//!
//! The daemon scans a root directory for *drums* (one namespace per
//! subdirectory), binds a single IPC channel and serves `nop`, `store`,
//! `query` and `create` packets from up to sixteen clients at once, all from
//! one control loop.
//!
//! ## Modules
//! - [`core`]: packet framing, the tokio codec, operation bodies
//! - [`storage`]: buckets, bucket stores and the drum catalog
//! - [`protocol`]: request dispatch
//! - [`transport`]: the connection multiplexer and socket entry points
//! - [`service`]: typed client and shell parser
//! - [`config`], [`error`], [`utils`]: the ambient pieces
//!
//! ## Example
//! ```no_run
//! use odb::config::DaemonConfig;
//! use odb::core::packet::Datatype;
//! use odb::service::Client;
//!
//! # async fn demo() -> odb::error::Result<()> {
//! let config = DaemonConfig::default();
//! let mut client = Client::connect(&config.server.socket_path).await?;
//! client.store("users", b"user1", Datatype::Text, b"42").await?;
//! let (_, value) = client.query("users", b"user1").await?;
//! assert_eq!(&value[..], b"42");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod storage;
pub mod transport;
pub mod utils;

pub use crate::core::codec::PacketCodec;
pub use crate::core::packet::{Datatype, Operation, Packet};
pub use crate::error::{OdbError, Result, StorageError};
pub use crate::transport::Daemon;
