//! # Transport Layer
//!
//! The IPC side of the daemon.
//!
//! ## Components
//! - **Local**: `start_server` / `connect` entry points over a Unix domain socket
//! - **Multiplexer**: the [`Daemon`] context and its single control loop
//! - **Slots**: fixed-capacity connection slot arena

pub mod local;
pub mod multiplexer;
pub mod slots;

pub use local::{connect, start_server, start_server_with_shutdown};
pub use multiplexer::{Daemon, SlotState};
pub use slots::{SlotArena, SlotId};
