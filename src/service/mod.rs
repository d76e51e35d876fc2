//! # Client Services
//!
//! The typed client used by the shell and by tests, and the shell's line parser.

pub mod client;
pub mod shell;

pub use client::Client;
