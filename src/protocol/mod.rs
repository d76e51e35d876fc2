//! # Request Dispatch
//!
//! Maps decoded packets onto the drum catalog and builds the reply that is
//! written back over the same connection.

pub mod dispatcher;

pub use dispatcher::{error_reply, status_reply, Dispatcher};

#[cfg(test)]
mod tests;
