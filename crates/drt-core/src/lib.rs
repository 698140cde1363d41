//! Core of the drt tools: credential store, local RPC client, login flow,
//! endpoint prober and the export/voice commands.
//!
//! This crate is transport-agnostic. IPC/WebSocket transports and HTTP token
//! exchange live behind ports (traits) implemented in adapter crates.

pub mod auth;
pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod export;
pub mod logging;
pub mod probe;
pub mod rpc;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
