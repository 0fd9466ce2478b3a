//! Command-relay bridge between an AI assistant and a node-graph
//! compositing host.
//!
//! The relay listens on a local TCP port for newline-delimited JSON
//! requests of the form `{"command": "<operation>", "params": {...}}`,
//! validates them against an immutable operation registry, forwards them
//! to the host executor, and writes back a JSON response per request.

pub mod client_config;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod graph;
pub mod logging;
pub mod ops;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod template;

pub use error::{BridgeError, Result};
