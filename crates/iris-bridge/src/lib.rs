//! Subprocess RPC bridge to the IRIS diagnosis worker.
//!
//! The worker is an external process that reads exactly one JSON request
//! from stdin and writes exactly one JSON reply to stdout. This crate
//! spawns one worker per call, enforces a hard deadline, and classifies
//! every failure mode into the closed [`BridgeError`] taxonomy.
//!
//! # Example
//!
//! ```rust,ignore
//! use iris_bridge::{WorkerBridge, WorkerConfig};
//!
//! let bridge = WorkerBridge::new(WorkerConfig::default());
//! let reply = bridge.execute(&serde_json::json!({"formulario": {"sdma": 18.5}})).await?;
//! ```

mod bridge;
mod classify;
mod config;
mod error;
mod lifecycle;

pub use bridge::{WorkerBridge, WorkerReply};
pub use config::{DEFAULT_TIMEOUT, WorkerConfig};
pub use error::{BridgeError, ErrorKind};
pub use lifecycle::WorkerState;
