//! # Forge Core
//!
//! Forge Core is a software-generation task pipeline: it accepts task
//! descriptions, routes each one to a role-specific producer agent, runs any
//! resulting code inside an isolated container sandbox under strict resource
//! caps, and reports a structured execution record with captured output,
//! exit status, measured resource usage, and an attached validation score.
//!
//! ## Architecture
//!
//! - **TaskExecutor**: in-process scheduler with a bounded concurrency pool,
//!   a per-execution state machine, tenant-scoped lookup, cancellation, and
//!   graceful drain
//! - **SandboxManager**: creation, supervision, resource-limited execution,
//!   timeout enforcement, log capture, and cleanup of per-task containers
//! - **AgentFactory**: maps each task type to its stateless producer
//! - **Oracles**: outbound adapters for text completion and validation; both
//!   degrade gracefully when unreachable
//! - **API server**: tenant-scoped HTTP surface with SSE status streaming
//!
//! Execution records are held in memory only; durability belongs to a
//! companion store, not this daemon.

/// Task producers and their factory
pub mod agents;
/// HTTP API server and endpoints
pub mod api;
/// Completion oracle client
pub mod completion;
/// System configuration
pub mod config;
/// System-wide constants
pub mod constants;
/// Error types and handling
pub mod error;
/// Task executor and execution index
pub mod executor;
/// Core data models
pub mod models;
/// Container sandbox management
pub mod sandbox;
/// Validation oracle adapter
pub mod validator;

#[cfg(test)]
mod tests;

pub use error::{ForgeError, Result};
