//! Chroma server library: axum API, metrics and shared state.
//!
//! The binary in `main.rs` wires configuration, the artifact store, the
//! image engine and the job orchestrator together; integration tests build
//! the same router in-process through this crate.

pub mod api;
pub mod metrics;
pub mod state;
