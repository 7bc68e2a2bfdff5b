//! Shared types for ledger-guard
//!
//! Row models and small utilities shared between the guard library,
//! its maintenance binaries and anything that consumes the audit /
//! security tables.

pub mod models;
pub mod types;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};
pub use types::Timestamp;
