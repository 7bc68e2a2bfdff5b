//! Data models
//!
//! Row types for the audit and security tables.
//! DB row types use `#[cfg_attr(feature = "db", derive(sqlx::FromRow))]`.
//! All IDs are `i64` (Postgres BIGSERIAL) and all timestamps Unix millis.

pub mod audit;
pub mod security;

// Re-exports
pub use audit::*;
pub use security::*;
