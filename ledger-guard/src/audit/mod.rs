//! 审计模块 — 加密审计追踪
//!
//! ```text
//! business action
//!   ├─ AuditTrail::record() → seal → mpsc → AuditWorker → AuditStore
//!   └─ AuditTrail::write()  → seal → AuditStore (awaited)
//! ```
//!
//! Metadata is serialized canonically (sorted keys) and sealed with the
//! keyring's current key before it leaves the caller. Only the sealed blob
//! and the `ENCRYPTED` marker reach storage.

pub mod service;
pub mod types;
pub mod worker;

pub use service::{AuditTrail, canonicalize};
pub use types::{AuditAction, AuditError, AuditRequest};
pub use worker::AuditWorker;
