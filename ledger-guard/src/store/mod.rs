//! Persistence layer
//!
//! The guard only talks to storage through these traits. Two backends:
//!
//! - [`PgStore`]: PostgreSQL via sqlx (production)
//! - [`MemoryStore`]: process-local maps (tests, local tooling)
//!
//! Every operation is a single store round-trip. In particular the block
//! upsert is one atomic insert-or-update keyed by address, never a read
//! followed by a write.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use shared::Timestamp;
use shared::models::{
    AuditRecord, AuditRecordCreate, BlockedIp, SecurityEvent, SecurityEventCreate,
};
use thiserror::Error;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// 存储错误 (PersistenceError)
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Corrupt row: {0}")]
    Decode(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Audit records: append, keyset scan, payload replacement (rotation only)
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn insert_audit(&self, record: AuditRecordCreate) -> StoreResult<AuditRecord>;

    /// Records with `id > after` in ascending id order, at most `limit`.
    ///
    /// Keyset pagination: rows inserted during a scan never shift the
    /// pages still to come.
    async fn scan_audit(&self, after: Option<i64>, limit: usize) -> StoreResult<Vec<AuditRecord>>;

    /// Replace the sealed payload of one record. `NotFound` if it does not exist.
    async fn update_audit_payload(&self, id: i64, encrypted_payload: &str) -> StoreResult<()>;
}

/// Security events: append-only plus a windowed count
#[async_trait]
pub trait SecurityEventStore: Send + Sync {
    async fn append_event(&self, event: SecurityEventCreate) -> StoreResult<SecurityEvent>;

    /// Events for `ip_address` with `from <= created_at <= to`
    async fn count_events_between(
        &self,
        ip_address: &str,
        from: Timestamp,
        to: Timestamp,
    ) -> StoreResult<u64>;
}

/// Blocked IPs: one row per address
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Atomic insert-or-update by address.
    ///
    /// Insert sets `created_at = updated_at = now`; update overwrites
    /// `reason`, `expires_at` and `updated_at` and keeps `created_at`.
    async fn upsert_block(
        &self,
        ip_address: &str,
        reason: &str,
        expires_at: Timestamp,
        now: Timestamp,
    ) -> StoreResult<BlockedIp>;

    async fn find_block(&self, ip_address: &str) -> StoreResult<Option<BlockedIp>>;
}
