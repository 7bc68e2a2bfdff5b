//! In-memory store
//!
//! Same contract as [`PgStore`](super::PgStore): monotonically increasing ids,
//! atomic block upsert (one lock acquisition per call).

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;
use shared::Timestamp;
use shared::models::{
    AuditRecord, AuditRecordCreate, BlockedIp, ENCRYPTED_PAYLOAD_MARKER, SecurityEvent,
    SecurityEventCreate,
};

use super::{AuditStore, BlockStore, SecurityEventStore, StoreError, StoreResult};

#[derive(Default)]
struct Inner {
    audit: BTreeMap<i64, AuditRecord>,
    last_audit_id: i64,
    events: Vec<SecurityEvent>,
    last_event_id: i64,
    blocks: HashMap<String, BlockedIp>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All audit records, ascending id
    pub fn audit_records(&self) -> Vec<AuditRecord> {
        self.inner.lock().audit.values().cloned().collect()
    }

    pub fn security_events(&self) -> Vec<SecurityEvent> {
        self.inner.lock().events.clone()
    }

    pub fn blocked_ips(&self) -> Vec<BlockedIp> {
        let mut rows: Vec<BlockedIp> = self.inner.lock().blocks.values().cloned().collect();
        rows.sort_by(|a, b| a.ip_address.cmp(&b.ip_address));
        rows
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn insert_audit(&self, record: AuditRecordCreate) -> StoreResult<AuditRecord> {
        let mut inner = self.inner.lock();
        inner.last_audit_id += 1;
        let row = AuditRecord {
            id: inner.last_audit_id,
            actor_id: record.actor_id,
            action: record.action,
            entity_type: record.entity_type,
            entity_id: record.entity_id,
            encrypted_payload: record.encrypted_payload,
            payload_marker: ENCRYPTED_PAYLOAD_MARKER.to_string(),
            created_at: record.created_at,
        };
        inner.audit.insert(row.id, row.clone());
        Ok(row)
    }

    async fn scan_audit(&self, after: Option<i64>, limit: usize) -> StoreResult<Vec<AuditRecord>> {
        let inner = self.inner.lock();
        let start = after.map_or(i64::MIN, |id| id.saturating_add(1));
        Ok(inner
            .audit
            .range(start..)
            .take(limit)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn update_audit_payload(&self, id: i64, encrypted_payload: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        let row = inner
            .audit
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("audit record {id}")))?;
        row.encrypted_payload = encrypted_payload.to_string();
        Ok(())
    }
}

#[async_trait]
impl SecurityEventStore for MemoryStore {
    async fn append_event(&self, event: SecurityEventCreate) -> StoreResult<SecurityEvent> {
        let mut inner = self.inner.lock();
        inner.last_event_id += 1;
        let row = SecurityEvent {
            id: inner.last_event_id,
            ip_address: event.ip_address,
            event_type: event.event_type,
            details: event.details,
            created_at: event.created_at,
        };
        inner.events.push(row.clone());
        Ok(row)
    }

    async fn count_events_between(
        &self,
        ip_address: &str,
        from: Timestamp,
        to: Timestamp,
    ) -> StoreResult<u64> {
        let inner = self.inner.lock();
        Ok(inner
            .events
            .iter()
            .filter(|e| e.ip_address == ip_address && e.created_at >= from && e.created_at <= to)
            .count() as u64)
    }
}

#[async_trait]
impl BlockStore for MemoryStore {
    async fn upsert_block(
        &self,
        ip_address: &str,
        reason: &str,
        expires_at: Timestamp,
        now: Timestamp,
    ) -> StoreResult<BlockedIp> {
        let mut inner = self.inner.lock();
        let row = inner
            .blocks
            .entry(ip_address.to_string())
            .and_modify(|row| {
                row.reason = reason.to_string();
                row.expires_at = expires_at;
                row.updated_at = now;
            })
            .or_insert_with(|| BlockedIp {
                ip_address: ip_address.to_string(),
                reason: reason.to_string(),
                expires_at,
                created_at: now,
                updated_at: now,
            });
        Ok(row.clone())
    }

    async fn find_block(&self, ip_address: &str) -> StoreResult<Option<BlockedIp>> {
        Ok(self.inner.lock().blocks.get(ip_address).cloned())
    }
}
