//! 审计服务
//!
//! `AuditTrail::record()` seals the metadata on the caller's task, then hands
//! the sealed row to the background [`AuditWorker`](super::AuditWorker) over a
//! bounded mpsc channel. Plaintext metadata never crosses the channel.

use std::sync::Arc;

use serde_json::Value;
use shared::models::{AuditRecord, AuditRecordCreate};
use tokio::sync::mpsc;

use super::types::{AuditAction, AuditError, AuditRequest};
use crate::clock::SharedClock;
use crate::crypto::Keyring;
use crate::error::FailurePolicy;
use crate::store::AuditStore;

pub struct AuditTrail {
    keyring: Keyring,
    store: Arc<dyn AuditStore>,
    clock: SharedClock,
    tx: mpsc::Sender<AuditRecordCreate>,
}

impl std::fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditTrail")
            .field("queue_capacity", &self.tx.max_capacity())
            .finish_non_exhaustive()
    }
}

impl AuditTrail {
    /// Audit failures are logged and swallowed; the business action that
    /// produced the entry always proceeds.
    pub const FAILURE_POLICY: FailurePolicy = FailurePolicy::FailOpen;

    /// Create the service and the receiving end for its worker
    pub fn new(
        keyring: Keyring,
        store: Arc<dyn AuditStore>,
        clock: SharedClock,
        buffer_size: usize,
    ) -> (Arc<Self>, mpsc::Receiver<AuditRecordCreate>) {
        let (tx, rx) = mpsc::channel(buffer_size.max(1));
        let service = Arc::new(Self {
            keyring,
            store,
            clock,
            tx,
        });
        (service, rx)
    }

    /// Record an audit entry (fire-and-forget).
    ///
    /// Never fails: sealing errors and a closed queue are logged. A full
    /// queue waits for capacity.
    pub async fn record(
        &self,
        actor_id: &str,
        action: AuditAction,
        entity_type: &str,
        entity_id: Option<&str>,
        metadata: &Value,
    ) {
        let request = AuditRequest {
            actor_id: actor_id.to_string(),
            action,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.map(str::to_string),
            metadata: metadata.clone(),
        };

        let row = match self.seal(&request) {
            Ok(row) => row,
            Err(e) => {
                tracing::error!(
                    action = %request.action,
                    entity_type = %request.entity_type,
                    "Failed to seal audit entry: {:?}",
                    e
                );
                return;
            }
        };

        if let Err(e) = self.tx.send(row).await {
            tracing::error!(
                action = %e.0.action,
                "Audit queue closed, entry dropped"
            );
        }
    }

    /// Seal and persist directly, awaiting the store
    pub async fn write(&self, request: &AuditRequest) -> Result<AuditRecord, AuditError> {
        let row = self.seal(request)?;
        Ok(self.store.insert_audit(row).await?)
    }

    /// Open a record's payload (current key, then previous)
    pub fn reveal(&self, record: &AuditRecord) -> Result<Value, AuditError> {
        let plain = self.keyring.open(&record.encrypted_payload)?;
        Ok(serde_json::from_slice(&plain)?)
    }

    fn seal(&self, request: &AuditRequest) -> Result<AuditRecordCreate, AuditError> {
        let canonical = serde_json::to_vec(&canonicalize(&request.metadata))?;
        let encrypted_payload = self.keyring.seal(&canonical)?;
        Ok(AuditRecordCreate {
            actor_id: request.actor_id.clone(),
            action: request.action.as_str().to_string(),
            entity_type: request.entity_type.clone(),
            entity_id: request.entity_id.clone(),
            encrypted_payload,
            created_at: self.clock.now_millis(),
        })
    }
}

/// Rebuild `value` with object keys in ascending order at every level
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
