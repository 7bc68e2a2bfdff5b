#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use ledger_guard::alert::{AlertDispatcher, MemoryChannel};
use ledger_guard::clock::ManualClock;
use ledger_guard::config::{AlertConfig, BlockConfig, Config, MonitorConfig};
use ledger_guard::crypto::MasterKey;
use ledger_guard::store::{AuditStore, MemoryStore, StoreError, StoreResult};
use ledger_guard::GuardState;
use parking_lot::Mutex;
use shared::models::{AuditRecord, AuditRecordCreate};

pub const T0: i64 = 1_700_000_000_000;

pub fn config(audit_key: MasterKey, previous: Option<MasterKey>) -> Config {
    Config {
        database_url: "postgres://unused".into(),
        environment: "test".into(),
        audit_key,
        audit_previous_key: previous,
        monitor: MonitorConfig::default(),
        block: BlockConfig::default(),
        alert: AlertConfig::default(),
        audit_channel_capacity: 16,
    }
}

pub struct Harness {
    pub state: GuardState,
    pub store: Arc<MemoryStore>,
    pub clock: ManualClock,
    pub channel: Arc<MemoryChannel>,
}

pub fn harness(config: &Config) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let clock = ManualClock::new(T0);
    let channel = Arc::new(MemoryChannel::new());
    let state = GuardState::with_store(
        store.clone(),
        config,
        AlertDispatcher::new(channel.clone()),
        Arc::new(clock.clone()),
    );
    Harness {
        state,
        store,
        clock,
        channel,
    }
}

/// Audit store wrapper with injectable failures
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    fail_inserts: AtomicBool,
    /// record id → remaining update failures
    update_failures: Mutex<HashMap<i64, u32>>,
    update_attempts: Mutex<HashMap<i64, u32>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, id: i64, times: u32) {
        self.update_failures.lock().insert(id, times);
    }

    pub fn update_attempts(&self, id: i64) -> u32 {
        self.update_attempts.lock().get(&id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl AuditStore for FlakyStore {
    async fn insert_audit(&self, record: AuditRecordCreate) -> StoreResult<AuditRecord> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected insert failure".into()));
        }
        self.inner.insert_audit(record).await
    }

    async fn scan_audit(&self, after: Option<i64>, limit: usize) -> StoreResult<Vec<AuditRecord>> {
        self.inner.scan_audit(after, limit).await
    }

    async fn update_audit_payload(&self, id: i64, encrypted_payload: &str) -> StoreResult<()> {
        *self.update_attempts.lock().entry(id).or_insert(0) += 1;
        {
            let mut failures = self.update_failures.lock();
            if let Some(left) = failures.get_mut(&id)
                && *left > 0
            {
                *left -= 1;
                return Err(StoreError::Unavailable("injected update failure".into()));
            }
        }
        self.inner.update_audit_payload(id, encrypted_payload).await
    }
}

/// Seed `n` audit records sealed under `key`; payload is `{"n": i}`
pub async fn seed_audit(store: &dyn AuditStore, key: &MasterKey, n: usize) {
    for i in 0..n {
        let payload = serde_json::json!({ "n": i }).to_string();
        store
            .insert_audit(AuditRecordCreate {
                actor_id: format!("user-{i}"),
                action: "VIEW_DECRYPTED_PII".into(),
                entity_type: "customer".into(),
                entity_id: Some(i.to_string()),
                encrypted_payload: key.seal_str(&payload).unwrap(),
                created_at: T0 + i as i64,
            })
            .await
            .unwrap();
    }
}
