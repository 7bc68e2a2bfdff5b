//! Master key rotation
//!
//! Re-seals every audit payload under a new key, in fixed-size batches
//! walked by ascending id (`WHERE id > cursor ORDER BY id LIMIT n`).
//!
//! - Records already readable under the new key are skipped, so a rerun
//!   after a crash or a completed run does nothing.
//! - A record is counted as migrated only after its new payload is
//!   persisted. Persist failures are retried a bounded number of times.
//! - The first record that cannot be migrated aborts the run and is
//!   reported by id. Earlier records stay migrated.
//!
//! Must not run concurrently with itself.

use std::sync::Arc;
use std::time::Duration;

use shared::models::AuditRecord;
use thiserror::Error;
use zeroize::Zeroize;

use crate::config::{ConfigError, RotationConfig};
use crate::crypto::{DecryptionError, EncryptionError, MasterKey};
use crate::store::{AuditStore, StoreError};

pub const DEFAULT_PERSIST_ATTEMPTS: u32 = 3;

const PERSIST_RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Why a single record could not be migrated
#[derive(Debug, Error)]
pub enum RecordFailure {
    #[error("payload does not open under the old key: {0}")]
    Decrypt(#[source] DecryptionError),
    #[error("payload could not be sealed under the new key: {0}")]
    Encrypt(#[source] EncryptionError),
    #[error("re-sealed payload not persisted after {attempts} attempts: {source}")]
    Persist {
        attempts: u32,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, Error)]
pub enum RotationError {
    #[error("invalid rotation configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to scan audit records: {0}")]
    Scan(#[source] StoreError),
    #[error("rotation aborted at audit record {record_id}: {source}")]
    Record {
        record_id: i64,
        #[source]
        source: RecordFailure,
    },
}

/// Totals for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationReport {
    pub scanned: u64,
    pub migrated: u64,
    pub already_current: u64,
    pub batches: u64,
}

enum Migration {
    Migrated,
    AlreadyCurrent,
}

pub struct KeyRotationPipeline {
    store: Arc<dyn AuditStore>,
    old_key: MasterKey,
    new_key: MasterKey,
    batch_size: usize,
    persist_attempts: u32,
}

impl KeyRotationPipeline {
    /// Validate keys and batch size before touching any record
    pub fn new(
        store: Arc<dyn AuditStore>,
        old_key: MasterKey,
        new_key: MasterKey,
        batch_size: usize,
    ) -> Result<Self, RotationError> {
        let config = RotationConfig::new(old_key, new_key, batch_size)?;
        Ok(Self::from_config(store, config))
    }

    pub fn from_config(store: Arc<dyn AuditStore>, config: RotationConfig) -> Self {
        Self {
            store,
            old_key: config.old_key,
            new_key: config.new_key,
            batch_size: config.batch_size,
            persist_attempts: DEFAULT_PERSIST_ATTEMPTS,
        }
    }

    pub fn with_persist_attempts(mut self, attempts: u32) -> Self {
        self.persist_attempts = attempts.max(1);
        self
    }

    pub async fn run(&self) -> Result<RotationReport, RotationError> {
        let mut report = RotationReport::default();
        let mut cursor: Option<i64> = None;

        tracing::info!(batch_size = self.batch_size, "Key rotation started");

        loop {
            let batch = self
                .store
                .scan_audit(cursor, self.batch_size)
                .await
                .map_err(RotationError::Scan)?;
            let Some(last) = batch.last() else {
                break;
            };
            let last_id = last.id;

            for record in &batch {
                report.scanned += 1;
                match self.migrate(record).await {
                    Ok(Migration::Migrated) => report.migrated += 1,
                    Ok(Migration::AlreadyCurrent) => report.already_current += 1,
                    Err(source) => {
                        tracing::error!(
                            record_id = record.id,
                            migrated = report.migrated,
                            "Key rotation aborted: {}",
                            source
                        );
                        return Err(RotationError::Record {
                            record_id: record.id,
                            source,
                        });
                    }
                }
            }

            report.batches += 1;
            cursor = Some(last_id);
            tracing::info!(
                batch = report.batches,
                cursor = last_id,
                scanned = report.scanned,
                migrated = report.migrated,
                "Key rotation batch complete"
            );

            if batch.len() < self.batch_size {
                break;
            }
        }

        tracing::info!(
            scanned = report.scanned,
            migrated = report.migrated,
            already_current = report.already_current,
            "Key rotation finished"
        );
        Ok(report)
    }

    async fn migrate(&self, record: &AuditRecord) -> Result<Migration, RecordFailure> {
        if self.new_key.open(&record.encrypted_payload).is_ok() {
            return Ok(Migration::AlreadyCurrent);
        }

        let mut plain = self
            .old_key
            .open(&record.encrypted_payload)
            .map_err(RecordFailure::Decrypt)?;
        let sealed = self.new_key.seal(&plain);
        plain.zeroize();
        let sealed = sealed.map_err(RecordFailure::Encrypt)?;

        self.persist(record.id, &sealed).await?;
        Ok(Migration::Migrated)
    }

    async fn persist(&self, id: i64, sealed: &str) -> Result<(), RecordFailure> {
        let mut attempt = 1;
        loop {
            match self.store.update_audit_payload(id, sealed).await {
                Ok(()) => return Ok(()),
                // Gone rows will not come back
                Err(source @ StoreError::NotFound(_)) => {
                    return Err(RecordFailure::Persist {
                        attempts: attempt,
                        source,
                    });
                }
                Err(source) if attempt >= self.persist_attempts => {
                    return Err(RecordFailure::Persist {
                        attempts: attempt,
                        source,
                    });
                }
                Err(e) => {
                    tracing::warn!(record_id = id, attempt, "Persist failed, retrying: {}", e);
                    tokio::time::sleep(PERSIST_RETRY_BACKOFF * attempt).await;
                    attempt += 1;
                }
            }
        }
    }
}
