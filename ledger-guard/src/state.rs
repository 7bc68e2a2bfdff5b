//! Service wiring
//!
//! Builds every component from one [`Config`] and one store, and owns the
//! audit worker task.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::alert::AlertDispatcher;
use crate::audit::{AuditTrail, AuditWorker};
use crate::clock::{self, SharedClock};
use crate::config::Config;
use crate::crypto::Keyring;
use crate::error::GuardResult;
use crate::security::{BlockRegistry, SecurityEventMonitor};
use crate::store::{AuditStore, BlockStore, PgStore, SecurityEventStore};

pub struct GuardState {
    pub audit: Arc<AuditTrail>,
    pub monitor: Arc<SecurityEventMonitor>,
    pub blocks: Arc<BlockRegistry>,
    worker: JoinHandle<()>,
}

impl GuardState {
    /// Connect to PostgreSQL (running migrations) and start the audit worker
    pub async fn connect(config: &Config) -> GuardResult<Self> {
        let store = Arc::new(PgStore::connect(&config.database_url).await?);
        tracing::info!(environment = %config.environment, "Connected to PostgreSQL");
        Ok(Self::with_store(
            store,
            config,
            AlertDispatcher::from_config(&config.alert),
            clock::system(),
        ))
    }

    /// Wire components over an existing store. Must be called inside a
    /// tokio runtime (spawns the audit worker).
    pub fn with_store<S>(
        store: Arc<S>,
        config: &Config,
        alerts: AlertDispatcher,
        clock: SharedClock,
    ) -> Self
    where
        S: AuditStore + SecurityEventStore + BlockStore + 'static,
    {
        let keyring = Keyring::with_previous(
            config.audit_key.clone(),
            config.audit_previous_key.clone(),
        );
        let (audit, rx) = AuditTrail::new(
            keyring,
            store.clone(),
            clock.clone(),
            config.audit_channel_capacity,
        );
        let worker = tokio::spawn(AuditWorker::new(store.clone()).run(rx));

        let blocks = Arc::new(BlockRegistry::new(
            store.clone(),
            alerts.clone(),
            clock.clone(),
            config.block,
        ));
        let monitor = Arc::new(SecurityEventMonitor::new(
            store,
            blocks.clone(),
            alerts,
            clock,
            config.monitor,
        ));

        Self {
            audit,
            monitor,
            blocks,
            worker,
        }
    }

    /// Drop the service handles and wait for queued audit entries to be
    /// written. Returns once every other `AuditTrail` clone is gone too.
    pub async fn shutdown(self) {
        let Self {
            audit,
            monitor,
            blocks,
            worker,
        } = self;
        drop((audit, monitor, blocks));

        if let Err(e) = worker.await {
            tracing::error!("Audit worker terminated abnormally: {:?}", e);
        }
    }
}
