//! IP 封禁表
//!
//! One row per address. Escalation refreshes the row in place; nothing is
//! ever deleted. Expiry is observed lazily on read.

use std::sync::Arc;

use shared::models::BlockedIp;
use shared::util::format_millis;

use crate::alert::{AlertDispatcher, IP_BLOCKED};
use crate::clock::{SharedClock, duration_millis};
use crate::config::BlockConfig;
use crate::security_log;
use crate::store::{BlockStore, StoreResult};

pub struct BlockRegistry {
    store: Arc<dyn BlockStore>,
    alerts: AlertDispatcher,
    clock: SharedClock,
    config: BlockConfig,
}

impl BlockRegistry {
    pub fn new(
        store: Arc<dyn BlockStore>,
        alerts: AlertDispatcher,
        clock: SharedClock,
        config: BlockConfig,
    ) -> Self {
        Self {
            store,
            alerts,
            clock,
            config,
        }
    }

    /// Block `ip_address` until `now + block_duration`.
    ///
    /// Single atomic upsert; a repeat call overwrites reason and expiry.
    /// The `IP_BLOCKED` alert is sent only after the write succeeded.
    pub async fn upsert_block(&self, ip_address: &str, reason: &str) -> StoreResult<BlockedIp> {
        let now = self.clock.now_millis();
        let expires_at = now.saturating_add(duration_millis(self.config.block_duration));

        let row = self
            .store
            .upsert_block(ip_address, reason, expires_at, now)
            .await?;

        security_log!(
            WARN,
            "ip_blocked",
            ip = %row.ip_address,
            reason = %row.reason,
            expires_at = row.expires_at
        );

        let details = format!(
            "IP: {}\nReason: {}\nExpires: {}",
            row.ip_address,
            row.reason,
            format_millis(row.expires_at)
        );
        self.alerts.send(IP_BLOCKED, &details).await;

        Ok(row)
    }

    /// True iff a row exists and has not expired
    pub async fn is_blocked(&self, ip_address: &str) -> StoreResult<bool> {
        let now = self.clock.now_millis();
        Ok(self
            .store
            .find_block(ip_address)
            .await?
            .is_some_and(|row| row.is_active_at(now)))
    }

    /// Raw row, expired or not
    pub async fn lookup(&self, ip_address: &str) -> StoreResult<Option<BlockedIp>> {
        self.store.find_block(ip_address).await
    }
}
