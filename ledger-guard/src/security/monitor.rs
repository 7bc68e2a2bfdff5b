//! Sliding-window security event monitor
//!
//! Every event is persisted before anything else happens, then counted
//! against the store (never an in-process counter) so that all instances
//! sharing the store agree on the window.

use std::sync::Arc;

use shared::models::{BlockedIp, SecurityEvent, SecurityEventCreate, SecurityEventType};
use thiserror::Error;

use super::blocklist::BlockRegistry;
use crate::alert::AlertDispatcher;
use crate::clock::{SharedClock, duration_millis};
use crate::config::MonitorConfig;
use crate::error::FailurePolicy;
use crate::security_log;
use crate::store::{SecurityEventStore, StoreError};

#[derive(Debug, Error)]
pub enum MonitorError {
    /// Event could not be recorded or evaluated; the caller must not
    /// treat the request as clean.
    #[error("security event store failed: {0}")]
    Store(#[from] StoreError),
}

/// Result of one `record_event` call
#[derive(Debug, Clone)]
pub struct EventOutcome {
    pub event: SecurityEvent,
    /// Events for this address in `[now - window, now]`, this one included
    pub window_count: u64,
    /// Set when this event pushed the address over the threshold
    pub block: Option<BlockedIp>,
}

impl EventOutcome {
    pub fn escalated(&self) -> bool {
        self.block.is_some()
    }
}

pub struct SecurityEventMonitor {
    events: Arc<dyn SecurityEventStore>,
    blocks: Arc<BlockRegistry>,
    alerts: AlertDispatcher,
    clock: SharedClock,
    config: MonitorConfig,
}

impl SecurityEventMonitor {
    /// Store failures propagate: losing a security event is worse than
    /// failing the request that produced it.
    pub const FAILURE_POLICY: FailurePolicy = FailurePolicy::FailClosed;

    pub fn new(
        events: Arc<dyn SecurityEventStore>,
        blocks: Arc<BlockRegistry>,
        alerts: AlertDispatcher,
        clock: SharedClock,
        config: MonitorConfig,
    ) -> Self {
        Self {
            events,
            blocks,
            alerts,
            clock,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<BlockRegistry> {
        &self.blocks
    }

    /// Record one event and escalate if needed.
    ///
    /// 1. append (awaited, so the count below sees it)
    /// 2. critical types alert immediately
    /// 3. count events in `[now - window, now]`
    /// 4. count ≥ threshold → upsert block
    pub async fn record_event(
        &self,
        ip_address: &str,
        event_type: SecurityEventType,
        details: Option<String>,
    ) -> Result<EventOutcome, MonitorError> {
        let now = self.clock.now_millis();

        let event = self
            .events
            .append_event(SecurityEventCreate {
                ip_address: ip_address.to_string(),
                event_type,
                details,
                created_at: now,
            })
            .await?;

        security_log!(
            INFO,
            "security_event",
            ip = %event.ip_address,
            event_type = event.event_type.as_str()
        );

        if event_type.is_critical() {
            let body = format!(
                "IP: {}\nDetails: {}",
                event.ip_address,
                event.details.as_deref().unwrap_or("(none)")
            );
            self.alerts.send(event_type.as_str(), &body).await;
        }

        let window_start = now.saturating_sub(duration_millis(self.config.window));
        let window_count = self
            .events
            .count_events_between(ip_address, window_start, now)
            .await?;

        let block = if window_count >= self.config.threshold {
            let reason = format!(
                "Excessive security events ({} in {}s)",
                window_count,
                self.config.window.as_secs()
            );
            Some(self.blocks.upsert_block(ip_address, &reason).await?)
        } else {
            None
        };

        Ok(EventOutcome {
            event,
            window_count,
            block,
        })
    }

    pub async fn is_blocked(&self, ip_address: &str) -> Result<bool, MonitorError> {
        Ok(self.blocks.is_blocked(ip_address).await?)
    }
}
