//! 审计后台 Worker
//!
//! 从 mpsc 通道消费已加密的审计记录并写入存储。通道关闭时自动退出。

use std::sync::Arc;

use shared::models::AuditRecordCreate;
use tokio::sync::mpsc;

use crate::store::AuditStore;

pub struct AuditWorker {
    store: Arc<dyn AuditStore>,
}

impl AuditWorker {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Run until every sender is dropped. Store failures are logged only.
    pub async fn run(self, mut rx: mpsc::Receiver<AuditRecordCreate>) {
        tracing::info!("Audit worker started");

        while let Some(row) = rx.recv().await {
            let action = row.action.clone();
            match self.store.insert_audit(row).await {
                Ok(record) => {
                    tracing::debug!(
                        audit_id = record.id,
                        action = %record.action,
                        entity_type = %record.entity_type,
                        "Audit record written"
                    );
                }
                Err(e) => {
                    tracing::error!(action = %action, "Failed to write audit entry: {:?}", e);
                }
            }
        }

        tracing::info!("Audit channel closed, worker stopping");
    }
}
