//! Ledger Guard - 安全事件监控、加密审计与密钥轮换
//!
//! # 架构概述
//!
//! - **加密信封** (`crypto`): AES-256-GCM seal/open, master keys, keyring
//! - **审计追踪** (`audit`): canonical metadata sealed before it is stored
//! - **安全监控** (`security`): sliding-window escalation to IP blocks
//! - **告警** (`alert`): best-effort webhook notifications
//! - **密钥轮换** (`rotation`): batch re-encryption of every audit payload
//!
//! # 模块结构
//!
//! ```text
//! ledger-guard/src/
//! ├── config.rs      # 环境变量配置
//! ├── error.rs       # 错误类型、失败策略
//! ├── logger.rs      # tracing 初始化
//! ├── clock.rs       # 时间源
//! ├── crypto.rs      # 加密信封
//! ├── store/         # 持久化 (PostgreSQL / 内存)
//! ├── audit/         # AuditTrail + 后台 worker
//! ├── security/      # SecurityEventMonitor + BlockRegistry
//! ├── alert.rs       # AlertDispatcher
//! ├── rotation.rs    # KeyRotationPipeline
//! └── state.rs       # 组件装配
//! ```

pub mod alert;
pub mod audit;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod error;
pub mod logger;
pub mod rotation;
pub mod security;
pub mod state;
pub mod store;

// Re-export 公共类型
pub use alert::{AlertChannel, AlertDispatcher, WebhookChannel};
pub use audit::{AuditAction, AuditError, AuditTrail, AuditWorker};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, ConfigError, RotationConfig};
pub use crypto::{DecryptionError, Keyring, MasterKey};
pub use error::{FailurePolicy, GuardError, GuardResult};
pub use logger::{init_logger, init_logger_with_file};
pub use rotation::{KeyRotationPipeline, RotationError, RotationReport};
pub use security::{BlockRegistry, EventOutcome, MonitorError, SecurityEventMonitor};
pub use state::GuardState;
pub use store::{MemoryStore, PgStore, StoreError};

// Security logging macro - target "security", 支持 tracing 字段语法
#[macro_export]
macro_rules! security_log {
    ($level:ident, $event:expr) => {
        tracing::event!(target: "security", tracing::Level::$level, event = $event)
    };
    ($level:ident, $event:expr, $($fields:tt)+) => {
        tracing::event!(
            target: "security",
            tracing::Level::$level,
            event = $event,
            $($fields)+
        )
    };
}
