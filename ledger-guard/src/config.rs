//! Guard configuration
//!
//! Everything is read from environment variables once at startup and then
//! passed explicitly into each component. Business logic never looks up
//! secrets on its own.
//!
//! | 环境变量 | 默认值 | 说明 |
//! |----------|--------|------|
//! | DATABASE_URL | (required) | PostgreSQL 连接 |
//! | ENVIRONMENT | development | development / staging / production |
//! | AUDIT_ENCRYPTION_KEY | (required outside development) | 当前主密钥 (hex) |
//! | AUDIT_PREVIOUS_KEY | - | 轮换窗口内仍可解密的旧密钥 |
//! | SECURITY_THRESHOLD_EVENTS | 5 | 窗口内触发封禁的事件数 |
//! | SECURITY_WINDOW_SECS | 60 | 滑动窗口 |
//! | SECURITY_BLOCK_DURATION_SECS | 3600 | 封禁时长 |
//! | SECURITY_ALERT_WEBHOOK_URL | - | 告警通道，未设置则不告警 |
//! | ALERT_TIMEOUT_MS | 5000 | 告警请求超时 |
//! | AUDIT_CHANNEL_CAPACITY | 1024 | 审计队列容量 |
//! | OLD_MASTER_KEY / NEW_MASTER_KEY | (rotation only) | 轮换密钥 |
//! | ROTATION_BATCH_SIZE | 100 | 轮换批大小 |
//! | LOG_LEVEL / LOG_FORMAT / LOG_DIR | info / text / - | 日志 (见 `logger::LogSettings`) |

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::crypto::{KeyError, MasterKey};

pub const DEFAULT_THRESHOLD_EVENTS: u64 = 5;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
pub const DEFAULT_BLOCK_DURATION: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_ROTATION_BATCH_SIZE: usize = 100;
pub const DEFAULT_ALERT_TIMEOUT: Duration = Duration::from_millis(5_000);
pub const DEFAULT_AUDIT_CHANNEL_CAPACITY: usize = 1024;

/// Configuration error. Fatal at startup, never masked.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be set")]
    Missing { name: String },
    #[error("{name} must be set in {environment} environment")]
    MissingSecret { name: String, environment: String },
    #[error("{name} has invalid value {value:?}")]
    InvalidValue { name: String, value: String },
    #[error("{name}: {source}")]
    InvalidKey {
        name: String,
        #[source]
        source: KeyError,
    },
    #[error("{0}")]
    Invalid(String),
}

/// Sliding-window escalation settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Events within `window` that trigger a block
    pub threshold: u64,
    pub window: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD_EVENTS,
            window: DEFAULT_WINDOW,
        }
    }
}

/// Block registry settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockConfig {
    pub block_duration: Duration,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            block_duration: DEFAULT_BLOCK_DURATION,
        }
    }
}

/// Alert channel settings. No URL → alerting disabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertConfig {
    pub webhook_url: Option<String>,
    pub timeout: Duration,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout: DEFAULT_ALERT_TIMEOUT,
        }
    }
}

/// Key rotation job settings (old/new keys coexist only here)
#[derive(Debug, Clone)]
pub struct RotationConfig {
    pub old_key: MasterKey,
    pub new_key: MasterKey,
    pub batch_size: usize,
}

impl RotationConfig {
    /// Load from `OLD_MASTER_KEY`, `NEW_MASTER_KEY`, `ROTATION_BATCH_SIZE`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let old_key = required_key(&lookup, "OLD_MASTER_KEY")?;
        let new_key = required_key(&lookup, "NEW_MASTER_KEY")?;
        let batch_size = parse_var(&lookup, "ROTATION_BATCH_SIZE", DEFAULT_ROTATION_BATCH_SIZE)?;
        Self::new(old_key, new_key, batch_size)
    }

    pub fn new(
        old_key: MasterKey,
        new_key: MasterKey,
        batch_size: usize,
    ) -> Result<Self, ConfigError> {
        if old_key == new_key {
            return Err(ConfigError::Invalid(
                "OLD_MASTER_KEY and NEW_MASTER_KEY must differ".into(),
            ));
        }
        if batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                name: "ROTATION_BATCH_SIZE".into(),
                value: "0".into(),
            });
        }
        Ok(Self {
            old_key,
            new_key,
            batch_size,
        })
    }
}

/// Guard service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Environment: development | staging | production
    pub environment: String,
    /// Current audit master key
    pub audit_key: MasterKey,
    /// Retired key still accepted for reads during a rotation window
    pub audit_previous_key: Option<MasterKey>,
    pub monitor: MonitorConfig,
    pub block: BlockConfig,
    pub alert: AlertConfig,
    /// Bounded queue between callers and the audit worker
    pub audit_channel_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// Load configuration through `lookup` (variable name → value)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".into());

        let monitor = MonitorConfig {
            threshold: parse_var(&lookup, "SECURITY_THRESHOLD_EVENTS", DEFAULT_THRESHOLD_EVENTS)?,
            window: Duration::from_secs(parse_var(
                &lookup,
                "SECURITY_WINDOW_SECS",
                DEFAULT_WINDOW.as_secs(),
            )?),
        };
        if monitor.threshold == 0 {
            return Err(ConfigError::InvalidValue {
                name: "SECURITY_THRESHOLD_EVENTS".into(),
                value: "0".into(),
            });
        }

        Ok(Self {
            database_url: lookup("DATABASE_URL").ok_or_else(|| ConfigError::Missing {
                name: "DATABASE_URL".into(),
            })?,
            audit_key: require_key(&lookup, "AUDIT_ENCRYPTION_KEY", &environment)?,
            audit_previous_key: optional_key(&lookup, "AUDIT_PREVIOUS_KEY")?,
            monitor,
            block: BlockConfig {
                block_duration: Duration::from_secs(parse_var(
                    &lookup,
                    "SECURITY_BLOCK_DURATION_SECS",
                    DEFAULT_BLOCK_DURATION.as_secs(),
                )?),
            },
            alert: AlertConfig {
                webhook_url: lookup("SECURITY_ALERT_WEBHOOK_URL").filter(|s| !s.trim().is_empty()),
                timeout: Duration::from_millis(parse_var(
                    &lookup,
                    "ALERT_TIMEOUT_MS",
                    DEFAULT_ALERT_TIMEOUT.as_millis() as u64,
                )?),
            },
            audit_channel_capacity: parse_var(
                &lookup,
                "AUDIT_CHANNEL_CAPACITY",
                DEFAULT_AUDIT_CHANNEL_CAPACITY,
            )?
            .max(1),
            environment,
        })
    }
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Require a key: must be set in non-development environments.
///
/// Development falls back to an ephemeral key; anything sealed with it is
/// unreadable after restart.
fn require_key(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    environment: &str,
) -> Result<MasterKey, ConfigError> {
    match optional_key(lookup, name)? {
        Some(key) => Ok(key),
        None if environment == "development" => {
            tracing::warn!(
                "{name} is not set, using an ephemeral key. \
                 Sealed audit data will NOT be recoverable after restart."
            );
            Ok(MasterKey::generate())
        }
        None => Err(ConfigError::MissingSecret {
            name: name.into(),
            environment: environment.into(),
        }),
    }
}

fn optional_key(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<MasterKey>, ConfigError> {
    match lookup(name) {
        Some(v) if !v.trim().is_empty() => parse_key(name, &v).map(Some),
        _ => Ok(None),
    }
}

fn required_key(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<MasterKey, ConfigError> {
    optional_key(lookup, name)?.ok_or_else(|| ConfigError::Missing { name: name.into() })
}

/// Hex-decode a key, tagging errors with the variable name
pub fn parse_key(name: &str, value: &str) -> Result<MasterKey, ConfigError> {
    MasterKey::from_hex(value).map_err(|source| ConfigError::InvalidKey {
        name: name.into(),
        source,
    })
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(v) => v.trim().parse().map_err(|_| ConfigError::InvalidValue {
            name: name.into(),
            value: v,
        }),
        None => Ok(default),
    }
}
