//! Security Event / Blocked IP Models

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::types::Timestamp;

/// Security event type
///
/// Wire/storage form is SCREAMING_SNAKE_CASE (e.g. `SQLI_ATTEMPT`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityEventType {
    SqliAttempt,
    IntegerOverflow,
    XssAttempt,
    PathTraversal,
    CsrfViolation,
    AuthFailure,
    RateLimitExceeded,
    InvalidInput,
    SuspiciousActivity,
}

impl SecurityEventType {
    pub const ALL: [SecurityEventType; 9] = [
        Self::SqliAttempt,
        Self::IntegerOverflow,
        Self::XssAttempt,
        Self::PathTraversal,
        Self::CsrfViolation,
        Self::AuthFailure,
        Self::RateLimitExceeded,
        Self::InvalidInput,
        Self::SuspiciousActivity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SqliAttempt => "SQLI_ATTEMPT",
            Self::IntegerOverflow => "INTEGER_OVERFLOW",
            Self::XssAttempt => "XSS_ATTEMPT",
            Self::PathTraversal => "PATH_TRAVERSAL",
            Self::CsrfViolation => "CSRF_VIOLATION",
            Self::AuthFailure => "AUTH_FAILURE",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::InvalidInput => "INVALID_INPUT",
            Self::SuspiciousActivity => "SUSPICIOUS_ACTIVITY",
        }
    }

    /// Critical types alert immediately, independent of any threshold.
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::SqliAttempt | Self::IntegerOverflow)
    }
}

impl std::fmt::Display for SecurityEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown security event tag
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown security event type: {0}")]
pub struct UnknownEventType(pub String);

impl FromStr for SecurityEventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownEventType(s.to_string()))
    }
}

/// Security event record (append-only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub id: i64,
    pub ip_address: String,
    pub event_type: SecurityEventType,
    pub details: Option<String>,
    pub created_at: Timestamp,
}

/// Create security event payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEventCreate {
    pub ip_address: String,
    pub event_type: SecurityEventType,
    #[serde(default)]
    pub details: Option<String>,
    pub created_at: Timestamp,
}

/// Blocked IP record (one row per address, never deleted)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct BlockedIp {
    pub ip_address: String,
    pub reason: String,
    pub expires_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl BlockedIp {
    /// Expiry is a read-time computation: blocked iff `now < expires_at`.
    pub fn is_active_at(&self, now: Timestamp) -> bool {
        now < self.expires_at
    }
}
