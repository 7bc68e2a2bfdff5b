//! Audit Record Model

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Marker stored beside every sealed payload.
///
/// Non-sensitive: only tells readers that the real metadata lives in
/// `encrypted_payload`.
pub const ENCRYPTED_PAYLOAD_MARKER: &str = "ENCRYPTED";

/// Audit record (immutable once written, payload replaced only by key rotation)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct AuditRecord {
    pub id: i64,
    pub actor_id: String,
    /// Action tag, e.g. "ROLE_CHANGE"
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    /// Sealed blob: `hex(nonce):hex(tag):hex(ciphertext)`
    pub encrypted_payload: String,
    /// Always [`ENCRYPTED_PAYLOAD_MARKER`]
    pub payload_marker: String,
    pub created_at: Timestamp,
}

/// Create audit record payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecordCreate {
    pub actor_id: String,
    pub action: String,
    pub entity_type: String,
    #[serde(default)]
    pub entity_id: Option<String>,
    pub encrypted_payload: String,
    pub created_at: Timestamp,
}
