//! 审计类型定义

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{DecryptionError, EncryptionError};
use crate::store::StoreError;

/// 审计操作类型
///
/// Well-known tags plus `Custom` for anything else; the store column is
/// a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum AuditAction {
    // ═══ 认证 ═══
    UserLogin,
    UserLogout,
    PasswordChange,

    // ═══ 权限 ═══
    RoleChange,
    /// 查看解密后的个人信息
    ViewDecryptedPii,

    // ═══ API Key ═══
    CreateApiKey,
    DeleteApiKey,

    Custom(String),
}

impl AuditAction {
    pub fn as_str(&self) -> &str {
        match self {
            AuditAction::UserLogin => "USER_LOGIN",
            AuditAction::UserLogout => "USER_LOGOUT",
            AuditAction::PasswordChange => "PASSWORD_CHANGE",
            AuditAction::RoleChange => "ROLE_CHANGE",
            AuditAction::ViewDecryptedPii => "VIEW_DECRYPTED_PII",
            AuditAction::CreateApiKey => "CREATE_API_KEY",
            AuditAction::DeleteApiKey => "DELETE_API_KEY",
            AuditAction::Custom(tag) => tag,
        }
    }
}

impl From<&str> for AuditAction {
    fn from(tag: &str) -> Self {
        match tag {
            "USER_LOGIN" => AuditAction::UserLogin,
            "USER_LOGOUT" => AuditAction::UserLogout,
            "PASSWORD_CHANGE" => AuditAction::PasswordChange,
            "ROLE_CHANGE" => AuditAction::RoleChange,
            "VIEW_DECRYPTED_PII" => AuditAction::ViewDecryptedPii,
            "CREATE_API_KEY" => AuditAction::CreateApiKey,
            "DELETE_API_KEY" => AuditAction::DeleteApiKey,
            other => AuditAction::Custom(other.to_string()),
        }
    }
}

impl From<String> for AuditAction {
    fn from(tag: String) -> Self {
        AuditAction::from(tag.as_str())
    }
}

impl From<AuditAction> for String {
    fn from(action: AuditAction) -> Self {
        match action {
            AuditAction::Custom(tag) => tag,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit entry before sealing
#[derive(Debug, Clone)]
pub struct AuditRequest {
    pub actor_id: String,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: Option<String>,
    /// Sensitive; only ever persisted sealed
    pub metadata: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("failed to serialize audit metadata: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("failed to seal audit metadata: {0}")]
    Encryption(#[from] EncryptionError),
    #[error("failed to open audit payload: {0}")]
    Decryption(#[from] DecryptionError),
    #[error("failed to persist audit record: {0}")]
    Store(#[from] StoreError),
}
