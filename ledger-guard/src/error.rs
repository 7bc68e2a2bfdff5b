//! Crate-level error type
//!
//! Each component owns a narrow error enum (`ConfigError`, `StoreError`,
//! `AuditError`, `MonitorError`, `RotationError`). `GuardError` bridges them
//! for wiring code (state construction, binaries) so `?` works across
//! components without manual `map_err`.

use thiserror::Error;

use crate::audit::AuditError;
use crate::config::ConfigError;
use crate::rotation::RotationError;
use crate::security::MonitorError;
use crate::store::StoreError;

/// How a subsystem treats its own persistence failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log and continue; the primary operation is never failed
    FailOpen,
    /// Propagate to the caller
    FailClosed,
}

#[derive(Debug, Error)]
pub enum GuardError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Audit(#[from] AuditError),
    #[error(transparent)]
    Monitor(#[from] MonitorError),
    #[error(transparent)]
    Rotation(#[from] RotationError),
}

pub type GuardResult<T> = Result<T, GuardError>;
