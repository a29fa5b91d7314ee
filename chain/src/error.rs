//! Top-level error type surfaced by the engine's public operations.
//!
//! Composes the per-subsystem error enums (§3.1) into spec §7's five
//! rejection categories: validation failure, permission denial, state
//! conflict, consensus-mechanism rejection, and I/O failure.

use std::fmt;

use crate::consensus::{ConsensusError, ValidationError};
use crate::permissions::mls::MlsError;
use crate::storage::StorageError;

#[derive(Debug)]
pub enum ChainError {
    /// A transaction or block failed structural/semantic validation.
    Validation(ValidationError),
    /// The actor lacked the permission required for the requested action.
    PermissionDenied { actor: String, action: String },
    /// Applying a transaction would conflict with current chain state
    /// (e.g. insufficient balance, stale nonce, unknown validator).
    StateConflict(String),
    /// The active consensus mechanism rejected the block.
    ConsensusReject(ConsensusError),
    /// Reading or writing persisted state failed.
    Io(StorageError),
}

impl From<ValidationError> for ChainError {
    fn from(e: ValidationError) -> Self {
        ChainError::Validation(e)
    }
}

impl From<ConsensusError> for ChainError {
    fn from(e: ConsensusError) -> Self {
        ChainError::ConsensusReject(e)
    }
}

impl From<StorageError> for ChainError {
    fn from(e: StorageError) -> Self {
        ChainError::Io(e)
    }
}

impl From<MlsError> for ChainError {
    fn from(e: MlsError) -> Self {
        ChainError::StateConflict(e.to_string())
    }
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::Validation(e) => write!(f, "{e}"),
            ChainError::PermissionDenied { actor, action } => {
                write!(f, "{actor} is not permitted to {action}")
            }
            ChainError::StateConflict(msg) => write!(f, "state conflict: {msg}"),
            ChainError::ConsensusReject(e) => write!(f, "{e}"),
            ChainError::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ChainError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_displays_actor_and_action() {
        let err = ChainError::PermissionDenied {
            actor: "0xabc".to_string(),
            action: "transfer".to_string(),
        };
        assert_eq!(err.to_string(), "0xabc is not permitted to transfer");
    }
}
