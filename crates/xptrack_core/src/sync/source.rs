//! Acquisition collaborator contract.
//!
//! The core never scrapes or fetches character data itself. Implementations
//! of [`CharacterSource`] own transport, caching and timeouts; the core only
//! consumes the observed payload.

use crate::model::snapshot::CharacterSnapshotInput;
use async_trait::async_trait;
use thiserror::Error;

/// Failure reported by an acquisition source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquisitionError {
    #[error("character `{name}` not found upstream on world `{world}`")]
    CharacterNotFound { name: String, world: String },

    #[error("upstream source unavailable: {0}")]
    Unavailable(String),

    #[error("upstream returned unreadable data: {0}")]
    Unreadable(String),
}

/// Source of freshly observed character data.
#[async_trait]
pub trait CharacterSource: Send + Sync {
    /// Acquires the current state of the character `name` on `world`.
    async fn acquire(
        &self,
        name: &str,
        world: &str,
    ) -> Result<CharacterSnapshotInput, AcquisitionError>;
}
