//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from registry/sync orchestration.
//!
//! # Invariants
//! - History writes enforce timestamp and counter monotonicity before SQL.
//! - Repository APIs return semantic errors (`NotFound`, `DuplicateCharacter`,
//!   `InvalidSnapshot`) in addition to DB transport errors.

use crate::db::DbError;
use crate::model::snapshot::CharacterId;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod character_repo;
pub mod history_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for character and history persistence.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("character not found: {0}")]
    NotFound(CharacterId),
    #[error("character already tracked: {name} ({world})")]
    DuplicateCharacter { name: String, world: String },
    #[error("snapshot rejected: {0}")]
    InvalidSnapshot(#[from] SnapshotRejection),
    #[error("invalid persisted character data: {0}")]
    InvalidData(String),
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Why a history append was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotRejection {
    #[error("observed at {observed} is not after latest {latest}")]
    NotAfterLatest {
        latest: DateTime<Utc>,
        observed: DateTime<Utc>,
    },
    #[error("experience regressed from {latest} to {observed}")]
    ExperienceRegressed { latest: u64, observed: u64 },
    #[error("deaths regressed from {latest} to {observed}")]
    DeathsRegressed { latest: u32, observed: u32 },
    #[error("snapshot belongs to {found}, not {expected}")]
    CharacterMismatch {
        expected: CharacterId,
        found: CharacterId,
    },
}
