//! Caller-facing error taxonomy.
//!
//! Every registry, sync and service operation reports failures as a
//! [`TrackerError`]. The type is `Clone` so one in-flight refresh outcome can
//! be delivered to every caller waiting on it.

use crate::model::snapshot::{CharacterId, SnapshotValidationError};
use crate::repo::{RepoError, SnapshotRejection};
use crate::sync::source::AcquisitionError;
use thiserror::Error;

pub type TrackerResult<T> = Result<T, TrackerError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error("character not found: {0}")]
    NotFound(CharacterId),

    #[error("character already tracked: {name} ({world})")]
    DuplicateCharacter { name: String, world: String },

    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    /// Acquired data is not a well-formed snapshot.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(#[from] SnapshotValidationError),

    /// Acquired data is not forward progress versus the stored latest.
    #[error("stale data: {0}")]
    StaleData(SnapshotRejection),

    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl TrackerError {
    /// Returns `false` for rejections that leave prior state intact and
    /// should be reported as a no-op rather than a failure.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::InvalidSnapshot(_) | Self::StaleData(_))
    }

    /// Stable machine-readable code for logs and presentation callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::DuplicateCharacter { .. } => "duplicate_character",
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidSnapshot(_) => "invalid_snapshot",
            Self::StaleData(_) => "stale_data",
            Self::Acquisition(_) => "acquisition_error",
            Self::Storage(_) => "storage_error",
        }
    }
}

impl From<RepoError> for TrackerError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::DuplicateCharacter { name, world } => {
                Self::DuplicateCharacter { name, world }
            }
            // Binding a snapshot to the wrong id is a wiring bug, not upstream data.
            RepoError::InvalidSnapshot(rejection @ SnapshotRejection::CharacterMismatch { .. }) => {
                Self::Storage(rejection.to_string())
            }
            RepoError::InvalidSnapshot(rejection) => Self::StaleData(rejection),
            other => Self::Storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TrackerError;
    use crate::repo::{RepoError, SnapshotRejection};
    use crate::sync::source::AcquisitionError;
    use uuid::Uuid;

    #[test]
    fn history_rejections_surface_as_stale_data() {
        let rejection = SnapshotRejection::ExperienceRegressed {
            latest: 10,
            observed: 5,
        };
        let err = TrackerError::from(RepoError::InvalidSnapshot(rejection.clone()));
        assert_eq!(err, TrackerError::StaleData(rejection));
        assert!(!err.is_fatal());
    }

    #[test]
    fn character_mismatch_is_a_fatal_storage_error() {
        let rejection = SnapshotRejection::CharacterMismatch {
            expected: Uuid::new_v4(),
            found: Uuid::new_v4(),
        };
        let err = TrackerError::from(RepoError::InvalidSnapshot(rejection));
        assert_eq!(err.code(), "storage_error");
        assert!(err.is_fatal());
    }

    #[test]
    fn acquisition_and_not_found_are_fatal() {
        let id = Uuid::new_v4();
        assert!(TrackerError::from(RepoError::NotFound(id)).is_fatal());
        let err = TrackerError::from(AcquisitionError::Unavailable("timeout".to_string()));
        assert!(err.is_fatal());
        assert_eq!(err.code(), "acquisition_error");
    }

    #[test]
    fn storage_failures_keep_message() {
        let err = TrackerError::from(RepoError::InvalidData("bad row".to_string()));
        assert_eq!(err.code(), "storage_error");
        assert!(err.to_string().contains("bad row"));
    }
}
