//! Character snapshot model.
//!
//! # Responsibility
//! - Define the raw acquisition payload (`CharacterSnapshotInput`).
//! - Convert untrusted payloads into validated `CharacterSnapshot` values.
//!
//! # Invariants
//! - Numeric fields of a `CharacterSnapshot` are non-negative and fit SQLite
//!   `INTEGER` storage.
//! - `observed_at` is truncated to millisecond precision, the storage unit.
//! - `vocation` and `world` are never blank.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Stable identifier of a tracked character.
pub type CharacterId = Uuid;

/// Freshly observed character data, as returned by an acquisition source.
///
/// Numeric fields are signed because upstream data is not trusted; they are
/// checked by [`CharacterSnapshotInput::into_snapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSnapshotInput {
    /// When the upstream source observed this state.
    pub observed_at: DateTime<Utc>,
    pub level: i64,
    /// Cumulative experience points.
    pub experience: i64,
    /// Cumulative death count.
    pub deaths: i64,
    pub vocation: String,
    pub world: String,
}

/// One observed state of a character, as recorded in its history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSnapshot {
    pub character_id: CharacterId,
    /// Millisecond precision; strictly increasing within one history.
    pub observed_at: DateTime<Utc>,
    pub level: u32,
    pub experience: u64,
    pub deaths: u32,
    pub vocation: String,
    pub world: String,
}

/// Reasons an acquired payload is not a well-formed snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotValidationError {
    #[error("snapshot field `{field}` is negative: {value}")]
    Negative { field: &'static str, value: i64 },
    #[error("snapshot field `{field}` is out of range: {value}")]
    OutOfRange { field: &'static str, value: i64 },
    #[error("snapshot field `{0}` must not be blank")]
    Blank(&'static str),
    #[error("snapshot timestamp is out of range")]
    TimestampOutOfRange,
}

impl CharacterSnapshotInput {
    /// Validates this payload and binds it to `character_id`.
    ///
    /// # Errors
    /// - `Negative` when level, experience or deaths is below zero.
    /// - `OutOfRange` when level or deaths exceeds `u32::MAX`.
    /// - `Blank` when vocation or world is empty after trimming.
    pub fn into_snapshot(
        self,
        character_id: CharacterId,
    ) -> Result<CharacterSnapshot, SnapshotValidationError> {
        let level = to_u32("level", self.level)?;
        let experience = non_negative("experience", self.experience)?.unsigned_abs();
        let deaths = to_u32("deaths", self.deaths)?;
        let vocation = non_blank("vocation", self.vocation)?;
        let world = non_blank("world", self.world)?;
        let observed_at = DateTime::from_timestamp_millis(self.observed_at.timestamp_millis())
            .ok_or(SnapshotValidationError::TimestampOutOfRange)?;

        Ok(CharacterSnapshot {
            character_id,
            observed_at,
            level,
            experience,
            deaths,
            vocation,
            world,
        })
    }
}

impl CharacterSnapshot {
    /// Observation time in epoch milliseconds, the persisted unit.
    pub fn observed_at_ms(&self) -> i64 {
        self.observed_at.timestamp_millis()
    }
}

fn non_negative(field: &'static str, value: i64) -> Result<i64, SnapshotValidationError> {
    if value < 0 {
        return Err(SnapshotValidationError::Negative { field, value });
    }
    Ok(value)
}

fn to_u32(field: &'static str, value: i64) -> Result<u32, SnapshotValidationError> {
    let value = non_negative(field, value)?;
    u32::try_from(value).map_err(|_| SnapshotValidationError::OutOfRange { field, value })
}

fn non_blank(field: &'static str, value: String) -> Result<String, SnapshotValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SnapshotValidationError::Blank(field));
    }
    if trimmed.len() == value.len() {
        return Ok(value);
    }
    Ok(trimmed.to_string())
}
