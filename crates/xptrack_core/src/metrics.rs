//! Derived progression metrics.
//!
//! # Responsibility
//! - Compute daily experience and snapshot deltas from a history.
//! - Expose per-field trends for charting.
//!
//! # Invariants
//! - Every function is pure over an ascending history slice.
//! - Nothing computed here is persisted; callers recompute on demand.

use crate::model::snapshot::CharacterSnapshot;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of the daily experience window.
pub fn daily_window() -> Duration {
    Duration::hours(24)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MetricsError {
    #[error("history is empty")]
    InsufficientHistory,
}

/// Progression fields that can be charted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendField {
    Level,
    Experience,
    Deaths,
}

impl TrendField {
    pub fn value_of(self, snapshot: &CharacterSnapshot) -> u64 {
        match self {
            Self::Level => u64::from(snapshot.level),
            Self::Experience => snapshot.experience,
            Self::Deaths => u64::from(snapshot.deaths),
        }
    }
}

/// Signed change between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDelta {
    pub level: i64,
    pub experience: i64,
    pub deaths: i64,
    /// Milliseconds between the two observations.
    pub elapsed_ms: i64,
}

impl SnapshotDelta {
    /// Change from `from` to `to`. Negative when `to` precedes `from`.
    pub fn between(from: &CharacterSnapshot, to: &CharacterSnapshot) -> Self {
        Self {
            level: i64::from(to.level) - i64::from(from.level),
            experience: signed_delta(from.experience, to.experience),
            deaths: i64::from(to.deaths) - i64::from(from.deaths),
            elapsed_ms: to.observed_at_ms() - from.observed_at_ms(),
        }
    }
}

/// Metrics shown next to a character history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub daily_experience: u64,
    /// Change from the first to the last snapshot.
    pub total: SnapshotDelta,
}

/// Experience gained in the 24 hours leading up to the latest snapshot.
///
/// The latest snapshot is the newest one observed at or before `as_of`. The
/// baseline is the newest snapshot observed at or before `latest - 24h`, or
/// the earliest snapshot when none is that old. Returns `0` when `as_of`
/// precedes the whole history.
///
/// # Errors
/// - `InsufficientHistory` when `history` is empty.
pub fn daily_experience(
    history: &[CharacterSnapshot],
    as_of: DateTime<Utc>,
) -> Result<u64, MetricsError> {
    let earliest = history.first().ok_or(MetricsError::InsufficientHistory)?;

    let visible = history.partition_point(|snapshot| snapshot.observed_at <= as_of);
    let Some(latest) = visible.checked_sub(1).map(|index| &history[index]) else {
        return Ok(0);
    };

    // No cutoff when `latest` is within a day of the earliest representable time.
    let older = match latest.observed_at.checked_sub_signed(daily_window()) {
        Some(cutoff) => {
            history[..visible].partition_point(|snapshot| snapshot.observed_at <= cutoff)
        }
        None => 0,
    };
    let baseline = older
        .checked_sub(1)
        .map_or(earliest, |index| &history[index]);

    Ok(latest.experience.saturating_sub(baseline.experience))
}

/// Computes the metrics bundle for a history as of `as_of`.
pub fn derive(
    history: &[CharacterSnapshot],
    as_of: DateTime<Utc>,
) -> Result<DerivedMetrics, MetricsError> {
    let daily_experience = daily_experience(history, as_of)?;
    let (Some(first), Some(last)) = (history.first(), history.last()) else {
        return Err(MetricsError::InsufficientHistory);
    };
    Ok(DerivedMetrics {
        daily_experience,
        total: SnapshotDelta::between(first, last),
    })
}

/// Yields `(observed_at, value)` for `field`, one pair per snapshot.
///
/// The iterator is `Clone`; clone it to walk the trend again.
pub fn trend(
    history: &[CharacterSnapshot],
    field: TrendField,
) -> impl ExactSizeIterator<Item = (DateTime<Utc>, u64)> + Clone + '_ {
    history
        .iter()
        .map(move |snapshot| (snapshot.observed_at, field.value_of(snapshot)))
}

fn signed_delta(from: u64, to: u64) -> i64 {
    let delta = i128::from(to) - i128::from(from);
    i64::try_from(delta).unwrap_or(if delta < 0 { i64::MIN } else { i64::MAX })
}
