//! Character history contracts and SQLite implementation.
//!
//! # Responsibility
//! - Own every persisted `CharacterSnapshot`.
//! - Keep each history append-only and ordered by `observed_at`.
//!
//! # Invariants
//! - `append` rejects snapshots that are not strictly newer than the latest
//!   entry, or whose experience/deaths fall below it.
//! - No entry is ever overwritten; entries only leave through `delete_all`.
//! - Reads return histories in ascending `observed_at` order.

use crate::model::snapshot::{CharacterId, CharacterSnapshot};
use crate::repo::{RepoError, RepoResult, SnapshotRejection};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const SNAPSHOT_SELECT_SQL: &str = "SELECT
    character_uuid,
    observed_at,
    level,
    experience,
    deaths,
    vocation,
    world
FROM character_snapshots";

/// Append-only store of per-character snapshot histories.
pub trait HistoryStore {
    /// Appends one snapshot after monotonicity checks.
    fn append(&self, character_id: CharacterId, snapshot: &CharacterSnapshot) -> RepoResult<()>;
    /// Returns the newest snapshot, or `NotFound` for an empty history.
    fn latest(&self, character_id: CharacterId) -> RepoResult<CharacterSnapshot>;
    /// Returns the full history in ascending time order.
    fn all(&self, character_id: CharacterId) -> RepoResult<Vec<CharacterSnapshot>>;
    /// Returns snapshots observed at or after `from`, ascending.
    fn since(
        &self,
        character_id: CharacterId,
        from: DateTime<Utc>,
    ) -> RepoResult<Vec<CharacterSnapshot>>;
    /// Removes the whole history. Returns the number of removed snapshots.
    fn delete_all(&self, character_id: CharacterId) -> RepoResult<usize>;
}

/// SQLite-backed history store.
///
/// Callers that combine an append with other writes should construct this
/// over a `Transaction`, which dereferences to `Connection`.
pub struct SqliteHistoryStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteHistoryStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn latest_opt(&self, character_id: CharacterId) -> RepoResult<Option<CharacterSnapshot>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SNAPSHOT_SELECT_SQL}
             WHERE character_uuid = ?1
             ORDER BY observed_at DESC
             LIMIT 1;"
        ))?;
        let row = stmt
            .query_row([character_id.to_string()], |row| Ok(parse_snapshot_row(row)))
            .optional()?;
        row.transpose()
    }

    fn query_many(
        &self,
        character_id: CharacterId,
        from_ms: Option<i64>,
    ) -> RepoResult<Vec<CharacterSnapshot>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SNAPSHOT_SELECT_SQL}
             WHERE character_uuid = ?1
               AND (?2 IS NULL OR observed_at >= ?2)
             ORDER BY observed_at ASC;"
        ))?;
        let mut rows = stmt.query(params![character_id.to_string(), from_ms])?;
        let mut snapshots = Vec::new();
        while let Some(row) = rows.next()? {
            snapshots.push(parse_snapshot_row(row)?);
        }
        Ok(snapshots)
    }
}

impl HistoryStore for SqliteHistoryStore<'_> {
    fn append(&self, character_id: CharacterId, snapshot: &CharacterSnapshot) -> RepoResult<()> {
        if snapshot.character_id != character_id {
            return Err(SnapshotRejection::CharacterMismatch {
                expected: character_id,
                found: snapshot.character_id,
            }
            .into());
        }

        if let Some(latest) = self.latest_opt(character_id)? {
            check_progression(&latest, snapshot)?;
        }

        self.conn.execute(
            "INSERT INTO character_snapshots (
                character_uuid,
                observed_at,
                level,
                experience,
                deaths,
                vocation,
                world
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                character_id.to_string(),
                snapshot.observed_at_ms(),
                i64::from(snapshot.level),
                experience_to_db(snapshot.experience)?,
                i64::from(snapshot.deaths),
                snapshot.vocation.as_str(),
                snapshot.world.as_str(),
            ],
        )?;

        Ok(())
    }

    fn latest(&self, character_id: CharacterId) -> RepoResult<CharacterSnapshot> {
        self.latest_opt(character_id)?
            .ok_or(RepoError::NotFound(character_id))
    }

    fn all(&self, character_id: CharacterId) -> RepoResult<Vec<CharacterSnapshot>> {
        self.query_many(character_id, None)
    }

    fn since(
        &self,
        character_id: CharacterId,
        from: DateTime<Utc>,
    ) -> RepoResult<Vec<CharacterSnapshot>> {
        self.query_many(character_id, Some(from.timestamp_millis()))
    }

    fn delete_all(&self, character_id: CharacterId) -> RepoResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM character_snapshots WHERE character_uuid = ?1;",
            [character_id.to_string()],
        )?;
        Ok(removed)
    }
}

/// Checks that `next` is forward progress relative to `latest`.
pub fn check_progression(
    latest: &CharacterSnapshot,
    next: &CharacterSnapshot,
) -> Result<(), SnapshotRejection> {
    if next.observed_at_ms() <= latest.observed_at_ms() {
        return Err(SnapshotRejection::NotAfterLatest {
            latest: latest.observed_at,
            observed: next.observed_at,
        });
    }
    if next.experience < latest.experience {
        return Err(SnapshotRejection::ExperienceRegressed {
            latest: latest.experience,
            observed: next.experience,
        });
    }
    if next.deaths < latest.deaths {
        return Err(SnapshotRejection::DeathsRegressed {
            latest: latest.deaths,
            observed: next.deaths,
        });
    }
    Ok(())
}

/// Parses one row selected with the `character_snapshots` column names.
pub(crate) fn parse_snapshot_row(row: &Row<'_>) -> RepoResult<CharacterSnapshot> {
    let uuid_text: String = row.get("character_uuid")?;
    let character_id = parse_character_id(&uuid_text)?;
    let observed_at = millis_to_datetime(row.get("observed_at")?)?;

    let level: i64 = row.get("level")?;
    let level = u32::try_from(level).map_err(|_| {
        RepoError::InvalidData(format!("invalid level `{level}` in character_snapshots"))
    })?;
    let experience: i64 = row.get("experience")?;
    let experience = u64::try_from(experience).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid experience `{experience}` in character_snapshots"
        ))
    })?;
    let deaths: i64 = row.get("deaths")?;
    let deaths = u32::try_from(deaths).map_err(|_| {
        RepoError::InvalidData(format!("invalid deaths `{deaths}` in character_snapshots"))
    })?;

    Ok(CharacterSnapshot {
        character_id,
        observed_at,
        level,
        experience,
        deaths,
        vocation: row.get("vocation")?,
        world: row.get("world")?,
    })
}

pub(crate) fn parse_character_id(value: &str) -> RepoResult<CharacterId> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid character uuid `{value}`")))
}

pub(crate) fn millis_to_datetime(value: i64) -> RepoResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(value)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid epoch millis `{value}`")))
}

fn experience_to_db(value: u64) -> RepoResult<i64> {
    i64::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("experience `{value}` exceeds storage range")))
}
