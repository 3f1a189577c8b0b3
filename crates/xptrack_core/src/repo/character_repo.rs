//! Character record contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist character identity (`uuid`, `name`, `world`, `created_at`).
//! - Project records with their latest snapshot resolved from history.
//!
//! # Invariants
//! - `(name, world)` is unique, compared case-insensitively.
//! - Rows hold identity only; progression fields always come from
//!   `character_snapshots`.
//! - A persisted character without any snapshot is reported as invalid data.

use crate::model::character::CharacterRecord;
use crate::model::snapshot::{CharacterId, CharacterSnapshot};
use crate::repo::history_repo::{millis_to_datetime, parse_character_id, parse_snapshot_row};
use crate::repo::{RepoError, RepoResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};

const RECORD_SELECT_SQL: &str = "SELECT
    c.uuid AS uuid,
    c.name AS name,
    c.world AS character_world,
    c.created_at AS created_at,
    s.character_uuid AS character_uuid,
    s.observed_at AS observed_at,
    s.level AS level,
    s.experience AS experience,
    s.deaths AS deaths,
    s.vocation AS vocation,
    s.world AS world
FROM characters c
LEFT JOIN character_snapshots s
    ON s.character_uuid = c.uuid
   AND s.observed_at = (
        SELECT MAX(latest.observed_at)
        FROM character_snapshots latest
        WHERE latest.character_uuid = c.uuid
   )";

/// Identity row of a tracked character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterRow {
    pub id: CharacterId,
    pub name: String,
    pub world: String,
    pub created_at: DateTime<Utc>,
}

/// Repository interface for character identity rows.
pub trait CharacterRepository {
    /// Inserts one row. Fails with `DuplicateCharacter` on a name/world clash.
    fn insert(&self, row: &CharacterRow) -> RepoResult<()>;
    /// Finds a row by case-insensitive name and world.
    fn find_by_name(&self, name: &str, world: &str) -> RepoResult<Option<CharacterRow>>;
    /// Gets one record with its latest snapshot.
    fn get(&self, id: CharacterId) -> RepoResult<Option<CharacterRecord>>;
    /// Lists all records ordered by name, then id.
    fn list(&self) -> RepoResult<Vec<CharacterRecord>>;
    /// Deletes one identity row. History must be removed first.
    fn delete(&self, id: CharacterId) -> RepoResult<()>;
}

/// SQLite-backed character repository.
pub struct SqliteCharacterRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCharacterRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl CharacterRepository for SqliteCharacterRepository<'_> {
    fn insert(&self, row: &CharacterRow) -> RepoResult<()> {
        let result = self.conn.execute(
            "INSERT INTO characters (uuid, name, world, created_at)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                row.id.to_string(),
                row.name.as_str(),
                row.world.as_str(),
                row.created_at.timestamp_millis(),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(RepoError::DuplicateCharacter {
                name: row.name.clone(),
                world: row.world.clone(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    fn find_by_name(&self, name: &str, world: &str) -> RepoResult<Option<CharacterRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT uuid, name, world, created_at
                 FROM characters
                 WHERE name = ?1 COLLATE NOCASE
                   AND world = ?2 COLLATE NOCASE;",
                params![name, world],
                |row| Ok(parse_identity(row, "world")),
            )
            .optional()?;
        row.transpose()
    }

    fn get(&self, id: CharacterId) -> RepoResult<Option<CharacterRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{RECORD_SELECT_SQL} WHERE c.uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_record_row(row)?));
        }
        Ok(None)
    }

    fn list(&self) -> RepoResult<Vec<CharacterRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{RECORD_SELECT_SQL} ORDER BY c.name COLLATE NOCASE ASC, c.uuid ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_record_row(row)?);
        }
        Ok(records)
    }

    fn delete(&self, id: CharacterId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM characters WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }
}

fn parse_identity(row: &Row<'_>, world_column: &str) -> RepoResult<CharacterRow> {
    let uuid_text: String = row.get("uuid")?;
    Ok(CharacterRow {
        id: parse_character_id(&uuid_text)?,
        name: row.get("name")?,
        world: row.get(world_column)?,
        created_at: millis_to_datetime(row.get("created_at")?)?,
    })
}

fn parse_record_row(row: &Row<'_>) -> RepoResult<CharacterRecord> {
    let identity = parse_identity(row, "character_world")?;
    let latest = parse_latest(row, identity.id)?;
    Ok(CharacterRecord {
        id: identity.id,
        name: identity.name,
        world: identity.world,
        created_at: identity.created_at,
        latest,
    })
}

fn parse_latest(row: &Row<'_>, id: CharacterId) -> RepoResult<CharacterSnapshot> {
    let snapshot_owner: Option<String> = row.get("character_uuid")?;
    if snapshot_owner.is_none() {
        return Err(RepoError::InvalidData(format!(
            "character {id} has no snapshots"
        )));
    }
    parse_snapshot_row(row)
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation
                && failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
