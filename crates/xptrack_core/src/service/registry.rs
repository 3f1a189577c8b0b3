//! Character registry use-cases.
//!
//! # Responsibility
//! - Register characters with a seed snapshot from the acquisition source.
//! - Read current-state projections and histories.
//! - Remove a character together with its whole history.
//!
//! # Invariants
//! - A registered character always has at least one snapshot: the record
//!   row and its seed snapshot are committed in one transaction.
//! - `(name, world)` is unique, compared case-insensitively.
//! - Removal deletes history and record in one transaction.

use crate::db::Database;
use crate::error::{TrackerError, TrackerResult};
use crate::model::character::{normalize_label, CharacterRecord};
use crate::model::snapshot::{CharacterId, CharacterSnapshot};
use crate::repo::character_repo::{CharacterRepository, CharacterRow, SqliteCharacterRepository};
use crate::repo::history_repo::{HistoryStore, SqliteHistoryStore};
use crate::repo::{RepoError, RepoResult};
use crate::sync::source::CharacterSource;
use chrono::{DateTime, SubsecRound, Utc};
use log::{info, warn};
use std::sync::Arc;
use uuid::Uuid;

/// Registry of tracked characters over a shared database handle.
pub struct CharacterRegistry {
    db: Database,
    source: Arc<dyn CharacterSource>,
}

impl CharacterRegistry {
    pub fn new(db: Database, source: Arc<dyn CharacterSource>) -> Self {
        Self { db, source }
    }

    pub(crate) fn source(&self) -> Arc<dyn CharacterSource> {
        Arc::clone(&self.source)
    }

    /// Registers a character and records its seed snapshot.
    ///
    /// # Errors
    /// - `InvalidInput` when `name` or `world` is blank.
    /// - `DuplicateCharacter` when the pair is already tracked.
    /// - `Acquisition` / `InvalidSnapshot` when no usable seed is acquired;
    ///   nothing is persisted in that case.
    pub async fn register(&self, name: &str, world: &str) -> TrackerResult<CharacterRecord> {
        let name = normalize_label(name).ok_or(TrackerError::InvalidInput("name is blank"))?;
        let world = normalize_label(world).ok_or(TrackerError::InvalidInput("world is blank"))?;

        let existing = self.db.with_conn(|conn| {
            SqliteCharacterRepository::new(conn).find_by_name(name.as_str(), world.as_str())
        })?;
        if let Some(existing) = existing {
            return Err(TrackerError::DuplicateCharacter {
                name: existing.name,
                world: existing.world,
            });
        }

        let id = Uuid::new_v4();
        let seed = match self.source.acquire(name.as_str(), world.as_str()).await {
            Ok(input) => input.into_snapshot(id)?,
            Err(err) => {
                warn!(
                    "event=character_register module=registry status=error character_id={id} error_code=acquisition_error error={err}"
                );
                return Err(err.into());
            }
        };

        let row = CharacterRow {
            id,
            name,
            world,
            // Stored as epoch millis.
            created_at: Utc::now().trunc_subsecs(3),
        };
        let record = self
            .db
            .with_conn(|conn| -> RepoResult<CharacterRecord> {
                let tx = conn.transaction()?;
                SqliteCharacterRepository::new(&tx).insert(&row)?;
                SqliteHistoryStore::new(&tx).append(id, &seed)?;
                tx.commit()?;
                Ok(CharacterRecord {
                    id: row.id,
                    name: row.name,
                    world: row.world,
                    created_at: row.created_at,
                    latest: seed,
                })
            })?;

        info!("event=character_register module=registry status=ok character_id={id}");
        Ok(record)
    }

    /// Gets one record with its latest snapshot.
    pub fn get(&self, id: CharacterId) -> TrackerResult<CharacterRecord> {
        self.db
            .with_conn(|conn| SqliteCharacterRepository::new(conn).get(id))?
            .ok_or(TrackerError::NotFound(id))
    }

    /// Lists all records as they are at call time.
    ///
    /// Later registrations, refreshes or removals do not affect the returned
    /// sequence.
    pub fn list(&self) -> TrackerResult<impl Iterator<Item = CharacterRecord>> {
        let records = self
            .db
            .with_conn(|conn| SqliteCharacterRepository::new(conn).list())?;
        Ok(records.into_iter())
    }

    /// Returns a record together with its full ascending history.
    pub fn detail(
        &self,
        id: CharacterId,
    ) -> TrackerResult<(CharacterRecord, Vec<CharacterSnapshot>)> {
        let (record, history) = self.db.with_conn(|conn| -> RepoResult<_> {
            let record = SqliteCharacterRepository::new(conn)
                .get(id)?
                .ok_or(RepoError::NotFound(id))?;
            let history = SqliteHistoryStore::new(conn).all(id)?;
            Ok((record, history))
        })?;
        Ok((record, history))
    }

    /// Returns snapshots observed at or after `from`, ascending.
    pub fn history_since(
        &self,
        id: CharacterId,
        from: DateTime<Utc>,
    ) -> TrackerResult<Vec<CharacterSnapshot>> {
        let history = self.db.with_conn(|conn| -> RepoResult<_> {
            if SqliteCharacterRepository::new(conn).get(id)?.is_none() {
                return Err(RepoError::NotFound(id));
            }
            SqliteHistoryStore::new(conn).since(id, from)
        })?;
        Ok(history)
    }

    /// Removes a record and its whole history.
    pub fn remove(&self, id: CharacterId) -> TrackerResult<()> {
        let removed_snapshots = self.db.with_conn(|conn| -> RepoResult<usize> {
            let tx = conn.transaction()?;
            let removed = SqliteHistoryStore::new(&tx).delete_all(id)?;
            SqliteCharacterRepository::new(&tx).delete(id)?;
            tx.commit()?;
            Ok(removed)
        })?;

        info!(
            "event=character_remove module=registry status=ok character_id={id} snapshots={removed_snapshots}"
        );
        Ok(())
    }

    /// Appends an acquired snapshot to an existing character.
    ///
    /// Fails with `NotFound` when the character was removed meanwhile and
    /// with `StaleData` when the history rejects the snapshot.
    pub(crate) fn commit_snapshot(
        &self,
        id: CharacterId,
        snapshot: CharacterSnapshot,
    ) -> TrackerResult<CharacterRecord> {
        let record = self.db.with_conn(|conn| -> RepoResult<CharacterRecord> {
            let tx = conn.transaction()?;
            let current = SqliteCharacterRepository::new(&tx)
                .get(id)?
                .ok_or(RepoError::NotFound(id))?;
            SqliteHistoryStore::new(&tx).append(id, &snapshot)?;
            tx.commit()?;
            Ok(CharacterRecord {
                latest: snapshot,
                ..current
            })
        })?;
        Ok(record)
    }
}
