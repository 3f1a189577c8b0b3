//! Tracker use-case facade for presentation callers.
//!
//! # Responsibility
//! - Expose list/detail/add/refresh/remove entry points over one registry and
//!   one sync coordinator.
//! - Attach derived metrics to detail reads.
//!
//! # Invariants
//! - All refreshes go through the coordinator, never around it.
//! - Derived metrics are computed per read and never stored.

use crate::config::TrackerConfig;
use crate::db::Database;
use crate::error::{TrackerError, TrackerResult};
use crate::metrics::{self, DerivedMetrics};
use crate::model::character::CharacterRecord;
use crate::model::snapshot::{CharacterId, CharacterSnapshot};
use crate::service::registry::CharacterRegistry;
use crate::sync::coordinator::{RefreshReport, SyncCoordinator};
use crate::sync::source::CharacterSource;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Full detail view of one character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterDetail {
    pub record: CharacterRecord,
    /// Full history, ascending by `observed_at`.
    pub history: Vec<CharacterSnapshot>,
    pub metrics: DerivedMetrics,
}

/// Entry point used by UI, CLI and scheduler hosts.
pub struct TrackerService {
    registry: Arc<CharacterRegistry>,
    coordinator: SyncCoordinator,
    history_window_days: u32,
}

impl TrackerService {
    /// Creates a service with default configuration values.
    pub fn new(db: Database, source: Arc<dyn CharacterSource>) -> Self {
        Self::with_config(db, source, &TrackerConfig::default())
    }

    /// Creates a service using pacing and window settings from `config`.
    pub fn with_config(
        db: Database,
        source: Arc<dyn CharacterSource>,
        config: &TrackerConfig,
    ) -> Self {
        let registry = Arc::new(CharacterRegistry::new(db, source));
        let coordinator = SyncCoordinator::new(Arc::clone(&registry), config.refresh_pacing);
        Self {
            registry,
            coordinator,
            history_window_days: config.history_window_days,
        }
    }

    pub fn registry(&self) -> &CharacterRegistry {
        &self.registry
    }

    pub fn coordinator(&self) -> &SyncCoordinator {
        &self.coordinator
    }

    /// Lists all tracked characters.
    pub fn list_characters(&self) -> TrackerResult<Vec<CharacterRecord>> {
        Ok(self.registry.list()?.collect())
    }

    /// Returns record, full history and metrics for one character.
    pub fn character_detail(&self, id: CharacterId) -> TrackerResult<CharacterDetail> {
        let (record, history) = self.registry.detail(id)?;
        let metrics = metrics::derive(&history, Utc::now()).map_err(|_| {
            TrackerError::Storage(format!("character {id} has an empty history"))
        })?;
        Ok(CharacterDetail {
            record,
            history,
            metrics,
        })
    }

    /// Returns snapshots observed within the last `days` days.
    ///
    /// `None` uses the configured default window. A window reaching past the
    /// earliest representable time returns the whole history.
    pub fn character_history(
        &self,
        id: CharacterId,
        days: Option<u32>,
    ) -> TrackerResult<Vec<CharacterSnapshot>> {
        let days = days.unwrap_or(self.history_window_days);
        let from = Utc::now()
            .checked_sub_signed(Duration::days(i64::from(days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.registry.history_since(id, from)
    }

    /// Starts tracking a character.
    pub async fn add_character(&self, name: &str, world: &str) -> TrackerResult<CharacterRecord> {
        self.registry.register(name, world).await
    }

    /// Refreshes one character from the acquisition source.
    pub async fn refresh_character(&self, id: CharacterId) -> TrackerResult<CharacterRecord> {
        self.coordinator.refresh(id).await
    }

    /// Refreshes every tracked character with configured pacing.
    pub async fn refresh_all(&self) -> TrackerResult<RefreshReport> {
        self.coordinator.refresh_all().await
    }

    /// Stops tracking a character and erases its history.
    pub fn remove_character(&self, id: CharacterId) -> TrackerResult<()> {
        self.registry.remove(id)
    }
}
