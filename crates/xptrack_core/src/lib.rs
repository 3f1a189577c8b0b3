//! Core domain logic for the character progression tracker.
//! This crate is the single source of truth for history and sync invariants.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod repo;
pub mod service;
pub mod sync;

pub use config::{ConfigError, LogConfig, TrackerConfig};
pub use db::{open_db, open_db_in_memory, Database, DbError};
pub use error::{TrackerError, TrackerResult};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status, LoggingError};
pub use metrics::{
    daily_experience, trend, DerivedMetrics, MetricsError, SnapshotDelta, TrendField,
};
pub use model::character::CharacterRecord;
pub use model::snapshot::{
    CharacterId, CharacterSnapshot, CharacterSnapshotInput, SnapshotValidationError,
};
pub use repo::history_repo::{HistoryStore, SqliteHistoryStore};
pub use repo::{RepoError, RepoResult, SnapshotRejection};
pub use service::registry::CharacterRegistry;
pub use service::tracker_service::{CharacterDetail, TrackerService};
pub use sync::coordinator::{RefreshReport, SyncCoordinator, SyncState};
pub use sync::source::{AcquisitionError, CharacterSource};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
