//! Shared fixtures for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use xptrack_core::{
    open_db_in_memory, AcquisitionError, CharacterSnapshotInput, CharacterSource, Database,
    TrackerConfig, TrackerService,
};

/// Acquisition source that replays queued responses in order.
pub struct ScriptedSource {
    responses: Mutex<VecDeque<Result<CharacterSnapshotInput, AcquisitionError>>>,
    calls: AtomicUsize,
    delay: std::time::Duration,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::with_delay(std::time::Duration::ZERO)
    }

    pub fn with_delay(delay: std::time::Duration) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            delay,
        }
    }

    pub fn push_ok(&self, input: CharacterSnapshotInput) {
        self.responses.lock().unwrap().push_back(Ok(input));
    }

    pub fn push_err(&self, err: AcquisitionError) {
        self.responses.lock().unwrap().push_back(Err(err));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CharacterSource for ScriptedSource {
    async fn acquire(
        &self,
        _name: &str,
        _world: &str,
    ) -> Result<CharacterSnapshotInput, AcquisitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AcquisitionError::Unavailable("script exhausted".to_string())))
    }
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// Observation `hours` after [`base_time`].
pub fn observation(hours: i64, level: i64, experience: i64, deaths: i64) -> CharacterSnapshotInput {
    observed_at(base_time() + Duration::hours(hours), level, experience, deaths)
}

pub fn observed_at(
    at: DateTime<Utc>,
    level: i64,
    experience: i64,
    deaths: i64,
) -> CharacterSnapshotInput {
    CharacterSnapshotInput {
        observed_at: at,
        level,
        experience,
        deaths,
        vocation: "Master Sorcerer".to_string(),
        world: "San".to_string(),
    }
}

/// Service over a fresh in-memory database with no refresh pacing.
pub fn service(source: Arc<ScriptedSource>) -> TrackerService {
    let config = TrackerConfig {
        refresh_pacing: std::time::Duration::ZERO,
        ..TrackerConfig::default()
    };
    service_with_config(source, &config)
}

pub fn service_with_config(source: Arc<ScriptedSource>, config: &TrackerConfig) -> TrackerService {
    let db = Database::new(open_db_in_memory().unwrap());
    TrackerService::with_config(db, source, config)
}
