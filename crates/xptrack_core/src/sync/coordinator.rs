//! Per-character refresh coordination.
//!
//! # Responsibility
//! - Run at most one acquisition per character at a time.
//! - Hand the outcome of that acquisition to every concurrent caller.
//! - Commit acquired snapshots through the registry.
//!
//! # Invariants
//! - State per character moves `Idle -> Syncing -> Idle` on success or stale
//!   data and `Idle -> Syncing -> Failed` on a fatal error. `Failed` holds
//!   until the next refresh of that character starts.
//! - The in-flight map lock guards map access only; it is never held while
//!   acquiring or while waiting on a refresh.
//! - A refresh is spawned onto the runtime, so dropping every waiter does not
//!   cancel it.
//!
//! # See also
//! - `service::registry` for the commit transaction.

use crate::error::{TrackerError, TrackerResult};
use crate::model::character::CharacterRecord;
use crate::model::snapshot::CharacterId;
use crate::service::registry::CharacterRegistry;
use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

type SharedRefresh = Shared<BoxFuture<'static, TrackerResult<CharacterRecord>>>;
type SharedSlots = Arc<Mutex<Slots>>;

/// Refresh state of one character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// No refresh in flight.
    Idle,
    /// An acquisition is running.
    Syncing,
    /// The last refresh failed; cleared when the next one starts.
    Failed,
}

#[derive(Default)]
struct Slots {
    in_flight: HashMap<CharacterId, SharedRefresh>,
    failed: HashSet<CharacterId>,
}

/// Outcome summary of [`SyncCoordinator::refresh_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Characters that gained a new snapshot.
    pub refreshed: Vec<CharacterId>,
    /// Characters whose acquired data was stale or malformed; prior state kept.
    pub unchanged: Vec<CharacterId>,
    /// Characters whose refresh failed.
    pub failed: Vec<(CharacterId, TrackerError)>,
}

impl RefreshReport {
    pub fn total(&self) -> usize {
        self.refreshed.len() + self.unchanged.len() + self.failed.len()
    }
}

/// Coordinates refreshes over a shared registry.
///
/// Must be used from within a Tokio runtime.
pub struct SyncCoordinator {
    registry: Arc<CharacterRegistry>,
    slots: SharedSlots,
    pacing: Duration,
}

impl SyncCoordinator {
    /// Creates a coordinator. `pacing` is the pause between upstream calls
    /// made by [`SyncCoordinator::refresh_all`].
    pub fn new(registry: Arc<CharacterRegistry>, pacing: Duration) -> Self {
        Self {
            registry,
            slots: Arc::new(Mutex::new(Slots::default())),
            pacing,
        }
    }

    /// Refreshes one character from the acquisition source.
    ///
    /// Joins the running refresh when one is already in flight for `id`.
    ///
    /// # Errors
    /// - `NotFound` when the character is unknown or removed before commit.
    /// - `Acquisition` when the source fails; history is untouched.
    /// - `InvalidSnapshot` / `StaleData` when the acquired data is rejected;
    ///   the stored latest snapshot is unchanged.
    pub async fn refresh(&self, id: CharacterId) -> TrackerResult<CharacterRecord> {
        let refresh = match self.join_in_flight(id) {
            Some(refresh) => refresh,
            None => self.start(id)?,
        };
        refresh.await
    }

    /// Refreshes every registered character, one after another.
    ///
    /// Sleeps the configured pacing between upstream calls. A failure for one
    /// character is recorded in the report and never aborts the batch.
    pub async fn refresh_all(&self) -> TrackerResult<RefreshReport> {
        let started_at = Instant::now();
        let ids: Vec<CharacterId> = self.registry.list()?.map(|record| record.id).collect();
        info!(
            "event=refresh_all module=sync status=start characters={}",
            ids.len()
        );

        let mut report = RefreshReport::default();
        for (index, id) in ids.into_iter().enumerate() {
            if index > 0 && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
            match self.refresh(id).await {
                Ok(_) => report.refreshed.push(id),
                // Removed while the batch was running.
                Err(TrackerError::NotFound(_)) => {}
                Err(err) if !err.is_fatal() => report.unchanged.push(id),
                Err(err) => report.failed.push((id, err)),
            }
        }

        info!(
            "event=refresh_all module=sync status=ok duration_ms={} refreshed={} unchanged={} failed={}",
            started_at.elapsed().as_millis(),
            report.refreshed.len(),
            report.unchanged.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Returns the current refresh state of `id`.
    pub fn state(&self, id: CharacterId) -> SyncState {
        let slots = lock(&self.slots);
        if slots.in_flight.contains_key(&id) {
            SyncState::Syncing
        } else if slots.failed.contains(&id) {
            SyncState::Failed
        } else {
            SyncState::Idle
        }
    }

    /// Returns how many characters currently have a refresh in flight.
    pub fn in_flight_count(&self) -> usize {
        lock(&self.slots).in_flight.len()
    }

    fn join_in_flight(&self, id: CharacterId) -> Option<SharedRefresh> {
        let refresh = lock(&self.slots).in_flight.get(&id).cloned();
        if refresh.is_some() {
            debug!("event=character_sync module=sync status=joined character_id={id}");
        }
        refresh
    }

    fn start(&self, id: CharacterId) -> TrackerResult<SharedRefresh> {
        let record = self.registry.get(id)?;

        let mut slots = lock(&self.slots);
        // Another caller may have started while the record was loading.
        if let Some(refresh) = slots.in_flight.get(&id) {
            return Ok(refresh.clone());
        }

        let task = tokio::spawn(run_refresh(
            Arc::clone(&self.registry),
            Arc::clone(&self.slots),
            record,
        ));
        let refresh = async move {
            task.await.unwrap_or_else(|join_err| {
                Err(TrackerError::Storage(format!(
                    "refresh task aborted: {join_err}"
                )))
            })
        }
        .boxed()
        .shared();

        slots.failed.remove(&id);
        slots.in_flight.insert(id, refresh.clone());
        Ok(refresh)
    }
}

async fn run_refresh(
    registry: Arc<CharacterRegistry>,
    slots: SharedSlots,
    record: CharacterRecord,
) -> TrackerResult<CharacterRecord> {
    let id = record.id;
    let started_at = Instant::now();
    info!("event=character_sync module=sync status=start character_id={id}");

    let outcome = acquire_and_commit(&registry, &record).await;
    let duration_ms = started_at.elapsed().as_millis();

    let mut guard = lock(&slots);
    match &outcome {
        Ok(updated) => info!(
            "event=character_sync module=sync status=ok character_id={id} duration_ms={duration_ms} level={} experience={}",
            updated.latest.level, updated.latest.experience
        ),
        Err(err) if !err.is_fatal() => info!(
            "event=character_sync module=sync status=stale character_id={id} duration_ms={duration_ms} error_code={} error={err}",
            err.code()
        ),
        Err(err) => {
            guard.failed.insert(id);
            warn!(
                "event=character_sync module=sync status=error character_id={id} duration_ms={duration_ms} error_code={} error={err}",
                err.code()
            );
        }
    }
    guard.in_flight.remove(&id);
    drop(guard);

    outcome
}

async fn acquire_and_commit(
    registry: &CharacterRegistry,
    record: &CharacterRecord,
) -> TrackerResult<CharacterRecord> {
    let input = registry
        .source()
        .acquire(record.name.as_str(), record.world.as_str())
        .await?;
    let snapshot = input.into_snapshot(record.id)?;
    registry.commit_snapshot(record.id, snapshot)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
