//! Character record projection.
//!
//! # Responsibility
//! - Define the record returned by registry and service reads.
//! - Normalize user-supplied names and worlds before they reach storage.
//!
//! # Invariants
//! - `name` and `world` are non-blank and never change after registration.
//! - `latest` is resolved from the character history on every read; records
//!   never persist their own copy of progression fields.

use crate::model::snapshot::{CharacterId, CharacterSnapshot};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Current-state projection of one tracked character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterRecord {
    pub id: CharacterId,
    pub name: String,
    pub world: String,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Most recent snapshot in the character history.
    pub latest: CharacterSnapshot,
}

impl CharacterRecord {
    pub fn level(&self) -> u32 {
        self.latest.level
    }

    pub fn experience(&self) -> u64 {
        self.latest.experience
    }

    pub fn vocation(&self) -> &str {
        &self.latest.vocation
    }

    /// When the character was last observed upstream.
    pub fn last_updated(&self) -> DateTime<Utc> {
        self.latest.observed_at
    }
}

/// Normalizes a character name or world label.
///
/// Trims both ends and collapses inner whitespace runs into one space.
/// Returns `None` when nothing is left.
pub fn normalize_label(value: &str) -> Option<String> {
    let collapsed = WHITESPACE_RE.replace_all(value.trim(), " ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed.into_owned())
    }
}
