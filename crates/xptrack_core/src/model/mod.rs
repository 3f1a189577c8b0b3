//! Domain model for tracked characters and their observed progression.
//!
//! # Responsibility
//! - Define the immutable snapshot shape appended to a character history.
//! - Define the record projection returned to presentation callers.
//!
//! # Invariants
//! - Every character is identified by a stable `CharacterId`.
//! - Snapshots are values: once appended they are never mutated or deleted
//!   individually, only together with their character.

pub mod character;
pub mod snapshot;
