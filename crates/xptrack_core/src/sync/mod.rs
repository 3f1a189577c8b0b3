//! Character refresh orchestration.
//!
//! # Responsibility
//! - Define the acquisition collaborator contract (`CharacterSource`).
//! - Coordinate refreshes so each character has at most one acquisition in
//!   flight, while different characters refresh independently.
//!
//! # Invariants
//! - A failed refresh never mutates history.
//! - Started acquisitions always run to completion, even when every caller
//!   stops waiting.

pub mod coordinator;
pub mod source;
