//! Generators for synthetic athlete data.
//!
//! - [`ActivityGenerator`]: one session as 1 Hz records
//! - [`HistoryGenerator`]: blocks of sessions written to an activity directory

pub mod activity;
pub mod history;

pub use activity::{ActivityGenerator, SessionPlan};
pub use history::{HistoryGenerator, HistorySummary, PlannedSession, SeedError, SessionSport};
