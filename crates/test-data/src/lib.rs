//! Synthetic athlete histories for the planner.
//!
//! Generates 1 Hz run and ride recordings over Perlin-noise terrain and
//! writes them, with their metadata, in the layout the planner loads.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_data::prelude::*;
//!
//! let summary = HistoryGenerator::new(SeedConfig::small()).write(&activities_dir)?;
//! ```

pub mod config;
pub mod generators;
pub mod profiles;
pub mod terrain;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::config::SeedConfig;
    pub use crate::generators::{
        ActivityGenerator, HistoryGenerator, HistorySummary, PlannedSession, SeedError,
        SessionPlan, SessionSport,
    };
    pub use crate::profiles::{
        AthleteProfile, CyclistProfile, RunnerProfile, sample_variance, speed_at_grade,
    };
    pub use crate::terrain::ElevationGenerator;
}
