//! Configuration types for synthetic athlete histories.

use serde::{Deserialize, Serialize};
use time::{Date, macros::date};

/// Shape of a generated training history.
///
/// Training happens in blocks of `block_days` consecutive days separated by
/// `break_days` without any activity, so the season detector has obvious
/// gaps to split at.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// Athlete directory name under the data root.
    pub athlete: String,

    /// Seed for every random choice; equal seeds give equal histories.
    pub seed: u64,

    /// First day of the first block.
    pub first_day: Date,

    /// Number of training blocks.
    pub blocks: usize,

    /// Length of each block in days.
    pub block_days: usize,

    /// Rest between blocks in days.
    pub break_days: usize,

    /// Average number of sessions per week inside a block.
    pub sessions_per_week: f64,

    /// Fraction of sessions that are runs; the rest are rides.
    pub run_share: f64,

    /// Meters.
    pub height: f64,

    /// Kilograms.
    pub weight: f64,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            athlete: "athlete".to_string(),
            seed: 12345,
            first_day: date!(2023 - 01 - 02),
            blocks: 4,
            block_days: 84,
            break_days: 45,
            sessions_per_week: 4.0,
            run_share: 0.5,
            height: 1.78,
            weight: 70.0,
        }
    }
}

impl SeedConfig {
    /// A short history for tests: three four-week blocks a month apart.
    pub fn small() -> Self {
        Self {
            blocks: 3,
            block_days: 28,
            break_days: 30,
            sessions_per_week: 3.0,
            ..Self::default()
        }
    }

    /// Days from the start of one block to the start of the next.
    pub fn block_stride(&self) -> usize {
        self.block_days + self.break_days
    }
}
