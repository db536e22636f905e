//! Runner athletic profile.

use super::AthleteProfile;

/// Athletic profile for running activities.
///
/// Threshold pace defaults to ~5:00/km, close to the critical velocity the
/// stress score assumes.
#[derive(Debug, Clone)]
pub struct RunnerProfile {
    threshold_speed: f64,
    variance: f64,
}

impl Default for RunnerProfile {
    fn default() -> Self {
        Self {
            threshold_speed: 3.35,
            variance: 0.05,
        }
    }
}

impl RunnerProfile {
    /// Creates a runner holding `pace_min_per_km` at threshold.
    pub fn with_pace(pace_min_per_km: f64) -> Self {
        Self {
            threshold_speed: 1000.0 / (pace_min_per_km * 60.0),
            ..Default::default()
        }
    }
}

impl AthleteProfile for RunnerProfile {
    fn sport(&self) -> &'static str {
        "running"
    }

    fn base_speed_mps(&self) -> f64 {
        self.threshold_speed
    }

    fn grade_factor(&self, grade: f64) -> f64 {
        if grade >= 0.0 {
            (1.0 - grade * 6.0).max(0.4)
        } else {
            (1.0 - grade * 3.0).min(1.3)
        }
    }

    fn variance(&self) -> f64 {
        self.variance
    }

    fn cadence(&self) -> f64 {
        84.0
    }
}
