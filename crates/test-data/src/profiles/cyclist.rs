//! Cyclist athletic profile.

use super::AthleteProfile;

/// Athletic profile for cycling activities, riding with a power meter.
#[derive(Debug, Clone)]
pub struct CyclistProfile {
    /// Functional threshold power in watts.
    ftp: f64,
    base_speed: f64,
    variance: f64,
}

impl Default for CyclistProfile {
    fn default() -> Self {
        Self {
            ftp: 250.0,
            base_speed: 9.0,
            variance: 0.07,
        }
    }
}

impl CyclistProfile {
    pub fn with_ftp(ftp: f64) -> Self {
        Self {
            ftp,
            ..Default::default()
        }
    }

    pub fn ftp(&self) -> f64 {
        self.ftp
    }
}

impl AthleteProfile for CyclistProfile {
    fn sport(&self) -> &'static str {
        "cycling"
    }

    fn base_speed_mps(&self) -> f64 {
        self.base_speed
    }

    fn grade_factor(&self, grade: f64) -> f64 {
        if grade >= 0.0 {
            (1.0 - grade * 12.0).max(0.25)
        } else {
            (1.0 - grade * 8.0).min(1.8)
        }
    }

    fn variance(&self) -> f64 {
        self.variance
    }

    fn cadence(&self) -> f64 {
        88.0
    }

    fn power(&self, intensity: f64, grade: f64) -> Option<f64> {
        // Climbs are ridden a little harder, descents mostly coasted.
        let terrain = (1.0 + grade * 4.0).clamp(0.1, 1.3);
        Some(self.ftp * intensity * terrain)
    }
}
