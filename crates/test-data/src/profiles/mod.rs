//! Athletic performance profiles.
//!
//! Profiles turn a session intensity and the terrain grade into speed, heart
//! rate, cadence and (for cyclists) power.

mod cyclist;
mod runner;

pub use cyclist::CyclistProfile;
pub use runner::RunnerProfile;

/// Trait for athletic performance profiles.
///
/// Intensity is a fraction of threshold effort: `1.0` is what the athlete can
/// hold for about an hour.
pub trait AthleteProfile: Send + Sync {
    /// Sport name as it appears in activity summaries.
    fn sport(&self) -> &'static str;

    /// Speed at threshold on flat terrain in meters per second.
    fn base_speed_mps(&self) -> f64;

    /// Speed multiplier for a given grade (expressed as a fraction, e.g., 0.05 = 5% grade).
    fn grade_factor(&self, grade: f64) -> f64;

    /// Day-to-day performance variance as a coefficient of variation.
    fn variance(&self) -> f64;

    /// Steady-state cadence in steps or revolutions per minute.
    fn cadence(&self) -> f64;

    /// Steady-state heart rate at `intensity`.
    fn heart_rate(&self, intensity: f64) -> f64 {
        (60.0 + 110.0 * intensity).clamp(60.0, 195.0)
    }

    /// Power at `intensity` and `grade`, for sports ridden with a power meter.
    fn power(&self, _intensity: f64, _grade: f64) -> Option<f64> {
        None
    }
}

/// Speed at `intensity` on the given grade.
pub fn speed_at_grade(profile: &dyn AthleteProfile, grade: f64, intensity: f64) -> f64 {
    let target = profile.base_speed_mps() * profile.grade_factor(grade) * intensity;
    target.max(0.5)
}

/// Samples a day-form multiplier around 1.0.
pub fn sample_variance(profile: &dyn AthleteProfile, rng: &mut impl rand::Rng) -> f64 {
    use rand_distr::{Distribution, Normal};

    match Normal::new(1.0, profile.variance()) {
        Ok(normal) if profile.variance() > 0.0 => normal.sample(rng).clamp(0.8, 1.2),
        _ => 1.0,
    }
}
