//! 1 Hz activity recordings.

use planner::records::{ActivityData, ActivityTotals, Records, SportSummary, Summaries};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use time::OffsetDateTime;

use crate::{
    profiles::{AthleteProfile, sample_variance, speed_at_grade},
    terrain::{ElevationGenerator, add_elevation_jitter},
};

/// One planned session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPlan {
    pub start: OffsetDateTime,
    pub seconds: usize,
    /// Fraction of threshold effort.
    pub intensity: f64,
}

/// Generates the recorded data of a session for one athlete profile.
pub struct ActivityGenerator<'a> {
    profile: &'a dyn AthleteProfile,
    terrain: &'a ElevationGenerator,
}

impl<'a> ActivityGenerator<'a> {
    pub fn new(profile: &'a dyn AthleteProfile, terrain: &'a ElevationGenerator) -> Self {
        Self { profile, terrain }
    }

    /// Simulates `plan` second by second.
    ///
    /// Speed follows the terrain grade with a little sample noise; heart rate
    /// drifts towards its steady state with a 30 s lag.
    pub fn generate(&self, plan: &SessionPlan, rng: &mut impl Rng) -> ActivityData {
        let form = sample_variance(self.profile, rng);
        let noise = Normal::new(0.0, 0.03).ok();

        let mut distance = Vec::with_capacity(plan.seconds);
        let mut speed = Vec::with_capacity(plan.seconds);
        let mut altitude = Vec::with_capacity(plan.seconds);
        let mut heartrate = Vec::with_capacity(plan.seconds);
        let mut cadence = Vec::with_capacity(plan.seconds);
        let mut power = Vec::with_capacity(plan.seconds);

        let intensity = plan.intensity * form;
        let mut travelled = 0.0;
        let mut hr = 70.0;
        for _ in 0..plan.seconds {
            let wobble = noise.map_or(0.0, |n| n.sample(rng));
            let grade = self.terrain.grade_at(travelled);

            let v = speed_at_grade(self.profile, grade, intensity) * (1.0 + wobble);
            hr += (self.profile.heart_rate(intensity) - hr) / 30.0;

            distance.push(Some(travelled));
            speed.push(Some(v));
            altitude.push(Some(add_elevation_jitter(
                self.terrain.elevation_at(travelled),
                rng,
                0.3,
            )));
            heartrate.push(Some(hr.round()));
            cadence.push(Some((self.profile.cadence() * (1.0 + wobble / 2.0)).round()));
            power.push(
                self.profile
                    .power(intensity, grade)
                    .map(|p| (p * (1.0 + wobble)).max(0.0).round()),
            );
            travelled += v;
        }

        let mut records = Records::with_seconds(Some(plan.start), plan.seconds);
        records.insert_numeric("distance", distance);
        records.insert_numeric("speed", speed);
        records.insert_numeric("altitude", altitude);
        records.insert_numeric("heartrate", heartrate);
        records.insert_numeric("cadence", cadence);
        if power.iter().any(Option::is_some) {
            records.insert_numeric("power", power);
        }

        ActivityData {
            records,
            summaries: Summaries {
                activity: Some(ActivityTotals {
                    total_timer_time: Some(plan.seconds as f64),
                }),
                sports: vec![SportSummary {
                    sport: self.profile.sport().to_string(),
                    sub_sport: None,
                    name: None,
                }],
                ..Summaries::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};
    use time::macros::datetime;

    use super::*;
    use crate::profiles::{CyclistProfile, RunnerProfile};

    fn plan(seconds: usize) -> SessionPlan {
        SessionPlan {
            start: datetime!(2024-03-01 07:00:00 UTC),
            seconds,
            intensity: 0.8,
        }
    }

    #[test]
    fn test_run_has_no_power_column() {
        let terrain = ElevationGenerator::flat(1);
        let profile = RunnerProfile::default();
        let data = ActivityGenerator::new(&profile, &terrain)
            .generate(&plan(600), &mut StdRng::seed_from_u64(1));

        assert_eq!(data.records.len(), 600);
        assert!(!data.records.has_column("power"));
        assert_eq!(data.summaries.sports[0].sport, "running");

        let distance = data.records.numeric("distance").unwrap();
        assert!(distance.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_ride_carries_power_near_target() {
        let terrain = ElevationGenerator::flat(1);
        let profile = CyclistProfile::with_ftp(250.0);
        let data = ActivityGenerator::new(&profile, &terrain)
            .generate(&plan(1200), &mut StdRng::seed_from_u64(2));

        let power = data.records.numeric("power").unwrap();
        let mean = power.iter().flatten().sum::<f64>() / power.len() as f64;
        assert!((140.0..260.0).contains(&mean), "mean power {mean}");
    }

    #[test]
    fn test_same_seed_same_recording() {
        let terrain = ElevationGenerator::new(5);
        let profile = RunnerProfile::default();
        let generator = ActivityGenerator::new(&profile, &terrain);
        let a = generator.generate(&plan(300), &mut StdRng::seed_from_u64(9));
        let b = generator.generate(&plan(300), &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }
}
