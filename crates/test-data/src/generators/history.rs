//! Whole training histories written as an athlete's activity directory.

use std::{fs, path::Path};

use planner::activity::{ActivityMeta, AthleteAttributes, Source};
use rand::{Rng, SeedableRng, rngs::StdRng};
use thiserror::Error;
use time::{Date, Duration, Time, macros::format_description};
use tracing::{debug, info};

use super::activity::{ActivityGenerator, SessionPlan};
use crate::{
    config::SeedConfig,
    profiles::{AthleteProfile, CyclistProfile, RunnerProfile},
    terrain::ElevationGenerator,
};

#[derive(Error, Debug)]
pub enum SeedError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Time formatting error: {0}")]
    Format(#[from] time::error::Format),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSport {
    Run,
    Ride,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedSession {
    pub sport: SessionSport,
    pub plan: SessionPlan,
}

/// What [`HistoryGenerator::write`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistorySummary {
    pub runs: usize,
    pub rides: usize,
    pub first_day: Option<Date>,
    pub last_day: Option<Date>,
}

impl HistorySummary {
    pub fn activities(&self) -> usize {
        self.runs + self.rides
    }
}

/// Plans and writes a synthetic history for one athlete.
pub struct HistoryGenerator {
    config: SeedConfig,
    runner: RunnerProfile,
    cyclist: CyclistProfile,
}

impl HistoryGenerator {
    pub fn new(config: SeedConfig) -> Self {
        Self {
            config,
            runner: RunnerProfile::default(),
            cyclist: CyclistProfile::default(),
        }
    }

    pub fn config(&self) -> &SeedConfig {
        &self.config
    }

    /// Chooses session days, sports, durations and intensities.
    ///
    /// The first and last day of every block always hold a session, so each
    /// block spans exactly `block_days`.
    pub fn plan(&self) -> Vec<PlannedSession> {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let daily = (self.config.sessions_per_week / 7.0).clamp(0.0, 1.0);

        let mut sessions = Vec::new();
        for block in 0..self.config.blocks {
            let block_start =
                self.config.first_day + Duration::days((block * self.config.block_stride()) as i64);
            for day in 0..self.config.block_days {
                let edge = day == 0 || day + 1 == self.config.block_days;
                if !edge && !rng.gen_bool(daily) {
                    continue;
                }
                let date = block_start + Duration::days(day as i64);
                sessions.push(self.session(date, &mut rng));
            }
        }
        sessions
    }

    fn session(&self, date: Date, rng: &mut StdRng) -> PlannedSession {
        let sport = if rng.gen_bool(self.config.run_share.clamp(0.0, 1.0)) {
            SessionSport::Run
        } else {
            SessionSport::Ride
        };
        let minutes: usize = match sport {
            SessionSport::Run => rng.gen_range(30..=75),
            SessionSport::Ride => rng.gen_range(45..=150),
        };
        let hour = rng.gen_range(6..=18);
        let start = date
            .with_time(Time::from_hms(hour, 0, 0).unwrap_or(Time::MIDNIGHT))
            .assume_utc();

        PlannedSession {
            sport,
            plan: SessionPlan {
                start,
                seconds: minutes * 60,
                intensity: rng.gen_range(0.6..0.95),
            },
        }
    }

    fn profile(&self, sport: SessionSport) -> &dyn AthleteProfile {
        match sport {
            SessionSport::Run => &self.runner,
            SessionSport::Ride => &self.cyclist,
        }
    }

    /// Writes every planned session into `dir` as a native records file plus
    /// its metadata.
    pub fn write(&self, dir: &Path) -> Result<HistorySummary, SeedError> {
        fs::create_dir_all(dir)?;
        let sessions = self.plan();
        let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(1));
        let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

        let mut summary = HistorySummary {
            runs: 0,
            rides: 0,
            first_day: None,
            last_day: None,
        };

        for (i, session) in sessions.iter().enumerate() {
            let terrain = match session.sport {
                SessionSport::Run => ElevationGenerator::new(i as u32),
                SessionSport::Ride => ElevationGenerator::hilly(i as u32),
            };
            let profile = self.profile(session.sport);
            let data = ActivityGenerator::new(profile, &terrain).generate(&session.plan, &mut rng);

            let stem = format!(
                "{}_{}",
                session.plan.start.date(),
                session.plan.start.unix_timestamp()
            );
            let source_file = format!("{stem}.records.json");
            fs::write(dir.join(&source_file), serde_json::to_vec(&data)?)?;

            let name = match session.sport {
                SessionSport::Run => "Run",
                SessionSport::Ride => "Ride",
            };
            let meta = ActivityMeta {
                source: Source::File,
                source_file: Some(source_file),
                name: Some(format!("{name} {}", i + 1)),
                start_time_gmt: Some(session.plan.start.format(format)?),
                athlete: Some(AthleteAttributes {
                    height: self.config.height,
                    weight: self.config.weight,
                }),
                ..ActivityMeta::default()
            };
            fs::write(
                dir.join(format!("{stem}.json")),
                serde_json::to_vec_pretty(&meta)?,
            )?;
            debug!("Wrote {stem} ({name}, {} s)", session.plan.seconds);

            match session.sport {
                SessionSport::Run => summary.runs += 1,
                SessionSport::Ride => summary.rides += 1,
            }
            let date = session.plan.start.date();
            summary.first_day = Some(summary.first_day.map_or(date, |d| d.min(date)));
            summary.last_day = Some(summary.last_day.map_or(date, |d| d.max(date)));
        }

        info!(
            "Wrote {} runs and {} rides to {}",
            summary.runs,
            summary.rides,
            dir.display()
        );
        Ok(summary)
    }
}
