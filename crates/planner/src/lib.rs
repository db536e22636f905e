pub mod activity;
pub mod athlete;
pub mod cache;
pub mod config;
pub mod errors;
pub mod file_parsers;
pub mod metrics;
pub mod records;
pub mod workouts;

use time::{Date, OffsetDateTime};
use tracing::info;

pub use crate::{
    activity::{Activity, ActivityMeta},
    athlete::{Athlete, DayValue, PmcDay, Reduction},
    config::PlannerConfig,
    errors::{MetricError, PlannerError, Result},
    metrics::{KindRef, MetricValue, MetricsCalculator, global, kind},
};
use crate::{
    metrics::govss::GOVSS,
    workouts::{WorkoutDirectory, WorkoutProvider},
};

/// Result of one full load-and-aggregate pass over an athlete.
#[derive(Debug, Clone)]
pub struct PlanningPass {
    pub activities: usize,
    pub workouts: usize,
    pub seasons: Vec<(Date, Date)>,
    pub pmc: Vec<PmcDay>,
}

/// Loads the configured athlete and their scheduled workouts, detects
/// seasons and builds the stress chart from daily GOVSS.
pub fn run_pass(config: &PlannerConfig, today: Date) -> Result<PlanningPass> {
    let mut athlete = Athlete::load(config)?;
    let providers: Vec<Box<dyn WorkoutProvider>> =
        vec![Box::new(WorkoutDirectory::new(config.workouts_dir()))];
    let workouts = athlete.load_workouts(&providers, today, config.lookahead_days)?;
    let seasons = athlete.detect_seasons(config.season_limit_days).to_vec();
    let pmc = athlete.performance_management(&kind::<GOVSS>(), false)?;

    info!(
        "{}: {} activities, {} workouts, {} seasons",
        athlete.id(),
        athlete.activity_count(),
        workouts,
        seasons.len()
    );
    Ok(PlanningPass {
        activities: athlete.activity_count(),
        workouts,
        seasons,
        pmc,
    })
}

/// Today's date in UTC.
pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}
