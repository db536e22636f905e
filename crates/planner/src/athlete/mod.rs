//! An athlete's activities and workouts, grouped by day.

pub mod aggregate;
pub mod pmc;
pub mod seasons;

use std::{
    collections::BTreeMap,
    fs,
    ops::RangeBounds,
    path::{Path, PathBuf},
    time::Instant,
};

use rayon::prelude::*;
use time::{Date, Duration};
use tracing::{debug, info, instrument, warn};

pub use aggregate::{DayValue, Reduction, reduce};
pub use pmc::{PmcDay, performance_management};
pub use seasons::{SEASON_LIMIT_DAYS, find_seasons};

use crate::{
    activity::Activity,
    config::PlannerConfig,
    errors::{PlannerError, Result},
    file_parsers::FileType,
    metrics::{KindRef, MetricsCalculator},
    workouts::WorkoutProvider,
};

/// Everything on one calendar day.
#[derive(Debug, Clone, Default)]
pub struct Day {
    pub activities: Vec<Activity>,
    pub workouts: Vec<Activity>,
}

impl Day {
    pub fn is_empty(&self) -> bool {
        self.activities.is_empty() && self.workouts.is_empty()
    }
}

#[derive(Debug)]
pub struct Athlete {
    id: String,
    activities_dir: Option<PathBuf>,
    days: BTreeMap<Date, Day>,
    seasons: Vec<(Date, Date)>,
}

impl Athlete {
    /// Loads every activity of the configured athlete.
    #[instrument(skip(config), fields(athlete = %config.athlete))]
    pub fn load(config: &PlannerConfig) -> Result<Self> {
        let dir = config.activities_dir();
        let activities = load_activities(&dir)?;
        let mut athlete = Self::from_activities(config.athlete.clone(), activities)?;
        athlete.activities_dir = Some(dir);
        Ok(athlete)
    }

    /// Groups already loaded activities by date. Activities without a date
    /// are dropped.
    pub fn from_activities(id: impl Into<String>, activities: Vec<Activity>) -> Result<Self> {
        let mut days: BTreeMap<Date, Day> = BTreeMap::new();
        for activity in activities {
            match activity.date() {
                Some(date) => days.entry(date).or_default().activities.push(activity),
                None => warn!("Dropping {} without a date", activity.display_name()),
            }
        }
        if days.is_empty() {
            return Err(PlannerError::NoActivities);
        }

        for day in days.values_mut() {
            day.activities.sort_by_key(Activity::start_time);
        }

        Ok(Self {
            id: id.into(),
            activities_dir: None,
            days,
            seasons: Vec::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn activities_dir(&self) -> Option<&Path> {
        self.activities_dir.as_deref()
    }

    pub fn days(&self) -> &BTreeMap<Date, Day> {
        &self.days
    }

    pub fn first_day(&self) -> Option<Date> {
        self.days.keys().next().copied()
    }

    pub fn last_day(&self) -> Option<Date> {
        self.days.keys().next_back().copied()
    }

    pub fn get_activities(&self, date: Date) -> &[Activity] {
        self.days.get(&date).map_or(&[], |day| &day.activities)
    }

    pub fn get_workouts(&self, date: Date) -> &[Activity] {
        self.days.get(&date).map_or(&[], |day| &day.workouts)
    }

    pub fn activity_count(&self) -> usize {
        self.days.values().map(|day| day.activities.len()).sum()
    }

    pub fn seasons(&self) -> &[(Date, Date)] {
        &self.seasons
    }

    /// Loads workouts scheduled between the first day and `lookahead_days`
    /// after `today`, then fills every day of that range. Workouts on or
    /// after `today` are opened without the result cache.
    #[instrument(skip_all, fields(athlete = %self.id))]
    pub fn load_workouts(
        &mut self,
        providers: &[Box<dyn WorkoutProvider>],
        today: Date,
        lookahead_days: i64,
    ) -> Result<usize> {
        let start_time = Instant::now();
        let Some(first) = self.first_day() else {
            return Ok(0);
        };
        let end = today + Duration::days(lookahead_days);

        let mut loaded = 0;
        for provider in providers {
            let scheduled = provider.workouts(first, end)?;
            debug!("{} scheduled {} workouts", provider.name(), scheduled.len());
            for workout in scheduled {
                let nocache = workout.date >= today;
                match Activity::open(&workout.path, nocache) {
                    Ok(activity) => {
                        self.days.entry(workout.date).or_default().workouts.push(activity);
                        loaded += 1;
                    }
                    Err(e) => warn!("Skipping workout {}: {e}", workout.path.display()),
                }
            }
        }

        let mut date = first;
        while date <= end {
            self.days.entry(date).or_default();
            match date.next_day() {
                Some(next) => date = next,
                None => break,
            }
        }

        info!("Loaded {loaded} workouts in {:?}", start_time.elapsed());
        Ok(loaded)
    }

    /// Active days: those with at least one activity or workout.
    pub fn active_days(&self) -> Vec<Date> {
        self.days
            .iter()
            .filter(|(_, day)| !day.is_empty())
            .map(|(date, _)| *date)
            .collect()
    }

    /// Splits the active days into seasons no longer than `limit_days`.
    #[instrument(skip(self), fields(athlete = %self.id))]
    pub fn detect_seasons(&mut self, limit_days: i64) -> &[(Date, Date)] {
        let start_time = Instant::now();
        self.seasons = find_seasons(&self.active_days(), limit_days);
        info!(
            "Detected {} seasons in {:?}",
            self.seasons.len(),
            start_time.elapsed()
        );
        &self.seasons
    }

    /// Evaluates `kind` for every activity (or, with `future`, every workout)
    /// of each day in `range` and reduces each day's values.
    ///
    /// The dependency order is resolved once for the whole call.
    #[instrument(skip(self, kind, range), fields(athlete = %self.id, kind = %kind))]
    pub fn aggregate(
        &mut self,
        kind: &KindRef,
        reduction: Reduction,
        range: impl RangeBounds<Date>,
        future: bool,
    ) -> Result<Vec<(Date, DayValue)>> {
        let start_time = Instant::now();
        let calculator = MetricsCalculator::new(std::slice::from_ref(kind))?;
        debug!("Evaluation order {:?}", calculator.order());

        let series: Vec<(Date, DayValue)> = self
            .days
            .range_mut(range)
            .map(|(date, day)| {
                let activities = if future {
                    &mut day.workouts
                } else {
                    &mut day.activities
                };
                let values = activities
                    .iter_mut()
                    .map(|activity| {
                        calculator.compute(activity);
                        activity.metrics().get(kind).cloned()
                    })
                    .collect();
                (*date, reduce(values, reduction))
            })
            .collect();

        info!(
            "Aggregated {kind} ({reduction}) over {} days in {:?}",
            series.len(),
            start_time.elapsed()
        );
        Ok(series)
    }

    /// Like [`Athlete::aggregate`], with the reduction given by name.
    pub fn aggregate_by_name(
        &mut self,
        kind: &KindRef,
        how: &str,
        range: impl RangeBounds<Date>,
        future: bool,
    ) -> Result<Vec<(Date, DayValue)>> {
        let reduction: Reduction = how.parse()?;
        self.aggregate(kind, reduction, range, future)
    }

    /// Daily summed `stress_kind` turned into a performance management chart.
    pub fn performance_management(
        &mut self,
        stress_kind: &KindRef,
        future: bool,
    ) -> Result<Vec<PmcDay>> {
        let daily: Vec<(Date, f64)> = self
            .aggregate(stress_kind, Reduction::Sum, .., future)?
            .into_iter()
            // Days whose stress could not be computed contribute no load.
            .map(|(date, value)| (date, value.as_f64().filter(|v| !v.is_nan()).unwrap_or(0.0)))
            .collect();
        Ok(performance_management(&daily))
    }
}

/// Opens every `*.json` activity metadata file in `dir` in parallel.
/// Unreadable activities are logged and skipped.
pub fn load_activities(dir: &Path) -> Result<Vec<Activity>> {
    let start_time = Instant::now();
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path.extension().is_some_and(|ext| ext == "json")
                && FileType::from_path(path) != FileType::Records
        })
        .collect();
    files.sort();
    let num = files.len();

    let activities: Vec<Activity> = files
        .par_iter()
        .enumerate()
        .filter_map(|(i, path)| match Activity::open(path, false) {
            Ok(activity) => {
                debug!("Read in {} (activity {} of {num})", path.display(), i + 1);
                Some(activity)
            }
            Err(e) => {
                warn!("Skipping activity {}: {e}", path.display());
                None
            }
        })
        .collect();

    info!(
        "Loaded {} of {num} activities in {:?}",
        activities.len(),
        start_time.elapsed()
    );
    Ok(activities)
}

#[cfg(test)]
mod tests {
    use time::{OffsetDateTime, macros::date};

    use super::*;
    use crate::{
        activity::ActivityMeta,
        metrics::{MetricValue, activity::AveragePower, kind},
        records::Records,
        workouts::ScheduledWorkout,
    };

    fn ride(start: OffsetDateTime, watts: f64) -> Activity {
        let mut records = Records::with_seconds(Some(start), 60);
        records.insert_numeric("power", vec![Some(watts); 60]);
        Activity::from_records(records, ActivityMeta::default())
    }

    fn athlete() -> Athlete {
        let day = date!(2024 - 03 - 01).midnight().assume_utc();
        Athlete::from_activities(
            "test",
            vec![
                ride(day + Duration::hours(7), 200.0),
                ride(day + Duration::hours(18), 150.0),
                ride(day + Duration::days(2), 300.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_activities_grouped_by_day() {
        let athlete = athlete();
        assert_eq!(athlete.get_activities(date!(2024 - 03 - 01)).len(), 2);
        assert!(athlete.get_activities(date!(2024 - 03 - 02)).is_empty());
        assert_eq!(athlete.activity_count(), 3);
    }

    #[test]
    fn test_aggregate_reductions() {
        let mut athlete = athlete();
        let power = kind::<AveragePower>();

        let sums = athlete.aggregate(&power, Reduction::Sum, .., false).unwrap();
        assert_eq!(
            sums,
            vec![
                (date!(2024 - 03 - 01), DayValue::Number(350.0)),
                (date!(2024 - 03 - 03), DayValue::Number(300.0)),
            ]
        );

        let maxes = athlete
            .aggregate(&power, Reduction::Max, date!(2024 - 03 - 01)..=date!(2024 - 03 - 01), false)
            .unwrap();
        assert_eq!(maxes, vec![(date!(2024 - 03 - 01), DayValue::Number(200.0))]);
    }

    #[test]
    fn test_unknown_reduction_name_fails() {
        let mut athlete = athlete();
        assert!(matches!(
            athlete.aggregate_by_name(&kind::<AveragePower>(), "median", .., false),
            Err(PlannerError::UnknownReduction(_))
        ));
    }

    #[test]
    fn test_nan_day_sum_adds_no_load() {
        let day = date!(2024 - 03 - 01).midnight().assume_utc();
        let mut athlete = Athlete::from_activities(
            "test",
            vec![ride(day, 200.0), ride(day + Duration::hours(5), 0.0)],
        )
        .unwrap();
        let power = kind::<AveragePower>();

        let sums = athlete.aggregate(&power, Reduction::Sum, .., false).unwrap();
        assert!(sums[0].1.as_f64().unwrap().is_nan());

        let pmc = athlete.performance_management(&power, false).unwrap();
        assert_eq!(pmc[0].stress, 0.0);
    }

    struct Nothing;

    impl WorkoutProvider for Nothing {
        fn name(&self) -> &str {
            "nothing"
        }

        fn workouts(&self, _start: Date, _end: Date) -> Result<Vec<ScheduledWorkout>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_workouts_make_days_contiguous() {
        let mut athlete = athlete();
        let providers: Vec<Box<dyn WorkoutProvider>> = vec![Box::new(Nothing)];
        athlete
            .load_workouts(&providers, date!(2024 - 03 - 05), 3)
            .unwrap();

        assert_eq!(athlete.days().len(), 8);
        assert_eq!(athlete.last_day(), Some(date!(2024 - 03 - 08)));

        let lists = athlete
            .aggregate(&kind::<AveragePower>(), Reduction::List, .., true)
            .unwrap();
        assert!(
            lists
                .iter()
                .all(|(_, v)| v == &DayValue::List(vec![MetricValue::Number(0.0)]))
        );
    }

    #[test]
    fn test_seasons_use_active_days_only() {
        let mut athlete = athlete();
        let providers: Vec<Box<dyn WorkoutProvider>> = vec![Box::new(Nothing)];
        athlete
            .load_workouts(&providers, date!(2024 - 06 - 01), 0)
            .unwrap();
        let seasons = athlete.detect_seasons(1).to_vec();
        assert_eq!(
            seasons,
            vec![
                (date!(2024 - 03 - 01), date!(2024 - 03 - 01)),
                (date!(2024 - 03 - 03), date!(2024 - 03 - 03)),
            ]
        );
    }
}
