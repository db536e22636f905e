//! Scheduled workouts: step definitions expanded into a 1 Hz records table.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use time::Date;
use tracing::{debug, warn};

use crate::{
    activity::ActivityMeta,
    errors::Result,
    records::Records,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutDefinition {
    #[serde(default)]
    pub workout_name: Option<String>,
    pub workout_segments: Vec<WorkoutSegment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutSegment {
    pub sport_type: String,
    pub workout_steps: Vec<WorkoutStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutStep {
    /// `warmup`, `interval`, `recovery`, `rest`, `cooldown` or `repeat`.
    pub step_type: String,
    #[serde(default)]
    pub description: Option<String>,
    /// `pace.zone`, `no.target`, `cadence`, `heart.rate.zone`, `power.zone`, `power.3s`.
    #[serde(default)]
    pub target_type: Option<String>,
    #[serde(default)]
    pub target_value_one: Option<f64>,
    #[serde(default)]
    pub target_value_two: Option<f64>,
    /// `time`, `distance` or `lap.button`.
    #[serde(default)]
    pub end_condition: Option<String>,
    #[serde(default)]
    pub end_condition_value: Option<f64>,
    #[serde(default)]
    pub number_of_iterations: Option<u32>,
    #[serde(default)]
    pub workout_steps: Vec<WorkoutStep>,
}

/// Expected speed in m/s for a step without a pace target.
fn estimate_speed(step_type: &str) -> f64 {
    match step_type {
        "interval" => 4.0,
        _ => 3.0,
    }
}

/// Longest planned workout, in seconds. Longer definitions are cut off.
pub const MAX_WORKOUT_SECONDS: usize = 24 * 3600;

struct Row<'a> {
    sport: &'a str,
    step_type: &'a str,
    target_type: &'a str,
    target_lower: Option<f64>,
    target_upper: Option<f64>,
    speed: f64,
    /// Meters covered in each second of the step.
    distance: f64,
}

impl WorkoutDefinition {
    /// One sample per planned second with `speed`, cumulative `distance`,
    /// `sport`, step `type` and target bounds.
    pub fn to_records(&self) -> Records {
        let mut rows: Vec<Row<'_>> = Vec::new();

        for segment in &self.workout_segments {
            expand_steps(&segment.sport_type, &segment.workout_steps, &mut rows);
        }
        if rows.len() >= MAX_WORKOUT_SECONDS {
            warn!("Workout {:?} truncated to {MAX_WORKOUT_SECONDS} s", self.workout_name);
        }

        let mut records = Records::with_seconds(None, rows.len());
        let mut total = 0.0;
        let distance = rows
            .iter()
            .map(|r| {
                total += r.distance;
                Some(total)
            })
            .collect();
        records.insert_numeric("distance", distance);
        records.insert_numeric("speed", rows.iter().map(|r| Some(r.speed)).collect());
        records.insert_numeric("target_lower", rows.iter().map(|r| r.target_lower).collect());
        records.insert_numeric("target_upper", rows.iter().map(|r| r.target_upper).collect());
        records.insert_text("sport", rows.iter().map(|r| Some(r.sport.to_string())).collect());
        records.insert_text("type", rows.iter().map(|r| Some(r.step_type.to_string())).collect());
        records.insert_text(
            "target_type",
            rows.iter().map(|r| Some(r.target_type.to_string())).collect(),
        );
        records
    }
}

/// Expands steps in order, descending into `repeat` steps at any depth.
fn expand_steps<'a>(sport: &'a str, steps: &'a [WorkoutStep], rows: &mut Vec<Row<'a>>) {
    for step in steps {
        if step.step_type == "repeat" {
            for _ in 0..step.number_of_iterations.unwrap_or(1) {
                if rows.len() >= MAX_WORKOUT_SECONDS {
                    return;
                }
                expand_steps(sport, &step.workout_steps, rows);
            }
        } else {
            expand_step(sport, step, rows);
        }
    }
}

fn expand_step<'a>(sport: &'a str, step: &'a WorkoutStep, rows: &mut Vec<Row<'a>>) {
    let target_type = step.target_type.as_deref().unwrap_or("no.target");
    let (target_type, target_lower, target_upper, speed) = match target_type {
        "pace.zone" => {
            let lower = step.target_value_two;
            let upper = step.target_value_one;
            let speed = match (lower, upper) {
                (Some(l), Some(u)) => 0.5 * (l + u),
                _ => estimate_speed(&step.step_type),
            };
            ("pace.zone", lower, upper, speed)
        }
        "no.target" => ("pace.estimate", None, None, estimate_speed(&step.step_type)),
        other => (
            other,
            step.target_value_two,
            step.target_value_one,
            estimate_speed(&step.step_type),
        ),
    };

    let value = step.end_condition_value.unwrap_or(0.0);
    let (duration, distance) = match step.end_condition.as_deref() {
        Some("time") => (value, value * speed),
        Some("distance") if speed > 0.0 => (value / speed, value),
        _ => (0.0, 0.0),
    };

    let full = duration as usize;
    let seconds = full.min(MAX_WORKOUT_SECONDS.saturating_sub(rows.len()));
    if seconds == 0 {
        return;
    }
    let per_second = distance / full as f64;
    for _ in 0..seconds {
        rows.push(Row {
            sport,
            step_type: &step.step_type,
            target_type,
            target_lower,
            target_upper,
            speed,
            distance: per_second,
        });
    }
}

/// A workout planned for a given day, stored as an activity metadata file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledWorkout {
    pub date: Date,
    pub name: Option<String>,
    pub path: PathBuf,
}

/// A source of scheduled workouts, e.g. a synced training calendar.
pub trait WorkoutProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Workouts scheduled in `[start, end]`.
    fn workouts(&self, start: Date, end: Date) -> Result<Vec<ScheduledWorkout>>;
}

/// Workouts stored as metadata files in a directory.
#[derive(Debug, Clone)]
pub struct WorkoutDirectory {
    dir: PathBuf,
}

impl WorkoutDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl WorkoutProvider for WorkoutDirectory {
    fn name(&self) -> &str {
        "directory"
    }

    fn workouts(&self, start: Date, end: Date) -> Result<Vec<ScheduledWorkout>> {
        if !self.dir.is_dir() {
            debug!("No workouts directory at {}", self.dir.display());
            return Ok(Vec::new());
        }

        let mut workouts = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let meta = match ActivityMeta::read(&path) {
                Ok(meta) => meta,
                Err(e) => {
                    warn!("Skipping workout {}: {e}", path.display());
                    continue;
                }
            };
            let Some(date) = meta.scheduled_date() else {
                warn!("Skipping workout {} without a date", path.display());
                continue;
            };
            if date < start || date > end {
                continue;
            }
            workouts.push(ScheduledWorkout {
                date,
                name: meta.name.clone(),
                path,
            });
        }
        workouts.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.path.cmp(&b.path)));
        Ok(workouts)
    }
}
