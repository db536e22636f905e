//! A single recorded activity or scheduled workout and its computed metrics.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, PrimitiveDateTime, macros::format_description};
use tracing::{debug, error, warn};

use crate::{
    cache::ResultCache,
    errors::{PlannerError, Result},
    file_parsers,
    metrics::{KindRef, MetricStore, MetricValue, MetricsCalculator, global},
    records::{ActivityData, Records, Summaries},
    workouts::WorkoutDefinition,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Device file downloaded from Garmin Connect.
    Garmin,
    /// Any other activity file next to the metadata.
    File,
    #[serde(alias = "garmin_workout")]
    Workout,
    #[default]
    Memory,
}

/// Body measurements used by the running power model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AthleteAttributes {
    /// Meters.
    pub height: f64,
    /// Kilograms.
    pub weight: f64,
}

/// Metadata file describing one activity or workout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityMeta {
    #[serde(default)]
    pub source: Source,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    #[serde(rename = "activityName", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `YYYY-MM-DD HH:MM:SS` in UTC.
    #[serde(rename = "startTimeGMT", default, skip_serializing_if = "Option::is_none")]
    pub start_time_gmt: Option<String>,
    /// `YYYY-MM-DD`, scheduled workouts only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub athlete: Option<AthleteAttributes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workout: Option<WorkoutDefinition>,
    /// Any other fields from the sync source, kept as-is.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ActivityMeta {
    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn start_time(&self) -> Option<OffsetDateTime> {
        let raw = self.start_time_gmt.as_deref()?;
        let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
        PrimitiveDateTime::parse(raw, format)
            .map(PrimitiveDateTime::assume_utc)
            .inspect_err(|e| warn!("Invalid startTimeGMT {raw:?}: {e}"))
            .ok()
    }

    pub fn scheduled_date(&self) -> Option<Date> {
        let raw = self.date.as_deref()?;
        Date::parse(raw, format_description!("[year]-[month]-[day]"))
            .inspect_err(|e| warn!("Invalid workout date {raw:?}: {e}"))
            .ok()
    }
}

/// An activity's data plus the results computed for it.
///
/// Only the metrics evaluator writes to the metric store; everyone else reads
/// through [`Activity::get_metric`].
#[derive(Debug, Clone)]
pub struct Activity {
    pub(crate) meta: ActivityMeta,
    pub(crate) data: ActivityData,
    pub(crate) metrics: MetricStore,
    cache: Option<ResultCache>,
}

impl Activity {
    /// Loads an activity from its metadata file.
    ///
    /// The parsed data and metrics come from the result cache when present;
    /// otherwise the source is parsed and a fresh cache is written. With
    /// `nocache` the source is always parsed.
    pub fn open(path: &Path, nocache: bool) -> Result<Self> {
        let meta = ActivityMeta::read(path)?;

        match meta.source {
            Source::Garmin | Source::File => {
                let source_file = meta.source_file.as_deref().ok_or_else(|| {
                    PlannerError::InvalidMetadata(format!(
                        "{} has no source_file",
                        path.display()
                    ))
                })?;
                let source_path = path
                    .parent()
                    .map_or_else(|| PathBuf::from(source_file), |dir| dir.join(source_file));
                let cache = ResultCache::for_source(&source_path);
                Self::load(meta, cache, nocache, || {
                    Ok(file_parsers::read_file(&source_path)?)
                })
            }
            Source::Workout => {
                let workout = meta.workout.clone().ok_or_else(|| {
                    PlannerError::InvalidMetadata(format!("{} has no workout", path.display()))
                })?;
                let cache = ResultCache::for_source(path);
                Self::load(meta, cache, nocache, || {
                    Ok(ActivityData::new(workout.to_records()))
                })
            }
            Source::Memory => Err(PlannerError::InvalidMetadata(format!(
                "{} has no loadable source",
                path.display()
            ))),
        }
    }

    fn load(
        meta: ActivityMeta,
        cache: ResultCache,
        nocache: bool,
        parse: impl FnOnce() -> Result<ActivityData>,
    ) -> Result<Self> {
        let cached = if nocache { None } else { cache.load() };

        let (data, metrics, fresh) = match cached {
            Some(cached) => match cached.data {
                Some(data) => (data, cached.metrics, false),
                None => (parse()?, cached.metrics, true),
            },
            None => (parse()?, MetricStore::new(), true),
        };

        let activity = Self {
            meta,
            data,
            metrics,
            cache: Some(cache),
        };
        if fresh {
            activity.cache();
        }
        Ok(activity)
    }

    /// Wraps in-memory records. Such activities have no cache.
    pub fn from_records(records: Records, meta: ActivityMeta) -> Self {
        Self::from_data(ActivityData::new(records), meta)
    }

    pub fn from_data(data: ActivityData, meta: ActivityMeta) -> Self {
        Self {
            meta,
            data,
            metrics: MetricStore::new(),
            cache: None,
        }
    }

    pub fn meta(&self) -> &ActivityMeta {
        &self.meta
    }

    pub fn data(&self) -> &ActivityData {
        &self.data
    }

    pub fn records(&self) -> &Records {
        &self.data.records
    }

    pub fn summaries(&self) -> &Summaries {
        &self.data.summaries
    }

    pub fn metrics(&self) -> &MetricStore {
        &self.metrics
    }

    pub fn cache_path(&self) -> Option<&Path> {
        self.cache.as_ref().map(ResultCache::path)
    }

    pub fn start_time(&self) -> Option<OffsetDateTime> {
        self.meta.start_time().or(self.data.records.start)
    }

    pub fn date(&self) -> Option<Date> {
        self.meta
            .scheduled_date()
            .or_else(|| self.start_time().map(OffsetDateTime::date))
    }

    pub fn display_name(&self) -> &str {
        self.meta.name.as_deref().unwrap_or("From records")
    }

    /// Writes data and metrics to the result cache. Failures are logged.
    pub fn cache(&self) {
        let Some(cache) = &self.cache else {
            return;
        };
        debug!("Caching {} metrics for {}", self.metrics.len(), self.display_name());
        if let Err(e) = cache.store(Some(&self.data), &self.metrics) {
            error!("Failed to write cache {}: {e}", cache.path().display());
        }
    }

    /// Resolves and evaluates `kind`, returning its value, or `None` when it
    /// is inapplicable or its computation failed.
    pub fn get_metric(&mut self, kind: &KindRef) -> Option<MetricValue> {
        let calculator = match MetricsCalculator::new(std::slice::from_ref(kind)) {
            Ok(calculator) => calculator,
            Err(e) => {
                error!("Cannot evaluate {kind}: {e}");
                return None;
            }
        };
        calculator.compute(self);
        self.metrics.get(kind).cloned()
    }

    /// Like [`Activity::get_metric`], looking the kind up by name first.
    pub fn get_metric_by_name(&mut self, name: &str) -> Option<MetricValue> {
        match global().lookup_by_name(name) {
            Ok(kind) => self.get_metric(&kind),
            Err(e) => {
                debug!("{e}");
                None
            }
        }
    }
}
