//! Basic per-activity metrics read straight from the records and summaries.

use std::collections::BTreeMap;

use super::{KindRef, Metric, MetricContext, MetricValue, StaticMetric, kind};
use crate::errors::MetricError;

/// Mean of the present values, skipping those rejected by `keep`. NaN when
/// nothing is left.
pub(crate) fn mean_where(values: &[Option<f64>], keep: impl Fn(f64) -> bool) -> f64 {
    let (sum, count) = values
        .iter()
        .flatten()
        .filter(|v| keep(**v))
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Sport of the activity as computed by [`Sport`]. The caller must declare
/// `Sport` as a dependency.
pub fn sport<'a>(ctx: &MetricContext<'a>) -> Option<&'a str> {
    ctx.get_metric(&kind::<Sport>())?.field_str("sport")
}

/// Gate for running-only metrics.
pub fn is_running(ctx: &MetricContext<'_>) -> bool {
    sport(ctx) == Some("running")
}

/// Gate for cycling-only metrics.
pub fn is_cycling(ctx: &MetricContext<'_>) -> bool {
    sport(ctx) == Some("cycling")
}

#[derive(Debug, Default)]
pub struct TimerTime;

impl StaticMetric for TimerTime {
    const KEY: &'static str = "TimerTime";
}

impl Metric for TimerTime {
    fn name(&self) -> &str {
        "Total timer time"
    }

    fn unit(&self) -> &str {
        "s"
    }

    fn applicable(&self, _ctx: &MetricContext<'_>) -> bool {
        true
    }

    fn compute(&self, ctx: &MetricContext<'_>) -> Result<MetricValue, MetricError> {
        let reported = ctx
            .summaries()
            .activity
            .as_ref()
            .and_then(|totals| totals.total_timer_time);
        Ok(reported.unwrap_or_else(|| ctx.records().duration()).into())
    }
}

/// The activity's sport, as a map with `sport`, `sub_sport` and `name`.
#[derive(Debug, Default)]
pub struct Sport;

impl StaticMetric for Sport {
    const KEY: &'static str = "Sport";
}

impl Metric for Sport {
    fn name(&self) -> &str {
        "Sport"
    }

    fn applicable(&self, ctx: &MetricContext<'_>) -> bool {
        ctx.summaries().sports.len() == 1 || ctx.records().unique_text("sport").len() == 1
    }

    fn compute(&self, ctx: &MetricContext<'_>) -> Result<MetricValue, MetricError> {
        let mut value = BTreeMap::new();
        let sports = &ctx.summaries().sports;

        if !sports.is_empty() {
            let [summary] = sports.as_slice() else {
                return Err(MetricError::Assertion(format!(
                    "expected one sport summary, found {}",
                    sports.len()
                )));
            };
            value.insert("sport".into(), MetricValue::Text(summary.sport.clone()));
            if let Some(sub_sport) = &summary.sub_sport {
                value.insert("sub_sport".into(), MetricValue::Text(sub_sport.clone()));
            }
            if let Some(name) = &summary.name {
                value.insert("name".into(), MetricValue::Text(name.clone()));
            }
        } else {
            let unique = ctx.records().unique_text("sport");
            let [sport] = unique.as_slice() else {
                return Err(MetricError::Assertion(format!(
                    "expected one sport in records, found {}",
                    unique.len()
                )));
            };
            value.insert("sport".into(), MetricValue::Text((*sport).to_string()));
        }

        Ok(MetricValue::Map(value))
    }
}

/// Calendar date of the first sample.
#[derive(Debug, Default)]
pub struct ActivityDate;

impl StaticMetric for ActivityDate {
    const KEY: &'static str = "ActivityDate";
}

impl Metric for ActivityDate {
    fn name(&self) -> &str {
        "Date"
    }

    fn format(&self) -> &str {
        "%d-%m-%Y"
    }

    fn applicable(&self, _ctx: &MetricContext<'_>) -> bool {
        true
    }

    fn compute(&self, ctx: &MetricContext<'_>) -> Result<MetricValue, MetricError> {
        ctx.records()
            .start
            .or_else(|| ctx.meta().start_time())
            .map(|start| start.date())
            .or_else(|| ctx.meta().scheduled_date())
            .map(MetricValue::Date)
            .ok_or_else(|| MetricError::Assertion("activity has no start time".into()))
    }
}

#[derive(Debug, Default)]
pub struct AverageSpeed;

impl StaticMetric for AverageSpeed {
    const KEY: &'static str = "AverageSpeed";
}

impl Metric for AverageSpeed {
    fn name(&self) -> &str {
        "Average speed"
    }

    fn unit(&self) -> &str {
        "m/s"
    }

    fn format(&self) -> &str {
        ".2f"
    }

    fn deps(&self) -> Vec<KindRef> {
        vec![kind::<TimerTime>()]
    }

    fn applicable(&self, ctx: &MetricContext<'_>) -> bool {
        ctx.has_column("speed")
    }

    fn compute(&self, ctx: &MetricContext<'_>) -> Result<MetricValue, MetricError> {
        let time = ctx.get_number(&kind::<TimerTime>())?;
        let distance = ctx
            .column("distance")?
            .iter()
            .rev()
            .find_map(|d| *d)
            .unwrap_or(f64::NAN);
        Ok((distance / time).into())
    }
}

/// Mean power, ignoring zeros (coasting) and dropouts.
#[derive(Debug, Default)]
pub struct AveragePower;

impl StaticMetric for AveragePower {
    const KEY: &'static str = "AveragePower";
}

impl Metric for AveragePower {
    fn name(&self) -> &str {
        "Average power"
    }

    fn unit(&self) -> &str {
        "W"
    }

    fn format(&self) -> &str {
        ".0f"
    }

    fn applicable(&self, ctx: &MetricContext<'_>) -> bool {
        ctx.has_column("power")
    }

    fn compute(&self, ctx: &MetricContext<'_>) -> Result<MetricValue, MetricError> {
        Ok(mean_where(ctx.column("power")?, |p| p != 0.0).into())
    }
}

#[derive(Debug, Default)]
pub struct AverageHR;

impl StaticMetric for AverageHR {
    const KEY: &'static str = "AverageHR";
}

impl Metric for AverageHR {
    fn name(&self) -> &str {
        "Average heart rate"
    }

    fn unit(&self) -> &str {
        "bpm"
    }

    fn format(&self) -> &str {
        ".0f"
    }

    fn applicable(&self, ctx: &MetricContext<'_>) -> bool {
        ctx.has_column("heartrate")
    }

    fn compute(&self, ctx: &MetricContext<'_>) -> Result<MetricValue, MetricError> {
        Ok(mean_where(ctx.column("heartrate")?, |_| true).into())
    }
}
