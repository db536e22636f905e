//! Values recorded by Garmin devices in undocumented Firstbeat messages.

use super::{
    KindRef, Metric, MetricContext, MetricValue, StaticMetric,
    activity::{Sport, is_running},
    kind,
};
use crate::errors::MetricError;

const FIRSTBEAT: &str = "firstbeat";

/// Reads one scaled field from the first Firstbeat message.
///
/// With `allow_zero` unset a raw zero means "not measured" and becomes NaN.
fn firstbeat_field(
    ctx: &MetricContext<'_>,
    field: &str,
    scale: f64,
    allow_zero: bool,
) -> Result<f64, MetricError> {
    let message = ctx
        .summaries()
        .unknown_message(FIRSTBEAT)
        .ok_or_else(|| MetricError::Assertion("no firstbeat message".into()))?;
    let raw = message
        .fields
        .get(field)
        .copied()
        .ok_or_else(|| MetricError::MissingColumn(field.to_string()))?;
    let value = raw * scale;
    if value == 0.0 && !allow_zero {
        Ok(f64::NAN)
    } else {
        Ok(value)
    }
}

#[derive(Debug, Default)]
pub struct VO2Max;

impl StaticMetric for VO2Max {
    const KEY: &'static str = "VO2Max";
}

impl Metric for VO2Max {
    fn name(&self) -> &str {
        "VO2Max (Garmin)"
    }

    fn unit(&self) -> &str {
        "ml/kg/min"
    }

    fn format(&self) -> &str {
        ".1f"
    }

    fn applicable(&self, ctx: &MetricContext<'_>) -> bool {
        ctx.summaries().unknown_message(FIRSTBEAT).is_some()
    }

    fn compute(&self, ctx: &MetricContext<'_>) -> Result<MetricValue, MetricError> {
        firstbeat_field(ctx, "unknown_7", 3.5 / 65536.0, false).map(MetricValue::Number)
    }
}

/// The device's VO2Max estimate, for runs only.
#[derive(Debug, Default)]
pub struct RunningVO2Max;

impl StaticMetric for RunningVO2Max {
    const KEY: &'static str = "RunningVO2Max";
}

impl Metric for RunningVO2Max {
    fn name(&self) -> &str {
        "Running VO2Max (Garmin)"
    }

    fn unit(&self) -> &str {
        "ml/kg/min"
    }

    fn format(&self) -> &str {
        ".1f"
    }

    fn deps(&self) -> Vec<KindRef> {
        vec![kind::<Sport>(), kind::<VO2Max>()]
    }

    fn applicable(&self, ctx: &MetricContext<'_>) -> bool {
        is_running(ctx)
    }

    fn compute(&self, ctx: &MetricContext<'_>) -> Result<MetricValue, MetricError> {
        ctx.get_number(&kind::<VO2Max>()).map(MetricValue::Number)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::{
        activity::{Activity, ActivityMeta},
        metrics::MetricsCalculator,
        records::{ActivityData, Records, SportSummary, UnknownMessage},
    };

    fn activity(sport: &str, raw_vo2max: f64) -> Activity {
        let mut data = ActivityData::new(Records::with_seconds(None, 10));
        data.summaries.sports.push(SportSummary {
            sport: sport.into(),
            sub_sport: None,
            name: None,
        });
        data.summaries.unknown_messages.push(UnknownMessage::from_number(
            140,
            BTreeMap::from([("unknown_7".to_string(), raw_vo2max)]),
        ));
        Activity::from_data(data, ActivityMeta::default())
    }

    #[test]
    fn test_vo2max_is_scaled() {
        let mut run = activity("running", 982_016.0);
        let running = kind::<RunningVO2Max>();
        MetricsCalculator::new(&[running.clone()])
            .unwrap()
            .compute(&mut run);

        let value = run.metrics().get(&running).and_then(MetricValue::as_f64).unwrap();
        assert!((value - 52.445).abs() < 1e-3);
    }

    #[test]
    fn test_running_vo2max_gated_on_sport() {
        let mut ride = activity("cycling", 982_016.0);
        let summary = MetricsCalculator::new(&[kind::<RunningVO2Max>()])
            .unwrap()
            .compute(&mut ride);

        assert_eq!(summary.inapplicable, vec!["RunningVO2Max"]);
        assert!(ride.metrics().contains(&kind::<VO2Max>()));
    }

    #[test]
    fn test_zero_reading_is_nan() {
        let mut run = activity("running", 0.0);
        let vo2max = kind::<VO2Max>();
        MetricsCalculator::new(&[vo2max.clone()])
            .unwrap()
            .compute(&mut run);
        assert!(run.metrics().get(&vo2max).is_some_and(MetricValue::is_nan));
    }
}
