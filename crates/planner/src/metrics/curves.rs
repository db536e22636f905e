//! Mean-maximal curves and the parametric families built on them.
//!
//! `Curve[column]` holds the best average of a column over a ladder of
//! durations, plus critical-power model predictions at the same durations.
//! `MeanMax[column,seconds]` reads one point of that curve.

use std::collections::BTreeMap;

use super::{KindRef, Metric, MetricContext, MetricValue, Param, global, registry::Family};
use crate::errors::{MetricError, PlannerError, Result};

/// Durations, in seconds, at which curves are sampled.
pub const CURVE_DURATIONS: &[u32] = &[
    1, 5, 10, 15, 30, 60, 120, 300, 600, 1200, 1800, 3600, 5400, 7200,
];

/// Curve points used to fit the critical power models.
const MODEL_MIN_DURATION: f64 = 120.0;
const MODEL_MAX_DURATION: f64 = 1200.0;

pub const TWO_PARAM_MODEL: &str = "2 param";
pub const THREE_PARAM_MODEL: &str = "3 param";

/// Kind of `Curve[column]`.
pub fn curve(column: &str) -> Result<KindRef> {
    global().family(CurveFamily::NAME, vec![column.into()])
}

/// Kind of `MeanMax[column,seconds]`.
pub fn mean_max(column: &str, seconds: u32) -> Result<KindRef> {
    global().family(MeanMaxFamily::NAME, vec![column.into(), seconds.into()])
}

fn unit_of(column: &str) -> &'static str {
    match column {
        "power" => "W",
        "heartrate" => "bpm",
        "speed" => "m/s",
        "cadence" => "rpm",
        _ => "",
    }
}

/// Best average of `values` over any `window` consecutive samples. Missing
/// samples count as zero.
pub fn best_mean(values: &[Option<f64>], window: usize) -> Option<f64> {
    if window == 0 || values.len() < window {
        return None;
    }
    let value = |i: usize| values[i].unwrap_or(0.0);

    let mut sum: f64 = (0..window).map(value).sum();
    let mut best = sum;
    for i in window..values.len() {
        sum += value(i) - value(i - window);
        best = best.max(sum);
    }
    Some(best / window as f64)
}

/// Critical power and W' from a linear fit of work against duration.
fn fit_critical_power(points: &[(f64, f64)]) -> Option<(f64, f64)> {
    let n = points.len() as f64;
    if points.len() < 2 {
        return None;
    }
    // Work = CP * t + W'
    let work: Vec<(f64, f64)> = points.iter().map(|&(t, p)| (t, p * t)).collect();
    let sum_x: f64 = work.iter().map(|(x, _)| x).sum();
    let sum_y: f64 = work.iter().map(|(_, y)| y).sum();
    let sum_xy: f64 = work.iter().map(|(x, y)| x * y).sum();
    let sum_xx: f64 = work.iter().map(|(x, _)| x * x).sum();

    let denom = n * sum_xx - sum_x * sum_x;
    if denom.abs() < 1e-10 {
        return None;
    }
    let cp = (n * sum_xy - sum_x * sum_y) / denom;
    let w_prime = (sum_y - cp * sum_x) / n;
    (cp > 0.0 && w_prime > 0.0).then_some((cp, w_prime))
}

/// Model predictions at each of `x`, keyed by model name. Empty when the
/// curve has too few points in the fitting range.
fn predict(x: &[f64], y: &[f64]) -> BTreeMap<String, Vec<f64>> {
    let mut predictions = BTreeMap::new();
    let points: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter(|(t, _)| (MODEL_MIN_DURATION..=MODEL_MAX_DURATION).contains(*t))
        .map(|(t, p)| (*t, *p))
        .collect();
    let Some((cp, w_prime)) = fit_critical_power(&points) else {
        return predictions;
    };

    predictions.insert(
        TWO_PARAM_MODEL.to_string(),
        x.iter().map(|t| cp + w_prime / t).collect(),
    );

    // Morton's model bounds the curve at the best instantaneous value.
    if let Some(&peak) = y.first()
        && peak > cp
    {
        let offset = w_prime / (peak - cp);
        predictions.insert(
            THREE_PARAM_MODEL.to_string(),
            x.iter().map(|t| cp + w_prime / (t + offset)).collect(),
        );
    }
    predictions
}

#[derive(Debug)]
pub struct Curve {
    column: String,
    name: String,
}

impl Curve {
    pub fn new(column: impl Into<String>) -> Self {
        let column = column.into();
        let name = format!("Mean maximal {column}");
        Self { column, name }
    }
}

impl Metric for Curve {
    fn name(&self) -> &str {
        &self.name
    }

    fn unit(&self) -> &str {
        unit_of(&self.column)
    }

    fn applicable(&self, ctx: &MetricContext<'_>) -> bool {
        ctx.records().numeric(&self.column).is_some_and(|c| !c.is_empty())
    }

    fn compute(&self, ctx: &MetricContext<'_>) -> Result<MetricValue, MetricError> {
        let values = ctx.column(&self.column)?;
        let (x, y): (Vec<f64>, Vec<f64>) = CURVE_DURATIONS
            .iter()
            .filter_map(|&d| best_mean(values, d as usize).map(|best| (f64::from(d), best)))
            .unzip();
        let predictions = predict(&x, &y);
        Ok(MetricValue::Curve(super::DurationCurve { x, y, predictions }))
    }
}

#[derive(Debug)]
pub struct MeanMax {
    column: String,
    seconds: u32,
    name: String,
}

impl MeanMax {
    pub fn new(column: impl Into<String>, seconds: u32) -> Self {
        let column = column.into();
        let name = format!("Maximal {column} for {seconds} s");
        Self {
            column,
            seconds,
            name,
        }
    }
}

impl Metric for MeanMax {
    fn name(&self) -> &str {
        &self.name
    }

    fn unit(&self) -> &str {
        unit_of(&self.column)
    }

    fn format(&self) -> &str {
        ".0f"
    }

    fn deps(&self) -> Vec<KindRef> {
        curve(&self.column).into_iter().collect()
    }

    fn applicable(&self, ctx: &MetricContext<'_>) -> bool {
        ctx.records()
            .numeric(&self.column)
            .is_some_and(|c| c.len() >= self.seconds as usize)
    }

    fn compute(&self, ctx: &MetricContext<'_>) -> Result<MetricValue, MetricError> {
        let seconds = f64::from(self.seconds);
        let from_curve = curve(&self.column)
            .ok()
            .and_then(|kind| ctx.get_metric(&kind))
            .and_then(MetricValue::as_curve)
            .and_then(|c| c.value_at(seconds));
        if let Some(value) = from_curve {
            return Ok(value.into());
        }

        best_mean(ctx.column(&self.column)?, self.seconds as usize)
            .map(MetricValue::Number)
            .ok_or_else(|| MetricError::Assertion(format!("activity shorter than {seconds} s")))
    }
}

fn invalid(family: &str, reason: impl Into<String>) -> PlannerError {
    PlannerError::InvalidParameters {
        family: family.to_string(),
        reason: reason.into(),
    }
}

fn column_param(family: &str, param: &Param) -> Result<String> {
    match param.as_str() {
        Some(column) if !column.is_empty() => Ok(column.to_string()),
        _ => Err(invalid(family, format!("expected a column name, got {param}"))),
    }
}

/// `Curve[column]`.
pub struct CurveFamily;

impl CurveFamily {
    pub const NAME: &'static str = "Curve";
}

impl Family for CurveFamily {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn build(&self, params: &[Param]) -> Result<Box<dyn Metric>> {
        let [column] = params else {
            return Err(invalid(Self::NAME, format!("expected 1 parameter, got {}", params.len())));
        };
        Ok(Box::new(Curve::new(column_param(Self::NAME, column)?)))
    }
}

/// `MeanMax[column,seconds]`.
pub struct MeanMaxFamily;

impl MeanMaxFamily {
    pub const NAME: &'static str = "MeanMax";
}

impl Family for MeanMaxFamily {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn build(&self, params: &[Param]) -> Result<Box<dyn Metric>> {
        let [column, seconds] = params else {
            return Err(invalid(Self::NAME, format!("expected 2 parameters, got {}", params.len())));
        };
        let column = column_param(Self::NAME, column)?;
        let seconds = seconds
            .as_int()
            .and_then(|s| u32::try_from(s).ok())
            .filter(|s| *s > 0)
            .ok_or_else(|| invalid(Self::NAME, format!("expected a positive duration, got {seconds}")))?;
        Ok(Box::new(MeanMax::new(column, seconds)))
    }
}
