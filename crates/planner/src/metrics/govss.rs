//! Gravity-ordered velocity stress score for running.
//!
//! Running power is estimated from speed and slope with an aerodynamic,
//! kinetic and gradient cost model, then normalized like cycling power.

use super::{
    KindRef, Metric, MetricContext, MetricValue, StaticMetric,
    activity::{Sport, TimerTime, is_running},
    kind,
};
use crate::errors::MetricError;

/// Speed in m/s at which the stress score is normalized.
pub const CRITICAL_VELOCITY: f64 = 3.3333;

/// Metabolic power in watts of running at `speed` m/s.
///
/// `distance` and `initial_speed` add the kinetic cost of accelerating from
/// `initial_speed` over `distance` meters; with a zero distance that term is
/// dropped.
pub fn calculate_power(
    weight: f64,
    height: f64,
    speed: f64,
    slope: f64,
    distance: f64,
    initial_speed: f64,
) -> f64 {
    let frontal_area = 0.2025 * height.powf(0.725) * weight.powf(0.425) * 0.266;
    let c_aero = 0.5 * 1.2 * 0.9 * frontal_area * speed * speed / weight;

    let c_kin = if distance != 0.0 {
        0.5 * (speed * speed - initial_speed * initial_speed) / distance
    } else {
        0.0
    };

    let c_slope = 155.4 * slope.powi(5) - 30.4 * slope.powi(4) - 43.3 * slope.powi(3)
        + 46.3 * slope.powi(2)
        + 19.5 * slope
        + 3.6;

    let efficiency = (0.25 + 0.054 * speed) * (1.0 - 0.5 * speed / 8.33);

    (c_aero + c_kin + c_slope * efficiency) * speed * weight
}

/// Flat-ground power at a steady speed.
fn steady_power(weight: f64, height: f64, speed: f64) -> f64 {
    calculate_power(weight, height, speed, 0.0, 0.0, 0.0)
}

/// Mean of the non-NaN values.
fn nan_mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 { f64::NAN } else { sum / count as f64 }
}

/// First index of each trailing window of `seconds` ending at every sample.
fn window_starts(elapsed: &[f64], seconds: f64) -> Vec<usize> {
    let mut starts = Vec::with_capacity(elapsed.len());
    let mut start = 0;
    for &t in elapsed {
        while elapsed[start] <= t - seconds {
            start += 1;
        }
        starts.push(start);
    }
    starts
}

/// First difference with a leading NaN.
fn diff(values: &[f64]) -> Vec<f64> {
    std::iter::once(f64::NAN)
        .chain(values.windows(2).map(|w| w[1] - w[0]))
        .collect()
}

/// Lactate-normalized power of a run.
pub fn lactate_normalized_power(
    elapsed: &[f64],
    distance: &[f64],
    altitude: &[f64],
    weight: f64,
    height: f64,
) -> f64 {
    let d_speed = diff(distance);
    let distance_diff: Vec<f64> = d_speed.iter().map(|&d| if d < 0.1 { 0.0 } else { d }).collect();
    let slope: Vec<f64> = diff(altitude)
        .iter()
        .zip(&distance_diff)
        .map(|(rise, run)| {
            let s = rise / run;
            if s.is_infinite() { 0.0 } else { s }
        })
        .collect();

    let power: Vec<f64> = window_starts(elapsed, 120.0)
        .into_iter()
        .enumerate()
        .map(|(i, start)| {
            let speed120 = nan_mean(d_speed[start..=i].iter().copied());
            let slope120 = nan_mean(slope[start..=i].iter().copied());
            calculate_power(
                weight,
                height,
                speed120,
                slope120,
                distance[i] - distance[start],
                d_speed[start],
            )
        })
        .collect();

    let power30_4 = window_starts(elapsed, 30.0)
        .into_iter()
        .enumerate()
        .map(|(i, start)| nan_mean(power[start..=i].iter().copied()).powi(4));

    let lnp = nan_mean(power30_4).powf(0.25);
    if lnp.is_nan() { 0.0 } else { lnp }
}

/// Flat-ground speed whose steady power matches `lnp`, found by bisection
/// to within 1 W.
pub fn equivalent_pace(lnp: f64, weight: f64, height: f64) -> f64 {
    let (mut low, mut high) = (0.0, 10.0);
    if lnp <= 0.0 {
        return low;
    }
    if lnp >= steady_power(weight, height, high) {
        return high;
    }

    let mut speed = (low + high) / 2.0;
    for _ in 0..64 {
        speed = (low + high) / 2.0;
        let watts = steady_power(weight, height, speed);
        if (watts - lnp).abs() < 1.0 {
            break;
        }
        if watts < lnp {
            low = speed;
        } else {
            high = speed;
        }
    }
    speed
}

fn running_deps(extra: &[KindRef]) -> Vec<KindRef> {
    let mut deps = vec![kind::<Sport>()];
    deps.extend_from_slice(extra);
    deps
}

/// Athlete height in meters, from the activity metadata.
#[derive(Debug, Default)]
pub struct Height;

impl StaticMetric for Height {
    const KEY: &'static str = "Height";
}

impl Metric for Height {
    fn name(&self) -> &str {
        "Height"
    }

    fn unit(&self) -> &str {
        "m"
    }

    fn format(&self) -> &str {
        ".2f"
    }

    fn applicable(&self, ctx: &MetricContext<'_>) -> bool {
        ctx.meta().athlete.is_some()
    }

    fn compute(&self, ctx: &MetricContext<'_>) -> Result<MetricValue, MetricError> {
        ctx.meta()
            .athlete
            .map(|a| MetricValue::Number(a.height))
            .ok_or_else(|| MetricError::Assertion("no athlete attributes".into()))
    }
}

/// Athlete weight in kilograms, from the activity metadata.
#[derive(Debug, Default)]
pub struct Weight;

impl StaticMetric for Weight {
    const KEY: &'static str = "Weight";
}

impl Metric for Weight {
    fn name(&self) -> &str {
        "Weight"
    }

    fn unit(&self) -> &str {
        "kg"
    }

    fn format(&self) -> &str {
        ".1f"
    }

    fn applicable(&self, ctx: &MetricContext<'_>) -> bool {
        ctx.meta().athlete.is_some()
    }

    fn compute(&self, ctx: &MetricContext<'_>) -> Result<MetricValue, MetricError> {
        ctx.meta()
            .athlete
            .map(|a| MetricValue::Number(a.weight))
            .ok_or_else(|| MetricError::Assertion("no athlete attributes".into()))
    }
}

#[derive(Debug, Default)]
pub struct LNP;

impl StaticMetric for LNP {
    const KEY: &'static str = "LNP";
}

impl Metric for LNP {
    fn name(&self) -> &str {
        "Lactate normalized power"
    }

    fn unit(&self) -> &str {
        "W"
    }

    fn format(&self) -> &str {
        ".0f"
    }

    fn deps(&self) -> Vec<KindRef> {
        running_deps(&[kind::<Height>(), kind::<Weight>()])
    }

    fn applicable(&self, ctx: &MetricContext<'_>) -> bool {
        is_running(ctx) && ctx.has_column("distance")
    }

    fn compute(&self, ctx: &MetricContext<'_>) -> Result<MetricValue, MetricError> {
        let weight = ctx.get_number(&kind::<Weight>())?;
        let height = ctx.get_number(&kind::<Height>())?;

        let records = ctx.records();
        let distance: Vec<f64> = ctx
            .column("distance")?
            .iter()
            .map(|d| d.unwrap_or(f64::NAN))
            .collect();
        let altitude: Vec<f64> = match records.numeric("altitude") {
            Some(altitude) => altitude.iter().map(|a| a.unwrap_or(f64::NAN)).collect(),
            None => vec![0.0; distance.len()],
        };

        Ok(lactate_normalized_power(&records.elapsed, &distance, &altitude, weight, height).into())
    }
}

/// Flat-ground pace equivalent to the run's normalized power.
#[derive(Debug, Default)]
pub struct XPace;

impl StaticMetric for XPace {
    const KEY: &'static str = "XPace";
}

impl Metric for XPace {
    fn name(&self) -> &str {
        "xPace"
    }

    fn unit(&self) -> &str {
        "m/s"
    }

    fn format(&self) -> &str {
        ".2f"
    }

    fn deps(&self) -> Vec<KindRef> {
        running_deps(&[kind::<Height>(), kind::<Weight>(), kind::<LNP>()])
    }

    fn applicable(&self, ctx: &MetricContext<'_>) -> bool {
        is_running(ctx)
    }

    fn compute(&self, ctx: &MetricContext<'_>) -> Result<MetricValue, MetricError> {
        let weight = ctx.get_number(&kind::<Weight>())?;
        let height = ctx.get_number(&kind::<Height>())?;
        let lnp = ctx.get_number(&kind::<LNP>())?;
        Ok(equivalent_pace(lnp, weight, height).into())
    }
}

#[derive(Debug, Default)]
pub struct CV;

impl StaticMetric for CV {
    const KEY: &'static str = "CV";
}

impl Metric for CV {
    fn name(&self) -> &str {
        "Critical velocity"
    }

    fn unit(&self) -> &str {
        "m/s"
    }

    fn deps(&self) -> Vec<KindRef> {
        running_deps(&[])
    }

    fn applicable(&self, ctx: &MetricContext<'_>) -> bool {
        is_running(ctx)
    }

    fn compute(&self, _ctx: &MetricContext<'_>) -> Result<MetricValue, MetricError> {
        Ok(CRITICAL_VELOCITY.into())
    }
}

/// Running threshold power: steady power at critical velocity.
#[derive(Debug, Default)]
pub struct RTP;

impl StaticMetric for RTP {
    const KEY: &'static str = "RTP";
}

impl Metric for RTP {
    fn name(&self) -> &str {
        "Running threshold power"
    }

    fn unit(&self) -> &str {
        "W"
    }

    fn format(&self) -> &str {
        ".0f"
    }

    fn deps(&self) -> Vec<KindRef> {
        running_deps(&[kind::<Height>(), kind::<Weight>(), kind::<CV>()])
    }

    fn applicable(&self, ctx: &MetricContext<'_>) -> bool {
        is_running(ctx)
    }

    fn compute(&self, ctx: &MetricContext<'_>) -> Result<MetricValue, MetricError> {
        let weight = ctx.get_number(&kind::<Weight>())?;
        let height = ctx.get_number(&kind::<Height>())?;
        let cv = ctx.get_number(&kind::<CV>())?;
        Ok(steady_power(weight, height, cv).into())
    }
}

#[derive(Debug, Default)]
pub struct IWF;

impl StaticMetric for IWF {
    const KEY: &'static str = "IWF";
}

impl Metric for IWF {
    fn name(&self) -> &str {
        "Intensity weighting factor"
    }

    fn format(&self) -> &str {
        ".2f"
    }

    fn deps(&self) -> Vec<KindRef> {
        running_deps(&[kind::<LNP>(), kind::<RTP>()])
    }

    fn applicable(&self, ctx: &MetricContext<'_>) -> bool {
        is_running(ctx)
    }

    fn compute(&self, ctx: &MetricContext<'_>) -> Result<MetricValue, MetricError> {
        let lnp = ctx.get_number(&kind::<LNP>())?;
        let rtp = ctx.get_number(&kind::<RTP>())?;
        Ok((lnp / rtp).into())
    }
}

#[derive(Debug, Default)]
pub struct GOVSS;

impl StaticMetric for GOVSS {
    const KEY: &'static str = "GOVSS";
}

impl Metric for GOVSS {
    fn name(&self) -> &str {
        "Gravity ordered velocity stress score"
    }

    fn format(&self) -> &str {
        ".0f"
    }

    fn deps(&self) -> Vec<KindRef> {
        running_deps(&[kind::<LNP>(), kind::<RTP>(), kind::<TimerTime>()])
    }

    fn applicable(&self, ctx: &MetricContext<'_>) -> bool {
        is_running(ctx)
    }

    fn compute(&self, ctx: &MetricContext<'_>) -> Result<MetricValue, MetricError> {
        let lnp = ctx.get_number(&kind::<LNP>())?;
        let rtp = ctx.get_number(&kind::<RTP>())?;
        let time = ctx.get_number(&kind::<TimerTime>())?;

        let raw = lnp * lnp / rtp * time;
        let normalizing_factor = rtp * 3600.0;
        Ok((raw / normalizing_factor * 100.0).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        activity::{Activity, ActivityMeta, AthleteAttributes},
        metrics::MetricsCalculator,
        records::Records,
    };

    const WEIGHT: f64 = 70.0;
    const HEIGHT: f64 = 1.8;

    fn steady_run(speed: f64, seconds: usize) -> Activity {
        let mut records = Records::with_seconds(None, seconds);
        records.insert_numeric(
            "distance",
            (0..seconds).map(|i| Some(i as f64 * speed)).collect(),
        );
        records.insert_numeric("speed", vec![Some(speed); seconds]);
        records.insert_text("sport", vec![Some("running".into()); seconds]);
        let meta = ActivityMeta {
            athlete: Some(AthleteAttributes {
                height: HEIGHT,
                weight: WEIGHT,
            }),
            ..ActivityMeta::default()
        };
        Activity::from_records(records, meta)
    }

    #[test]
    fn test_power_grows_with_speed_and_slope() {
        let flat = steady_power(WEIGHT, HEIGHT, 3.0);
        assert!(flat > 0.0);
        assert!(steady_power(WEIGHT, HEIGHT, 4.0) > flat);
        assert!(calculate_power(WEIGHT, HEIGHT, 3.0, 0.05, 0.0, 0.0) > flat);
    }

    #[test]
    fn test_steady_run_normalizes_to_steady_power() {
        let mut run = steady_run(CRITICAL_VELOCITY, 1800);
        let govss = kind::<GOVSS>();
        MetricsCalculator::new(&[govss.clone(), kind::<XPace>(), kind::<IWF>()])
            .unwrap()
            .compute(&mut run);

        let metrics = run.metrics();
        let lnp = metrics.get(&kind::<LNP>()).and_then(MetricValue::as_f64).unwrap();
        let rtp = metrics.get(&kind::<RTP>()).and_then(MetricValue::as_f64).unwrap();
        assert!((lnp - rtp).abs() / rtp < 0.01, "lnp {lnp} rtp {rtp}");

        let iwf = metrics.get(&kind::<IWF>()).and_then(MetricValue::as_f64).unwrap();
        assert!((iwf - 1.0).abs() < 0.01);

        // Half an hour at threshold scores about 50.
        let score = metrics.get(&govss).and_then(MetricValue::as_f64).unwrap();
        assert!((score - 50.0).abs() < 1.5, "score {score}");

        let xpace = metrics.get(&kind::<XPace>()).and_then(MetricValue::as_f64).unwrap();
        assert!((steady_power(WEIGHT, HEIGHT, xpace) - lnp).abs() < 1.0);
    }

    #[test]
    fn test_equivalent_pace_bounds() {
        assert_eq!(equivalent_pace(0.0, WEIGHT, HEIGHT), 0.0);
        assert_eq!(equivalent_pace(1e6, WEIGHT, HEIGHT), 10.0);
    }

    #[test]
    fn test_stationary_run_scores_zero_lnp() {
        let mut run = steady_run(0.0, 300);
        let lnp = kind::<LNP>();
        MetricsCalculator::new(&[lnp.clone()]).unwrap().compute(&mut run);
        let value = run.metrics().get(&lnp).and_then(MetricValue::as_f64).unwrap();
        assert!(value.is_finite());
    }

    #[test]
    fn test_no_athlete_attributes_leaves_govss_absent() {
        let mut run = steady_run(3.0, 300);
        run.meta.athlete = None;
        let govss = kind::<GOVSS>();
        let summary = MetricsCalculator::new(&[govss.clone()]).unwrap().compute(&mut run);

        assert!(summary.inapplicable.contains(&"Height".to_string()));
        assert!(!run.metrics().contains(&govss));
    }
}
