//! Performance management chart: chronic and acute training load.

use serde::{Deserialize, Serialize};
use time::Date;

/// Days of the chronic (long term) load average.
pub const CHRONIC_DAYS: f64 = 42.0;
/// Days of the acute (short term) load average.
pub const ACUTE_DAYS: f64 = 7.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PmcDay {
    pub date: Date,
    pub stress: f64,
    /// Long term stress.
    pub chronic: f64,
    /// Short term stress.
    pub acute: f64,
    /// Chronic minus acute.
    pub balance: f64,
    /// Change in chronic load over the last week.
    pub ramp_rate: f64,
}

/// Exponentially weighted loads for a contiguous series of daily stress.
pub fn performance_management(daily_stress: &[(Date, f64)]) -> Vec<PmcDay> {
    let chronic_k = 2.0 / (CHRONIC_DAYS + 1.0);
    let acute_k = 2.0 / (ACUTE_DAYS + 1.0);

    let mut out: Vec<PmcDay> = Vec::with_capacity(daily_stress.len());
    let (mut chronic, mut acute) = (0.0, 0.0);
    for (i, &(date, stress)) in daily_stress.iter().enumerate() {
        chronic = chronic * (1.0 - chronic_k) + stress * chronic_k;
        acute = acute * (1.0 - acute_k) + stress * acute_k;
        let week_ago = i.checked_sub(7).map_or(0.0, |j| out[j].chronic);
        out.push(PmcDay {
            date,
            stress,
            chronic,
            acute,
            balance: chronic - acute,
            ramp_rate: chronic - week_ago,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use time::{Duration, macros::date};

    use super::*;

    fn series(values: &[f64]) -> Vec<(Date, f64)> {
        let start = date!(2024 - 01 - 01);
        values
            .iter()
            .enumerate()
            .map(|(i, v)| (start + Duration::days(i as i64), *v))
            .collect()
    }

    #[test]
    fn test_steady_load_converges() {
        let pmc = performance_management(&series(&[100.0; 400]));
        let last = pmc.last().unwrap();
        assert!((last.chronic - 100.0).abs() < 0.1);
        assert!((last.acute - 100.0).abs() < 1e-6);
        assert!(last.balance.abs() < 0.1);
    }

    #[test]
    fn test_acute_load_reacts_faster() {
        let mut values = vec![0.0; 30];
        values.extend([150.0; 7]);
        let pmc = performance_management(&series(&values));
        let last = pmc.last().unwrap();
        assert!(last.acute > last.chronic);
        assert!(last.balance < 0.0);
        assert!(last.ramp_rate > 0.0);
    }
}
