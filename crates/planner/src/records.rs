//! Tabular time series and summary tables for a single activity.
//!
//! This is the shape every activity source is converted into: a sample index
//! of elapsed seconds, named columns parallel to that index, and optional
//! lap/session/HRV summaries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Vendor column names renamed on ingest.
pub const COLUMN_NAME_MAP: &[(&str, &str)] = &[
    ("unknown_90", "performance_condition"),
    ("heart_rate", "heartrate"),
    ("position_lat", "latitude"),
    ("position_long", "longitude"),
];

/// Vendor message numbers with a known meaning.
pub const MESSAGE_TYPE_MAP: &[(u16, &str)] = &[(140, "firstbeat")];

/// A single column of samples.
///
/// Numeric values are `None` where the sensor had no reading for that sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum Column {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Time-indexed samples with named columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Records {
    /// Absolute time of the first sample. Scheduled workouts only have elapsed time.
    pub start: Option<OffsetDateTime>,
    /// Seconds since the first sample, ascending.
    pub elapsed: Vec<f64>,
    columns: BTreeMap<String, Column>,
}

impl Records {
    pub fn new(start: Option<OffsetDateTime>, elapsed: Vec<f64>) -> Self {
        Self {
            start,
            elapsed,
            columns: BTreeMap::new(),
        }
    }

    /// Builds a 1 Hz table of `len` samples.
    pub fn with_seconds(start: Option<OffsetDateTime>, len: usize) -> Self {
        Self::new(start, (0..len).map(|i| i as f64).collect())
    }

    pub fn len(&self) -> usize {
        self.elapsed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elapsed.is_empty()
    }

    /// Elapsed seconds between the first and last samples.
    pub fn duration(&self) -> f64 {
        match (self.elapsed.first(), self.elapsed.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Checks that every column is parallel to the elapsed index. Tables read
    /// from disk can violate this; everything downstream relies on it.
    pub fn check_lengths(&self) -> Result<(), String> {
        match self
            .columns
            .iter()
            .find(|(_, column)| column.len() != self.len())
        {
            Some((name, column)) => Err(format!(
                "column {name} has {} samples, expected {}",
                column.len(),
                self.len()
            )),
            None => Ok(()),
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn numeric(&self, name: &str) -> Option<&[Option<f64>]> {
        match self.columns.get(name)? {
            Column::Numeric(values) => Some(values),
            Column::Text(_) => None,
        }
    }

    pub fn text(&self, name: &str) -> Option<&[Option<String>]> {
        match self.columns.get(name)? {
            Column::Text(values) => Some(values),
            Column::Numeric(_) => None,
        }
    }

    /// Distinct non-missing values of a text column, in order of first appearance.
    pub fn unique_text(&self, name: &str) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for value in self.text(name).unwrap_or_default().iter().flatten() {
            if !seen.contains(&value.as_str()) {
                seen.push(value);
            }
        }
        seen
    }

    /// Inserts or replaces a column. The column must be parallel to the index.
    pub fn insert(&mut self, name: impl Into<String>, column: Column) {
        let name = name.into();
        debug_assert_eq!(column.len(), self.len(), "column {name} has wrong length");
        self.columns.insert(name, column);
    }

    pub fn insert_numeric(&mut self, name: impl Into<String>, values: Vec<Option<f64>>) {
        self.insert(name, Column::Numeric(values));
    }

    pub fn insert_text(&mut self, name: impl Into<String>, values: Vec<Option<String>>) {
        self.insert(name, Column::Text(values));
    }

    pub fn remove(&mut self, name: &str) -> Option<Column> {
        self.columns.remove(name)
    }

    /// Applies the ingest naming rules: `enhanced_X` replaces `X`,
    /// `fractional_X` is added into `X`, then vendor names are mapped.
    pub fn standardize(&mut self, fractional: bool) {
        let enhanced: Vec<String> = self
            .columns
            .keys()
            .filter(|name| name.starts_with("enhanced_"))
            .cloned()
            .collect();
        for name in enhanced {
            if let Some(column) = self.columns.remove(&name) {
                let base = name.trim_start_matches("enhanced_").to_string();
                self.columns.insert(base, column);
            }
        }

        if fractional {
            let fractions: Vec<String> = self
                .columns
                .keys()
                .filter(|name| name.starts_with("fractional_"))
                .cloned()
                .collect();
            for name in fractions {
                let base = name.trim_start_matches("fractional_").to_string();
                let Some(Column::Numeric(fraction)) = self.columns.remove(&name) else {
                    continue;
                };
                if let Some(Column::Numeric(whole)) = self.columns.get_mut(&base) {
                    for (w, f) in whole.iter_mut().zip(fraction) {
                        if let (Some(w), Some(f)) = (w.as_mut(), f) {
                            *w += f;
                        }
                    }
                }
            }
        }

        for (from, to) in COLUMN_NAME_MAP {
            if let Some(column) = self.columns.remove(*from) {
                self.columns.insert((*to).to_string(), column);
            }
        }
    }

    /// Resamples onto a 1 Hz grid starting at the first sample.
    ///
    /// Numeric columns are linearly interpolated between known samples,
    /// text columns carry the last value forward.
    pub fn resample_1hz(&self) -> Records {
        let Some(&first) = self.elapsed.first() else {
            return self.clone();
        };
        let len = self.duration().floor() as usize + 1;
        let start = self
            .start
            .map(|s| s + time::Duration::seconds_f64(first));
        let mut out = Records::with_seconds(start, len);

        for (name, column) in &self.columns {
            let resampled = match column {
                Column::Numeric(values) => {
                    Column::Numeric(interpolate(&self.elapsed, values, first, len))
                }
                Column::Text(values) => {
                    Column::Text(forward_fill(&self.elapsed, values, first, len))
                }
            };
            out.columns.insert(name.clone(), resampled);
        }
        out
    }
}

fn interpolate(elapsed: &[f64], values: &[Option<f64>], first: f64, len: usize) -> Vec<Option<f64>> {
    let known: Vec<(f64, f64)> = elapsed
        .iter()
        .zip(values)
        .filter_map(|(t, v)| v.map(|v| (t - first, v)))
        .collect();

    let mut out = Vec::with_capacity(len);
    let mut j = 0;
    for i in 0..len {
        let t = i as f64;
        while j + 1 < known.len() && known[j + 1].0 <= t {
            j += 1;
        }
        let value = match (known.get(j), known.get(j + 1)) {
            (Some(&(t0, v0)), _) if (t0 - t).abs() < f64::EPSILON => Some(v0),
            (Some(&(t0, v0)), Some(&(t1, v1))) if t0 <= t && t <= t1 => {
                Some(v0 + (v1 - v0) * (t - t0) / (t1 - t0))
            }
            _ => None,
        };
        out.push(value);
    }
    out
}

fn forward_fill(
    elapsed: &[f64],
    values: &[Option<String>],
    first: f64,
    len: usize,
) -> Vec<Option<String>> {
    let mut out = Vec::with_capacity(len);
    let mut j = 0;
    let mut last: Option<String> = None;
    for i in 0..len {
        let t = i as f64;
        while j < elapsed.len() && elapsed[j] - first <= t {
            if values[j].is_some() {
                last = values[j].clone();
            }
            j += 1;
        }
        out.push(last.clone());
    }
    out
}

/// Overall totals reported by the recording device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityTotals {
    pub total_timer_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SportSummary {
    pub sport: String,
    pub sub_sport: Option<String>,
    pub name: Option<String>,
}

/// A vendor-specific message kept as raw numeric fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnknownMessage {
    pub kind: String,
    pub fields: BTreeMap<String, f64>,
}

impl UnknownMessage {
    /// Renames known vendor message numbers, e.g. `140` becomes `firstbeat`.
    pub fn from_number(number: u16, fields: BTreeMap<String, f64>) -> Self {
        let kind = MESSAGE_TYPE_MAP
            .iter()
            .find(|(n, _)| *n == number)
            .map(|(_, name)| (*name).to_string())
            .unwrap_or_else(|| number.to_string());
        Self { kind, fields }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summaries {
    pub activity: Option<ActivityTotals>,
    #[serde(default)]
    pub sports: Vec<SportSummary>,
    #[serde(default)]
    pub laps: Vec<BTreeMap<String, f64>>,
    #[serde(default)]
    pub sessions: Vec<BTreeMap<String, f64>>,
    /// RR intervals in seconds.
    #[serde(default)]
    pub hrv: Vec<f64>,
    #[serde(default)]
    pub unknown_messages: Vec<UnknownMessage>,
}

impl Summaries {
    pub fn unknown_message(&self, kind: &str) -> Option<&UnknownMessage> {
        self.unknown_messages.iter().find(|m| m.kind == kind)
    }
}

/// Everything an activity source produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityData {
    pub records: Records,
    #[serde(default)]
    pub summaries: Summaries,
}

impl ActivityData {
    pub fn new(records: Records) -> Self {
        Self {
            records,
            summaries: Summaries::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standardize_prefers_enhanced_and_renames() {
        let mut records = Records::with_seconds(None, 2);
        records.insert_numeric("speed", vec![Some(1.0), Some(1.0)]);
        records.insert_numeric("enhanced_speed", vec![Some(2.5), Some(3.5)]);
        records.insert_numeric("heart_rate", vec![Some(120.0), Some(121.0)]);
        records.insert_numeric("unknown_90", vec![Some(3.0), None]);

        records.standardize(true);

        assert_eq!(records.numeric("speed"), Some(&[Some(2.5), Some(3.5)][..]));
        assert!(!records.has_column("enhanced_speed"));
        assert!(records.has_column("heartrate"));
        assert!(!records.has_column("heart_rate"));
        assert!(records.has_column("performance_condition"));
    }

    #[test]
    fn test_standardize_adds_fractional_part() {
        let mut records = Records::with_seconds(None, 2);
        records.insert_numeric("cadence", vec![Some(80.0), None]);
        records.insert_numeric("fractional_cadence", vec![Some(0.5), Some(0.5)]);

        records.standardize(true);

        assert_eq!(records.numeric("cadence"), Some(&[Some(80.5), None][..]));
        assert!(!records.has_column("fractional_cadence"));
    }

    #[test]
    fn test_resample_interpolates_numeric_and_fills_text() {
        let mut records = Records::new(None, vec![0.0, 2.0, 4.0]);
        records.insert_numeric("power", vec![Some(100.0), Some(200.0), None]);
        records.insert_text(
            "sport",
            vec![Some("running".into()), None, Some("cycling".into())],
        );

        let resampled = records.resample_1hz();

        assert_eq!(resampled.len(), 5);
        assert_eq!(
            resampled.numeric("power"),
            Some(&[Some(100.0), Some(150.0), Some(200.0), None, None][..])
        );
        assert_eq!(
            resampled.unique_text("sport"),
            vec!["running", "cycling"]
        );
    }

    #[test]
    fn test_unknown_message_kind_mapping() {
        let firstbeat = UnknownMessage::from_number(140, BTreeMap::new());
        assert_eq!(firstbeat.kind, "firstbeat");
        let other = UnknownMessage::from_number(999, BTreeMap::new());
        assert_eq!(other.kind, "999");
    }
}
