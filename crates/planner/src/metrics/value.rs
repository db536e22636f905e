use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::Date;

/// A computed metric value.
///
/// `Number(NAN)` is a real, cached result and is distinct from a metric that
/// was never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MetricValue {
    Number(#[serde(with = "non_finite")] f64),
    Text(String),
    Date(Date),
    DateRange { start: Date, end: Date },
    Map(BTreeMap<String, MetricValue>),
    Curve(DurationCurve),
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetricValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, MetricValue>> {
        match self {
            MetricValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_curve(&self) -> Option<&DurationCurve> {
        match self {
            MetricValue::Curve(c) => Some(c),
            _ => None,
        }
    }

    /// Looks up a text entry of a map value, e.g. `sport` of the `Sport` metric.
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.as_map()?.get(key)?.as_str()
    }

    pub fn is_nan(&self) -> bool {
        matches!(self, MetricValue::Number(v) if v.is_nan())
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::Number(value)
    }
}

impl From<Date> for MetricValue {
    fn from(value: Date) -> Self {
        MetricValue::Date(value)
    }
}

/// Best average of a column for each duration, plus model predictions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationCurve {
    /// Durations in seconds.
    pub x: Vec<f64>,
    /// Best mean value sustained for each duration.
    pub y: Vec<f64>,
    /// Model name to predicted value at each `x`.
    pub predictions: BTreeMap<String, Vec<f64>>,
}

impl DurationCurve {
    pub fn value_at(&self, seconds: f64) -> Option<f64> {
        self.x
            .iter()
            .position(|&x| (x - seconds).abs() < f64::EPSILON)
            .map(|i| self.y[i])
    }

    pub fn max_duration(&self) -> f64 {
        self.x.last().copied().unwrap_or(0.0)
    }
}

/// JSON has no NaN or infinity, so those are written as strings.
mod non_finite {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_infinite() {
            serializer.serialize_str(if *value > 0.0 { "inf" } else { "-inf" })
        } else {
            serializer.serialize_f64(*value)
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(v) => Ok(v),
            Repr::Text(s) => match s.as_str() {
                "NaN" => Ok(f64::NAN),
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                other => Err(serde::de::Error::custom(format!(
                    "invalid number {other:?}"
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn test_nan_survives_json() {
        let json = serde_json::to_string(&MetricValue::Number(f64::NAN)).unwrap();
        let back: MetricValue = serde_json::from_str(&json).unwrap();
        assert!(back.is_nan());

        let json = serde_json::to_string(&MetricValue::Number(f64::NEG_INFINITY)).unwrap();
        let back: MetricValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_f64(), Some(f64::NEG_INFINITY));
    }

    #[test]
    fn test_nested_values_survive_json() {
        let mut map = BTreeMap::new();
        map.insert("sport".to_string(), MetricValue::Text("running".into()));
        map.insert(
            "block".to_string(),
            MetricValue::DateRange {
                start: date!(2024 - 01 - 01),
                end: date!(2024 - 02 - 01),
            },
        );
        let value = MetricValue::Map(map);

        let json = serde_json::to_string(&value).unwrap();
        let back: MetricValue = serde_json::from_str(&json).unwrap();

        assert_eq!(back, value);
        assert_eq!(back.field_str("sport"), Some("running"));
    }
}
