use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{errors::PlannerError, metrics::MetricValue};

/// How the values of one day's activities are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reduction {
    List,
    Sum,
    Max,
}

impl FromStr for Reduction {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "list" => Ok(Reduction::List),
            "sum" => Ok(Reduction::Sum),
            "max" => Ok(Reduction::Max),
            other => Err(PlannerError::UnknownReduction(other.to_string())),
        }
    }
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Reduction::List => "list",
            Reduction::Sum => "sum",
            Reduction::Max => "max",
        })
    }
}

/// Aggregated value of one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DayValue {
    List(Vec<MetricValue>),
    Number(f64),
}

impl DayValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DayValue::Number(v) => Some(*v),
            DayValue::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[MetricValue]> {
        match self {
            DayValue::List(values) => Some(values),
            DayValue::Number(_) => None,
        }
    }
}

/// Numeric contribution of a value to a sum or max. Non-numeric values
/// count as zero; NaN stays NaN.
fn numeric(value: &MetricValue) -> f64 {
    value.as_f64().unwrap_or(0.0)
}

/// Combines the values of one day's activities, `None` standing for an
/// activity without a value. A day without activities reduces as if it had
/// one activity with value zero.
///
/// `Sum` propagates NaN. `Max` keeps the running maximum and only replaces
/// it with a strictly greater value, so a NaN wins only when it comes first.
pub fn reduce(values: Vec<Option<MetricValue>>, reduction: Reduction) -> DayValue {
    let mut values: Vec<MetricValue> = values
        .into_iter()
        .map(|v| v.unwrap_or(MetricValue::Number(0.0)))
        .collect();
    if values.is_empty() {
        values.push(MetricValue::Number(0.0));
    }

    match reduction {
        Reduction::List => DayValue::List(values),
        Reduction::Sum => DayValue::Number(values.iter().map(numeric).sum()),
        Reduction::Max => {
            let mut numbers = values.iter().map(numeric);
            let first = numbers.next().unwrap_or(0.0);
            DayValue::Number(numbers.fold(first, |max, v| if v > max { v } else { max }))
        }
    }
}
