use thiserror::Error;

use crate::file_parsers::ParseError;

#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Activity parsing error: {0}")]
    Parse(#[from] ParseError),

    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("Invalid parameters for {family}: {reason}")]
    InvalidParameters { family: String, reason: String },

    #[error("Dependency cycle between metrics: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    #[error("Unknown reduction {0:?}, expected one of \"list\", \"sum\", \"max\"")]
    UnknownReduction(String),

    #[error("Invalid activity metadata: {0}")]
    InvalidMetadata(String),

    #[error("No activities found")]
    NoActivities,
}

/// Failure of a single metric computation.
///
/// These never abort an evaluation batch; the evaluator logs them and leaves
/// the metric absent for the activity.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    #[error("assertion failed: {0}")]
    Assertion(String),

    #[error("missing column {0:?}")]
    MissingColumn(String),

    #[error("dependency {0} has no value")]
    MissingDependency(String),
}

pub type Result<T, E = PlannerError> = std::result::Result<T, E>;
