//! Metric kinds and the machinery that evaluates them.
//!
//! A metric kind is a named computation with declared dependencies on other
//! kinds. Kinds are either static (one per type, e.g. [`activity::AveragePower`])
//! or instances of a parametric family (e.g. `Curve[power]`). Both flavours are
//! handled through the same [`KindRef`] handle, whose equality is identity:
//! the [`registry`] hands out exactly one handle per key.

pub mod activity;
pub mod curves;
pub mod evaluator;
pub mod garmin;
pub mod govss;
pub mod registry;
pub mod resolver;
mod value;

use std::{
    collections::BTreeMap,
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::{
    activity::ActivityMeta,
    errors::MetricError,
    records::{ActivityData, Records, Summaries},
};

pub use evaluator::{EvaluationSummary, MetricsCalculator, evaluate};
pub use registry::{Registry, global, kind};
pub use resolver::order_deps;
pub use value::{DurationCurve, MetricValue};

/// A computation over one activity.
pub trait Metric: Send + Sync {
    /// Display name.
    fn name(&self) -> &str;

    fn unit(&self) -> &str {
        ""
    }

    /// Presentation hint, e.g. `.0f` or `%d-%m-%Y`.
    fn format(&self) -> &str {
        ""
    }

    /// Kinds that must be evaluated before this one.
    fn deps(&self) -> Vec<KindRef> {
        Vec::new()
    }

    /// Whether the metric means anything for this activity.
    fn applicable(&self, ctx: &MetricContext<'_>) -> bool;

    fn compute(&self, ctx: &MetricContext<'_>) -> Result<MetricValue, MetricError>;
}

/// A metric with exactly one kind, registered under a fixed key.
pub trait StaticMetric: Metric + Default + 'static {
    const KEY: &'static str;
}

/// Parameter of a parametric family instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Param {
    Int(i64),
    Text(String),
}

impl Param {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Param::Text(s) => Some(s),
            Param::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Param::Int(i) => Some(*i),
            Param::Text(_) => None,
        }
    }

    /// Integers parse as `Int`, anything else is `Text`.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        raw.parse::<i64>()
            .map(Param::Int)
            .unwrap_or_else(|_| Param::Text(raw.to_string()))
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Int(i) => write!(f, "{i}"),
            Param::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Text(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::Text(value)
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Param::Int(value)
    }
}

impl From<u32> for Param {
    fn from(value: u32) -> Self {
        Param::Int(i64::from(value))
    }
}

/// Identity of a metric kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KindKey {
    Static(String),
    Parametric { family: String, params: Vec<Param> },
}

impl fmt::Display for KindKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KindKey::Static(name) => f.write_str(name),
            KindKey::Parametric { family, params } => {
                let params: Vec<String> = params.iter().map(ToString::to_string).collect();
                write!(f, "{family}[{}]", params.join(","))
            }
        }
    }
}

struct Kind {
    key: KindKey,
    cache_key: String,
    metric: Box<dyn Metric>,
}

/// Shared handle to a registered metric kind.
///
/// Equality and hashing use the handle's identity, not its key, so two kinds
/// built outside a registry with the same key are still different kinds.
#[derive(Clone)]
pub struct KindRef(Arc<Kind>);

impl KindRef {
    pub(crate) fn new(key: KindKey, metric: Box<dyn Metric>) -> Self {
        let cache_key = key.to_string();
        Self(Arc::new(Kind {
            key,
            cache_key,
            metric,
        }))
    }

    pub fn key(&self) -> &KindKey {
        &self.0.key
    }

    /// Stable string used to key cached results: the type key for static
    /// kinds, `Family[params]` for parametric ones.
    pub fn cache_key(&self) -> &str {
        &self.0.cache_key
    }

    pub fn name(&self) -> &str {
        self.0.metric.name()
    }

    pub fn unit(&self) -> &str {
        self.0.metric.unit()
    }

    pub fn format(&self) -> &str {
        self.0.metric.format()
    }

    pub fn deps(&self) -> Vec<KindRef> {
        self.0.metric.deps()
    }

    pub fn metric(&self) -> &dyn Metric {
        self.0.metric.as_ref()
    }
}

impl PartialEq for KindRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for KindRef {}

impl Hash for KindRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.0), state);
    }
}

impl fmt::Debug for KindRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KindRef({})", self.cache_key())
    }
}

impl fmt::Display for KindRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cache_key())
    }
}

/// Computed values of one activity, keyed by [`KindRef::cache_key`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricStore(BTreeMap<String, MetricValue>);

impl MetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: &KindRef) -> Option<&MetricValue> {
        self.0.get(kind.cache_key())
    }

    pub fn contains(&self, kind: &KindRef) -> bool {
        self.0.contains_key(kind.cache_key())
    }

    pub(crate) fn insert(&mut self, kind: &KindRef, value: MetricValue) {
        self.0.insert(kind.cache_key().to_string(), value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Transient view handed to one metric while it is evaluated.
pub struct MetricContext<'a> {
    kind: &'a KindRef,
    deps: Vec<KindRef>,
    data: &'a ActivityData,
    meta: &'a ActivityMeta,
    results: &'a MetricStore,
}

impl<'a> MetricContext<'a> {
    pub fn new(
        kind: &'a KindRef,
        data: &'a ActivityData,
        meta: &'a ActivityMeta,
        results: &'a MetricStore,
    ) -> Self {
        Self {
            kind,
            deps: kind.deps(),
            data,
            meta,
            results,
        }
    }

    pub fn kind(&self) -> &KindRef {
        self.kind
    }

    pub fn records(&self) -> &'a Records {
        &self.data.records
    }

    pub fn summaries(&self) -> &'a Summaries {
        &self.data.summaries
    }

    pub fn meta(&self) -> &'a ActivityMeta {
        self.meta
    }

    /// Value of a declared dependency, `None` if it was inapplicable or failed.
    ///
    /// # Panics
    /// If `dep` is not one of this kind's declared dependencies.
    pub fn get_metric(&self, dep: &KindRef) -> Option<&'a MetricValue> {
        assert!(
            self.deps.contains(dep),
            "{} read {} without declaring it as a dependency",
            self.kind,
            dep
        );
        self.results.get(dep)
    }

    /// Numeric value of a declared dependency.
    pub fn get_number(&self, dep: &KindRef) -> Result<f64, MetricError> {
        self.get_metric(dep)
            .and_then(MetricValue::as_f64)
            .ok_or_else(|| MetricError::MissingDependency(dep.cache_key().to_string()))
    }

    /// Numeric column, or [`MetricError::MissingColumn`].
    pub fn column(&self, name: &str) -> Result<&'a [Option<f64>], MetricError> {
        self.data
            .records
            .numeric(name)
            .ok_or_else(|| MetricError::MissingColumn(name.to_string()))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.data.records.has_column(name)
    }
}
