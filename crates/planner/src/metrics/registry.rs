//! Lookup of metric kinds by key, name, or family parameters.
//!
//! The process-wide registry is built once with every built-in kind.
//! Parametric instances are created on first request and memoized, so the
//! same `(family, params)` always yields the same [`KindRef`].

use std::{
    collections::HashMap,
    sync::{LazyLock, Mutex, PoisonError},
};

use tracing::debug;

use super::{KindKey, KindRef, Metric, Param, StaticMetric, activity, curves, garmin, govss};
use crate::errors::{PlannerError, Result};

/// A parametric family of metrics such as `Curve[column]`.
pub trait Family: Send + Sync {
    fn name(&self) -> &'static str;

    /// Builds the metric for one parameter tuple, rejecting invalid tuples.
    fn build(&self, params: &[Param]) -> Result<Box<dyn Metric>>;
}

#[derive(Default)]
pub struct Registry {
    statics: HashMap<String, KindRef>,
    static_order: Vec<KindRef>,
    families: HashMap<&'static str, Box<dyn Family>>,
    instances: Mutex<HashMap<KindKey, KindRef>>,
}

static GLOBAL: LazyLock<Registry> = LazyLock::new(Registry::with_builtins);

/// The process-wide registry holding every built-in kind.
pub fn global() -> &'static Registry {
    &GLOBAL
}

/// Kind of a built-in static metric.
///
/// # Panics
/// If `T` is not registered in the global registry.
pub fn kind<T: StaticMetric>() -> KindRef {
    global()
        .static_kind(T::KEY)
        .unwrap_or_else(|| panic!("metric {} is not registered", T::KEY))
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        registry.register::<activity::TimerTime>();
        registry.register::<activity::Sport>();
        registry.register::<activity::ActivityDate>();
        registry.register::<activity::AverageSpeed>();
        registry.register::<activity::AveragePower>();
        registry.register::<activity::AverageHR>();

        registry.register::<garmin::VO2Max>();
        registry.register::<garmin::RunningVO2Max>();

        registry.register::<govss::Height>();
        registry.register::<govss::Weight>();
        registry.register::<govss::LNP>();
        registry.register::<govss::XPace>();
        registry.register::<govss::CV>();
        registry.register::<govss::RTP>();
        registry.register::<govss::IWF>();
        registry.register::<govss::GOVSS>();

        registry.register_family(curves::CurveFamily);
        registry.register_family(curves::MeanMaxFamily);

        registry
    }

    pub fn register<T: StaticMetric>(&mut self) -> KindRef {
        self.register_static(T::KEY, Box::new(T::default()))
    }

    /// Registers a static kind. Registering a key twice returns the first kind.
    pub fn register_static(&mut self, key: impl Into<String>, metric: Box<dyn Metric>) -> KindRef {
        let key = key.into();
        if let Some(existing) = self.statics.get(&key) {
            tracing::warn!("Metric {key} registered twice, keeping the first");
            return existing.clone();
        }
        let kind = KindRef::new(KindKey::Static(key.clone()), metric);
        self.statics.insert(key, kind.clone());
        self.static_order.push(kind.clone());
        kind
    }

    pub fn register_family(&mut self, family: impl Family + 'static) {
        self.families.insert(family.name(), Box::new(family));
    }

    pub fn static_kind(&self, key: &str) -> Option<KindRef> {
        self.statics.get(key).cloned()
    }

    /// Instance of a parametric family, created on first request.
    pub fn family(&self, name: &str, params: Vec<Param>) -> Result<KindRef> {
        let family = self
            .families
            .get(name)
            .ok_or_else(|| PlannerError::UnknownMetric(name.to_string()))?;

        let key = KindKey::Parametric {
            family: family.name().to_string(),
            params,
        };

        let mut instances = self.instances.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(kind) = instances.get(&key) {
            return Ok(kind.clone());
        }

        let KindKey::Parametric { params, .. } = &key else {
            unreachable!("family keys are parametric");
        };
        let metric = family.build(params)?;
        let kind = KindRef::new(key.clone(), metric);
        debug!("Created metric kind {kind}");
        instances.insert(key, kind.clone());
        Ok(kind)
    }

    /// Resolves a name to a kind.
    ///
    /// Accepts a static key (`AveragePower`), a family expression
    /// (`Curve[power]`, `MeanMax[power,300]`) or a display name
    /// (`Average power`).
    pub fn lookup_by_name(&self, name: &str) -> Result<KindRef> {
        let name = name.trim();
        if let Some(kind) = self.statics.get(name) {
            return Ok(kind.clone());
        }

        if let Some((family, params)) = parse_family_expression(name) {
            return self.family(family, params);
        }

        self.static_order
            .iter()
            .find(|kind| kind.name() == name)
            .cloned()
            .ok_or_else(|| PlannerError::UnknownMetric(name.to_string()))
    }

    /// Static kinds in registration order, then every parametric instance
    /// created so far, ordered by key.
    pub fn all_kinds(&self) -> Vec<KindRef> {
        let mut kinds = self.static_order.clone();
        let instances = self.instances.lock().unwrap_or_else(PoisonError::into_inner);
        let mut parametric: Vec<KindRef> = instances.values().cloned().collect();
        parametric.sort_by(|a, b| a.cache_key().cmp(b.cache_key()));
        kinds.extend(parametric);
        kinds
    }
}

fn parse_family_expression(name: &str) -> Option<(&str, Vec<Param>)> {
    let (family, rest) = name.split_once('[')?;
    let inner = rest.strip_suffix(']')?;
    if family.is_empty() || inner.trim().is_empty() {
        return None;
    }
    let params = inner.split(',').map(Param::parse).collect();
    Some((family.trim(), params))
}
