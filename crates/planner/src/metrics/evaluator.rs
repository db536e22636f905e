use std::time::Instant;

use tracing::{debug, warn};

use super::{KindRef, MetricContext, order_deps};
use crate::{activity::Activity, errors::Result};

/// What one evaluation pass did, by cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationSummary {
    pub retrieved: Vec<String>,
    pub computed: Vec<String>,
    pub inapplicable: Vec<String>,
    pub failed: Vec<String>,
}

/// Evaluates `ordered` kinds against `activity`, in the given order.
///
/// Inapplicable kinds are skipped without writing anything. Kinds already in
/// the activity's store (NaN included) are not recomputed unless
/// `force_recompute` is set. A failing computation is logged and leaves the
/// kind absent; the rest of the batch still runs. If anything was computed
/// the activity's cache is written once at the end.
pub fn evaluate(
    activity: &mut Activity,
    ordered: &[KindRef],
    force_recompute: bool,
) -> EvaluationSummary {
    let mut summary = EvaluationSummary::default();

    for kind in ordered {
        let ctx = MetricContext::new(kind, &activity.data, &activity.meta, &activity.metrics);
        let metric = kind.metric();

        if !metric.applicable(&ctx) {
            summary.inapplicable.push(kind.cache_key().to_string());
            continue;
        }
        if activity.metrics.contains(kind) && !force_recompute {
            summary.retrieved.push(kind.cache_key().to_string());
            continue;
        }

        let start = Instant::now();
        let result = metric.compute(&ctx);
        match result {
            Ok(value) => {
                debug!("Computing {} took {:?}", kind.name(), start.elapsed());
                activity.metrics.insert(kind, value);
                summary.computed.push(kind.cache_key().to_string());
            }
            Err(e) => {
                warn!(
                    "Metric {} not computed for {}: {e}",
                    kind.name(),
                    activity.display_name()
                );
                summary.failed.push(kind.cache_key().to_string());
            }
        }
    }

    if !summary.computed.is_empty() {
        activity.cache();
    }

    debug!(
        "{}\nRetrieved {:?} from cache\nComputed and cached {:?}",
        activity.display_name(),
        summary.retrieved,
        summary.computed
    );
    summary
}

/// A resolved evaluation order that can be applied to many activities.
#[derive(Debug, Clone)]
pub struct MetricsCalculator {
    order: Vec<KindRef>,
}

impl MetricsCalculator {
    /// Resolves `desired` and its dependencies into an evaluation order.
    pub fn new(desired: &[KindRef]) -> Result<Self> {
        Ok(Self {
            order: order_deps(desired)?,
        })
    }

    /// Uses an order that was already resolved.
    pub fn pre_ordered(order: Vec<KindRef>) -> Self {
        Self { order }
    }

    pub fn order(&self) -> &[KindRef] {
        &self.order
    }

    pub fn compute(&self, activity: &mut Activity) -> EvaluationSummary {
        evaluate(activity, &self.order, false)
    }

    pub fn recompute_all(&self, activity: &mut Activity) -> EvaluationSummary {
        evaluate(activity, &self.order, true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::{
        activity::ActivityMeta,
        errors::MetricError,
        metrics::{KindKey, Metric, MetricValue},
        records::Records,
    };

    struct Stub {
        calls: Arc<AtomicUsize>,
        applicable: bool,
        result: Result<f64, MetricError>,
        deps: Vec<KindRef>,
    }

    impl Metric for Stub {
        fn name(&self) -> &str {
            "stub"
        }

        fn deps(&self) -> Vec<KindRef> {
            self.deps.clone()
        }

        fn applicable(&self, _ctx: &MetricContext<'_>) -> bool {
            self.applicable
        }

        fn compute(&self, ctx: &MetricContext<'_>) -> Result<MetricValue, MetricError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let from_deps: f64 = self
                .deps
                .iter()
                .map(|d| ctx.get_number(d))
                .sum::<Result<f64, MetricError>>()?;
            self.result.clone().map(|v| MetricValue::Number(v + from_deps))
        }
    }

    fn stub(
        key: &str,
        applicable: bool,
        result: Result<f64, MetricError>,
        deps: Vec<KindRef>,
    ) -> (KindRef, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let kind = KindRef::new(
            KindKey::Static(key.to_string()),
            Box::new(Stub {
                calls: calls.clone(),
                applicable,
                result,
                deps,
            }),
        );
        (kind, calls)
    }

    fn activity() -> Activity {
        Activity::from_records(Records::with_seconds(None, 10), ActivityMeta::default())
    }

    #[test]
    fn test_second_evaluation_recomputes_nothing() {
        let (base, base_calls) = stub("Base", true, Ok(1.0), vec![]);
        let (top, top_calls) = stub("Top", true, Ok(10.0), vec![base.clone()]);
        let mut activity = activity();

        let calculator = MetricsCalculator::new(&[top.clone()]).unwrap();
        let first = calculator.compute(&mut activity);
        assert_eq!(first.computed, vec!["Base", "Top"]);
        assert_eq!(activity.metrics().get(&top), Some(&MetricValue::Number(11.0)));

        let before = activity.metrics().clone();
        let second = calculator.compute(&mut activity);
        assert!(second.computed.is_empty());
        assert_eq!(second.retrieved, vec!["Base", "Top"]);
        assert_eq!(activity.metrics(), &before);
        assert_eq!(base_calls.load(Ordering::SeqCst), 1);
        assert_eq!(top_calls.load(Ordering::SeqCst), 1);

        calculator.recompute_all(&mut activity);
        assert_eq!(top_calls.load(Ordering::SeqCst), 2);

        // The same order applies to a different activity without resolving.
        let reused = MetricsCalculator::pre_ordered(calculator.order().to_vec());
        let mut other = self::activity();
        assert_eq!(reused.compute(&mut other).computed, vec!["Base", "Top"]);
        assert_eq!(other.metrics().get(&top), Some(&MetricValue::Number(11.0)));
    }

    #[test]
    fn test_inapplicable_kind_is_never_stored() {
        let (gated, calls) = stub("Gated", false, Ok(1.0), vec![]);
        let mut activity = activity();

        let summary = evaluate(&mut activity, &[gated.clone()], true);

        assert_eq!(summary.inapplicable, vec!["Gated"]);
        assert!(!activity.metrics().contains(&gated));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failure_does_not_abort_batch() {
        let (broken, _) = stub(
            "Broken",
            true,
            Err(MetricError::Assertion("more than one sport".into())),
            vec![],
        );
        let (healthy, _) = stub("Healthy", true, Ok(3.0), vec![]);
        let (downstream, _) = stub("Downstream", true, Ok(0.0), vec![broken.clone()]);
        let mut activity = activity();

        let calculator =
            MetricsCalculator::new(&[broken.clone(), healthy.clone(), downstream.clone()]).unwrap();
        let summary = calculator.compute(&mut activity);

        assert_eq!(summary.failed, vec!["Broken", "Downstream"]);
        assert_eq!(summary.computed, vec!["Healthy"]);
        assert!(!activity.metrics().contains(&broken));
        assert_eq!(activity.metrics().get(&healthy), Some(&MetricValue::Number(3.0)));
    }

    #[test]
    fn test_cached_nan_is_not_recomputed() {
        let (nan, calls) = stub("Nan", true, Ok(f64::NAN), vec![]);
        let mut activity = activity();

        evaluate(&mut activity, &[nan.clone()], false);
        evaluate(&mut activity, &[nan.clone()], false);

        assert!(activity.metrics().get(&nan).is_some_and(MetricValue::is_nan));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[should_panic(expected = "without declaring it as a dependency")]
    fn test_undeclared_dependency_read_panics() {
        struct Sneaky(KindRef);
        impl Metric for Sneaky {
            fn name(&self) -> &str {
                "sneaky"
            }
            fn applicable(&self, _ctx: &MetricContext<'_>) -> bool {
                true
            }
            fn compute(&self, ctx: &MetricContext<'_>) -> Result<MetricValue, MetricError> {
                ctx.get_number(&self.0).map(MetricValue::Number)
            }
        }

        let (other, _) = stub("Other", true, Ok(1.0), vec![]);
        let sneaky = KindRef::new(KindKey::Static("Sneaky".into()), Box::new(Sneaky(other)));
        let mut activity = activity();
        evaluate(&mut activity, &[sneaky], false);
    }
}
