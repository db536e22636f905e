use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, OnceLock},
};

use planner::{
    MetricError, MetricValue, PlannerError,
    metrics::{KindRef, Metric, MetricContext, Registry, order_deps},
};
use proptest::prelude::*;

struct Node {
    deps: Vec<KindRef>,
}

impl Metric for Node {
    fn name(&self) -> &str {
        "node"
    }

    fn deps(&self) -> Vec<KindRef> {
        self.deps.clone()
    }

    fn applicable(&self, _ctx: &MetricContext<'_>) -> bool {
        true
    }

    fn compute(&self, _ctx: &MetricContext<'_>) -> Result<MetricValue, MetricError> {
        Ok(MetricValue::Number(0.0))
    }
}

/// Random DAG: node `i` may depend on any node before it.
fn dag() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1usize..25).prop_flat_map(|size| {
        (0..size)
            .map(|i| proptest::collection::vec(0..i.max(1), 0..i.min(4) + 1))
            .collect::<Vec<_>>()
            .prop_map(|edges| {
                edges
                    .into_iter()
                    .enumerate()
                    .map(|(i, deps)| deps.into_iter().filter(|d| *d < i).collect::<Vec<usize>>())
                    .collect()
            })
    })
}

fn build(registry: &mut Registry, edges: &[Vec<usize>]) -> Vec<KindRef> {
    let mut kinds: Vec<KindRef> = Vec::with_capacity(edges.len());
    for (i, deps) in edges.iter().enumerate() {
        let deps = deps.iter().map(|d| kinds[*d].clone()).collect();
        kinds.push(registry.register_static(format!("K{i}"), Box::new(Node { deps })));
    }
    kinds
}

fn transitive_closure(desired: &[KindRef]) -> HashSet<KindRef> {
    let mut seen = HashSet::new();
    let mut stack: Vec<KindRef> = desired.to_vec();
    while let Some(kind) = stack.pop() {
        if seen.insert(kind.clone()) {
            stack.extend(kind.deps());
        }
    }
    seen
}

proptest! {
    #[test]
    fn test_prop_dependencies_precede_dependents(
        edges in dag(),
        picks in proptest::collection::vec(any::<prop::sample::Index>(), 1..6),
    ) {
        let mut registry = Registry::new();
        let kinds = build(&mut registry, &edges);
        let desired: Vec<KindRef> = picks.iter().map(|p| p.get(&kinds).clone()).collect();

        let order = order_deps(&desired).unwrap();
        let position: HashMap<&KindRef, usize> =
            order.iter().enumerate().map(|(i, k)| (k, i)).collect();

        for kind in &order {
            for dep in kind.deps() {
                prop_assert!(position[&dep] < position[kind], "{dep} after {kind}");
            }
        }
    }

    #[test]
    fn test_prop_order_is_exact_closure_without_duplicates(
        edges in dag(),
        picks in proptest::collection::vec(any::<prop::sample::Index>(), 1..6),
    ) {
        let mut registry = Registry::new();
        let kinds = build(&mut registry, &edges);
        let desired: Vec<KindRef> = picks.iter().map(|p| p.get(&kinds).clone()).collect();

        let order = order_deps(&desired).unwrap();
        let unique: HashSet<KindRef> = order.iter().cloned().collect();

        prop_assert_eq!(unique.len(), order.len());
        prop_assert_eq!(unique, transitive_closure(&desired));
    }

    #[test]
    fn test_prop_order_is_repeatable_and_ignores_duplicates(
        edges in dag(),
        picks in proptest::collection::vec(any::<prop::sample::Index>(), 1..6),
    ) {
        let mut registry = Registry::new();
        let kinds = build(&mut registry, &edges);
        let desired: Vec<KindRef> = picks.iter().map(|p| p.get(&kinds).clone()).collect();
        let mut doubled = desired.clone();
        doubled.extend(desired.iter().cloned());

        let first = order_deps(&desired).unwrap();
        prop_assert_eq!(&first, &order_deps(&desired).unwrap());
        prop_assert_eq!(&first, &order_deps(&doubled).unwrap());
    }
}

/// Metric whose dependencies are wired after registration, so a test can
/// close a loop.
struct Late(Arc<OnceLock<Vec<KindRef>>>);

impl Metric for Late {
    fn name(&self) -> &str {
        "late"
    }

    fn deps(&self) -> Vec<KindRef> {
        self.0.get().cloned().unwrap_or_default()
    }

    fn applicable(&self, _ctx: &MetricContext<'_>) -> bool {
        true
    }

    fn compute(&self, _ctx: &MetricContext<'_>) -> Result<MetricValue, MetricError> {
        Ok(MetricValue::Number(0.0))
    }
}

#[test]
fn test_cycle_is_reported_not_looped() {
    let mut registry = Registry::new();
    let a_deps = Arc::new(OnceLock::new());
    let b_deps = Arc::new(OnceLock::new());
    let a = registry.register_static("A", Box::new(Late(a_deps.clone())));
    let b = registry.register_static("B", Box::new(Late(b_deps.clone())));
    a_deps.set(vec![b.clone()]).unwrap();
    b_deps.set(vec![a.clone()]).unwrap();

    for _ in 0..3 {
        match order_deps(&[a.clone()]) {
            Err(PlannerError::DependencyCycle(path)) => {
                assert_eq!(path.first(), path.last());
                assert!(path.contains(&"A".to_string()) && path.contains(&"B".to_string()));
            }
            other => panic!("expected a cycle, got {other:?}"),
        }
    }
}
