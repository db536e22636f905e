//! Evaluation order for a set of desired kinds.
//!
//! The required set is the breadth-first closure of `deps` over the desired
//! kinds, in first-seen order. It is then sorted topologically with Kahn's
//! algorithm; ties are broken by first-seen position, so the same input list
//! always produces the same order no matter which activity it is applied to.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use tracing::debug;

use super::KindRef;
use crate::errors::{PlannerError, Result};

/// Orders `desired` and all its transitive dependencies so that every kind
/// comes after its dependencies. Duplicates in `desired` are ignored.
///
/// # Errors
/// [`PlannerError::DependencyCycle`] if the dependency graph has a cycle.
pub fn order_deps(desired: &[KindRef]) -> Result<Vec<KindRef>> {
    let (required, deps) = closure(desired);

    let index: HashMap<&KindRef, usize> =
        required.iter().enumerate().map(|(i, k)| (k, i)).collect();

    let mut in_degree = vec![0usize; required.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); required.len()];
    for (i, kind_deps) in deps.iter().enumerate() {
        for dep in kind_deps {
            let d = index[dep];
            dependents[d].push(i);
            in_degree[i] += 1;
        }
    }

    // Ready kinds leave in first-seen order.
    let mut ready: BTreeSet<usize> = in_degree
        .iter()
        .enumerate()
        .filter(|&(_, &degree)| degree == 0)
        .map(|(i, _)| i)
        .collect();

    let mut sorted = Vec::with_capacity(required.len());
    while let Some(i) = ready.pop_first() {
        sorted.push(required[i].clone());
        for &j in &dependents[i] {
            in_degree[j] -= 1;
            if in_degree[j] == 0 {
                ready.insert(j);
            }
        }
    }

    if sorted.len() != required.len() {
        let cycle = find_cycle(&required, &deps, &in_degree);
        return Err(PlannerError::DependencyCycle(cycle));
    }

    debug!(
        "Resolved {:?} to {:?}",
        desired.iter().map(KindRef::cache_key).collect::<Vec<_>>(),
        sorted.iter().map(KindRef::cache_key).collect::<Vec<_>>()
    );
    Ok(sorted)
}

/// Breadth-first closure over `deps`, returning kinds in first-seen order
/// together with the deduplicated dependency list of each.
fn closure(desired: &[KindRef]) -> (Vec<KindRef>, Vec<Vec<KindRef>>) {
    let mut seen: HashSet<KindRef> = HashSet::new();
    let mut queue: VecDeque<KindRef> = VecDeque::new();
    for kind in desired {
        if seen.insert(kind.clone()) {
            queue.push_back(kind.clone());
        }
    }

    let mut required = Vec::new();
    let mut deps = Vec::new();
    while let Some(kind) = queue.pop_front() {
        let mut kind_deps: Vec<KindRef> = Vec::new();
        for dep in kind.deps() {
            if !kind_deps.contains(&dep) {
                kind_deps.push(dep.clone());
            }
            if seen.insert(dep.clone()) {
                queue.push_back(dep);
            }
        }
        required.push(kind);
        deps.push(kind_deps);
    }
    (required, deps)
}

/// Walks unresolved kinds back along their dependencies until one repeats.
fn find_cycle(required: &[KindRef], deps: &[Vec<KindRef>], in_degree: &[usize]) -> Vec<String> {
    let index: HashMap<&KindRef, usize> =
        required.iter().enumerate().map(|(i, k)| (k, i)).collect();

    let Some(mut current) = in_degree.iter().position(|&d| d > 0) else {
        return Vec::new();
    };

    let mut path: Vec<usize> = Vec::new();
    loop {
        if let Some(start) = path.iter().position(|&i| i == current) {
            let mut cycle: Vec<String> = path[start..]
                .iter()
                .map(|&i| required[i].cache_key().to_string())
                .collect();
            cycle.push(required[current].cache_key().to_string());
            return cycle;
        }
        path.push(current);
        // Every unresolved kind has at least one unresolved dependency.
        match deps[current].iter().map(|d| index[d]).find(|&d| in_degree[d] > 0) {
            Some(next) => current = next,
            None => {
                return path
                    .iter()
                    .map(|&i| required[i].cache_key().to_string())
                    .collect();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, OnceLock};

    use super::*;
    use crate::{
        errors::MetricError,
        metrics::{KindKey, Metric, MetricContext, MetricValue},
    };

    /// Test metric whose dependencies can be wired after creation.
    #[derive(Default)]
    struct Node {
        deps: Arc<OnceLock<Vec<KindRef>>>,
    }

    impl Metric for Node {
        fn name(&self) -> &str {
            "node"
        }

        fn deps(&self) -> Vec<KindRef> {
            self.deps.get().cloned().unwrap_or_default()
        }

        fn applicable(&self, _ctx: &MetricContext<'_>) -> bool {
            true
        }

        fn compute(&self, _ctx: &MetricContext<'_>) -> Result<MetricValue, MetricError> {
            Ok(MetricValue::Number(0.0))
        }
    }

    fn node(name: &str) -> (KindRef, Arc<OnceLock<Vec<KindRef>>>) {
        let deps = Arc::new(OnceLock::new());
        let kind = KindRef::new(
            KindKey::Static(name.to_string()),
            Box::new(Node { deps: deps.clone() }),
        );
        (kind, deps)
    }

    fn keys(kinds: &[KindRef]) -> Vec<&str> {
        kinds.iter().map(KindRef::cache_key).collect()
    }

    #[test]
    fn test_dependencies_come_first() {
        let (a, a_deps) = node("A");
        let (b, b_deps) = node("B");
        let (c, _) = node("C");
        a_deps.set(vec![b.clone(), c.clone()]).unwrap();
        b_deps.set(vec![c.clone()]).unwrap();

        let order = order_deps(&[a]).unwrap();
        assert_eq!(keys(&order), vec!["C", "B", "A"]);
    }

    #[test]
    fn test_duplicates_and_overlap_are_deduplicated() {
        let (a, a_deps) = node("A");
        let (b, b_deps) = node("B");
        let (shared, _) = node("Shared");
        a_deps.set(vec![shared.clone()]).unwrap();
        b_deps.set(vec![shared.clone(), shared.clone()]).unwrap();

        let order = order_deps(&[a.clone(), b.clone(), a.clone()]).unwrap();
        assert_eq!(order.len(), 3);
        assert_eq!(order[0], shared);
        assert_eq!(keys(&order), vec!["Shared", "A", "B"]);
    }

    #[test]
    fn test_order_is_repeatable() {
        let (a, a_deps) = node("A");
        let (b, _) = node("B");
        let (c, _) = node("C");
        a_deps.set(vec![c.clone(), b.clone()]).unwrap();

        let first = order_deps(&[a.clone()]).unwrap();
        for _ in 0..10 {
            assert_eq!(order_deps(&[a.clone()]).unwrap(), first);
        }
        assert_eq!(keys(&first), vec!["C", "B", "A"]);
    }

    #[test]
    fn test_cycle_is_an_error() {
        let (a, a_deps) = node("A");
        let (b, b_deps) = node("B");
        let (c, c_deps) = node("C");
        a_deps.set(vec![b.clone()]).unwrap();
        b_deps.set(vec![c.clone()]).unwrap();
        c_deps.set(vec![a.clone()]).unwrap();

        match order_deps(&[a]) {
            Err(PlannerError::DependencyCycle(cycle)) => {
                assert_eq!(cycle.first(), cycle.last());
                assert_eq!(cycle.len(), 4);
            }
            other => panic!("expected a cycle error, got {other:?}"),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let (a, a_deps) = node("A");
        a_deps.set(vec![a.clone()]).unwrap();
        assert!(matches!(
            order_deps(&[a]),
            Err(PlannerError::DependencyCycle(_))
        ));
    }

    #[test]
    fn test_empty_input() {
        assert!(order_deps(&[]).unwrap().is_empty());
    }
}
