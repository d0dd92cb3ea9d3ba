use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use tasklink_core::graph::adjacency::DependencyGraph;
use tasklink_core::graph::cycles::is_reachable;
use tasklink_core::graph::order;
use tasklink_core::{
    DependencyError, DependencyService, EdgeId, NewDependency, NewWorkItem, Scope,
};
use tempfile::TempDir;

use generators::*;

struct Seeded {
    _dir: TempDir,
    svc: DependencyService,
    ids: Vec<String>,
}

fn seeded() -> Seeded {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut svc = DependencyService::in_memory(dir.path().join("locks")).expect("service");
    let ids = (0..NODES)
        .map(|i| {
            svc.create_work_item(NewWorkItem::new("alpha", format!("task {i}")))
                .expect("create item")
                .id
        })
        .collect();
    Seeded {
        _dir: dir,
        svc,
        ids,
    }
}

/// Apply `ops`, checking each outcome against a model of the accepted edges.
fn run_ops(
    svc: &mut DependencyService,
    ids: &[String],
    ops: Vec<Op>,
) -> Result<Vec<(EdgeId, String, String)>, TestCaseError> {
    let mut accepted: Vec<(EdgeId, String, String)> = Vec::new();

    for op in ops {
        let before = DependencyGraph::from_pairs(
            accepted
                .iter()
                .map(|(_, pred, succ)| (pred.as_str(), succ.as_str())),
        );

        match op {
            Op::Add {
                successor,
                predecessor,
                kind,
                lag,
            } => {
                let succ = &ids[successor];
                let pred = &ids[predecessor];
                let result = svc.add_dependency(
                    &Scope::All,
                    NewDependency::new(succ, pred).with_type(kind).with_lag(lag),
                );

                match result {
                    Ok(dep) => {
                        prop_assert_ne!(successor, predecessor);
                        prop_assert!(!before.contains_edge(pred, succ));
                        prop_assert!(!is_reachable(&before, succ, pred));
                        prop_assert_eq!(dep.dependency_type, kind);
                        prop_assert_eq!(dep.lag, lag);
                        accepted.push((dep.id, pred.clone(), succ.clone()));
                    }
                    Err(DependencyError::InvalidDependency { .. }) => {
                        prop_assert_eq!(successor, predecessor);
                    }
                    Err(DependencyError::DuplicateDependency { .. }) => {
                        prop_assert!(before.contains_edge(pred, succ));
                    }
                    Err(DependencyError::CyclicDependency(path)) => {
                        prop_assert!(is_reachable(&before, succ, pred));
                        prop_assert_eq!(path.nodes().first(), Some(pred));
                        prop_assert_eq!(path.nodes().last(), Some(pred));
                    }
                    Err(other) => {
                        return Err(TestCaseError::fail(format!("unexpected error: {other}")));
                    }
                }
            }
            Op::Remove { pick } => {
                if !accepted.is_empty() {
                    let (id, _, _) = accepted.remove(pick % accepted.len());
                    svc.remove_dependency(&Scope::All, id).expect("remove accepted edge");
                }
            }
        }

        let after = DependencyGraph::from_pairs(
            accepted
                .iter()
                .map(|(_, pred, succ)| (pred.as_str(), succ.as_str())),
        );
        prop_assert!(order::topological_order(&after).is_ok());

        let report = svc.verify_acyclic(&Scope::All, "alpha").expect("scan");
        prop_assert!(report.is_acyclic());
        prop_assert_eq!(report.edges, accepted.len());
    }

    Ok(accepted)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn accepted_edges_always_admit_topological_order(ops in arb_ops(40)) {
        let Seeded { _dir, mut svc, ids } = seeded();
        run_ops(&mut svc, &ids, ops)?;

        let order = svc.topological_order(&Scope::All, "alpha").expect("order");
        prop_assert_eq!(order.len(), NODES);
    }

    #[test]
    fn listings_do_not_depend_on_call_order(ops in arb_ops(30)) {
        let Seeded { _dir, mut svc, ids } = seeded();
        run_ops(&mut svc, &ids, ops)?;

        let forward: Vec<_> = ids
            .iter()
            .map(|id| {
                (
                    svc.list_dependents(&Scope::All, id).expect("dependents"),
                    svc.list_predecessors(&Scope::All, id).expect("predecessors"),
                )
            })
            .collect();

        let mut backward: Vec<_> = ids
            .iter()
            .rev()
            .map(|id| {
                (
                    svc.list_dependents(&Scope::All, id).expect("dependents"),
                    svc.list_predecessors(&Scope::All, id).expect("predecessors"),
                )
            })
            .collect();
        backward.reverse();

        prop_assert_eq!(forward, backward);
    }
}
