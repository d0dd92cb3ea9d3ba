use std::path::{Path, PathBuf};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use tasklink_core::config::{EffectiveConfig, ProjectConfig};
use tasklink_core::{DependencyError, DependencyService, NewDependency, NewWorkItem, Scope};

fn config() -> EffectiveConfig {
    EffectiveConfig {
        project: ProjectConfig::default(),
        lock_timeout: Duration::from_secs(10),
        busy_timeout: Duration::from_secs(10),
    }
}

fn seed(root: &Path, count: usize) -> Vec<String> {
    let mut svc = DependencyService::open(root, &config()).expect("open store");
    (0..count)
        .map(|i| {
            svc.create_work_item(NewWorkItem::new("site", format!("step {i}")))
                .expect("create")
                .id
        })
        .collect()
}

/// Each thread adds one edge of a ring; together they would close a cycle.
fn race_ring(root: PathBuf, ids: &[String]) -> Vec<Result<(), DependencyError>> {
    let barrier = Arc::new(Barrier::new(ids.len()));
    let handles: Vec<_> = (0..ids.len())
        .map(|i| {
            let root = root.clone();
            let barrier = Arc::clone(&barrier);
            let predecessor = ids[i].clone();
            let successor = ids[(i + 1) % ids.len()].clone();
            thread::spawn(move || {
                let mut svc = DependencyService::open(&root, &config()).expect("open store");
                barrier.wait();
                svc.add_dependency(&Scope::All, NewDependency::new(successor, predecessor))
                    .map(|_| ())
            })
        })
        .collect();

    handles
        .into_iter()
        .map(|h| h.join().expect("writer thread"))
        .collect()
}

#[test]
fn two_writers_cannot_both_close_a_cycle() {
    let dir = tempfile::tempdir().expect("temp dir");
    let ids = seed(dir.path(), 2);

    let results = race_ring(dir.path().to_path_buf(), &ids);
    let ok = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(ok, 1, "results: {results:?}");
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(DependencyError::CyclicDependency(_))))
    );
}

#[test]
fn ring_of_writers_leaves_exactly_one_rejected() {
    let dir = tempfile::tempdir().expect("temp dir");
    let ids = seed(dir.path(), 6);

    let results = race_ring(dir.path().to_path_buf(), &ids);
    let rejected: Vec<_> = results.iter().filter(|r| r.is_err()).collect();
    assert_eq!(rejected.len(), 1, "results: {results:?}");
    assert!(matches!(rejected[0], Err(DependencyError::CyclicDependency(_))));

    let svc = DependencyService::open(dir.path(), &config()).expect("reopen");
    let report = svc.verify_acyclic(&Scope::All, "site").expect("scan");
    assert!(report.is_acyclic());
    assert_eq!(report.edges, ids.len() - 1);
}

#[test]
fn store_survives_reopen() {
    let dir = tempfile::tempdir().expect("temp dir");
    let ids = seed(dir.path(), 2);

    {
        let mut svc = DependencyService::open(dir.path(), &config()).expect("open");
        svc.add_dependency(&Scope::All, NewDependency::new(&ids[1], &ids[0]))
            .expect("link");
    }

    let svc = DependencyService::open(dir.path(), &config()).expect("reopen");
    let deps = svc.list_dependents(&Scope::All, &ids[0]).expect("list");
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].successor_id, ids[1]);
}
