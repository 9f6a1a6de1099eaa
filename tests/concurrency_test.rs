mod common;

use assert2::check;
use common::{ids, TempWorkspace};
use query_elevation::{
    Candidate, ElevationParams, EngineConfig, NoDocuments, QueryElevator, RawRule, RuleFile,
    SnapshotKey, SortOrder,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};

fn ranked() -> Vec<Candidate> {
    (0..20)
        .map(|i| Candidate::new(format!("doc{:02}", i), 20.0 - i as f32))
        .collect()
}

fn merged_ids(elevator: &QueryElevator, snapshot: u64) -> Vec<String> {
    let docs = elevator.elevate(
        &SnapshotKey(snapshot),
        "ipod",
        &ElevationParams::default(),
        SortOrder::Relevance,
        &ranked(),
        &NoDocuments,
    );
    ids(&docs).into_iter().map(str::to_string).collect()
}

fn expected(elevated: &[&str]) -> Vec<String> {
    let mut out: Vec<String> = elevated.iter().map(|id| id.to_string()).collect();
    out.extend(
        ranked()
            .into_iter()
            .map(|c| c.id.to_string())
            .filter(|id| !elevated.contains(&id.as_str())),
    );
    out
}

/// Test: Concurrent requests against one elevator always see a whole rule set,
/// never a mix of two.
#[test]
fn requests_see_old_or_new_rules_during_reloads() {
    let elevator: QueryElevator = QueryElevator::with_rules(
        EngineConfig::default(),
        vec![RawRule::new("ipod", ["doc10", "doc11"], [] as [&str; 0])],
    )
    .unwrap();
    let old = expected(&["doc10", "doc11"]);
    let new = expected(&["doc19"]);
    let done = AtomicBool::new(false);
    let barrier = Barrier::new(5);

    std::thread::scope(|scope| {
        for worker in 0..4u64 {
            let (elevator, old, new, done, barrier) = (&elevator, &old, &new, &done, &barrier);
            scope.spawn(move || {
                barrier.wait();
                let mut round = 0;
                while !done.load(Ordering::SeqCst) {
                    let result = merged_ids(elevator, worker * 1000 + round % 3);
                    check!(result == *old || result == *new);
                    round += 1;
                }
            });
        }

        barrier.wait();
        for i in 0..50 {
            if i % 2 == 0 {
                elevator.set_top_query_results("ipod", ["doc19"], [] as [&str; 0]).unwrap();
            } else {
                elevator
                    .set_top_query_results("ipod", [] as [&str; 0], [] as [&str; 0])
                    .unwrap();
            }
        }
        done.store(true, Ordering::SeqCst);
    });

    // 50 toggles leave the override removed.
    check!(merged_ids(&elevator, 1) == old);
}

/// Test: Racing first requests for one snapshot read the rule file once.
#[test]
fn one_build_per_snapshot_under_contention() {
    let workspace = TempWorkspace::new();
    let path = workspace.write_file("elevate.toml", "[[rule]]\nquery = \"ipod\"\nelevate = [\"doc05\"]\n");
    let elevator: QueryElevator =
        QueryElevator::new(EngineConfig::default(), Arc::new(RuleFile::new(path))).unwrap();
    let barrier = Barrier::new(8);

    let providers: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    elevator.provider(&SnapshotKey(7))
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    check!(providers.iter().all(|p| Arc::ptr_eq(p, &providers[0])));
    check!(elevator.cached_snapshots() == 1);
    check!(merged_ids(&elevator, 7)[0] == "doc05");
}
