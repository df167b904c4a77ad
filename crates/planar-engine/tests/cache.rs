//! Plan cache behavior over the full pipeline.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use planar_cache::{MemStore, PlanStore};
use planar_core::TensorId;
use planar_engine::{Planner, PlannerConfig};
use planar_test_utils::ScheduleBuilder;

fn caching_config() -> PlannerConfig {
    PlannerConfig { cache_threshold: 0, ..PlannerConfig::default() }
}

fn sample_schedule() -> ScheduleBuilder {
    let mut b = ScheduleBuilder::new();
    b.graph_id(3);
    let mut step = b.step(0, &[512]);
    for _ in 0..3 {
        let next = b.step(0, &[512]);
        b.consume(next, step, 0);
        step = next;
    }
    let other = b.step(1, &[256]);
    b.sync(step, other);
    b
}

fn offsets(plan: &planar_engine::MemoryPlan) -> Vec<u64> {
    (0..plan.model().tensor_count())
        .map(|i| plan.tensor_offset(TensorId(i as u32)).unwrap())
        .collect()
}

#[test]
fn second_run_restores_identical_offsets_from_cache() {
    let store = Arc::new(MemStore::default());
    let schedule = sample_schedule().finish();

    let first = Planner::new(caching_config())
        .with_store(Box::new(store.clone()))
        .plan(&schedule)
        .unwrap();
    assert!(!first.from_cache());

    let second = Planner::new(caching_config())
        .with_store(Box::new(store))
        .plan(&schedule)
        .unwrap();
    assert!(second.from_cache());
    assert_eq!(second.arena_size(), first.arena_size());
    assert_eq!(offsets(&second), offsets(&first));
}

#[test]
fn small_graphs_skip_the_cache() {
    let store = Arc::new(MemStore::default());
    let schedule = sample_schedule().finish();
    let config = PlannerConfig { cache_threshold: 1000, ..PlannerConfig::default() };

    Planner::new(config)
        .with_store(Box::new(store.clone()))
        .plan(&schedule)
        .unwrap();
    let again = Planner::new(config)
        .with_store(Box::new(store))
        .plan(&schedule)
        .unwrap();
    assert!(!again.from_cache());
}

#[test]
fn tampered_snapshot_falls_back_to_recomputation() {
    let store = Arc::new(MemStore::default());
    let schedule = sample_schedule().finish();

    let first = Planner::new(caching_config())
        .with_store(Box::new(store.clone()))
        .plan(&schedule)
        .unwrap();

    // Corrupt the persisted structural counts.
    let key = planar_cache::snapshot_key(3, &planar_cache::model_hash(&first.model_text()));
    let mut snapshot = planar_cache::load_snapshot(&store, &key).unwrap();
    snapshot.tensor_size += 1;
    planar_cache::save_snapshot(&*store, &key, &snapshot);

    let second = Planner::new(caching_config())
        .with_store(Box::new(store))
        .plan(&schedule)
        .unwrap();
    assert!(!second.from_cache());
    assert_eq!(offsets(&second), offsets(&first));
}

/// Serves garbage on the first load of each key, then delegates.
struct FlakyStore {
    inner: Arc<MemStore>,
    failed_once: AtomicBool,
}

impl PlanStore for FlakyStore {
    fn save(&self, key: &str, bytes: &[u8]) -> io::Result<()> {
        self.inner.save(key, bytes)
    }

    fn load(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        if !self.failed_once.swap(true, Ordering::SeqCst) {
            return Ok(Some(b"not a snapshot".to_vec()));
        }
        self.inner.load(key)
    }
}

#[test]
fn corrupt_read_retries_once_and_then_hits() {
    let inner = Arc::new(MemStore::default());
    let schedule = sample_schedule().finish();

    let first = Planner::new(caching_config())
        .with_store(Box::new(inner.clone()))
        .plan(&schedule)
        .unwrap();

    let flaky = FlakyStore { inner, failed_once: AtomicBool::new(false) };
    let second = Planner::new(caching_config())
        .with_store(Box::new(flaky))
        .plan(&schedule)
        .unwrap();
    assert!(second.from_cache());
    assert_eq!(offsets(&second), offsets(&first));
}

#[test]
fn filesystem_store_round_trips_a_plan() {
    let dir = tempfile::tempdir().unwrap();
    let schedule = sample_schedule().finish();

    let first = Planner::new(caching_config())
        .with_store(Box::new(planar_cache::FsStore::new(dir.path())))
        .plan(&schedule)
        .unwrap();
    assert!(!first.from_cache());

    let second = Planner::new(caching_config())
        .with_store(Box::new(planar_cache::FsStore::new(dir.path())))
        .plan(&schedule)
        .unwrap();
    assert!(second.from_cache());
    assert_eq!(offsets(&second), offsets(&first));
}
