//! Plan caching for the Planar memory planner.
//!
//! A planning run's model is canonicalized to a deterministic text form
//! and hashed (FNV-1a, not cryptographic — this detects model drift, not
//! tampering). The finished plan is persisted as a JSON snapshot keyed by
//! graph id and hash; a later run over an unchanged graph verifies the
//! snapshot structurally and restores its offsets, skipping conflict
//! computation and solving entirely.
//!
//! Every failure here is advisory: a missing, corrupt or mismatched
//! snapshot degrades to a full recomputation, never to a planning error.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod hash;
pub mod snapshot;
pub mod store;

use std::time::Duration;

pub use hash::fnv1a_64;
pub use snapshot::{PlanSnapshot, TensorSnapshot};
pub use store::{FsStore, MemStore, PlanStore};

/// Delay before the single retry of a corrupt snapshot read.
pub const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Key of the persisted plan snapshot for one graph/hash pair.
#[must_use]
pub fn snapshot_key(graph_id: u32, hash_id: &str) -> String {
    format!("plan_graph_{graph_id}_{hash_id}.json")
}

/// Key of the persisted canonical model text.
#[must_use]
pub fn model_text_key(graph_id: u32, hash_id: &str) -> String {
    format!("plan_graph_{graph_id}_{hash_id}.info")
}

/// Hash the canonical model text into the cache's hash id.
#[must_use]
pub fn model_hash(model_text: &str) -> String {
    fnv1a_64(model_text.as_bytes()).to_string()
}

/// Load and parse a snapshot, retrying once after [`RETRY_DELAY`] on a
/// corrupt read. Returns `None` on miss or on persistent corruption.
pub fn load_snapshot(store: &dyn PlanStore, key: &str) -> Option<PlanSnapshot> {
    load_snapshot_with_delay(store, key, RETRY_DELAY)
}

/// [`load_snapshot`] with an explicit retry delay, for tests.
pub fn load_snapshot_with_delay(
    store: &dyn PlanStore,
    key: &str,
    delay: Duration,
) -> Option<PlanSnapshot> {
    match read_once(store, key) {
        Ok(found) => found,
        Err(reason) => {
            tracing::info!(key, reason, "snapshot read failed, retrying once");
            std::thread::sleep(delay);
            match read_once(store, key) {
                Ok(found) => found,
                Err(reason) => {
                    tracing::info!(key, reason, "snapshot retry failed, treating as miss");
                    None
                }
            }
        }
    }
}

fn read_once(store: &dyn PlanStore, key: &str) -> Result<Option<PlanSnapshot>, String> {
    let Some(bytes) = store.load(key).map_err(|e| e.to_string())? else {
        return Ok(None);
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| e.to_string())
}

/// Serialize and persist a snapshot. Failures are logged and swallowed;
/// an unsaved plan is still a valid plan.
pub fn save_snapshot(store: &dyn PlanStore, key: &str, snapshot: &PlanSnapshot) {
    let bytes = match serde_json::to_vec(snapshot) {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::warn!(key, %error, "snapshot serialization failed");
            return;
        }
    };
    if let Err(error) = store.save(key, &bytes) {
        tracing::warn!(key, %error, "snapshot save failed");
    }
}

/// Persist the canonical model text alongside the snapshot.
pub fn save_model_text(store: &dyn PlanStore, key: &str, text: &str) {
    if let Err(error) = store.save(key, text.as_bytes()) {
        tracing::warn!(key, %error, "model text save failed");
    }
}
