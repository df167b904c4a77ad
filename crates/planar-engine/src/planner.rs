//! The planning pipeline facade.
//!
//! [`Planner`] owns the solver and the optional plan store, and runs
//! the stages in order: build, resolve, closure, then either a verified
//! cache restore or conflict computation, reconciliation and solving.
//! The result is a [`MemoryPlan`] holding the final model, the arena
//! size and the diagnostics.

use planar_cache::{self as cache, PlanSnapshot, PlanStore};
use planar_core::{Model, NodeId, PlanError, TensorId};
use planar_graph::{build_closure, build_model, resolve, Schedule};
use planar_solver::{BestFitSolver, Solver};

use crate::assign::assign_offsets;
use crate::conflict::{compute_reuse, ConflictOptions};
use crate::dump;
use crate::reconcile::reconcile;
use crate::stats::{compute_stats, PlanStats};

/// Planner tuning knobs.
#[derive(Clone, Copy, Debug)]
pub struct PlannerConfig {
    /// Minimum tensor count before the plan cache is consulted; smaller
    /// graphs recompute cheaply.
    pub cache_threshold: usize,
    /// Candidate count at which conflict computation goes parallel.
    pub parallel_threshold: usize,
    /// Conflict worker thread count.
    pub workers: usize,
    /// Seed for the deterministic conflict batch shuffle.
    pub shuffle_seed: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            cache_threshold: 2000,
            parallel_threshold: 2000,
            workers: 4,
            shuffle_seed: 0,
        }
    }
}

/// Runs the planning pipeline over schedules.
pub struct Planner {
    config: PlannerConfig,
    solver: Box<dyn Solver>,
    store: Option<Box<dyn PlanStore>>,
}

impl Planner {
    /// A planner with the default best-fit solver and no plan store.
    #[must_use]
    pub fn new(config: PlannerConfig) -> Self {
        Self {
            config,
            solver: Box::new(BestFitSolver),
            store: None,
        }
    }

    /// Replace the packing solver.
    #[must_use]
    pub fn with_solver(mut self, solver: Box<dyn Solver>) -> Self {
        self.solver = solver;
        self
    }

    /// Attach a plan store, enabling the cache for graphs at or above
    /// the configured tensor threshold.
    #[must_use]
    pub fn with_store(mut self, store: Box<dyn PlanStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Plan one schedule. Fatal structural defects and solver failure
    /// abort with an error; cache trouble only ever costs recomputation.
    pub fn plan(&self, schedule: &Schedule) -> Result<MemoryPlan, PlanError> {
        let mut model = build_model(schedule)?;
        resolve(&mut model, schedule)?;
        let closure = build_closure(&mut model);

        let text = dump::model_text(&model);
        let hash = cache::model_hash(&text);
        let store = self
            .store
            .as_deref()
            .filter(|_| model.tensor_count() >= self.config.cache_threshold);

        let mut from_cache = false;
        let mut arena_size = 0;
        if let Some(store) = store {
            let key = cache::snapshot_key(model.graph_id, &hash);
            if let Some(snapshot) = cache::load_snapshot(store, &key) {
                if let Some(size) = snapshot.verify_and_restore(&mut model, &hash) {
                    tracing::info!(
                        graph = model.graph_id,
                        hash = %hash,
                        arena = size,
                        "restored plan from cache"
                    );
                    arena_size = size;
                    from_cache = true;
                }
            }
        }

        if !from_cache {
            let options = ConflictOptions {
                parallel_threshold: self.config.parallel_threshold,
                workers: self.config.workers,
                shuffle_seed: self.config.shuffle_seed,
            };
            let mut rows = compute_reuse(&model, &closure, &options);
            let reconciled = reconcile(&mut model, &mut rows);
            let assignment =
                assign_offsets(&mut model, &rows, &reconciled, self.solver.as_ref())?;
            arena_size = assignment.arena_size;

            if let Some(store) = store {
                let snapshot = PlanSnapshot::capture(&model, &hash, arena_size);
                cache::save_snapshot(store, &cache::snapshot_key(model.graph_id, &hash), &snapshot);
                cache::save_model_text(store, &cache::model_text_key(model.graph_id, &hash), &text);
            }
        }

        let stats = compute_stats(&model);
        tracing::info!(
            graph = model.graph_id,
            arena = arena_size,
            lower_bound = stats.lower_bound,
            upper_bound = stats.upper_bound,
            from_cache,
            "planning complete"
        );
        Ok(MemoryPlan { model, arena_size, stats, from_cache })
    }
}

/// A finished plan: one byte offset per tensor inside a shared arena.
#[derive(Clone, Debug)]
pub struct MemoryPlan {
    model: Model,
    arena_size: u64,
    stats: PlanStats,
    from_cache: bool,
}

impl MemoryPlan {
    /// Total arena size in bytes.
    #[must_use]
    pub fn arena_size(&self) -> u64 {
        self.arena_size
    }

    /// Offset of one tensor.
    pub fn tensor_offset(&self, id: TensorId) -> Result<u64, PlanError> {
        Ok(self.model.tensor(id)?.offset)
    }

    /// Offset of output `index` of `node`.
    pub fn output_offset(&self, node: NodeId, index: usize) -> Result<u64, PlanError> {
        let node = self.model.node(node)?;
        let Some(&tensor) = node.outputs.get(index) else {
            return Err(PlanError::OutputIndexOutOfRange {
                producer: node.name.clone(),
                index,
                count: node.outputs.len(),
            });
        };
        self.tensor_offset(tensor)
    }

    /// Offset of workspace `index` of `node`.
    pub fn workspace_offset(&self, node: NodeId, index: usize) -> Result<u64, PlanError> {
        let node = self.model.node(node)?;
        let Some(&tensor) = node.workspaces.get(index) else {
            return Err(PlanError::WorkspaceIndexOutOfRange {
                node: node.name.clone(),
                index,
                count: node.workspaces.len(),
            });
        };
        self.tensor_offset(tensor)
    }

    /// Size diagnostics for this run.
    #[must_use]
    pub fn stats(&self) -> &PlanStats {
        &self.stats
    }

    /// True if the offsets were restored from a verified cache snapshot.
    #[must_use]
    pub fn from_cache(&self) -> bool {
        self.from_cache
    }

    /// The resolved model, for dump and diagnostic consumers.
    #[must_use]
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Canonical model text, the cache's hash input.
    #[must_use]
    pub fn model_text(&self) -> String {
        dump::model_text(&self.model)
    }

    /// Parameter table plus the canonical model text.
    #[must_use]
    pub fn full_text(&self) -> String {
        dump::full_text(&self.model)
    }

    /// Edge/constraint dump for standalone solver tooling.
    #[must_use]
    pub fn offline_text(&self) -> String {
        dump::offline_text(&self.model)
    }
}
