//! Persisted plan snapshots: capture, structural verification, restore.

use serde::{Deserialize, Serialize};

use planar_core::{Model, NodeId};

/// Per-tensor persisted state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorSnapshot {
    /// Dense tensor id.
    pub tensor_id: u32,
    /// Aligned size at plan time.
    pub size: u64,
    /// Requested size at plan time.
    pub ori_size: u64,
    /// Numeric liveness-extension encoding.
    pub lifelong_value: u8,
    /// Lifetime start node id.
    pub life_start: u32,
    /// Lifetime end node id.
    pub life_end: u32,
    /// Assigned arena offset.
    pub offset: u64,
}

/// One persisted plan, keyed by graph id and model hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSnapshot {
    /// External graph identifier.
    pub graph_id: u32,
    /// Decimal FNV-1a hash of the canonical model text.
    pub hash_id: String,
    /// Total arena size.
    pub mem_offset: u64,
    /// Node count at plan time.
    pub node_size: usize,
    /// Tensor count at plan time.
    pub tensor_size: usize,
    /// Contiguous group count at plan time.
    pub contiguous_size: usize,
    /// Ref group count at plan time.
    pub ref_node_size: usize,
    /// Stream count at plan time.
    pub stream_size: usize,
    /// Stream group count at plan time.
    pub stream_group_size: usize,
    /// Per-tensor state.
    pub tensors: Vec<TensorSnapshot>,
}

impl PlanSnapshot {
    /// Capture a finished plan.
    #[must_use]
    pub fn capture(model: &Model, hash_id: &str, mem_offset: u64) -> Self {
        Self {
            graph_id: model.graph_id,
            hash_id: hash_id.to_string(),
            mem_offset,
            node_size: model.node_count(),
            tensor_size: model.tensor_count(),
            contiguous_size: model.contiguous_groups.len(),
            ref_node_size: model.ref_groups.len(),
            stream_size: model.streams.len(),
            stream_group_size: model.stream_groups.len(),
            tensors: model
                .tensors
                .iter()
                .map(|t| TensorSnapshot {
                    tensor_id: t.id.0,
                    size: t.aligned_size,
                    ori_size: t.original_size,
                    lifelong_value: t.lifelong.as_u8(),
                    life_start: t.lifetime.start.0,
                    life_end: t.lifetime.end.0,
                    offset: t.offset,
                })
                .collect(),
        }
    }

    /// Verify the snapshot against the current model and, if everything
    /// matches, write the persisted offsets back onto the tensors.
    ///
    /// Returns the restored arena size, or `None` (with a warning naming
    /// the first mismatch) if the snapshot does not describe this model.
    /// On `None` the model is untouched.
    pub fn verify_and_restore(&self, model: &mut Model, hash_id: &str) -> Option<u64> {
        if let Some(mismatch) = self.structural_mismatch(model, hash_id) {
            tracing::warn!(mismatch, "cached plan rejected");
            return None;
        }
        for snap in &self.tensors {
            let Ok(tensor) = model.tensor(planar_core::TensorId(snap.tensor_id)) else {
                tracing::warn!(tensor = snap.tensor_id, "cached plan names unknown tensor");
                return None;
            };
            if let Some(mismatch) = tensor_mismatch(snap, tensor) {
                tracing::warn!(tensor = snap.tensor_id, mismatch, "cached plan rejected");
                return None;
            }
        }
        for snap in &self.tensors {
            model.tensors[snap.tensor_id as usize].offset = snap.offset;
        }
        Some(self.mem_offset)
    }

    fn structural_mismatch(&self, model: &Model, hash_id: &str) -> Option<String> {
        let checks: [(&str, usize, usize); 6] = [
            ("node count", self.node_size, model.node_count()),
            ("tensor count", self.tensor_size, model.tensor_count()),
            ("contiguous count", self.contiguous_size, model.contiguous_groups.len()),
            ("ref group count", self.ref_node_size, model.ref_groups.len()),
            ("stream count", self.stream_size, model.streams.len()),
            ("stream group count", self.stream_group_size, model.stream_groups.len()),
        ];
        if self.graph_id != model.graph_id {
            return Some(format!("graph id {} vs {}", self.graph_id, model.graph_id));
        }
        if self.hash_id != hash_id {
            return Some(format!("hash id {} vs {hash_id}", self.hash_id));
        }
        for (what, cached, current) in checks {
            if cached != current {
                return Some(format!("{what} {cached} vs {current}"));
            }
        }
        None
    }
}

fn tensor_mismatch(snap: &TensorSnapshot, tensor: &planar_core::Tensor) -> Option<String> {
    if snap.size != tensor.aligned_size {
        return Some(format!("size {} vs {}", snap.size, tensor.aligned_size));
    }
    if snap.ori_size != tensor.original_size {
        return Some(format!("original size {} vs {}", snap.ori_size, tensor.original_size));
    }
    if snap.lifelong_value != tensor.lifelong.as_u8() {
        return Some(format!(
            "lifelong {} vs {}",
            snap.lifelong_value,
            tensor.lifelong.as_u8()
        ));
    }
    if NodeId(snap.life_start) != tensor.lifetime.start {
        return Some(format!("life start {} vs {}", snap.life_start, tensor.lifetime.start));
    }
    if NodeId(snap.life_end) != tensor.lifetime.end {
        return Some(format!("life end {} vs {}", snap.life_end, tensor.lifetime.end));
    }
    None
}
