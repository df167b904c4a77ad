//! Deterministic text renderings of the model.
//!
//! [`model_text`] is the canonical form hashed for the plan cache, so
//! its output must be stable across runs for an unchanged graph:
//! everything is emitted in dense-id order and parameters are excluded
//! (their backing addresses vary between processes). [`full_text`]
//! prepends the parameter table for human-readable dumps, and
//! [`offline_text`] renders the edge/constraint view consumed by
//! standalone solver tooling.

use std::fmt::Write as _;

use planar_core::Model;

/// Canonical model text: tensors, nodes, stream groups, ref groups and
/// contiguous groups, without parameters.
#[must_use]
pub fn model_text(model: &Model) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "graph {}", model.graph_id);

    let _ = writeln!(out, "tensors:");
    for tensor in &model.tensors {
        let _ = writeln!(
            out,
            "%{}T size {} ori {} kind {} lifelong {} start {} end {} stream {}",
            tensor.id,
            tensor.aligned_size,
            tensor.original_size,
            tensor.kind,
            tensor.lifelong,
            tensor.lifetime.start,
            tensor.lifetime.end,
            tensor.stream,
        );
    }

    let _ = writeln!(out, "nodes:");
    for node in &model.nodes {
        let _ = write!(out, "${} {} stream {} inputs[", node.id, node.name, node.stream);
        let mut tensor_cursor = 0;
        let total = node.inputs.len() + node.input_params.len();
        for position in 0..total {
            if let Some((_, param)) =
                node.input_params.iter().find(|(pos, _)| *pos == position)
            {
                let _ = write!(out, " %{param}P");
            } else if let Some(&tensor) = node.inputs.get(tensor_cursor) {
                let _ = write!(out, " %{tensor}T");
                tensor_cursor += 1;
            }
        }
        let _ = write!(out, " ] outputs[");
        for &tensor in &node.outputs {
            let _ = write!(out, " %{tensor}T");
        }
        let _ = write!(out, " ] workspaces[");
        for &tensor in &node.workspaces {
            let _ = write!(out, " %{tensor}T");
        }
        let _ = writeln!(out, " ]");
    }

    let _ = writeln!(out, "stream groups:");
    for group in &model.stream_groups {
        for stream in group {
            let _ = write!(out, "stm{stream} ");
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "ref groups:");
    for group in &model.ref_groups {
        for tensor in group {
            let _ = write!(out, "%{tensor}T ");
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "contiguous:");
    for group in &model.contiguous_groups {
        for tensor in group {
            let _ = write!(out, "%{tensor}T ");
        }
        let _ = writeln!(out);
    }
    out
}

/// Parameter table plus the canonical model text.
#[must_use]
pub fn full_text(model: &Model) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "parameters:");
    for param in &model.parameters {
        let _ = writeln!(
            out,
            "%{}P size {} source {} index {}",
            param.id, param.size, param.source, param.output_index,
        );
    }
    out.push_str(&model_text(model));
    out
}

/// Edge/constraint dump: one line per (tensor, consumer) edge, then the
/// contiguous lists and stream groups.
#[must_use]
pub fn offline_text(model: &Model) -> String {
    use planar_core::TensorKind;

    let mut out = String::new();
    for tensor in &model.tensors {
        let head = format!(
            "edge src=n{} srcstm={}",
            tensor.producer, tensor.stream,
        );
        let tail = format!(
            "size={} lifelong={} tid={} start={} end={}",
            tensor.original_size,
            tensor.lifelong.as_u8(),
            tensor.id,
            tensor.lifetime.start,
            tensor.lifetime.end,
        );
        if matches!(tensor.kind, TensorKind::OutputOnly | TensorKind::RefOutput) {
            let _ = writeln!(out, "{head} dst=nc dststm=nc workspace=0 {tail}");
        } else {
            let workspace = u8::from(tensor.kind == TensorKind::Workspace);
            for &consumer in &tensor.consumers {
                let stream = model.nodes[consumer.index()].stream;
                let _ = writeln!(
                    out,
                    "{head} dst=n{consumer} dststm={stream} workspace={workspace} {tail}"
                );
            }
        }
    }
    for group in &model.contiguous_groups {
        let _ = write!(out, "contiguous");
        for tensor in group {
            let _ = write!(out, " {tensor}");
        }
        let _ = writeln!(out);
    }
    for group in &model.stream_groups {
        let _ = write!(out, "group");
        for stream in group {
            let _ = write!(out, " {stream}");
        }
        let _ = writeln!(out);
    }
    out
}
