//! Lifetime & Tag Resolver.
//!
//! One walk over the schedule resolves every input edge (consumer sets,
//! lifetime extension, ancestor edges, parameter deduplication) and
//! materializes cross-stream sync events, then a fixed sequence of
//! special-case passes applies the tensor category rules. Pass order
//! matters only where one pass extends a category another one set; it
//! matches the external policy the schedule encodes:
//!
//! independent → summary → aliases → inplace → disable-reuse →
//! contiguous → graph-input feeds.

use indexmap::IndexMap;

use planar_core::{
    Lifelong, Model, NodeId, NodeKind, ParamId, Parameter, PlanError, TensorId, TensorKind,
    GAP_SIZE,
};

use crate::source::{InputRef, Schedule};

/// Resolve lifetimes, tags and constraints on a freshly built model.
pub fn resolve(model: &mut Model, schedule: &Schedule) -> Result<(), PlanError> {
    resolve_inputs(model, schedule)?;
    resolve_events(model, schedule)?;

    independent_pass(model, schedule);
    summary_pass(model, schedule);
    alias_pass(model, schedule)?;
    inplace_pass(model, schedule)?;
    disable_reuse_pass(model, schedule);
    contiguous_pass(model)?;
    feed_pass(model, schedule);

    tracing::debug!(
        ref_groups = model.ref_groups.len(),
        contiguous_groups = model.contiguous_groups.len(),
        parameters = model.parameters.len(),
        "resolved lifetimes and tags"
    );
    Ok(())
}

fn resolve_inputs(model: &mut Model, schedule: &Schedule) -> Result<(), PlanError> {
    // Parameter dedup map is local to this run, keyed by producing entity
    // and output index.
    let mut param_index: IndexMap<(String, usize), ParamId> = IndexMap::new();

    for (position, step) in schedule.steps.iter().enumerate() {
        let consumer = NodeId(position as u32);
        for (input_pos, input) in step.inputs.iter().enumerate() {
            match input {
                InputRef::Bundle { .. } => {
                    return Err(PlanError::TupleInput {
                        consumer: step.name.clone(),
                        input: input_pos,
                    });
                }
                InputRef::External { name, index, size } => {
                    let next_id = ParamId(model.parameters.len() as u32);
                    let id = *param_index
                        .entry((name.clone(), *index))
                        .or_insert_with(|| {
                            model.parameters.push(Parameter {
                                id: next_id,
                                source: name.clone(),
                                output_index: *index,
                                size: *size,
                            });
                            next_id
                        });
                    model.nodes[position].input_params.push((input_pos, id));
                }
                InputRef::Produced { step: origin, index } => {
                    let tensor = lookup_output(model, schedule, *origin, *index, &step.name)?;
                    model.nodes[position].inputs.push(tensor);

                    let t = &mut model.tensors[tensor.index()];
                    if t.kind == TensorKind::OutputOnly {
                        t.kind = TensorKind::Common;
                    }
                    t.consumers.insert(consumer);
                    t.lifetime.extend_to(consumer);
                    let producer = t.producer;
                    if producer != consumer {
                        model.nodes[position].ancestors.insert(producer);
                    }
                }
            }
        }
    }
    Ok(())
}

/// Resolve `origin`'s `index`-th declared output, with fatal bounds checks.
fn lookup_output(
    model: &Model,
    schedule: &Schedule,
    origin: usize,
    index: usize,
    consumer: &str,
) -> Result<TensorId, PlanError> {
    let Some(origin_step) = schedule.steps.get(origin) else {
        return Err(PlanError::DanglingStep { consumer: consumer.to_string(), step: origin });
    };
    // Bound against the declared output count, not the node's tensor
    // list: event markers are appended to the same list later.
    if index >= origin_step.output_sizes.len() {
        return Err(PlanError::OutputIndexOutOfRange {
            producer: origin_step.name.clone(),
            index,
            count: origin_step.output_sizes.len(),
        });
    }
    Ok(model.nodes[origin].outputs[index])
}

/// Materialize one zero-size event tensor per explicit sync pair. The
/// event spans producer→consumer and forces an ancestor edge between
/// them, which is what makes the cross-stream ordering visible to the
/// dependency closure.
fn resolve_events(model: &mut Model, schedule: &Schedule) -> Result<(), PlanError> {
    for pair in &schedule.sync_pairs {
        for step in [pair.from_step, pair.to_step] {
            if step >= model.node_count() {
                return Err(PlanError::DanglingStep { consumer: "sync pair".into(), step });
            }
        }
        let from = NodeId(pair.from_step as u32);
        let to = NodeId(pair.to_step as u32);
        let id = TensorId(model.tensors.len() as u32);
        let stream = model.nodes[from.index()].stream;

        let mut tensor = planar_core::Tensor::new(id, from, stream, 0, 0);
        tensor.kind = TensorKind::EventMarker;
        tensor.lifetime.extend_to(to);
        tensor.consumers.insert(to);
        model.tensors.push(tensor);

        model.nodes[from.index()].outputs.push(id);
        model.nodes[to.index()].inputs.push(id);
        if from != to {
            model.nodes[to.index()].ancestors.insert(from);
        }
    }
    Ok(())
}

/// Outputs of isolated nodes stay live until the end of the schedule.
fn independent_pass(model: &mut Model, schedule: &Schedule) {
    let mut total = 0u64;
    for (position, step) in schedule.steps.iter().enumerate() {
        if !step.independent {
            continue;
        }
        for tensor in model.nodes[position].outputs.clone() {
            let t = &mut model.tensors[tensor.index()];
            total += t.aligned_size;
            t.lifelong = Lifelong::GraphEnd;
        }
    }
    tracing::info!(total, "special tensor size: independent node outputs");
}

/// Summary-observed outputs span the whole graph. A dangling reference
/// here is advisory: warn and keep planning.
fn summary_pass(model: &mut Model, schedule: &Schedule) {
    let mut total = 0u64;
    for sref in &schedule.summary_refs {
        let Some(step) = schedule.steps.get(sref.step) else {
            tracing::warn!(step = sref.step, "summary ref names a missing step");
            continue;
        };
        if sref.index >= step.output_sizes.len() {
            tracing::warn!(
                step = sref.step,
                index = sref.index,
                count = step.output_sizes.len(),
                "summary ref output index exceeds declared outputs"
            );
            continue;
        }
        let tensor = model.nodes[sref.step].outputs[sref.index];
        let t = &mut model.tensors[tensor.index()];
        t.lifelong = Lifelong::WholeGraph;
        t.kind = TensorKind::SummaryInput;
        total += t.aligned_size;
    }
    tracing::info!(total, "special tensor size: summary inputs");
}

/// Declared output aliases become two-member ref groups
/// `[origin, output]`.
fn alias_pass(model: &mut Model, schedule: &Schedule) -> Result<(), PlanError> {
    for (position, step) in schedule.steps.iter().enumerate() {
        for alias in &step.aliases {
            if alias.output_index >= step.output_sizes.len() {
                return Err(PlanError::OutputIndexOutOfRange {
                    producer: step.name.clone(),
                    index: alias.output_index,
                    count: step.output_sizes.len(),
                });
            }
            let output = model.nodes[position].outputs[alias.output_index];
            let origin =
                lookup_output(model, schedule, alias.origin_step, alias.origin_index, &step.name)?;

            model.tensors[output.index()].kind = TensorKind::RefOutput;
            model.tensors[origin.index()].kind = TensorKind::RefInput;
            model.ref_groups.push(vec![origin, output]);
            tracing::info!(%origin, %output, "ref constraint recorded");
        }
    }
    Ok(())
}

/// An in-place node binds its first input and all of its outputs into a
/// single ref group.
fn inplace_pass(model: &mut Model, schedule: &Schedule) -> Result<(), PlanError> {
    for (position, step) in schedule.steps.iter().enumerate() {
        if !step.inplace {
            continue;
        }
        let node = &model.nodes[position];
        let Some(&input) = node.inputs.first() else {
            return Err(PlanError::InplaceWithoutInput { node: step.name.clone() });
        };
        let mut group = vec![input];
        group.extend(node.outputs.iter().copied());

        model.tensors[input.index()].kind = TensorKind::RefInput;
        for &output in &group[1..] {
            model.tensors[output.index()].kind = TensorKind::RefOutput;
        }
        model.ref_groups.push(group);
    }
    Ok(())
}

/// Everything a reuse-disabled node touches becomes lifelong.
fn disable_reuse_pass(model: &mut Model, schedule: &Schedule) {
    for (position, step) in schedule.steps.iter().enumerate() {
        if !step.disable_reuse {
            continue;
        }
        tracing::info!(node = %step.name, "memory reuse disabled for node");
        let node = &model.nodes[position];
        let touched: Vec<TensorId> = node
            .inputs
            .iter()
            .chain(node.outputs.iter())
            .chain(node.workspaces.iter())
            .copied()
            .collect();
        for tensor in touched {
            model.tensors[tensor.index()].lifelong = Lifelong::WholeGraph;
        }
    }
}

/// Wrap every collective node's input and output lists into contiguous
/// groups, reserving the inter-buffer gap on the first and last non-empty
/// member.
fn contiguous_pass(model: &mut Model) -> Result<(), PlanError> {
    for position in 0..model.node_count() {
        if model.nodes[position].kind != NodeKind::Collective {
            continue;
        }
        let name = model.nodes[position].name.clone();

        let inputs = model.nodes[position].inputs.clone();
        if let Some(total) = collect_group(model, &name, &inputs)? {
            model.comm_input_total += total;
        }
        let outputs = model.nodes[position].outputs.clone();
        if let Some(total) = collect_group(model, &name, &outputs)? {
            model.comm_output_total += total;
        }
    }
    Ok(())
}

/// Turn `members` into one contiguous group; returns its total aligned
/// size, or `None` when the list is empty or already grouped (a tensor
/// may feed several collectives, the first one wins).
fn collect_group(
    model: &mut Model,
    node: &str,
    members: &[TensorId],
) -> Result<Option<u64>, PlanError> {
    let Some(&first) = members.first() else {
        return Ok(None);
    };
    if model.tensors[first.index()].contiguous {
        return Ok(None);
    }

    // A zero-size member needs no gap padding.
    for &edge in [first, *members.last().unwrap_or(&first)].iter() {
        let t = &mut model.tensors[edge.index()];
        if t.aligned_size != 0 {
            t.aligned_size += GAP_SIZE;
        }
    }

    let mut total = 0u64;
    let mut seen = std::collections::BTreeSet::new();
    for &member in members {
        if !seen.insert(member) {
            return Err(PlanError::DuplicateContiguousMember {
                node: node.to_string(),
                tensor: member,
            });
        }
        let t = &mut model.tensors[member.index()];
        t.contiguous = true;
        total += t.aligned_size;
    }
    model.contiguous_groups.push(members.to_vec());
    Ok(Some(total))
}

/// Graph-input feed outputs span the whole graph.
fn feed_pass(model: &mut Model, schedule: &Schedule) {
    let mut total = 0u64;
    for (position, step) in schedule.steps.iter().enumerate() {
        if !step.graph_input_feed {
            continue;
        }
        for tensor in model.nodes[position].outputs.clone() {
            let t = &mut model.tensors[tensor.index()];
            total += t.aligned_size;
            t.lifelong = Lifelong::WholeGraph;
            t.kind = TensorKind::GetNextOutput;
        }
    }
    tracing::info!(total, "special tensor size: graph input feed outputs");
}
