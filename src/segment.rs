//! Segmenter (C8, spec §4.8): partitions a fusion graph too large or too
//! shape-incompatible for one kernel into a DAG of fusible groups.
//!
//! Groups start one-expr-each, track a `level` (longest path from any
//! source group), and a candidate merge is only considered along a
//! direct edge whose endpoints' levels differ by exactly one — the
//! Herrmann et al. acyclic-partitioning criterion, checked here by
//! rebuilding the contracted group graph and running `petgraph`'s cycle
//! detector on it rather than reasoning about ancestor/descendant sets
//! by hand. A candidate is accepted only if the union of its exprs is
//! schedulable by some registered heuristic. Merging repeats, rebuilding
//! the group graph from scratch each round, until no accepted candidate
//! remains.

use crate::config::Config;
use crate::ir::{ExprId, Fusion, ValId};
use crate::scheduler::{propose_heuristics, schedule_fusion, Heuristic, ScheduleParams};
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

/// One partition: the set of fusion exprs it contains and the resolved
/// scheduling decision it runs under once the segmenter accepted it.
#[derive(Clone, Debug)]
pub struct Group {
    pub exprs: HashSet<ExprId>,
    pub params: ScheduleParams,
}

impl Group {
    pub fn heuristic(&self) -> Heuristic {
        self.params.heuristic
    }
}

/// Resolves a group's standalone `ScheduleParams` by scheduling its trial
/// fusion (spec §9 `SchedulerEntry::sameAs`, SPEC_FULL §9): the segmenter
/// uses `PartialEq` on the result to rule out an incompatible merge
/// candidate before paying for the more expensive cyclic-graph check and
/// a trial lowering of the merged group.
fn group_schedule_params(fusion: &Fusion, exprs: &HashSet<ExprId>) -> Option<ScheduleParams> {
    let mut trial = trial_fusion(fusion, exprs);
    schedule_fusion(&mut trial, &Config::default()).ok()
}

pub struct SegmentedFusion {
    pub groups: Vec<Group>,
}

/// Partitions `fusion` into schedulable groups (spec §4.8). Never fails:
/// a fusion with no schedulable grouping at all degenerates to one group
/// per expr, each individually re-checked by the caller via
/// `propose_heuristics` before lowering (S4's expected rejection path).
pub fn segment_fusion(fusion: &Fusion) -> SegmentedFusion {
    let mut groups: Vec<HashSet<ExprId>> = fusion.exprs().into_iter().map(|e| HashSet::from([e])).collect();

    loop {
        let (graph, index_of) = build_graph(fusion, &groups);
        let levels = compute_levels(&graph);

        let accepted = graph.edge_indices().find_map(|e| {
            let (ia, ib) = graph.edge_endpoints(e).unwrap();
            if (levels[&ia] as i64 - levels[&ib] as i64).abs() != 1 {
                return None;
            }
            let a = graph[ia].clone();
            let b = graph[ib].clone();

            // Fast pre-check: if each side is independently schedulable but
            // under incompatible parameters, the merge cannot possibly
            // succeed either, so skip the cyclic-graph check and the
            // (pricier) trial lowering of the merged group entirely.
            if let (Some(pa), Some(pb)) = (group_schedule_params(fusion, &a), group_schedule_params(fusion, &b)) {
                if pa != pb {
                    return None;
                }
            }

            let mut merged = a.clone();
            merged.extend(b.iter().copied());

            let candidate_groups: Vec<HashSet<ExprId>> = groups
                .iter()
                .filter(|g| **g != a && **g != b)
                .cloned()
                .chain(std::iter::once(merged.clone()))
                .collect();
            let (candidate_graph, _) = build_graph(fusion, &candidate_groups);
            if is_cyclic_directed(&candidate_graph) {
                return None;
            }
            let trial = trial_fusion(fusion, &merged);
            propose_heuristics(&trial).map(|_| (a, b, merged))
        });

        let _ = index_of;
        match accepted {
            Some((a, b, merged)) => {
                groups.retain(|g| *g != a && *g != b);
                groups.push(merged);
            }
            None => break,
        }
    }

    let result_groups = groups
        .into_iter()
        .map(|exprs| {
            let params = group_schedule_params(fusion, &exprs).unwrap_or(ScheduleParams {
                heuristic: Heuristic::PointWise,
                block_size: Config::default().default_block_size,
            });
            Group { exprs, params }
        })
        .collect();
    SegmentedFusion { groups: result_groups }
}

fn build_graph(
    fusion: &Fusion,
    groups: &[HashSet<ExprId>],
) -> (DiGraph<HashSet<ExprId>, ()>, HashMap<ExprId, NodeIndex>) {
    let mut graph: DiGraph<HashSet<ExprId>, ()> = DiGraph::new();
    let mut node_of: HashMap<ExprId, NodeIndex> = HashMap::new();
    for group in groups {
        let idx = graph.add_node(group.clone());
        for &e in group {
            node_of.insert(e, idx);
        }
    }
    for group in groups {
        let consumer = node_of[group.iter().next().unwrap()];
        for &eid in group {
            let expr = match fusion.expr(eid) {
                Some(e) => e,
                None => continue,
            };
            for &inp in &expr.inputs {
                if let Some(producer_expr) = fusion.origin(inp) {
                    if let Some(&producer) = node_of.get(&producer_expr) {
                        if producer != consumer {
                            graph.update_edge(producer, consumer, ());
                        }
                    }
                }
            }
        }
    }
    (graph, node_of)
}

fn compute_levels(graph: &DiGraph<HashSet<ExprId>, ()>) -> HashMap<NodeIndex, u32> {
    let order = petgraph::algo::toposort(graph, None).expect("segmenter graph must stay acyclic");
    let mut levels: HashMap<NodeIndex, u32> = HashMap::new();
    for node in order {
        let level = graph
            .neighbors_directed(node, petgraph::Direction::Incoming)
            .map(|p| levels.get(&p).copied().unwrap_or(0) + 1)
            .max()
            .unwrap_or(0);
        levels.insert(node, level);
    }
    levels
}

/// Builds a standalone `Fusion` containing exactly `exprs`, with its
/// input/output boundary inferred from `original`'s cross-group edges —
/// the fusion the segmenter hands `propose_heuristics` to test a
/// candidate grouping without mutating the real graph.
pub fn trial_fusion(original: &Fusion, exprs: &HashSet<ExprId>) -> Fusion {
    let mut new_inputs: HashSet<ValId> = HashSet::new();
    let mut new_outputs: HashSet<ValId> = HashSet::new();

    for &eid in exprs {
        let expr = match original.expr(eid) {
            Some(e) => e,
            None => continue,
        };
        for &inp in &expr.inputs {
            let producer_in_group = original.origin(inp).map(|o| exprs.contains(&o)).unwrap_or(false);
            if !producer_in_group {
                new_inputs.insert(inp);
            }
        }
        for &out in &expr.outputs {
            let consumed_outside = original
                .val(out)
                .map(|v| v.uses.iter().any(|u| !exprs.contains(u)))
                .unwrap_or(false);
            let has_uses = original.val(out).map(|v| !v.uses.is_empty()).unwrap_or(false);
            if original.has_output(out) || consumed_outside || !has_uses {
                new_outputs.insert(out);
            }
        }
    }

    let mut trial = original.clone();
    let remove_ids: Vec<ExprId> = trial.unordered_exprs().map(|e| e.id).filter(|id| !exprs.contains(id)).collect();
    trial.clear_io();
    for id in remove_ids {
        let _ = trial.remove_expr(id);
    }
    for v in new_inputs {
        if !trial.has_input(v) && !trial.val(v).map(|n| n.is_const_scalar()).unwrap_or(true) {
            let _ = trial.add_input(v);
        }
    }
    for v in new_outputs {
        if !trial.has_output(v) {
            let _ = trial.add_output(v);
        }
    }
    trial
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ExprOp;
    use crate::types::{BinaryOpType, DataType, MemoryType, ScalarConst, UnaryOpType};

    fn chained_unary_fusion() -> Fusion {
        let mut f = Fusion::new();
        let zero = f.create_scalar(DataType::Int64, Some(ScalarConst::Int(0)));
        let n = f.create_scalar(DataType::Int64, None);
        let axis = f.create_iter_domain(zero, n, None, false, false);
        let td_a = f.create_tensor_domain(vec![axis]);
        let a = f.create_tensor_view(DataType::Float32, td_a, MemoryType::Global);
        let td_b = f.create_tensor_domain(vec![axis]);
        let b = f.create_tensor_view(DataType::Float32, td_b, MemoryType::Global);
        let td_c = f.create_tensor_domain(vec![axis]);
        let c = f.create_tensor_view(DataType::Float32, td_c, MemoryType::Global);
        f.add_input(a).unwrap();
        f.register_expr(ExprOp::UnaryOp(UnaryOpType::Neg), vec![a], vec![b]).unwrap();
        f.register_expr(ExprOp::UnaryOp(UnaryOpType::Relu), vec![b], vec![c]).unwrap();
        f.add_output(c).unwrap();
        f
    }

    #[test]
    fn chained_pointwise_exprs_merge_into_one_group() {
        let f = chained_unary_fusion();
        let segmented = segment_fusion(&f);
        assert_eq!(segmented.groups.len(), 1);
        assert_eq!(segmented.groups[0].exprs.len(), 2);
        assert_eq!(segmented.groups[0].heuristic(), Heuristic::PointWise);
    }

    #[test]
    fn trial_fusion_of_single_expr_is_schedulable_standalone() {
        let f = chained_unary_fusion();
        let one_expr: HashSet<ExprId> = f.exprs().into_iter().take(1).collect();
        let trial = trial_fusion(&f, &one_expr);
        assert!(propose_heuristics(&trial).is_some());
    }

    #[test]
    fn pointwise_then_reduction_segments_without_panicking() {
        let mut f = Fusion::new();
        let zero = f.create_scalar(DataType::Int64, Some(ScalarConst::Int(0)));
        let n = f.create_scalar(DataType::Int64, None);
        let one = f.create_scalar(DataType::Int64, Some(ScalarConst::Int(1)));
        let pw_axis = f.create_iter_domain(zero, n, None, false, false);
        let td_a = f.create_tensor_domain(vec![pw_axis]);
        let a = f.create_tensor_view(DataType::Float32, td_a, MemoryType::Global);
        let td_b = f.create_tensor_domain(vec![pw_axis]);
        let b = f.create_tensor_view(DataType::Float32, td_b, MemoryType::Global);
        f.add_input(a).unwrap();
        f.register_expr(ExprOp::UnaryOp(UnaryOpType::Relu), vec![a], vec![b]).unwrap();

        let reduce_axis = f.create_iter_domain(zero, n, None, true, false);
        let out_axis = f.create_iter_domain(zero, one, None, false, false);
        let td_red_in = f.create_tensor_domain(vec![reduce_axis]);
        let red_in = f.create_tensor_view(DataType::Float32, td_red_in, MemoryType::Global);
        let td_c = f.create_tensor_domain(vec![out_axis]);
        let c = f.create_tensor_view(DataType::Float32, td_c, MemoryType::Global);
        f.register_expr(ExprOp::UnaryOp(UnaryOpType::Set), vec![b], vec![red_in]).unwrap();
        let zero_f = f.create_scalar(DataType::Float32, Some(ScalarConst::Float(0.0)));
        f.register_expr(ExprOp::ReductionOp { op: BinaryOpType::Add, init: zero_f }, vec![red_in], vec![c])
            .unwrap();
        f.add_output(c).unwrap();

        let segmented = segment_fusion(&f);
        assert!(!segmented.groups.is_empty());
    }
}
