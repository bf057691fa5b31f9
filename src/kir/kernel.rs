//! `Kernel`: owns every kernel-IR node produced by lowering one scheduled
//! fusion (spec §3 "Kernel IR (C2)" invariants).

use crate::ir::ValId;
use crate::kir::nodes::{KirId, KirNode};
use crate::types::ParallelType;
use std::collections::HashMap;

/// Which allocation bucket a lowered `Allocate` node falls into — drives
/// both code emission order and the executor's shared-memory accounting
/// (spec §3, §4.4b, §4.6).
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum AllocCategory {
    /// Size resolvable purely from compile-time context.
    Static,
    /// Size depends on a runtime-bound symbol.
    Dynamic,
    /// Scratch buffer living in device global memory (grid-reduction
    /// workspaces).
    Global,
    /// Device-side barrier counter; must be zero-initialized.
    Sync,
}

#[derive(Default, Clone)]
pub struct Kernel {
    nodes: HashMap<KirId, KirNode>,
    next_id: u32,
    /// Ordered top-level statements (loops, ifs, bare ops) forming the
    /// kernel body.
    top_level_exprs: Vec<KirId>,
    /// `Allocate` node ids, grouped by category.
    allocations: HashMap<AllocCategory, Vec<KirId>>,
    /// Maps each fusion-graph `Val` that has a runtime-visible kernel-IR
    /// counterpart to that node.
    val_map: HashMap<ValId, KirId>,
    pub name: String,
    /// Lowered `TensorView` nodes for the fusion inputs/outputs, in the
    /// same order as `Fusion::inputs()`/`outputs()` — what the executor
    /// binds runtime tensors against.
    pub input_tvs: Vec<KirId>,
    pub output_tvs: Vec<KirId>,
    /// Whether any lowered expr classifies as RNG (spec §4.6 step 6, S6).
    pub has_random: bool,
}

impl Kernel {
    pub fn new(name: impl Into<String>) -> Self {
        Kernel {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn fresh_id(&mut self) -> KirId {
        let id = KirId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn insert(&mut self, id: KirId, node: KirNode) {
        self.nodes.insert(id, node);
    }

    pub fn node(&self, id: KirId) -> Option<&KirNode> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: KirId) -> Option<&mut KirNode> {
        self.nodes.get_mut(&id)
    }

    pub fn push_top_level(&mut self, id: KirId) {
        self.top_level_exprs.push(id);
    }

    pub fn top_level_exprs(&self) -> &[KirId] {
        &self.top_level_exprs
    }

    pub fn set_top_level_exprs(&mut self, exprs: Vec<KirId>) {
        self.top_level_exprs = exprs;
    }

    pub fn add_allocation(&mut self, category: AllocCategory, id: KirId) {
        self.allocations.entry(category).or_default().push(id);
    }

    pub fn allocations(&self, category: AllocCategory) -> &[KirId] {
        self.allocations.get(&category).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn map_val(&mut self, val: ValId, kir: KirId) {
        self.val_map.insert(val, kir);
    }

    pub fn lowered(&self, val: ValId) -> Option<KirId> {
        self.val_map.get(&val).copied()
    }

    /// Every `IterDomain` node with a hardware parallel-type binding,
    /// used by launch-parameter computation (spec §4.6 step 3).
    pub fn parallelized_iter_domains(&self) -> Vec<(KirId, ParallelType)> {
        self.nodes
            .iter()
            .filter_map(|(id, node)| match node {
                KirNode::IterDomain(kid) => kid.parallel_type.map(|pt| (*id, pt)),
                _ => None,
            })
            .collect()
    }

    /// Insert `child` as a direct child of `scope`, before the first
    /// occurrence of `before` if given, else appended.
    pub fn insert_in_scope(&mut self, scope: Option<KirId>, before: Option<KirId>, child: KirId) {
        if let Some(before_id) = before {
            if let Some(parent) = self.parent_container_mut(scope) {
                if let Some(pos) = parent.iter().position(|id| *id == before_id) {
                    parent.insert(pos, child);
                    return;
                }
            }
        }
        if let Some(parent) = self.parent_container_mut(scope) {
            parent.push(child);
        }
    }

    fn parent_container_mut(&mut self, scope: Option<KirId>) -> Option<&mut Vec<KirId>> {
        match scope {
            None => Some(&mut self.top_level_exprs),
            Some(id) => self.nodes.get_mut(&id).and_then(|n| n.body_mut()),
        }
    }
}
