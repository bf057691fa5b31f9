//! Kernel-IR node family (spec §3 "Kernel IR (C2)", §4.2).
//!
//! Unlike the fusion graph, kernel-IR nodes are immutable after
//! construction except for a scope-bearing node's `body` and its
//! `parent_scope` — both of which the lowering passes mutate in place as
//! they insert allocations/predicates/syncs.

use crate::types::{BinaryOpType, DataType, MemoryType, ParallelType, ScalarConst, TernaryOpType, UnaryOpType};

/// Identity for any kernel-IR node, scalar or tensor, statement or scope.
/// A single shared counter, unlike the fusion-graph's per-kind `ValId`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct KirId(pub u32);

impl std::fmt::Display for KirId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "k{}", self.0)
    }
}

#[derive(Clone, Debug)]
pub struct KIterDomain {
    pub start: KirId,
    pub extent: KirId,
    pub parallel_type: Option<ParallelType>,
    pub is_reduction: bool,
    pub is_broadcast: bool,
}

#[derive(Clone, Debug)]
pub struct KTensorView {
    pub dtype: DataType,
    /// Current (possibly split/merged) domain, outermost first.
    pub domain: Vec<KirId>,
    pub memory_type: MemoryType,
}

/// Kernel-IR node payload. `Scope`-carrying variants (`ForLoop`,
/// `IfThenElse`) own a `body: Vec<KirId>` plus a `parent_scope` so
/// predicate/sync insertion can walk up to the enclosing scope.
#[derive(Clone, Debug)]
pub enum KirNode {
    Scalar {
        dtype: DataType,
        const_value: Option<ScalarConst>,
    },
    TensorView(KTensorView),
    IterDomain(KIterDomain),

    ForLoop {
        index_var: KirId,
        iter_domain: KirId,
        body: Vec<KirId>,
        parent_scope: Option<KirId>,
    },
    IfThenElse {
        condition: KirId,
        then_body: Vec<KirId>,
        else_body: Vec<KirId>,
        parent_scope: Option<KirId>,
    },

    /// `size` is a scalar expression (possibly symbolic); `zero_init`
    /// matters for sync-buffer allocations, which must start at zero.
    Allocate {
        buffer: KirId,
        memory_type: MemoryType,
        size: KirId,
        zero_init: bool,
    },

    UnaryOp {
        op: UnaryOpType,
        out: KirId,
        input: KirId,
        predicate: Option<KirId>,
    },
    BinaryOp {
        op: BinaryOpType,
        out: KirId,
        lhs: KirId,
        rhs: KirId,
        predicate: Option<KirId>,
    },
    TernaryOp {
        op: TernaryOpType,
        out: KirId,
        a: KirId,
        b: KirId,
        c: KirId,
        predicate: Option<KirId>,
    },
    BroadcastOp {
        out: KirId,
        input: KirId,
        predicate: Option<KirId>,
    },
    /// A (possibly block-) reduction: `out = out ⊕ input` for a serial or
    /// TID-bound reduction axis, folding from `init`.
    ReductionOp {
        op: BinaryOpType,
        out: KirId,
        input: KirId,
        init: KirId,
        predicate: Option<KirId>,
    },
    /// Wraps a `ReductionOp` that additionally needs cross-block
    /// coordination: a global workspace buffer plus a zero-initialized
    /// sync-flag buffer.
    GridReduction {
        reduction: KirId,
        workspace: KirId,
        sync_buffer: KirId,
    },
    /// Block-level barrier, inserted between a shared-memory write and a
    /// subsequent read by a different thread.
    Sync,

    /// A boolean predicate expression guarding an out-of-bounds thread,
    /// represented as an opaque comparison between a thread/block index
    /// expression and an iteration-domain extent. Stored as raw text of
    /// the condition for index-lowering purposes — the predicate pass
    /// only needs to attach it, not interpret it structurally.
    Predicate { condition_of: KirId },
}

impl KirNode {
    pub fn is_scope(&self) -> bool {
        matches!(self, KirNode::ForLoop { .. } | KirNode::IfThenElse { .. })
    }

    pub fn parent_scope(&self) -> Option<KirId> {
        match self {
            KirNode::ForLoop { parent_scope, .. } => *parent_scope,
            KirNode::IfThenElse { parent_scope, .. } => *parent_scope,
            _ => None,
        }
    }

    pub fn set_parent_scope(&mut self, parent: Option<KirId>) {
        match self {
            KirNode::ForLoop { parent_scope, .. } => *parent_scope = parent,
            KirNode::IfThenElse { parent_scope, .. } => *parent_scope = parent,
            _ => {}
        }
    }

    pub fn body(&self) -> Option<&[KirId]> {
        match self {
            KirNode::ForLoop { body, .. } => Some(body),
            KirNode::IfThenElse { then_body, .. } => Some(then_body),
            _ => None,
        }
    }

    pub fn body_mut(&mut self) -> Option<&mut Vec<KirId>> {
        match self {
            KirNode::ForLoop { body, .. } => Some(body),
            KirNode::IfThenElse { then_body, .. } => Some(then_body),
            _ => None,
        }
    }

    pub fn output(&self) -> Option<KirId> {
        match self {
            KirNode::UnaryOp { out, .. }
            | KirNode::BinaryOp { out, .. }
            | KirNode::TernaryOp { out, .. }
            | KirNode::BroadcastOp { out, .. }
            | KirNode::ReductionOp { out, .. } => Some(*out),
            _ => None,
        }
    }

    pub fn set_predicate(&mut self, pred: KirId) {
        match self {
            KirNode::UnaryOp { predicate, .. }
            | KirNode::BinaryOp { predicate, .. }
            | KirNode::TernaryOp { predicate, .. }
            | KirNode::BroadcastOp { predicate, .. }
            | KirNode::ReductionOp { predicate, .. } => *predicate = Some(pred),
            _ => {}
        }
    }
}
