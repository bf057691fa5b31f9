//! `Val`: the data-node half of the fusion graph (spec §3, §4.1).

use crate::ir::expr::ExprId;
use crate::types::{DataType, MemoryType, ParallelType, ScalarConst};
use std::fmt;

/// Discriminant used both to tag a `Val`'s payload and as the namespace for
/// its per-kind unique name (spec §4.1: "unique integer names are drawn per
/// value-kind").
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum ValKindTag {
    Scalar,
    TensorView,
    IterDomain,
    TensorDomain,
}

/// A `Val`'s identity: which per-kind counter it was drawn from plus the
/// value of that counter. Stands in for the original's raw `Val*` pointer
/// identity — two `Val`s are the same node iff their `ValId`s are equal.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ValId {
    pub kind: ValKindTag,
    pub name: u32,
}

impl fmt::Display for ValId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind {
            ValKindTag::Scalar => "s",
            ValKindTag::TensorView => "T",
            ValKindTag::IterDomain => "id",
            ValKindTag::TensorDomain => "td",
        };
        write!(f, "{}{}", prefix, self.name)
    }
}

/// Where an `IterDomain`'s extent comes from: an original (root) axis, or
/// one half of a scheduler-applied split of a root axis by a compile-time
/// tile factor (spec §3 "current domain after splits/merges/reorders").
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum AxisExtentKind {
    Root,
    SplitOuter { base: ValId, factor: u32 },
    SplitInner { factor: u32 },
}

/// Kind-specific payload of a `Val`.
#[derive(Clone, Debug)]
pub enum ValData {
    Scalar {
        dtype: DataType,
        const_value: Option<ScalarConst>,
    },
    /// One axis of a tensor domain: `[start, extent)`, with an optional
    /// hardware binding and reduction/broadcast flags.
    IterDomain {
        start: ValId,
        extent: ValId,
        parallel_type: Option<ParallelType>,
        is_reduction: bool,
        is_broadcast: bool,
        extent_kind: AxisExtentKind,
    },
    /// An ordered list of `IterDomain` vals. `root` is the original axes as
    /// produced by the defining expression; `domain` is the current
    /// (possibly split/merged/reordered) schedule of those same axes.
    TensorDomain {
        root: Vec<ValId>,
        domain: Vec<ValId>,
    },
    /// A logical tensor: its domain (by id, pointing at a `TensorDomain`
    /// val), element type, memory placement, and compute-at depth.
    TensorView {
        dtype: DataType,
        domain: ValId,
        memory_type: MemoryType,
        compute_at_axis: usize,
    },
}

#[derive(Clone, Debug)]
pub struct ValNode {
    pub id: ValId,
    pub data: ValData,
    /// The unique `Expr` that produced this val, if any.
    pub origin: Option<ExprId>,
    /// Reverse index of exprs consuming this val; rebuildable from scratch.
    pub uses: Vec<ExprId>,
    pub is_fusion_input: bool,
    pub is_fusion_output: bool,
}

impl ValNode {
    pub fn kind(&self) -> ValKindTag {
        self.id.kind
    }

    /// True for a scalar carrying a known compile-time value, per spec
    /// §4.1 `validateInputs` ("compile-time constant scalar").
    pub fn is_const_scalar(&self) -> bool {
        matches!(
            self.data,
            ValData::Scalar {
                const_value: Some(_),
                ..
            }
        )
    }

    pub fn const_value(&self) -> Option<ScalarConst> {
        match &self.data {
            ValData::Scalar { const_value, .. } => *const_value,
            _ => None,
        }
    }

    pub fn scalar_dtype(&self) -> Option<DataType> {
        match &self.data {
            ValData::Scalar { dtype, .. } => Some(*dtype),
            _ => None,
        }
    }

    pub fn as_tensor_view(&self) -> Option<(DataType, ValId, MemoryType, usize)> {
        match &self.data {
            ValData::TensorView {
                dtype,
                domain,
                memory_type,
                compute_at_axis,
            } => Some((*dtype, *domain, *memory_type, *compute_at_axis)),
            _ => None,
        }
    }

    pub fn as_iter_domain(&self) -> Option<(ValId, ValId, Option<ParallelType>, bool, bool)> {
        match &self.data {
            ValData::IterDomain {
                start,
                extent,
                parallel_type,
                is_reduction,
                is_broadcast,
                ..
            } => Some((*start, *extent, *parallel_type, *is_reduction, *is_broadcast)),
            _ => None,
        }
    }

    pub fn extent_kind(&self) -> Option<AxisExtentKind> {
        match &self.data {
            ValData::IterDomain { extent_kind, .. } => Some(*extent_kind),
            _ => None,
        }
    }

    pub fn as_tensor_domain(&self) -> Option<(&[ValId], &[ValId])> {
        match &self.data {
            ValData::TensorDomain { root, domain } => Some((root.as_slice(), domain.as_slice())),
            _ => None,
        }
    }
}
