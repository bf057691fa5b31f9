//! `Expr`: the operator-node half of the fusion graph (spec §3, §4.1).

use crate::ir::val::ValId;
use crate::types::{BinaryOpType, TernaryOpType, UnaryOpType};
use std::fmt;

/// Expr identity. Drawn from a single shared counter (spec §4.1), unlike
/// `ValId` which is namespaced per kind.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct ExprId(pub u32);

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

#[derive(Clone, Debug)]
pub enum ExprOp {
    UnaryOp(UnaryOpType),
    BinaryOp(BinaryOpType),
    TernaryOp(TernaryOpType),
    /// A reduction along the axes the output's domain marks as reduction
    /// axes, combined with `op` starting from `init`.
    ReductionOp { op: BinaryOpType, init: ValId },
    /// Broadcasts `in` into `out`'s (wider) domain along `out`'s broadcast
    /// axes.
    BroadcastOp,
}

impl ExprOp {
    pub fn label(&self) -> String {
        match self {
            ExprOp::UnaryOp(op) => format!("{:?}", op),
            ExprOp::BinaryOp(op) => format!("{}", op),
            ExprOp::TernaryOp(op) => format!("{:?}", op),
            ExprOp::ReductionOp { op, .. } => format!("reduce<{}>", op),
            ExprOp::BroadcastOp => "broadcast".to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExprNode {
    pub id: ExprId,
    pub op: ExprOp,
    pub inputs: Vec<ValId>,
    pub outputs: Vec<ValId>,
}
