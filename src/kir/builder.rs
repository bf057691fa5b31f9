//! `IrBuilder`: the sole constructor for kernel-IR nodes (spec §4.2).
//! Arithmetic helpers fold constants when both operands are constant,
//! mirroring the original's `mulExpr`/`addExpr`.

use crate::kir::kernel::Kernel;
use crate::kir::nodes::{KIterDomain, KTensorView, KirId, KirNode};
use crate::types::{BinaryOpType, DataType, MemoryType, ParallelType, ScalarConst};

pub struct IrBuilder<'k> {
    kernel: &'k mut Kernel,
}

impl<'k> IrBuilder<'k> {
    pub fn new(kernel: &'k mut Kernel) -> Self {
        IrBuilder { kernel }
    }

    /// Escape hatch for lowering passes that need to mutate a
    /// previously-built node (attach a body entry, a predicate, a parent
    /// scope) rather than construct a new one.
    pub fn kernel_mut(&mut self) -> &mut Kernel {
        self.kernel
    }

    pub fn create_const_int(&mut self, v: i64) -> KirId {
        let id = self.kernel.fresh_id();
        self.kernel.insert(
            id,
            KirNode::Scalar {
                dtype: DataType::Int64,
                const_value: Some(ScalarConst::Int(v)),
            },
        );
        id
    }

    pub fn create_const(&mut self, dtype: DataType, value: ScalarConst) -> KirId {
        let id = self.kernel.fresh_id();
        self.kernel.insert(
            id,
            KirNode::Scalar {
                dtype,
                const_value: Some(value),
            },
        );
        id
    }

    pub fn create_named_scalar(&mut self, dtype: DataType) -> KirId {
        let id = self.kernel.fresh_id();
        self.kernel.insert(id, KirNode::Scalar { dtype, const_value: None });
        id
    }

    pub fn const_value(&self, id: KirId) -> Option<ScalarConst> {
        match self.kernel.node(id) {
            Some(KirNode::Scalar { const_value, .. }) => *const_value,
            _ => None,
        }
    }

    fn fold_or_build(&mut self, op: BinaryOpType, lhs: KirId, rhs: KirId) -> KirId {
        if let (Some(a), Some(b)) = (self.const_value(lhs), self.const_value(rhs)) {
            if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
                let folded = match op {
                    BinaryOpType::Add => Some(a + b),
                    BinaryOpType::Sub => Some(a - b),
                    BinaryOpType::Mul => Some(a * b),
                    BinaryOpType::Div if b != 0 => Some(a / b),
                    BinaryOpType::Max => Some(a.max(b)),
                    BinaryOpType::Min => Some(a.min(b)),
                    BinaryOpType::Mod if b != 0 => Some(a % b),
                    _ => None,
                };
                if let Some(v) = folded {
                    return self.create_const_int(v);
                }
            }
        }
        let out = self.kernel.fresh_id();
        self.kernel.insert(
            out,
            KirNode::BinaryOp {
                op,
                out,
                lhs,
                rhs,
                predicate: None,
            },
        );
        out
    }

    pub fn add_expr(&mut self, lhs: KirId, rhs: KirId) -> KirId {
        self.fold_or_build(BinaryOpType::Add, lhs, rhs)
    }

    pub fn sub_expr(&mut self, lhs: KirId, rhs: KirId) -> KirId {
        self.fold_or_build(BinaryOpType::Sub, lhs, rhs)
    }

    pub fn mul_expr(&mut self, lhs: KirId, rhs: KirId) -> KirId {
        self.fold_or_build(BinaryOpType::Mul, lhs, rhs)
    }

    pub fn ceil_div_expr(&mut self, lhs: KirId, rhs: KirId) -> KirId {
        if let (Some(a), Some(b)) = (self.const_value(lhs), self.const_value(rhs)) {
            if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
                if b != 0 {
                    return self.create_const_int((a + b - 1) / b);
                }
            }
        }
        let one = self.create_const_int(1);
        let rhs_minus_one = self.sub_expr(rhs, one);
        let num = self.add_expr(lhs, rhs_minus_one);
        self.div_expr(num, rhs)
    }

    pub fn div_expr(&mut self, lhs: KirId, rhs: KirId) -> KirId {
        self.fold_or_build(BinaryOpType::Div, lhs, rhs)
    }

    pub fn iter_domain(
        &mut self,
        start: KirId,
        extent: KirId,
        parallel_type: Option<ParallelType>,
        is_reduction: bool,
        is_broadcast: bool,
    ) -> KirId {
        let id = self.kernel.fresh_id();
        self.kernel.insert(
            id,
            KirNode::IterDomain(KIterDomain {
                start,
                extent,
                parallel_type,
                is_reduction,
                is_broadcast,
            }),
        );
        id
    }

    pub fn tensor_view(&mut self, dtype: DataType, domain: Vec<KirId>, memory_type: MemoryType) -> KirId {
        let id = self.kernel.fresh_id();
        self.kernel.insert(
            id,
            KirNode::TensorView(KTensorView {
                dtype,
                domain,
                memory_type,
            }),
        );
        id
    }

    pub fn for_loop(&mut self, index_var: KirId, iter_domain: KirId, parent_scope: Option<KirId>) -> KirId {
        let id = self.kernel.fresh_id();
        self.kernel.insert(
            id,
            KirNode::ForLoop {
                index_var,
                iter_domain,
                body: Vec::new(),
                parent_scope,
            },
        );
        id
    }

    pub fn if_then_else(&mut self, condition: KirId, parent_scope: Option<KirId>) -> KirId {
        let id = self.kernel.fresh_id();
        self.kernel.insert(
            id,
            KirNode::IfThenElse {
                condition,
                then_body: Vec::new(),
                else_body: Vec::new(),
                parent_scope,
            },
        );
        id
    }

    pub fn allocate(&mut self, buffer: KirId, memory_type: MemoryType, size: KirId, zero_init: bool) -> KirId {
        let id = self.kernel.fresh_id();
        self.kernel.insert(
            id,
            KirNode::Allocate {
                buffer,
                memory_type,
                size,
                zero_init,
            },
        );
        id
    }

    pub fn sync(&mut self) -> KirId {
        let id = self.kernel.fresh_id();
        self.kernel.insert(id, KirNode::Sync);
        id
    }

    pub fn predicate(&mut self, condition_of: KirId) -> KirId {
        let id = self.kernel.fresh_id();
        self.kernel.insert(id, KirNode::Predicate { condition_of });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_folding_applies_for_both_const_operands() {
        let mut k = Kernel::new("k1");
        let mut b = IrBuilder::new(&mut k);
        let two = b.create_const_int(2);
        let three = b.create_const_int(3);
        let sum = b.add_expr(two, three);
        assert_eq!(b.const_value(sum), Some(ScalarConst::Int(5)));
    }

    #[test]
    fn no_folding_when_operand_symbolic() {
        let mut k = Kernel::new("k1");
        let mut b = IrBuilder::new(&mut k);
        let n = b.create_named_scalar(DataType::Int64);
        let two = b.create_const_int(2);
        let prod = b.mul_expr(n, two);
        assert_eq!(b.const_value(prod), None);
    }
}
