//! Lowering pipeline (C4, spec §4.4): scheduled `Fusion` → `Kernel`.
//!
//! Passes run in the fixed order the spec names: symbolic-size
//! replacement, loop-nest generation, index lowering, allocation
//! insertion, predicate insertion, synchronization insertion. Each pass
//! is a free function over a shared [`LoweringCtx`] so later passes can
//! see the kernel-IR nodes earlier ones produced.

pub mod allocation;
pub mod index;
pub mod loop_nest;
pub mod predicate;
pub mod symbolic_sizes;
pub mod sync;

use crate::error::Result;
use crate::ir::{ExprId, Fusion, ValId};
use crate::kir::{Kernel, KirId};
use std::collections::HashMap;

#[derive(Default)]
pub struct LoweringCtx {
    pub kernel: Kernel,
    /// Lowered `IterDomain` nodes, keyed by the fusion-graph axis that
    /// produced them.
    pub axis_kir: HashMap<ValId, KirId>,
    /// Lowered extent scalars, keyed by the fusion-graph axis whose
    /// extent they represent (shared across axes with the same extent
    /// val, which is how intermediate tensors "inherit" shapes).
    pub extent_kir: HashMap<ValId, KirId>,
    /// Lowered scalar values that are not an axis extent (reduction
    /// inits, free constants).
    pub scalar_kir: HashMap<ValId, KirId>,
    /// Lowered `TensorView` nodes, keyed by the fusion-graph tensor view.
    pub tv_kir: HashMap<ValId, KirId>,
    /// The reference loop nest (outermost first) that every expr inlines
    /// into — this implementation's simplified stand-in for per-tensor
    /// compute-at placement (see DESIGN.md).
    pub ref_loops: Vec<KirId>,
    /// The lowered op node for each fusion expr.
    pub expr_kir: HashMap<ExprId, KirId>,
}

pub fn lower_fusion(fusion: &Fusion, kernel_name: impl Into<String>) -> Result<Kernel> {
    fusion.validate_inputs()?;
    let mut ctx = LoweringCtx {
        kernel: Kernel::new(kernel_name),
        ..Default::default()
    };
    symbolic_sizes::run(fusion, &mut ctx)?;
    loop_nest::run(fusion, &mut ctx)?;
    index::run(fusion, &mut ctx)?;
    allocation::run(fusion, &mut ctx)?;
    predicate::run(fusion, &mut ctx)?;
    sync::run(fusion, &mut ctx)?;
    ctx.kernel.has_random = fusion.has_random();
    Ok(ctx.kernel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ir::ExprOp;
    use crate::scheduler::schedule_fusion;
    use crate::types::{BinaryOpType, DataType, MemoryType, ScalarConst};

    fn pointwise_fusion() -> Fusion {
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
        f.add_input(b).unwrap();
        f.register_expr(ExprOp::BinaryOp(BinaryOpType::Add), vec![a, b], vec![c])
            .unwrap();
        f.add_output(c).unwrap();
        f
    }

    #[test]
    fn lowers_scheduled_pointwise_fusion_into_kernel() {
        let mut f = pointwise_fusion();
        let config = Config::default();
        schedule_fusion(&mut f, &config).unwrap();
        let kernel = lower_fusion(&f, "kernel1").unwrap();
        assert_eq!(kernel.input_tvs.len(), 2);
        assert_eq!(kernel.output_tvs.len(), 1);
        assert!(!kernel.parallelized_iter_domains().is_empty());
    }
}
