//! Fusion-graph fixtures shared by the S1-S6 integration tests.

use fusorch::ir::{ExprOp, Fusion};
use fusorch::types::{BinaryOpType, DataType, MemoryType, ScalarConst, UnaryOpType};

/// `c = a + b`, all three rank-1 Float32 tensors over one shared axis.
pub fn pointwise_add_fusion() -> Fusion {
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

/// Full reduction of a rank-1 Float32 input to a scalar output: `c = sum(a)`.
pub fn axis_reduction_fusion() -> Fusion {
    let mut f = Fusion::new();
    let zero = f.create_scalar(DataType::Int64, Some(ScalarConst::Int(0)));
    let n = f.create_scalar(DataType::Int64, None);
    let one = f.create_scalar(DataType::Int64, Some(ScalarConst::Int(1)));
    let axis = f.create_iter_domain(zero, n, None, true, false);
    let out_axis = f.create_iter_domain(zero, one, None, false, false);
    let td_a = f.create_tensor_domain(vec![axis]);
    let a = f.create_tensor_view(DataType::Float32, td_a, MemoryType::Global);
    let td_c = f.create_tensor_domain(vec![out_axis]);
    let c = f.create_tensor_view(DataType::Float32, td_c, MemoryType::Global);
    let zero_f = f.create_scalar(DataType::Float32, Some(ScalarConst::Float(0.0)));
    f.add_input(a).unwrap();
    f.register_expr(ExprOp::ReductionOp { op: BinaryOpType::Add, init: zero_f }, vec![a], vec![c])
        .unwrap();
    f.add_output(c).unwrap();
    f
}

/// Two reduction stages sharing one reduction axis: `sum = sum(a)`,
/// `sumsq = sum(a * a)` — the Normalization heuristic's shape.
pub fn normalization_fusion() -> Fusion {
    let mut f = Fusion::new();
    let zero = f.create_scalar(DataType::Int64, Some(ScalarConst::Int(0)));
    let n = f.create_scalar(DataType::Int64, None);
    let one = f.create_scalar(DataType::Int64, Some(ScalarConst::Int(1)));
    let axis = f.create_iter_domain(zero, n, None, true, false);
    let out_axis = f.create_iter_domain(zero, one, None, false, false);
    let td_a = f.create_tensor_domain(vec![axis]);
    let a = f.create_tensor_view(DataType::Float32, td_a, MemoryType::Global);
    let td_sq = f.create_tensor_domain(vec![axis]);
    let sq = f.create_tensor_view(DataType::Float32, td_sq, MemoryType::Global);
    let td_sum = f.create_tensor_domain(vec![out_axis]);
    let sum_out = f.create_tensor_view(DataType::Float32, td_sum, MemoryType::Global);
    let td_sumsq = f.create_tensor_domain(vec![out_axis]);
    let sumsq_out = f.create_tensor_view(DataType::Float32, td_sumsq, MemoryType::Global);

    f.add_input(a).unwrap();
    f.register_expr(ExprOp::BinaryOp(BinaryOpType::Mul), vec![a, a], vec![sq]).unwrap();
    let zero_f1 = f.create_scalar(DataType::Float32, Some(ScalarConst::Float(0.0)));
    f.register_expr(ExprOp::ReductionOp { op: BinaryOpType::Add, init: zero_f1 }, vec![a], vec![sum_out])
        .unwrap();
    let zero_f2 = f.create_scalar(DataType::Float32, Some(ScalarConst::Float(0.0)));
    f.register_expr(ExprOp::ReductionOp { op: BinaryOpType::Add, init: zero_f2 }, vec![sq], vec![sumsq_out])
        .unwrap();
    f.add_output(sum_out).unwrap();
    f.add_output(sumsq_out).unwrap();
    f
}

/// A reduction result immediately re-broadcast and consumed further — the
/// SingleReduction heuristic's declined shape (spec §4.5 "not broadcast to
/// a descendant"), and with only one reduction stage Normalization
/// declines too, so no registered heuristic accepts this fusion at all.
pub fn reduction_then_broadcast_fusion() -> Fusion {
    let mut f = Fusion::new();
    let zero = f.create_scalar(DataType::Int64, Some(ScalarConst::Int(0)));
    let n = f.create_scalar(DataType::Int64, None);
    let one = f.create_scalar(DataType::Int64, Some(ScalarConst::Int(1)));
    let axis = f.create_iter_domain(zero, n, None, true, false);
    let out_axis = f.create_iter_domain(zero, one, None, false, false);
    let td_a = f.create_tensor_domain(vec![axis]);
    let a = f.create_tensor_view(DataType::Float32, td_a, MemoryType::Global);
    let td_r = f.create_tensor_domain(vec![out_axis]);
    let r = f.create_tensor_view(DataType::Float32, td_r, MemoryType::Global);
    let td_b = f.create_tensor_domain(vec![axis]);
    let b = f.create_tensor_view(DataType::Float32, td_b, MemoryType::Global);

    f.add_input(a).unwrap();
    let zero_f = f.create_scalar(DataType::Float32, Some(ScalarConst::Float(0.0)));
    f.register_expr(ExprOp::ReductionOp { op: BinaryOpType::Add, init: zero_f }, vec![a], vec![r])
        .unwrap();
    f.register_expr(ExprOp::BroadcastOp, vec![r], vec![b]).unwrap();
    f.add_output(b).unwrap();
    f
}

/// A direct input-to-scalar reduction with no intermediate allocation, so
/// the only shared-memory pressure comes from the block-reduction's
/// dynamic footprint — used to exercise a too-small device shared-memory
/// budget at launch time (S5).
pub fn large_axis_reduction_fusion() -> Fusion {
    axis_reduction_fusion()
}

/// `b = rand_like(a)`, a pointwise fusion whose single op classifies as
/// RNG (spec §4.6 step 6, S6).
pub fn rng_pointwise_fusion() -> Fusion {
    let mut f = Fusion::new();
    let zero = f.create_scalar(DataType::Int64, Some(ScalarConst::Int(0)));
    let n = f.create_scalar(DataType::Int64, None);
    let axis = f.create_iter_domain(zero, n, None, false, false);
    let td_a = f.create_tensor_domain(vec![axis]);
    let a = f.create_tensor_view(DataType::Float32, td_a, MemoryType::Global);
    let td_b = f.create_tensor_domain(vec![axis]);
    let b = f.create_tensor_view(DataType::Float32, td_b, MemoryType::Global);
    f.add_input(a).unwrap();
    f.register_expr(ExprOp::UnaryOp(UnaryOpType::RandLike), vec![a], vec![b]).unwrap();
    f.add_output(b).unwrap();
    f
}
