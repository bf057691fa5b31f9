//! Pass 3 — index lowering (spec §4.4a).
//!
//! Builds the kernel-IR op node for every fusion expr, wiring its
//! operands to already-lowered tensor/scalar nodes, classifies
//! reductions (serial / block / grid) and applies the grid+serial
//! tie-break rejection. Concrete per-thread address arithmetic
//! (`lowerSrcIndex`/`lowerDstIndex`) is left to code emission / the mock
//! interpreter, which can derive it positionally from each operand
//! tensor's lowered domain — see DESIGN.md for why this implementation
//! does not also materialize literal offset-scalar kernel-IR nodes.

use crate::error::{Error, Result};
use crate::ir::{ExprOp, Fusion, ValId};
use crate::kir::{IrBuilder, KirId, KirNode};
use crate::lower::LoweringCtx;
use crate::types::{DataType, ParallelType};
use std::collections::HashMap;

pub fn run(fusion: &Fusion, ctx: &mut LoweringCtx) -> Result<()> {
    let LoweringCtx {
        kernel,
        tv_kir,
        scalar_kir,
        ref_loops,
        expr_kir,
        ..
    } = ctx;
    let mut builder = IrBuilder::new(kernel);
    let innermost = ref_loops.last().copied();

    for expr_id in fusion.exprs() {
        let expr = fusion.expr(expr_id).unwrap().clone();
        let out = *expr
            .outputs
            .first()
            .ok_or_else(|| Error::internal("expr has no output"))?;
        let out_kir = resolve_operand(fusion, out, tv_kir, scalar_kir, &mut builder);

        let node_id = match &expr.op {
            ExprOp::UnaryOp(op) => {
                let input = resolve_operand(fusion, expr.inputs[0], tv_kir, scalar_kir, &mut builder);
                new_node(
                    &mut builder,
                    KirNode::UnaryOp {
                        op: *op,
                        out: out_kir,
                        input,
                        predicate: None,
                    },
                )
            }
            ExprOp::BinaryOp(op) => {
                let lhs = resolve_operand(fusion, expr.inputs[0], tv_kir, scalar_kir, &mut builder);
                let rhs = resolve_operand(fusion, expr.inputs[1], tv_kir, scalar_kir, &mut builder);
                new_node(
                    &mut builder,
                    KirNode::BinaryOp {
                        op: *op,
                        out: out_kir,
                        lhs,
                        rhs,
                        predicate: None,
                    },
                )
            }
            ExprOp::TernaryOp(op) => {
                let a = resolve_operand(fusion, expr.inputs[0], tv_kir, scalar_kir, &mut builder);
                let b = resolve_operand(fusion, expr.inputs[1], tv_kir, scalar_kir, &mut builder);
                let c = resolve_operand(fusion, expr.inputs[2], tv_kir, scalar_kir, &mut builder);
                new_node(
                    &mut builder,
                    KirNode::TernaryOp {
                        op: *op,
                        out: out_kir,
                        a,
                        b,
                        c,
                        predicate: None,
                    },
                )
            }
            ExprOp::BroadcastOp => {
                let input = resolve_operand(fusion, expr.inputs[0], tv_kir, scalar_kir, &mut builder);
                new_node(
                    &mut builder,
                    KirNode::BroadcastOp {
                        out: out_kir,
                        input,
                        predicate: None,
                    },
                )
            }
            ExprOp::ReductionOp { op, init } => {
                let input = resolve_operand(fusion, expr.inputs[0], tv_kir, scalar_kir, &mut builder);
                let init_kir = resolve_operand(fusion, *init, tv_kir, scalar_kir, &mut builder);
                classify_reduction(fusion, expr.inputs[0])?;
                let reduction_id = new_node(
                    &mut builder,
                    KirNode::ReductionOp {
                        op: *op,
                        out: out_kir,
                        input,
                        init: init_kir,
                        predicate: None,
                    },
                );
                if is_grid_reduction(fusion, expr.inputs[0]) {
                    wrap_grid_reduction(&mut builder, reduction_id)
                } else {
                    reduction_id
                }
            }
        };

        builder.kernel_mut().insert_in_scope(innermost, None, node_id);
        expr_kir.insert(expr_id, node_id);
    }

    Ok(())
}

fn new_node(builder: &mut IrBuilder<'_>, node: KirNode) -> KirId {
    let id = builder.kernel_mut().fresh_id();
    builder.kernel_mut().insert(id, node);
    id
}

fn wrap_grid_reduction(builder: &mut IrBuilder<'_>, reduction: KirId) -> KirId {
    let workspace_buf = builder.create_named_scalar(DataType::Int64);
    let sync_buf = builder.create_named_scalar(DataType::Int64);
    new_node(
        builder,
        KirNode::GridReduction {
            reduction,
            workspace: workspace_buf,
            sync_buffer: sync_buf,
        },
    )
}

fn reduction_axes(fusion: &Fusion, input_tv: ValId) -> Vec<ValId> {
    fusion
        .tv_root_domain(input_tv)
        .map(|root| root.iter().copied().filter(|&a| fusion.is_nontrivial_reduction_axis(a)).collect())
        .unwrap_or_default()
}

fn is_grid_reduction(fusion: &Fusion, input_tv: ValId) -> bool {
    reduction_axes(fusion, input_tv).iter().any(|&axis| {
        fusion
            .val(axis)
            .and_then(|v| v.as_iter_domain())
            .and_then(|(_, _, pt, ..)| pt)
            .map(|pt| pt.is_block_dim())
            .unwrap_or(false)
    })
}

/// Rejects a reduction stage that is both grid-reduced and has a
/// non-parallelized (serial) reduction axis (spec §4.4a tie-break).
fn classify_reduction(fusion: &Fusion, input_tv: ValId) -> Result<()> {
    let axes = reduction_axes(fusion, input_tv);
    let is_grid = axes.iter().any(|&axis| {
        matches!(
            fusion.val(axis).and_then(|v| v.as_iter_domain()).and_then(|(_, _, pt, ..)| pt),
            Some(pt) if pt.is_block_dim()
        )
    });
    let has_serial = axes.iter().any(|&axis| {
        fusion.val(axis).and_then(|v| v.as_iter_domain()).and_then(|(_, _, pt, ..)| pt).is_none()
    });
    if is_grid && has_serial {
        return Err(Error::validation(
            "reduction is both grid-reduced and has a serial reduction axis; rfactor required",
        ));
    }
    Ok(())
}

fn resolve_operand(
    fusion: &Fusion,
    val: ValId,
    tv_kir: &mut HashMap<ValId, KirId>,
    scalar_kir: &mut HashMap<ValId, KirId>,
    builder: &mut IrBuilder<'_>,
) -> KirId {
    if let Some(id) = tv_kir.get(&val) {
        return *id;
    }
    if let Some(id) = scalar_kir.get(&val) {
        return *id;
    }
    let node = fusion.val(val).unwrap();
    let dtype = node.scalar_dtype().unwrap_or(DataType::Int64);
    let id = match node.const_value() {
        Some(c) => builder.create_const(dtype, c),
        None => builder.create_named_scalar(dtype),
    };
    scalar_kir.insert(val, id);
    id
}
