//! Pass 4 — allocation insertion (spec §4.4b).
//!
//! For each tensor-producing expr whose output is not itself a fusion
//! output, emits an `Allocate` node sized by the product of kept axis
//! extents (skipping reduction/broadcast axes and de-duplicating a
//! thread-parallel axis against its memory type, per the spec's
//! inside/outside-`alloc_pos` table) and files it under the right
//! [`AllocCategory`].

use crate::error::Result;
use crate::ir::{ExprOp, Fusion};
use crate::kir::{AllocCategory, IrBuilder, KirId, KirNode};
use crate::lower::LoweringCtx;
use crate::types::MemoryType;

pub fn run(fusion: &Fusion, ctx: &mut LoweringCtx) -> Result<()> {
    let LoweringCtx {
        kernel,
        extent_kir,
        tv_kir,
        expr_kir,
        ref_loops,
        ..
    } = ctx;
    let mut builder = IrBuilder::new(kernel);
    let innermost = ref_loops.last().copied();

    for expr_id in fusion.exprs() {
        let expr = fusion.expr(expr_id).unwrap().clone();
        let out = match expr.outputs.first() {
            Some(o) => *o,
            None => continue,
        };
        if fusion.has_output(out) {
            continue;
        }

        let root = fusion.tv_root_domain(out).unwrap_or(&[]).to_vec();
        let (_, _, memory_type, _) = fusion.val(out).and_then(|v| v.as_tensor_view()).unwrap();

        let mut kept_extents: Vec<KirId> = Vec::new();
        let mut is_dynamic = false;
        for axis in &root {
            let (_, _, pt, is_reduction, is_broadcast) = fusion.val(*axis).and_then(|v| v.as_iter_domain()).unwrap();
            if is_reduction || is_broadcast {
                continue;
            }
            let keep = match memory_type {
                MemoryType::Shared => pt.map(|p| p.is_thread_dim()).unwrap_or(false),
                MemoryType::Local => false,
                MemoryType::Global => true,
            };
            if !keep {
                continue;
            }
            let extent = extent_kir[axis];
            if builder.const_value(extent).is_none() {
                is_dynamic = true;
            }
            kept_extents.push(extent);
        }

        let size = kept_extents
            .into_iter()
            .fold(None, |acc: Option<KirId>, e| match acc {
                None => Some(e),
                Some(a) => Some(builder.mul_expr(a, e)),
            })
            .unwrap_or_else(|| builder.create_const_int(1));

        let buffer = tv_kir[&out];
        let zero_init = matches!(expr.op, ExprOp::ReductionOp { .. });
        let alloc_id = builder.allocate(buffer, memory_type, size, zero_init);

        let category = if is_dynamic { AllocCategory::Dynamic } else { AllocCategory::Static };
        builder.kernel_mut().add_allocation(category, alloc_id);

        let expr_node = expr_kir.get(&expr_id).copied();
        builder.kernel_mut().insert_in_scope(innermost, expr_node, alloc_id);
    }

    // File any grid-reduction workspace/sync buffers raised during index
    // lowering under the Global/Sync categories.
    let grid_reductions: Vec<(KirId, KirId)> = expr_kir
        .values()
        .filter_map(|&id| match builder.kernel_mut().node(id) {
            Some(KirNode::GridReduction { workspace, sync_buffer, .. }) => Some((*workspace, *sync_buffer)),
            _ => None,
        })
        .collect();
    for (workspace, sync_buffer) in grid_reductions {
        builder.kernel_mut().add_allocation(AllocCategory::Global, workspace);
        builder.kernel_mut().add_allocation(AllocCategory::Sync, sync_buffer);
    }

    Ok(())
}
