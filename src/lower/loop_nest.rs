//! Pass 2 — loop-nest generation (spec §4.4 step 2).
//!
//! This implementation inlines every expression into a single reference
//! loop nest built from a terminating output's scheduled domain, rather
//! than reproducing the original's per-tensor compute-at placement in
//! full generality (see DESIGN.md). Parallelized axes still materialize
//! a `ForLoop` node carrying their parallel type, per the spec note that
//! code emission collapses them to a thread/block index later.

use crate::error::{Error, Result};
use crate::ir::Fusion;
use crate::kir::{IrBuilder, KirNode};
use crate::lower::LoweringCtx;
use crate::types::DataType;

pub fn run(fusion: &Fusion, ctx: &mut LoweringCtx) -> Result<()> {
    let reference_tv = fusion
        .terminating_outputs()
        .into_iter()
        .next()
        .or_else(|| fusion.outputs().first().copied())
        .ok_or_else(|| Error::validation("fusion has no outputs"))?;

    let domain = fusion.tv_current_domain(reference_tv).unwrap_or(&[]).to_vec();

    let LoweringCtx {
        kernel,
        axis_kir,
        ref_loops,
        ..
    } = ctx;
    let mut builder = IrBuilder::new(kernel);

    let mut parent: Option<_> = None;
    for axis in &domain {
        if fusion.is_nontrivial_reduction_axis(*axis) {
            // Reduction axes don't get their own host-visible loop when
            // bound to a hardware dimension (handled at the op level by
            // index lowering); a serial reduction axis still loops.
            let (_, _, pt, _, _) = fusion.val(*axis).and_then(|v| v.as_iter_domain()).unwrap();
            if pt.is_some() {
                continue;
            }
        }
        let kir_axis = axis_kir[axis];
        let index_var = builder.create_named_scalar(DataType::Int64);
        let loop_id = builder.for_loop(index_var, kir_axis, parent);
        if let Some(p) = parent {
            if let Some(KirNode::ForLoop { body, .. }) = builder_node_mut(&mut builder, p) {
                body.push(loop_id);
            }
        } else {
            kernel_push_top(&mut builder, loop_id);
        }
        ref_loops.push(loop_id);
        parent = Some(loop_id);
    }

    Ok(())
}

// Small helpers so the pass body above stays readable despite `IrBuilder`
// not exposing direct node mutation (it is meant for construction, not
// tree surgery — these two calls are the only exceptions lowering needs).
fn builder_node_mut<'a>(builder: &'a mut IrBuilder<'_>, id: crate::kir::KirId) -> Option<&'a mut KirNode> {
    builder.kernel_mut().node_mut(id)
}

fn kernel_push_top(builder: &mut IrBuilder<'_>, id: crate::kir::KirId) {
    builder.kernel_mut().push_top_level(id);
}
