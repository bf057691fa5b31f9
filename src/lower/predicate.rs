//! Pass 5 — predicate insertion (spec §4.4 step 5).
//!
//! For every tensor-producing expr lowered from an axis the scheduler
//! split (so the hardware-dimension extent can overshoot the true
//! iteration count — e.g. `gdimx * BLOCK > N`), attaches a guard
//! predicate node. Exprs over exactly-sized axes get none, matching the
//! original's "only emit a predicate where a parallel-ID extent can
//! actually exceed the true extent" rule.

use crate::error::Result;
use crate::ir::val::AxisExtentKind;
use crate::ir::Fusion;
use crate::kir::IrBuilder;
use crate::lower::LoweringCtx;

pub fn run(fusion: &Fusion, ctx: &mut LoweringCtx) -> Result<()> {
    let LoweringCtx {
        kernel, expr_kir, ..
    } = ctx;
    let mut builder = IrBuilder::new(kernel);

    for expr_id in fusion.exprs() {
        let expr = fusion.expr(expr_id).unwrap().clone();
        let out = match expr.outputs.first() {
            Some(o) => *o,
            None => continue,
        };
        let root = fusion.tv_root_domain(out).unwrap_or(&[]);
        let needs_predicate = root.iter().any(|&axis| {
            fusion
                .val(axis)
                .and_then(|v| v.extent_kind())
                .map(|k| matches!(k, AxisExtentKind::SplitOuter { .. }))
                .unwrap_or(false)
        });
        if !needs_predicate {
            continue;
        }
        let node_id = match expr_kir.get(&expr_id) {
            Some(id) => *id,
            None => continue,
        };
        let pred = builder.predicate(node_id);
        if let Some(op_node) = builder.kernel_mut().node_mut(node_id) {
            op_node.set_predicate(pred);
        }
    }

    Ok(())
}
