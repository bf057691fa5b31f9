//! Pass 1 — symbolic size replacement (spec §4.4 step 1).
//!
//! Every fusion input/output tensor view's root-domain extents become
//! fresh named kernel-IR scalars (bound from runtime shapes at launch
//! time); intermediate tensor views and scheduler-derived axes resolve
//! their extents algebraically (shared root extent, or a split's
//! `ceil_div`/tile-factor expression) rather than getting their own
//! sentinel.

use crate::error::Result;
use crate::ir::val::AxisExtentKind;
use crate::ir::{Fusion, ValId};
use crate::kir::IrBuilder;
use crate::lower::LoweringCtx;
use crate::types::DataType;
use std::collections::HashMap;

pub fn run(fusion: &Fusion, ctx: &mut LoweringCtx) -> Result<()> {
    let LoweringCtx {
        kernel,
        axis_kir,
        extent_kir,
        tv_kir,
        ..
    } = ctx;
    let mut builder = IrBuilder::new(kernel);

    for tv in fusion.tensor_views().collect::<Vec<_>>() {
        let root = fusion.tv_root_domain(tv).unwrap_or(&[]).to_vec();
        let domain = fusion.tv_current_domain(tv).map(|d| d.to_vec()).unwrap_or_else(|| root.clone());

        for axis in root.iter().chain(domain.iter()) {
            resolve_axis(fusion, *axis, axis_kir, extent_kir, &mut builder);
        }

        let (dtype, _domain_val, memory_type, _ca) = fusion.val(tv).and_then(|v| v.as_tensor_view()).unwrap();
        let kir_domain: Vec<_> = domain.iter().map(|a| axis_kir[a]).collect();
        let kir_tv = builder.tensor_view(dtype, kir_domain, memory_type);
        tv_kir.insert(tv, kir_tv);
    }

    kernel.input_tvs = fusion.inputs().iter().map(|v| tv_kir[v]).collect();
    kernel.output_tvs = fusion.outputs().iter().map(|v| tv_kir[v]).collect();
    Ok(())
}

fn resolve_extent(
    fusion: &Fusion,
    axis: ValId,
    extent_kir: &mut HashMap<ValId, crate::kir::KirId>,
    builder: &mut IrBuilder,
) -> crate::kir::KirId {
    if let Some(id) = extent_kir.get(&axis) {
        return *id;
    }
    let kind = fusion.val(axis).and_then(|v| v.extent_kind()).unwrap();
    let id = match kind {
        AxisExtentKind::Root => {
            let (_, extent_val, ..) = fusion.val(axis).and_then(|v| v.as_iter_domain()).unwrap();
            match fusion.val(extent_val).and_then(|v| v.const_value()) {
                Some(c) => builder.create_const_int(c.as_i64().unwrap_or(1)),
                None => builder.create_named_scalar(DataType::Int64),
            }
        }
        AxisExtentKind::SplitOuter { base, factor } => {
            let base_extent = resolve_extent(fusion, base, extent_kir, builder);
            let factor_c = builder.create_const_int(factor as i64);
            builder.ceil_div_expr(base_extent, factor_c)
        }
        AxisExtentKind::SplitInner { factor } => builder.create_const_int(factor as i64),
    };
    extent_kir.insert(axis, id);
    id
}

fn resolve_axis(
    fusion: &Fusion,
    axis: ValId,
    axis_kir: &mut HashMap<ValId, crate::kir::KirId>,
    extent_kir: &mut HashMap<ValId, crate::kir::KirId>,
    builder: &mut IrBuilder,
) -> crate::kir::KirId {
    if let Some(id) = axis_kir.get(&axis) {
        return *id;
    }
    let (_, _, parallel_type, is_reduction, is_broadcast) = fusion.val(axis).and_then(|v| v.as_iter_domain()).unwrap();
    let extent = resolve_extent(fusion, axis, extent_kir, builder);
    let zero = builder.create_const_int(0);
    let id = builder.iter_domain(zero, extent, parallel_type, is_reduction, is_broadcast);
    axis_kir.insert(axis, id);
    id
}
