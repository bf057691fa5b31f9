//! Launch-parameter computation (spec §4.6 step 3): binds every
//! parallelized iter-domain to a concrete grid/block dimension, honoring
//! caller constraints, then sizes the kernel's shared-memory footprint.

use crate::error::{Error, Result};
use crate::eval::Evaluator;
use crate::kir::{AllocCategory, Kernel, KirNode};
use crate::types::{MemoryType, ParallelType};
use crate::device::{LaunchAxis, LaunchParams, UNBOUND};

fn axis_for(pt: ParallelType) -> Option<LaunchAxis> {
    match pt {
        ParallelType::BIDx => Some(LaunchAxis::Gx),
        ParallelType::BIDy => Some(LaunchAxis::Gy),
        ParallelType::BIDz => Some(LaunchAxis::Gz),
        ParallelType::TIDx => Some(LaunchAxis::Bx),
        ParallelType::TIDy => Some(LaunchAxis::By),
        ParallelType::TIDz => Some(LaunchAxis::Bz),
        ParallelType::Unroll | ParallelType::Vectorize | ParallelType::Serial => None,
    }
}

fn constraint_for(constraints: &LaunchParams, axis: LaunchAxis) -> i64 {
    match axis {
        LaunchAxis::Gx => constraints.grid[0],
        LaunchAxis::Gy => constraints.grid[1],
        LaunchAxis::Gz => constraints.grid[2],
        LaunchAxis::Bx => constraints.block[0],
        LaunchAxis::By => constraints.block[1],
        LaunchAxis::Bz => constraints.block[2],
    }
}

pub fn compute_launch_params(
    kernel: &Kernel,
    evaluator: &mut Evaluator<'_>,
    constraints: &LaunchParams,
    smem_cap: u64,
) -> Result<LaunchParams> {
    let mut params = LaunchParams::default();
    let parallelized = kernel.parallelized_iter_domains();

    for &(kid, pt) in &parallelized {
        let axis = match axis_for(pt) {
            Some(a) => a,
            None => continue,
        };
        let extent = match kernel.node(kid) {
            Some(KirNode::IterDomain(d)) => d.extent,
            _ => continue,
        };
        let constraint = constraint_for(constraints, axis);
        if constraint != UNBOUND {
            if let Some(inferred) = evaluator.evaluate(extent) {
                if inferred != constraint {
                    return Err(Error::validation(format!(
                        "launch constraint {} conflicts with inferred extent {} for {:?}",
                        constraint, inferred, pt
                    )));
                }
            } else {
                evaluator.safe_bind(extent, constraint)?;
            }
            params.bind(axis, constraint)?;
        } else {
            let value = evaluator.require(extent)?;
            params.bind(axis, value)?;
        }
    }

    // Any hardware dimension nothing bound to defaults to 1, not "unbound",
    // since a real launch needs concrete grid/block sizes.
    for g in params.grid.iter_mut() {
        if *g == UNBOUND {
            *g = 1;
        }
    }
    for b in params.block.iter_mut() {
        if *b == UNBOUND {
            *b = 1;
        }
    }

    params.dynamic_smem_bytes = compute_shared_memory(kernel, evaluator, &params, smem_cap)?;
    Ok(params)
}

fn buffer_dtype_size(kernel: &Kernel, buffer: crate::kir::KirId) -> u64 {
    match kernel.node(buffer) {
        Some(KirNode::TensorView(tv)) => tv.dtype.size_bytes() as u64,
        Some(KirNode::Scalar { dtype, .. }) => dtype.size_bytes() as u64,
        _ => 1,
    }
}

fn compute_shared_memory(
    kernel: &Kernel,
    evaluator: &mut Evaluator<'_>,
    params: &LaunchParams,
    smem_cap: u64,
) -> Result<u64> {
    let mut static_bytes: u64 = 0;
    for &id in kernel.allocations(AllocCategory::Static) {
        if let Some(KirNode::Allocate { buffer, size, .. }) = kernel.node(id) {
            let count = evaluator.require(*size)?;
            static_bytes += count as u64 * buffer_dtype_size(kernel, *buffer);
        }
    }
    if static_bytes >= smem_cap {
        return Err(Error::ResourceExhausted {
            requested: static_bytes,
            available: smem_cap,
        });
    }

    let has_block_reduction = kernel_has_block_reduction(kernel);
    let mut dynamic_bytes: u64 = if has_block_reduction {
        let bdim = (params.block[0].max(1) * params.block[1].max(1) * params.block[2].max(1)) as u64;
        max_smem_elem_size(kernel) * bdim
    } else {
        0
    };

    for &id in kernel.allocations(AllocCategory::Dynamic) {
        if let Some(KirNode::Allocate { buffer, size, .. }) = kernel.node(id) {
            let count = evaluator.require(*size)?;
            let elem = buffer_dtype_size(kernel, *buffer);
            let bytes = count as u64 * elem;
            let padded = pad_to(dynamic_bytes, elem) + bytes;
            dynamic_bytes = padded;
        }
    }

    let total = static_bytes + dynamic_bytes;
    if total >= smem_cap {
        return Err(Error::ResourceExhausted {
            requested: total,
            available: smem_cap,
        });
    }
    Ok(dynamic_bytes)
}

fn pad_to(offset: u64, alignment: u64) -> u64 {
    if alignment == 0 {
        return offset;
    }
    let rem = offset % alignment;
    if rem == 0 {
        offset
    } else {
        offset + (alignment - rem)
    }
}

fn kernel_has_block_reduction(kernel: &Kernel) -> bool {
    kernel.parallelized_iter_domains().iter().any(|&(kid, pt)| {
        pt.is_thread_dim()
            && matches!(kernel.node(kid), Some(KirNode::IterDomain(d)) if d.is_reduction)
    })
}

fn max_smem_elem_size(kernel: &Kernel) -> u64 {
    kernel
        .output_tvs
        .iter()
        .chain(kernel.input_tvs.iter())
        .filter_map(|&id| match kernel.node(id) {
            Some(KirNode::TensorView(tv)) => Some(tv.dtype.size_bytes() as u64),
            _ => None,
        })
        .max()
        .unwrap_or(4)
}

/// Philox RNG offset (spec §4.6 step 6, S6): `4 * (ceil(out_numel / (4 *
/// 128 * gdimx)) + 1)`.
pub fn philox_offset(out_numel: i64, gdimx: i64) -> u64 {
    let denom = 4 * 128 * gdimx.max(1);
    let steps = (out_numel + denom - 1) / denom;
    (4 * (steps + 1)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kir::builder::IrBuilder;
    use crate::types::DataType;
    use rstest::rstest;

    #[test]
    fn philox_offset_matches_spec_formula() {
        // out_numel = 4*128*7 exactly -> ceil = 7, offset = 4*(7+1) = 32.
        assert_eq!(philox_offset(4 * 128 * 7, 7), 32);
    }

    #[test]
    fn philox_offset_rounds_up_partial_block() {
        assert_eq!(philox_offset(4 * 128 * 7 + 1, 7), 36);
    }

    #[rstest]
    #[case(3, 4, 4)]
    #[case(8, 4, 8)]
    #[case(0, 4, 0)]
    #[case(5, 1, 5)]
    #[case(6, 8, 8)]
    fn pad_to_rounds_up_to_alignment(#[case] offset: u64, #[case] alignment: u64, #[case] expected: u64) {
        assert_eq!(pad_to(offset, alignment), expected);
    }

    /// Property 5 (allocation size law, SPEC_FULL §8): two static
    /// allocations of known dtype/size sum to an exact byte total — a
    /// device cap set to exactly that total is rejected (`>=` is the
    /// exhaustion threshold), one byte over it succeeds.
    #[test]
    fn allocation_size_law_holds_for_static_allocations() {
        let mut kernel = Kernel::new("alloc_law");
        let (buf_a, buf_b, size_a, size_b) = {
            let mut b = IrBuilder::new(&mut kernel);
            let buf_a = b.tensor_view(DataType::Float32, vec![], MemoryType::Local);
            let buf_b = b.tensor_view(DataType::Float64, vec![], MemoryType::Local);
            let size_a = b.create_const_int(16); // 16 * 4 bytes = 64
            let size_b = b.create_const_int(8); // 8 * 8 bytes = 64
            (buf_a, buf_b, size_a, size_b)
        };
        let alloc_a = {
            let mut b = IrBuilder::new(&mut kernel);
            b.allocate(buf_a, MemoryType::Local, size_a, false)
        };
        let alloc_b = {
            let mut b = IrBuilder::new(&mut kernel);
            b.allocate(buf_b, MemoryType::Local, size_b, false)
        };
        kernel.add_allocation(AllocCategory::Static, alloc_a);
        kernel.add_allocation(AllocCategory::Static, alloc_b);

        let expected_static_bytes: u64 = 16 * 4 + 8 * 8;

        let mut ev_fail = Evaluator::new(&kernel);
        let err = compute_shared_memory(&kernel, &mut ev_fail, &LaunchParams::default(), expected_static_bytes)
            .unwrap_err();
        assert!(matches!(err, Error::ResourceExhausted { .. }));

        let mut ev_ok = Evaluator::new(&kernel);
        let dynamic = compute_shared_memory(&kernel, &mut ev_ok, &LaunchParams::default(), expected_static_bytes + 1)
            .unwrap();
        assert_eq!(dynamic, 0);
    }

    /// Property 6 (launch-constraint consistency, SPEC_FULL §8): a caller
    /// constraint equal to the inferred extent is accepted; a conflicting
    /// one fails instead of silently preferring either value.
    #[test]
    fn launch_constraint_consistency_accepts_matching_and_rejects_conflicting() {
        let mut kernel = Kernel::new("launch_consistency");
        let extent = {
            let mut b = IrBuilder::new(&mut kernel);
            let start = b.create_const_int(0);
            let extent = b.create_named_scalar(DataType::Int64);
            b.iter_domain(start, extent, Some(ParallelType::BIDx), false, false);
            extent
        };

        let matching = LaunchParams {
            grid: [8, UNBOUND, UNBOUND],
            ..LaunchParams::default()
        };
        let mut ev = Evaluator::new(&kernel);
        ev.safe_bind(extent, 8).unwrap();
        let params = compute_launch_params(&kernel, &mut ev, &matching, 1_000_000).unwrap();
        assert_eq!(params.grid[0], 8);

        let conflicting = LaunchParams {
            grid: [9, UNBOUND, UNBOUND],
            ..LaunchParams::default()
        };
        let mut ev2 = Evaluator::new(&kernel);
        ev2.safe_bind(extent, 8).unwrap();
        let err = compute_launch_params(&kernel, &mut ev2, &conflicting, 1_000_000).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
