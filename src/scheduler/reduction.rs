//! SingleReduction heuristic (spec §4.5): accepts exactly one non-trivial
//! reduction whose result is not broadcast to a descendant. Binds the
//! reduction axis to `TIDx` (block reduction) and the first surviving
//! non-reduction axis to `BIDx`, with no splitting — the axis as a whole
//! becomes one block's worth of work, matching S2's literal launch shape.

use crate::config::Config;
use crate::error::Result;
use crate::ir::Fusion;
use crate::scheduler::{is_broadcast_consumer_of, nontrivial_reduction_exprs, Heuristic, ScheduleParams, SchedulerEntry};
use crate::types::ParallelType;

pub struct SingleReductionScheduler;

impl SingleReductionScheduler {
    fn single_reduction_output(fusion: &Fusion) -> Option<crate::ir::ValId> {
        let stages = nontrivial_reduction_exprs(fusion);
        if stages.len() != 1 {
            return None;
        }
        fusion.expr(stages[0])?.outputs.first().copied()
    }
}

impl SchedulerEntry for SingleReductionScheduler {
    fn heuristic(&self) -> Heuristic {
        Heuristic::SingleReduction
    }

    fn can_schedule(&self, fusion: &Fusion) -> bool {
        match Self::single_reduction_output(fusion) {
            Some(out) => !is_broadcast_consumer_of(fusion, out),
            None => false,
        }
    }

    fn schedule(&self, fusion: &mut Fusion, config: &Config) -> Result<ScheduleParams> {
        let stages = nontrivial_reduction_exprs(fusion);
        let expr = fusion.expr(stages[0]).unwrap().clone();
        for &input_tv in &expr.inputs {
            let root = match fusion.tv_root_domain(input_tv) {
                Some(r) => r.to_vec(),
                None => continue,
            };
            let mut bound_bidx = false;
            let mut new_domain = Vec::with_capacity(root.len());
            for axis in root {
                if fusion.is_nontrivial_reduction_axis(axis) {
                    fusion.set_axis_parallel_type(axis, ParallelType::TIDx);
                } else if !bound_bidx {
                    fusion.set_axis_parallel_type(axis, ParallelType::BIDx);
                    bound_bidx = true;
                }
                new_domain.push(axis);
            }
            fusion.set_tv_current_domain(input_tv, new_domain);
        }
        Ok(ScheduleParams {
            heuristic: Heuristic::SingleReduction,
            block_size: config.default_block_size,
        })
    }
}
