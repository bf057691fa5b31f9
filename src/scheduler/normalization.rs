//! Normalization heuristic (spec §4.5): accepts two or more non-trivial
//! reductions sharing the same reduction-axis count and equivalent root
//! domains (a simplified stand-in for a full `ComputeAtRootDomainMap`:
//! same root-domain length and matching per-axis reduction flags).
//! Reuses the single-reduction tiling, applied once per distinct axis so
//! every reduction stage that shares an axis gets a consistent binding.

use crate::config::Config;
use crate::error::Result;
use crate::ir::{Fusion, ValId};
use crate::scheduler::{nontrivial_reduction_exprs, Heuristic, ScheduleParams, SchedulerEntry};
use crate::types::ParallelType;
use std::collections::HashSet;

pub struct NormalizationScheduler;

impl NormalizationScheduler {
    fn reduction_input_tvs(fusion: &Fusion) -> Option<Vec<ValId>> {
        let stages = nontrivial_reduction_exprs(fusion);
        if stages.len() < 2 {
            return None;
        }
        let mut tvs = Vec::new();
        let mut shapes = Vec::new();
        for stage in &stages {
            let expr = fusion.expr(*stage)?;
            let input_tv = *expr.inputs.first()?;
            let root = fusion.tv_root_domain(input_tv)?;
            let flags: Vec<bool> = root.iter().map(|&a| fusion.is_nontrivial_reduction_axis(a)).collect();
            shapes.push(flags);
            tvs.push(input_tv);
        }
        let first = &shapes[0];
        if shapes.iter().all(|s| s == first) {
            Some(tvs)
        } else {
            None
        }
    }
}

impl SchedulerEntry for NormalizationScheduler {
    fn heuristic(&self) -> Heuristic {
        Heuristic::Normalization
    }

    fn can_schedule(&self, fusion: &Fusion) -> bool {
        Self::reduction_input_tvs(fusion).is_some()
    }

    fn schedule(&self, fusion: &mut Fusion, config: &Config) -> Result<ScheduleParams> {
        let tvs = Self::reduction_input_tvs(fusion).unwrap_or_default();
        let mut seen: HashSet<ValId> = HashSet::new();
        for tv in tvs {
            let root = match fusion.tv_root_domain(tv) {
                Some(r) => r.to_vec(),
                None => continue,
            };
            let mut bound_bidx = false;
            for axis in &root {
                if !seen.insert(*axis) {
                    continue;
                }
                if fusion.is_nontrivial_reduction_axis(*axis) {
                    fusion.set_axis_parallel_type(*axis, ParallelType::TIDx);
                } else if !bound_bidx {
                    fusion.set_axis_parallel_type(*axis, ParallelType::BIDx);
                    bound_bidx = true;
                }
            }
            fusion.set_tv_current_domain(tv, root);
        }
        Ok(ScheduleParams {
            heuristic: Heuristic::Normalization,
            block_size: config.default_block_size,
        })
    }
}
