//! PointWise heuristic (spec §4.5): accepts any fusion with no
//! non-trivial reduction; tiles each output's leading axis into
//! `BIDx × TIDx`.

use crate::config::Config;
use crate::error::Result;
use crate::ir::Fusion;
use crate::scheduler::{Heuristic, ScheduleParams, SchedulerEntry};
use crate::types::ParallelType;

pub struct PointWiseScheduler;

impl SchedulerEntry for PointWiseScheduler {
    fn heuristic(&self) -> Heuristic {
        Heuristic::PointWise
    }

    fn can_schedule(&self, fusion: &Fusion) -> bool {
        !fusion.has_reduction()
    }

    fn schedule(&self, fusion: &mut Fusion, config: &Config) -> Result<ScheduleParams> {
        let block_size = config.default_block_size;
        let outputs: Vec<_> = fusion.outputs().to_vec();
        for tv in outputs {
            let root = match fusion.tv_root_domain(tv) {
                Some(r) if !r.is_empty() => r.to_vec(),
                _ => continue,
            };
            let leading = root[0];
            let (outer, inner) = fusion.split_axis(leading, block_size);
            fusion.set_axis_parallel_type(outer, ParallelType::BIDx);
            fusion.set_axis_parallel_type(inner, ParallelType::TIDx);
            let mut new_domain = vec![outer, inner];
            new_domain.extend_from_slice(&root[1..]);
            fusion.set_tv_current_domain(tv, new_domain);
            fusion.set_tv_compute_at_axis(tv, 2);
        }
        Ok(ScheduleParams {
            heuristic: Heuristic::PointWise,
            block_size,
        })
    }
}
