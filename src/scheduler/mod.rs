//! Scheduler registry (C5, spec §4.5): recognizes a fusion's shape class
//! and applies the matching axis transformation before lowering.

pub mod normalization;
pub mod pointwise;
pub mod reduction;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::ir::{ExprId, ExprOp, Fusion, ValId};

/// Resolved parameters of a scheduling decision, compared structurally by
/// the segmenter before paying for a trial lowering (spec §9
/// `SchedulerEntry::sameAs`, SPEC_FULL §9).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduleParams {
    pub heuristic: Heuristic,
    pub block_size: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Heuristic {
    PointWise,
    SingleReduction,
    Normalization,
}

impl Heuristic {
    pub fn name(&self) -> &'static str {
        match self {
            Heuristic::PointWise => "pointwise",
            Heuristic::SingleReduction => "single_reduction",
            Heuristic::Normalization => "normalization",
        }
    }
}

/// A scheduler capability: decide whether it applies, and mutate the
/// fusion in place to apply it (spec §4.5).
pub trait SchedulerEntry {
    fn heuristic(&self) -> Heuristic;
    fn can_schedule(&self, fusion: &Fusion) -> bool;
    fn schedule(&self, fusion: &mut Fusion, config: &Config) -> Result<ScheduleParams>;
}

/// Every reduction expression in the fusion whose reduction axis is
/// non-trivial (extent not the constant 1). Counts one "stage" per
/// `ReductionOp` expr, regardless of how many axes it reduces over.
pub fn nontrivial_reduction_exprs(fusion: &Fusion) -> Vec<ExprId> {
    fusion
        .exprs()
        .into_iter()
        .filter(|&id| {
            let expr = match fusion.expr(id) {
                Some(e) => e,
                None => return false,
            };
            if !matches!(expr.op, ExprOp::ReductionOp { .. }) {
                return false;
            }
            expr.inputs.iter().any(|&input_tv| {
                fusion
                    .tv_root_domain(input_tv)
                    .map(|root| root.iter().any(|&ax| fusion.is_nontrivial_reduction_axis(ax)))
                    .unwrap_or(false)
            })
        })
        .collect()
}

/// True if any `BroadcastOp` in the fusion directly consumes `val`.
pub fn is_broadcast_consumer_of(fusion: &Fusion, val: ValId) -> bool {
    fusion.unordered_exprs().any(|e| matches!(e.op, ExprOp::BroadcastOp) && e.inputs.contains(&val))
}

/// Tries each registered heuristic in order, returning the first
/// acceptance (spec §4.5 `proposeHeuristics`).
pub fn propose_heuristics(fusion: &Fusion) -> Option<Heuristic> {
    let registry: [Box<dyn SchedulerEntry>; 3] = [
        Box::new(pointwise::PointWiseScheduler),
        Box::new(reduction::SingleReductionScheduler),
        Box::new(normalization::NormalizationScheduler),
    ];
    registry.iter().find(|s| s.can_schedule(fusion)).map(|s| s.heuristic())
}

/// Applies `propose_heuristics`' recognized heuristic, or fails with
/// `Error::Unschedulable` if none accepts (spec §7).
pub fn schedule_fusion(fusion: &mut Fusion, config: &Config) -> Result<ScheduleParams> {
    let heuristic = propose_heuristics(fusion).ok_or(Error::Unschedulable)?;
    let entry: Box<dyn SchedulerEntry> = match heuristic {
        Heuristic::PointWise => Box::new(pointwise::PointWiseScheduler),
        Heuristic::SingleReduction => Box::new(reduction::SingleReductionScheduler),
        Heuristic::Normalization => Box::new(normalization::NormalizationScheduler),
    };
    entry.schedule(fusion, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BinaryOpType, DataType, MemoryType, ScalarConst};

    fn pointwise_fusion() -> Fusion {
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

    #[test]
    fn pointwise_fusion_schedules_as_pointwise_and_stays_recognized() {
        let mut f = pointwise_fusion();
        assert_eq!(propose_heuristics(&f), Some(Heuristic::PointWise));
        let config = Config::default();
        schedule_fusion(&mut f, &config).unwrap();
        // Scheduler round-trip property (spec §8 property 7).
        assert_eq!(propose_heuristics(&f), Some(Heuristic::PointWise));
    }

    #[test]
    fn empty_nontrivial_reductions_for_pointwise_fusion() {
        let f = pointwise_fusion();
        assert!(nontrivial_reduction_exprs(&f).is_empty());
    }
}
