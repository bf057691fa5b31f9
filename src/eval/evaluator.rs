//! `StatefulExpressionEvaluator`: binds named scalars to runtime integer
//! values and evaluates kernel-IR scalar expressions by structural
//! recursion (spec §4.3).
//!
//! One evaluator per launch (spec §9 "Evaluator restart" — state is
//! per-launch and must not be shared across runs of the same executor);
//! callers get a fresh restart by constructing a new `Evaluator`.

use crate::error::{Error, Result};
use crate::kir::{Kernel, KirId, KirNode};
use crate::types::BinaryOpType;
use std::collections::HashMap;

pub struct Evaluator<'k> {
    kernel: &'k Kernel,
    bindings: HashMap<KirId, i64>,
}

impl<'k> Evaluator<'k> {
    pub fn new(kernel: &'k Kernel) -> Self {
        Evaluator {
            kernel,
            bindings: HashMap::new(),
        }
    }

    /// Binds `symbol` to `value`. Fails if already bound to a different
    /// value (spec §4.3 `safeBind`).
    pub fn safe_bind(&mut self, symbol: KirId, value: i64) -> Result<()> {
        if let Some(existing) = self.bindings.get(&symbol) {
            if *existing != value {
                return Err(Error::validation(format!(
                    "{} already bound to {}, cannot rebind to {}",
                    symbol, existing, value
                )));
            }
            return Ok(());
        }
        self.bindings.insert(symbol, value);
        Ok(())
    }

    /// Binds a fusion-input tensor view's root-domain extent symbols to
    /// the corresponding runtime shape (spec §4.3). Errors, rather than
    /// silently truncating, if `shape`'s rank does not match the tensor
    /// view's domain (spec §196 input rank mismatch).
    pub fn bind_tensor_input(&mut self, tv: KirId, shape: &[i64]) -> Result<()> {
        let domain = match self.kernel.node(tv) {
            Some(KirNode::TensorView(ktv)) => ktv.domain.clone(),
            _ => return Err(Error::internal("bind_tensor_input: not a tensor view")),
        };
        if domain.len() != shape.len() {
            return Err(Error::validation(format!(
                "input rank mismatch: expected rank {}, got rank {}",
                domain.len(),
                shape.len()
            )));
        }
        for (axis_id, &dim) in domain.iter().zip(shape) {
            if let Some(KirNode::IterDomain(kid)) = self.kernel.node(*axis_id) {
                self.safe_bind(kid.extent, dim)?;
            }
        }
        Ok(())
    }

    /// Evaluates `id` by structural recursion, returning `None` if some
    /// transitively-referenced symbol is unbound.
    pub fn evaluate(&mut self, id: KirId) -> Option<i64> {
        if let Some(v) = self.bindings.get(&id) {
            return Some(*v);
        }
        let node = self.kernel.node(id)?.clone();
        let value = match node {
            KirNode::Scalar { const_value, .. } => const_value?.as_i64()?,
            KirNode::BinaryOp { op, lhs, rhs, .. } => {
                let l = self.evaluate(lhs)?;
                let r = self.evaluate(rhs)?;
                match op {
                    BinaryOpType::Add => l + r,
                    BinaryOpType::Sub => l - r,
                    BinaryOpType::Mul => l * r,
                    BinaryOpType::Div if r != 0 => l / r,
                    BinaryOpType::Max => l.max(r),
                    BinaryOpType::Min => l.min(r),
                    BinaryOpType::Mod if r != 0 => l % r,
                    _ => return None,
                }
            }
            _ => return None,
        };
        self.bindings.insert(id, value);
        Some(value)
    }

    /// `evaluate` that turns an unresolved symbol into `Error::Inference`.
    pub fn require(&mut self, id: KirId) -> Result<i64> {
        self.evaluate(id)
            .ok_or_else(|| Error::Inference { symbol: id.to_string() })
    }
}
