//! Error taxonomy (spec §7). One enum, one `Result` alias, matching the
//! teacher's `thiserror`-based `crate::error` module.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Synchronous, caller-recoverable input validation failure: empty
    /// outputs, non-tensor output, non-matching device, input type/rank
    /// mismatch.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A specific scheduler heuristic declined this fusion. Not normally
    /// user-visible: the segmenter/registry tries the next heuristic.
    #[error("scheduler '{heuristic}' rejected fusion: {reason}")]
    ScheduleRejected { heuristic: String, reason: String },

    /// Every registered heuristic rejected the fusion.
    #[error("fusion is not schedulable by any registered heuristic")]
    Unschedulable,

    /// The symbolic evaluator could not resolve a required extent.
    #[error("could not infer value for symbol '{symbol}'")]
    Inference { symbol: String },

    /// Static or total shared-memory requirement exceeds the device budget.
    #[error("shared memory allocation ({requested} bytes) exceeds device capacity ({available} bytes)")]
    ResourceExhausted { requested: u64, available: u64 },

    /// Verbatim propagation of a `DeviceCompiler`/`TensorRuntime` failure.
    #[error("device driver error: {0}")]
    Driver(String),

    /// A compiler invariant was violated; should never fire on well-formed
    /// input. Treated as a fatal assertion, not a recoverable condition.
    #[error("internal invariant violated: {0}")]
    Internal(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn internal(msg: &'static str) -> Self {
        Error::Internal(msg)
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }
}
