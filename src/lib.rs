//! `fusorch`: a fusing JIT compiler for tensor-operator graphs.
//!
//! A fusion definition is built in the high-level IR (`ir`), segmented
//! into fusible groups (`segment`), scheduled by one of the registered
//! heuristics (`scheduler`), lowered to kernel IR (`lower`, producing a
//! `kir::Kernel`), and driven through compile/launch by an `executor`
//! talking to a `device`-trait-shaped external backend. `mock`, behind
//! the `mock-runtime` feature, supplies a CPU reference backend for
//! testing without a GPU driver stack.

pub mod config;
pub mod device;
pub mod error;
pub mod eval;
pub mod executor;
pub mod ir;
pub mod kir;
pub mod lower;
pub mod marshal;
#[cfg(feature = "mock-runtime")]
pub mod mock;
pub mod scheduler;
pub mod segment;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use executor::Executor;
pub use ir::{ExprId, Fusion, FusionGuard, ValId};
pub use kir::Kernel;
pub use segment::{segment_fusion, Group, SegmentedFusion};
