//! Kernel IR: the low-level loop/predicate/allocation tier that lowering
//! produces from a scheduled fusion (spec §3, §4.2).

pub mod builder;
pub mod kernel;
pub mod nodes;

pub use builder::IrBuilder;
pub use kernel::{AllocCategory, Kernel};
pub use nodes::{KIterDomain, KTensorView, KirId, KirNode};
