//! The fusion graph: the high-level IR that fusion definitions are built
//! in and that the segmenter/scheduler operate over (spec §3, §4.1).

pub mod cloner;
pub mod expr;
pub mod fusion;
pub mod val;

pub use cloner::IrCloner;
pub use expr::{ExprId, ExprNode, ExprOp};
pub use fusion::{Fusion, FusionGuard};
pub use val::{ValData, ValId, ValKindTag, ValNode};
