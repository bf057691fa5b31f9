//! CPU reference implementation of the external collaborator traits in
//! `crate::device` (spec §6), gated behind the `mock-runtime` feature.
//! Exists so the test suite — and callers without a real GPU driver
//! stack — can exercise the executor end to end. It is a deliberately
//! simplified structural interpreter of lowered kernel IR, not a code
//! generator: see `compiler::MockDevice` for the scope of what it
//! actually runs.

pub mod compiler;
pub mod runtime;

pub use compiler::MockDevice;
pub use runtime::{MockRuntime, MockTensor};
