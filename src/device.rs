//! External collaborator traits (spec §6): the vendor runtime-compiler,
//! tensor allocator, source emitter, and device query surface this crate
//! consumes but does not implement. Production embeddings supply a real
//! GPU-backed implementation; the `mock-runtime` feature ships a CPU
//! reference implementation for tests (see `crate::mock`).

use crate::error::Result;
use crate::kir::Kernel;
use crate::types::DataType;

/// Opaque handle to one compiled kernel, returned by `DeviceCompiler::compile`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct CompiledHandle(pub u64);

/// Six launch dimensions plus dynamic shared-memory bytes (spec §3
/// "Launch parameters"). Any grid/block dimension may be unbound,
/// represented by the sentinel `-1`.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct LaunchParams {
    pub grid: [i64; 3],
    pub block: [i64; 3],
    pub dynamic_smem_bytes: u64,
}

pub const UNBOUND: i64 = -1;

impl Default for LaunchParams {
    fn default() -> Self {
        LaunchParams {
            grid: [UNBOUND; 3],
            block: [UNBOUND; 3],
            dynamic_smem_bytes: 0,
        }
    }
}

impl LaunchParams {
    /// Binds `dim` to `value`; idempotent for an equal rebind, a hard
    /// error on conflict (spec §3).
    pub fn bind(&mut self, axis: LaunchAxis, value: i64) -> Result<()> {
        let slot = self.slot_mut(axis);
        if *slot != UNBOUND && *slot != value {
            return Err(crate::error::Error::internal("launch dimension conflict"));
        }
        *slot = value;
        Ok(())
    }

    fn slot_mut(&mut self, axis: LaunchAxis) -> &mut i64 {
        match axis {
            LaunchAxis::Gx => &mut self.grid[0],
            LaunchAxis::Gy => &mut self.grid[1],
            LaunchAxis::Gz => &mut self.grid[2],
            LaunchAxis::Bx => &mut self.block[0],
            LaunchAxis::By => &mut self.block[1],
            LaunchAxis::Bz => &mut self.block[2],
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum LaunchAxis {
    Gx,
    Gy,
    Gz,
    Bx,
    By,
    Bz,
}

/// A runtime tensor buffer as seen by the compiler: shape/dtype/strides
/// are all the core needs, plus an opaque payload the `TensorRuntime`
/// owns.
pub trait Tensor {
    fn shape(&self) -> &[i64];
    fn dtype(&self) -> DataType;
    fn strides(&self) -> &[i64];
    /// Opaque device address, used only for argument marshalling.
    fn data_ptr(&self) -> u64;
    fn numel(&self) -> i64 {
        self.shape().iter().product()
    }
}

/// Allocates device buffers (spec §6 `TensorRuntime`).
pub trait TensorRuntime {
    type Tensor: Tensor;

    fn allocate(&self, shape: &[i64], dtype: DataType, device: i32, zero_init: bool) -> Result<Self::Tensor>;
}

/// Compiles device-source text and launches a compiled kernel (spec §6
/// `DeviceCompiler`).
pub trait DeviceCompiler {
    type Args;

    fn compile(&self, source_text: &str, symbol_name: &str, id: u64) -> Result<CompiledHandle>;

    fn launch(&self, handle: CompiledHandle, params: &LaunchParams, stream: u64, args: &Self::Args) -> Result<()>;
}

/// Renders lowered kernel IR to device source text (spec §6 `CodeEmitter`).
pub trait CodeEmitter {
    fn emit(&self, kernel: &Kernel) -> Result<String>;
}

/// Per-device static properties (spec §6 `DeviceInfo`).
pub trait DeviceInfo {
    fn shared_mem_per_block(&self, device: i32) -> u64;
}
