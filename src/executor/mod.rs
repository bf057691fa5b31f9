//! Launch planner & executor (C6, spec §4.6): owns the compile-once,
//! launch-many lifecycle for a scheduled fusion.

pub mod launch;

use crate::config::Config;
use crate::device::{CodeEmitter, CompiledHandle, DeviceCompiler, DeviceInfo, LaunchParams, Tensor, TensorRuntime};
use crate::error::{Error, Result};
use crate::eval::Evaluator;
use crate::ir::Fusion;
use crate::kir::{AllocCategory, Kernel, KirNode};
use crate::lower::lower_fusion;
use crate::marshal::{ArgumentBuilder, RngArg, TensorArg};
use crate::scheduler::schedule_fusion;
use lazy_static::lazy_static;
use parking_lot::Mutex;

lazy_static! {
    /// Monotonic fusion-id source shared process-wide (spec §4.6
    /// "assign a monotonically increasing fusion id").
    static ref NEXT_FUSION_ID: Mutex<u64> = Mutex::new(0);
}

fn next_fusion_id() -> u64 {
    let mut guard = NEXT_FUSION_ID.lock();
    let id = *guard;
    *guard += 1;
    id
}

enum State {
    Uncompiled,
    Compiled { kernel: Kernel, handle: CompiledHandle },
}

/// Drives one fusion through `compile` → `run` (spec §4.6 state machine:
/// `Uncompiled → Compiled → Running`). Recompilation is unsupported — a
/// fresh `Executor` is required per fusion id, matching the original's
/// "no re-entrant compile" rule.
pub struct Executor<C, E, R, I> {
    compiler: C,
    emitter: E,
    runtime: R,
    device_info: I,
    device: i32,
    fusion_id: u64,
    state: State,
}

impl<C, E, R, I> Executor<C, E, R, I>
where
    C: DeviceCompiler<Args = Vec<u8>>,
    E: CodeEmitter,
    R: TensorRuntime,
    I: DeviceInfo,
{
    pub fn new(compiler: C, emitter: E, runtime: R, device_info: I, device: i32) -> Self {
        Executor {
            compiler,
            emitter,
            runtime,
            device_info,
            device,
            fusion_id: next_fusion_id(),
            state: State::Uncompiled,
        }
    }

    pub fn fusion_id(&self) -> u64 {
        self.fusion_id
    }

    /// Schedules, lowers, emits, and compiles `fusion` (spec §4.6
    /// `compile`). Clones the input so the caller's fusion is untouched.
    pub fn compile_fusion(&mut self, fusion: &Fusion, config: &Config) -> Result<()> {
        let mut scheduled = fusion.clone();
        schedule_fusion(&mut scheduled, config)?;
        let kernel = lower_fusion(&scheduled, format!("fused_kernel_{}", self.fusion_id))?;

        let static_bytes: u64 = kernel
            .allocations(AllocCategory::Static)
            .iter()
            .filter_map(|&id| match kernel.node(id) {
                Some(KirNode::Allocate { buffer, size, .. }) => {
                    let count = match kernel.node(*size) {
                        Some(KirNode::Scalar { const_value: Some(c), .. }) => c.as_i64()?,
                        _ => return None,
                    };
                    let elem = match kernel.node(*buffer) {
                        Some(KirNode::TensorView(tv)) => tv.dtype.size_bytes() as i64,
                        _ => 1,
                    };
                    Some((count * elem) as u64)
                }
                _ => None,
            })
            .sum();
        let cap = config.shared_mem_override_bytes.unwrap_or_else(|| self.device_info.shared_mem_per_block(self.device));
        if static_bytes >= cap {
            return Err(Error::validation(
                "static shared memory allocation is larger than available memory",
            ));
        }

        let source = self.emitter.emit(&kernel)?;
        if Config::debug_enabled_from_env() {
            tracing::info!(fusion_id = self.fusion_id, kernel_source = %source, "emitted kernel source");
        }
        let handle = self.compiler.compile(&source, &kernel.name.clone(), self.fusion_id)?;
        self.state = State::Compiled { kernel, handle };
        Ok(())
    }

    /// Binds inputs, computes launch parameters, allocates outputs and
    /// scratch buffers, marshals arguments, and launches (spec §4.6
    /// `run`, steps 1-7). `outputs`, when provided, is reused tensor for
    /// tensor wherever its shape and dtype already match the kernel's
    /// inferred output (spec §4.6 step 4); any remaining slot is freshly
    /// allocated.
    pub fn run_fusion(
        &self,
        inputs: &[R::Tensor],
        outputs: Option<Vec<R::Tensor>>,
        constraints: &LaunchParams,
        stream: u64,
    ) -> Result<Vec<R::Tensor>> {
        let (kernel, handle) = match &self.state {
            State::Compiled { kernel, handle } => (kernel, *handle),
            State::Uncompiled => return Err(Error::validation("run called before compile_fusion")),
        };

        if inputs.len() != kernel.input_tvs.len() {
            return Err(Error::validation(format!(
                "expected {} inputs, got {}",
                kernel.input_tvs.len(),
                inputs.len()
            )));
        }
        for (&tv, input) in kernel.input_tvs.iter().zip(inputs) {
            let expected_dtype = match kernel.node(tv) {
                Some(KirNode::TensorView(ktv)) => ktv.dtype,
                _ => return Err(Error::internal("input tv not a TensorView")),
            };
            if input.dtype() != expected_dtype {
                return Err(Error::validation(format!(
                    "input dtype mismatch: expected {:?}, got {:?}",
                    expected_dtype,
                    input.dtype()
                )));
            }
        }
        if let Some(provided) = &outputs {
            if provided.len() != kernel.output_tvs.len() {
                return Err(Error::validation(format!(
                    "expected {} outputs, got {}",
                    kernel.output_tvs.len(),
                    provided.len()
                )));
            }
        }

        let mut evaluator = Evaluator::new(kernel);
        for (&tv, input) in kernel.input_tvs.iter().zip(inputs) {
            evaluator.bind_tensor_input(tv, input.shape())?;
        }

        let smem_cap = self.device_info.shared_mem_per_block(self.device);
        let launch_params = launch::compute_launch_params(kernel, &mut evaluator, constraints, smem_cap)?;

        let mut provided = outputs.map(|v| v.into_iter());
        let mut outputs = Vec::with_capacity(kernel.output_tvs.len());
        for &tv in &kernel.output_tvs {
            let shape = output_shape(kernel, &mut evaluator, tv)?;
            let dtype = match kernel.node(tv) {
                Some(KirNode::TensorView(ktv)) => ktv.dtype,
                _ => return Err(Error::internal("output tv not a TensorView")),
            };
            let reused = provided.as_mut().and_then(|it| it.next());
            let tensor = match reused {
                Some(t) if t.shape() == shape.as_slice() && t.dtype() == dtype => t,
                _ => self.runtime.allocate(&shape, dtype, self.device, false)?,
            };
            outputs.push(tensor);
        }

        let mut global_scratch = Vec::new();
        for &id in kernel.allocations(AllocCategory::Global) {
            if let Some(KirNode::Allocate { size, .. }) = kernel.node(id) {
                let count = evaluator.require(*size)?;
                global_scratch.push(self.runtime.allocate(&[count], crate::types::DataType::Float32, self.device, false)?);
            }
        }
        let mut sync_scratch = Vec::new();
        for &id in kernel.allocations(AllocCategory::Sync) {
            if let Some(KirNode::Allocate { size, .. }) = kernel.node(id) {
                let count = evaluator.require(*size)?;
                sync_scratch.push(self.runtime.allocate(&[count], crate::types::DataType::Int32, self.device, true)?);
            }
        }

        let mut args = ArgumentBuilder::new();
        for t in inputs {
            args.push_tensor(&tensor_arg(t));
        }
        for t in &outputs {
            args.push_tensor(&tensor_arg(t));
        }
        for t in global_scratch.iter().chain(sync_scratch.iter()) {
            args.push_tensor(&tensor_arg(t));
        }
        if kernel.has_random {
            let out_numel: i64 = outputs.iter().map(|o| o.numel()).sum();
            let offset = launch::philox_offset(out_numel, launch_params.grid[0].max(1));
            args.push_rng(&RngArg { seed: self.fusion_id, offset });
        }

        self.compiler.launch(handle, &launch_params, stream, &args.finish())?;
        Ok(outputs)
    }
}

fn tensor_arg<T: Tensor>(t: &T) -> TensorArg {
    TensorArg {
        data_ptr: t.data_ptr(),
        sizes: t.shape().to_vec(),
        strides: t.strides().to_vec(),
    }
}

fn output_shape(kernel: &Kernel, evaluator: &mut Evaluator<'_>, tv: crate::kir::KirId) -> Result<Vec<i64>> {
    let domain = match kernel.node(tv) {
        Some(KirNode::TensorView(ktv)) => ktv.domain.clone(),
        _ => return Err(Error::internal("output_shape: not a tensor view")),
    };
    let mut shape = Vec::with_capacity(domain.len());
    for axis in domain {
        if let Some(KirNode::IterDomain(d)) = kernel.node(axis) {
            if d.is_reduction || d.is_broadcast {
                continue;
            }
            shape.push(evaluator.require(d.extent)?);
        }
    }
    Ok(shape)
}
