//! CPU-backed `TensorRuntime` (spec §6, `mock-runtime` feature): allocates
//! plain `Vec<f64>` buffers behind a fabricated device pointer, so tests
//! can drive the executor without a real GPU driver.

use crate::device::Tensor;
use crate::error::Result;
use crate::types::DataType;
use dashmap::DashMap;
use lazy_static::lazy_static;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

lazy_static! {
    /// The fake device's address space: every `MockTensor`'s `data_ptr`
    /// indexes into this table. Global because `DeviceCompiler::launch`
    /// only ever sees raw pointers, not `MockTensor`s, once arguments are
    /// marshalled.
    static ref STORE: DashMap<u64, Mutex<Vec<f64>>> = DashMap::new();
}

static NEXT_PTR: AtomicU64 = AtomicU64::new(1);

/// Reads the flat contents backing `ptr`. Panics if `ptr` was never
/// allocated through `MockRuntime` — a programmer error, not a runtime one.
pub fn read(ptr: u64) -> Vec<f64> {
    STORE.get(&ptr).expect("mock tensor pointer not allocated").lock().clone()
}

/// Overwrites the flat contents backing `ptr`, e.g. to seed a test input.
pub fn write(ptr: u64, data: &[f64]) {
    let mut slot = STORE.get(&ptr).expect("mock tensor pointer not allocated").lock();
    slot.clear();
    slot.extend_from_slice(data);
}

fn row_major_strides(shape: &[i64]) -> Vec<i64> {
    let mut strides = vec![1i64; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1].max(1);
    }
    strides
}

#[derive(Clone, Debug)]
pub struct MockTensor {
    ptr: u64,
    shape: Vec<i64>,
    strides: Vec<i64>,
    dtype: DataType,
}

impl MockTensor {
    pub fn ptr(&self) -> u64 {
        self.ptr
    }

    /// Convenience accessor for tests that want to inspect results without
    /// going through the `runtime::read` free function.
    pub fn to_vec(&self) -> Vec<f64> {
        read(self.ptr)
    }
}

impl Tensor for MockTensor {
    fn shape(&self) -> &[i64] {
        &self.shape
    }

    fn dtype(&self) -> DataType {
        self.dtype
    }

    fn strides(&self) -> &[i64] {
        &self.strides
    }

    fn data_ptr(&self) -> u64 {
        self.ptr
    }
}

/// A `TensorRuntime` that allocates host memory instead of device memory.
/// Every buffer is stored as `f64` regardless of `dtype` — precision loss
/// for `Half`/`Float32` round-tripping is out of scope for a test double.
#[derive(Default, Clone, Copy)]
pub struct MockRuntime;

impl crate::device::TensorRuntime for MockRuntime {
    type Tensor = MockTensor;

    fn allocate(&self, shape: &[i64], dtype: DataType, _device: i32, zero_init: bool) -> Result<MockTensor> {
        let numel: usize = shape.iter().product::<i64>().max(0) as usize;
        let data = if zero_init {
            vec![0.0; numel]
        } else {
            vec![f64::NAN; numel]
        };
        let ptr = NEXT_PTR.fetch_add(1, Ordering::SeqCst);
        STORE.insert(ptr, Mutex::new(data));
        Ok(MockTensor {
            ptr,
            shape: shape.to_vec(),
            strides: row_major_strides(shape),
            dtype,
        })
    }
}
