//! Argument marshaller (C7, spec §4.7): packs tensor descriptors, bound
//! scalars, and (if the kernel uses RNG) the Philox seed/offset pair into
//! one contiguous byte buffer in kernel declaration order, ready to hand
//! to a `DeviceCompiler::launch` implementation.

use byteorder::{LittleEndian, WriteBytesExt};
use bytes::{BufMut, BytesMut};

/// One packed tensor argument: device pointer plus its strides/sizes, in
/// the layout a generated kernel indexes with (spec §4.7 `{data_ptr,
/// strides[rank], sizes[rank]}`, rank known at compile time from the
/// tensor view and so not itself part of the wire layout).
pub struct TensorArg {
    pub data_ptr: u64,
    pub sizes: Vec<i64>,
    pub strides: Vec<i64>,
}

pub struct RngArg {
    pub seed: u64,
    pub offset: u64,
}

/// Builds the packed argument buffer. Order is: input tensors, output
/// tensors, bound scalars, then the RNG pair if present — the same order
/// `Kernel::input_tvs`/`output_tvs` plus scalar bindings are produced in,
/// so no reordering table is needed on the receiving side.
#[derive(Default)]
pub struct ArgumentBuilder {
    buf: BytesMut,
}

impl ArgumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_tensor(&mut self, arg: &TensorArg) -> &mut Self {
        self.buf.put_u64_le(arg.data_ptr);
        for &s in &arg.strides {
            self.buf.put_i64_le(s);
        }
        for &s in &arg.sizes {
            self.buf.put_i64_le(s);
        }
        self
    }

    pub fn push_scalar_i64(&mut self, v: i64) -> &mut Self {
        self.buf.put_i64_le(v);
        self
    }

    pub fn push_scalar_f64(&mut self, v: f64) -> &mut Self {
        self.buf.put_f64_le(v);
        self
    }

    pub fn push_rng(&mut self, rng: &RngArg) -> &mut Self {
        self.buf.put_u64_le(rng.seed);
        self.buf.put_u64_le(rng.offset);
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

/// Writer-based alternative used when a caller already owns a `Write`
/// sink (e.g. a pinned host staging buffer) rather than wanting an owned
/// `Vec<u8>` back.
pub fn write_tensor<W: std::io::Write>(w: &mut W, arg: &TensorArg) -> std::io::Result<()> {
    w.write_u64::<LittleEndian>(arg.data_ptr)?;
    for &s in &arg.strides {
        w.write_i64::<LittleEndian>(s)?;
    }
    for &s in &arg.sizes {
        w.write_i64::<LittleEndian>(s)?;
    }
    Ok(())
}
