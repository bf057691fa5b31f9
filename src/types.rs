//! Fundamental types shared by both IR tiers: element types, memory
//! placement, and parallel-dimension bindings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Element type carried by a scalar `Val` or the payload of a `TensorView`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum DataType {
    Bool,
    Int32,
    Int64,
    Float32,
    Float64,
    Half,
}

impl DataType {
    /// Size in bytes, used for shared-memory budgeting and argument packing.
    pub fn size_bytes(&self) -> usize {
        match self {
            DataType::Bool => 1,
            DataType::Int32 => 4,
            DataType::Int64 => 8,
            DataType::Float32 => 4,
            DataType::Float64 => 8,
            DataType::Half => 2,
        }
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64 | DataType::Half)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataType::Bool => "bool",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
            DataType::Half => "half",
        };
        write!(f, "{}", s)
    }
}

/// Where a `TensorView`'s backing buffer lives.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum MemoryType {
    Global,
    Shared,
    Local,
}

/// Hardware-dimension binding for an iteration domain axis.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum ParallelType {
    BIDx,
    BIDy,
    BIDz,
    TIDx,
    TIDy,
    TIDz,
    Unroll,
    Vectorize,
    Serial,
}

impl ParallelType {
    pub fn is_block_dim(&self) -> bool {
        matches!(self, ParallelType::BIDx | ParallelType::BIDy | ParallelType::BIDz)
    }

    pub fn is_thread_dim(&self) -> bool {
        matches!(self, ParallelType::TIDx | ParallelType::TIDy | ParallelType::TIDz)
    }

    /// Any hardware-parallel binding (grid or block), i.e. not Serial/Unroll/Vectorize.
    pub fn is_thread(&self) -> bool {
        self.is_block_dim() || self.is_thread_dim()
    }

    /// Bit position used by `ParallelTypeSet`; only meaningful for the six
    /// hardware-parallel variants.
    fn bit(&self) -> Option<u8> {
        match self {
            ParallelType::BIDx => Some(0),
            ParallelType::BIDy => Some(1),
            ParallelType::BIDz => Some(2),
            ParallelType::TIDx => Some(3),
            ParallelType::TIDy => Some(4),
            ParallelType::TIDz => Some(5),
            _ => None,
        }
    }
}

/// Bitset over the six hardware parallel-dimension bindings, mirroring the
/// original fuser's `ParallelTypeBitmap` (`lower_utils.h`).
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub struct ParallelTypeSet(u8);

impl ParallelTypeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pt: ParallelType) {
        if let Some(b) = pt.bit() {
            self.0 |= 1 << b;
        }
    }

    pub fn contains(&self, pt: ParallelType) -> bool {
        pt.bit().map(|b| self.0 & (1 << b) != 0).unwrap_or(false)
    }

    pub fn none(&self) -> bool {
        self.0 == 0
    }

    pub fn any(&self) -> bool {
        self.0 != 0
    }
}

/// Unary scalar/tensor operation tag.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum UnaryOpType {
    Set,
    Neg,
    Abs,
    Relu,
    Exp,
    Log,
    Sqrt,
    Cast,
    RandLike,
}

/// Binary scalar/tensor operation tag.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum BinaryOpType {
    Add,
    Sub,
    Mul,
    Div,
    Max,
    Min,
    Mod,
    Eq,
    Lt,
    Gt,
}

impl fmt::Display for BinaryOpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOpType::Add => "+",
            BinaryOpType::Sub => "-",
            BinaryOpType::Mul => "*",
            BinaryOpType::Div => "/",
            BinaryOpType::Max => "max",
            BinaryOpType::Min => "min",
            BinaryOpType::Mod => "%",
            BinaryOpType::Eq => "==",
            BinaryOpType::Lt => "<",
            BinaryOpType::Gt => ">",
        };
        write!(f, "{}", s)
    }
}

/// Ternary scalar/tensor operation tag.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum TernaryOpType {
    Where,
    Clamp,
}

/// A compile-time-known scalar constant, used for constant folding and for
/// `isConstScalar`-style input validation.
#[derive(Copy, Clone, PartialEq, Debug, Serialize, Deserialize)]
pub enum ScalarConst {
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl ScalarConst {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ScalarConst::Int(v) => Some(*v),
            ScalarConst::Bool(b) => Some(*b as i64),
            ScalarConst::Float(_) => None,
        }
    }

    pub fn is_one(&self) -> bool {
        self.as_i64() == Some(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parallel_type_set_tracks_block_and_thread_dims() {
        let mut s = ParallelTypeSet::new();
        assert!(s.none());
        s.insert(ParallelType::BIDx);
        s.insert(ParallelType::TIDx);
        assert!(s.contains(ParallelType::BIDx));
        assert!(s.contains(ParallelType::TIDx));
        assert!(!s.contains(ParallelType::BIDy));
        assert!(s.any());
    }

    #[test]
    fn data_type_sizes() {
        assert_eq!(DataType::Float32.size_bytes(), 4);
        assert_eq!(DataType::Int64.size_bytes(), 8);
        assert_eq!(DataType::Bool.size_bytes(), 1);
    }
}
