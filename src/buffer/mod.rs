//! Symbolic buffer descriptors
//!
//! A [`BufferDecl`] is the compile-time description of a tensor argument:
//! shape and stride expressions, element type, byte offset, and device
//! placement. Descriptors are immutable values owned by the signature that
//! created them; the binder reads but never mutates one.

mod handle;

pub use handle::{HandleField, TensorHandle};

use crate::dtype::DType;
use crate::expr::Expr;
use smallvec::SmallVec;

/// Stack allocation threshold for dimensions
/// Most tensors have 4 or fewer dimensions, so we stack-allocate up to 4
const STACK_DIMS: usize = 4;

/// Per-dimension expression list (shape or strides)
pub type DimExprs = SmallVec<[Expr; STACK_DIMS]>;

/// Symbolic description of a tensor argument
///
/// Shapes and strides are expressions, so a dimension may be a constant, a
/// signature variable, or derived arithmetic (`n + 2`). Empty `strides`
/// means compact row-major layout.
#[derive(Clone, Debug)]
pub struct BufferDecl {
    /// Element type
    pub dtype: DType,
    /// Extent expression per dimension
    pub shape: DimExprs,
    /// Stride expression per dimension; empty means compact row-major
    pub strides: DimExprs,
    /// Byte offset of the first element
    pub byte_offset: Expr,
    /// Device type code of the placement
    pub device_type: Expr,
    /// Device ordinal of the placement
    pub device_id: Expr,
}

impl BufferDecl {
    /// Create a compact row-major descriptor with zero byte offset
    pub fn new(dtype: DType, shape: impl IntoIterator<Item = Expr>) -> Self {
        Self {
            dtype,
            shape: shape.into_iter().collect(),
            strides: SmallVec::new(),
            byte_offset: Expr::int(0),
            device_type: Expr::int(crate::runtime::DeviceType::Cpu.code()),
            device_id: Expr::int(0),
        }
    }

    /// Attach explicit stride expressions
    pub fn with_strides(mut self, strides: impl IntoIterator<Item = Expr>) -> Self {
        self.strides = strides.into_iter().collect();
        self
    }

    /// Attach a byte-offset expression
    pub fn with_byte_offset(mut self, byte_offset: Expr) -> Self {
        self.byte_offset = byte_offset;
        self
    }

    /// Attach a device placement expression pair
    pub fn with_device(mut self, device_type: Expr, device_id: Expr) -> Self {
        self.device_type = device_type;
        self.device_id = device_id;
        self
    }

    /// Number of dimensions (rank)
    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }
}

/// Compute compact row-major strides for a symbolic shape
///
/// The trailing stride is 1; each earlier stride is the product of all
/// later extents. Constant extents fold, so `[2, 3, n]` yields
/// `[(3*n), n, 1]`.
pub fn compact_strides(shape: &[Expr]) -> DimExprs {
    let mut strides: DimExprs = SmallVec::with_capacity(shape.len());
    let mut stride = Expr::int(1);

    // Compute strides from last dimension to first
    for dim in shape.iter().rev() {
        strides.push(stride.clone());
        stride = &stride * dim;
    }

    strides.reverse();
    strides
}
