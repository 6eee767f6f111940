//! Concrete runtime tensor handles and their by-position field model
//!
//! A `TensorHandle` is what a caller actually passes at call time: a rank,
//! a shape array, an optional stride array, a byte offset, a dtype code,
//! and a device placement. The binder never touches one directly; it emits
//! symbolic field reads (`HandleField`) that generated code resolves
//! against a handle. All reads funnel through [`TensorHandle::read`], which
//! refuses to dereference any per-dimension field at or past `ndim`.

use crate::dtype::DType;
use std::fmt;

/// By-position fields of a runtime tensor handle
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HandleField {
    /// Number of dimensions
    Ndim,
    /// Extent of dimension `i`
    Shape(usize),
    /// Stride of dimension `i`, in elements
    ///
    /// A handle that omits its stride array reports the compact row-major
    /// stride derived from its shape through this field.
    Stride(usize),
    /// Byte offset of the first element within the data allocation
    ByteOffset,
    /// Element type code (see [`crate::dtype::DType::code`])
    DTypeCode,
    /// Device type code of the placement
    DeviceType,
    /// Device ordinal of the placement
    DeviceId,
}

impl fmt::Display for HandleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ndim => write!(f, "ndim"),
            Self::Shape(i) => write!(f, "shape[{i}]"),
            Self::Stride(i) => write!(f, "strides[{i}]"),
            Self::ByteOffset => write!(f, "byte_offset"),
            Self::DTypeCode => write!(f, "dtype_code"),
            Self::DeviceType => write!(f, "device_type"),
            Self::DeviceId => write!(f, "device_id"),
        }
    }
}

/// The concrete, call-time representation of a tensor argument
///
/// # Example
/// ```
/// use bindr::buffer::{HandleField, TensorHandle};
/// use bindr::dtype::DType;
///
/// let handle = TensorHandle::contiguous(&[2, 3], DType::F32, 1, 0);
/// assert_eq!(handle.read(HandleField::Ndim), Some(2));
/// assert_eq!(handle.read(HandleField::Stride(0)), Some(3));
/// assert_eq!(handle.read(HandleField::Shape(5)), None);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TensorHandle {
    /// Extent of each dimension
    pub shape: Vec<i64>,
    /// Element strides; `None` means compact row-major layout
    pub strides: Option<Vec<i64>>,
    /// Byte offset of the first element
    pub byte_offset: i64,
    /// Element type code
    pub dtype_code: u8,
    /// Device type code of the placement
    pub device_type: i64,
    /// Device ordinal of the placement
    pub device_id: i64,
}

impl TensorHandle {
    /// Create a compact row-major handle on the given device placement
    pub fn contiguous(shape: &[i64], dtype: DType, device_type: i64, device_id: i64) -> Self {
        Self {
            shape: shape.to_vec(),
            strides: None,
            byte_offset: 0,
            dtype_code: dtype.code(),
            device_type,
            device_id,
        }
    }

    /// Number of dimensions
    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Read one field by position
    ///
    /// Per-dimension fields (`Shape(i)`, `Stride(i)`) return `None` when
    /// `i >= ndim`; nothing past the reported rank is ever dereferenced.
    pub fn read(&self, field: HandleField) -> Option<i64> {
        match field {
            HandleField::Ndim => Some(self.ndim() as i64),
            HandleField::Shape(i) => self.shape.get(i).copied(),
            HandleField::Stride(i) => {
                if i >= self.ndim() {
                    return None;
                }
                match &self.strides {
                    Some(strides) => strides.get(i).copied(),
                    // Strideless handles are compact: stride i is the
                    // product of all later extents.
                    None => Some(self.shape[i + 1..].iter().product()),
                }
            }
            HandleField::ByteOffset => Some(self.byte_offset),
            HandleField::DTypeCode => Some(i64::from(self.dtype_code)),
            HandleField::DeviceType => Some(self.device_type),
            HandleField::DeviceId => Some(self.device_id),
        }
    }
}
