//! Error types for bindr

use crate::dtype::DType;
use crate::runtime::DeviceContext;
use thiserror::Error;

/// Result type alias using bindr's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while matching a signature or driving a device
#[derive(Error, Debug)]
pub enum Error {
    /// A constraint references a variable no earlier argument has defined
    #[error("Undefined variable '{var}' in constraint for argument '{arg}'")]
    UndefinedVar {
        /// Name of the undefined variable
        var: String,
        /// The argument whose constraint referenced it
        arg: String,
    },

    /// Element count mismatch in an array bind
    #[error("Argument '{arg}' expects {expected} elements, got {got}")]
    ArityMismatch {
        /// The argument name
        arg: String,
        /// Expected element count
        expected: usize,
        /// Actual element count
        got: usize,
    },

    /// Buffer rank mismatch
    #[error("Argument '{arg}' expects rank {expected}, got rank {got}")]
    RankMismatch {
        /// The argument name
        arg: String,
        /// Expected number of dimensions
        expected: usize,
        /// Actual number of dimensions
        got: usize,
    },

    /// A buffer declares strides whose count disagrees with its rank
    #[error("Argument '{arg}' declares {strides} strides for rank {rank}")]
    StrideCountMismatch {
        /// The argument name
        arg: String,
        /// The buffer's rank
        rank: usize,
        /// Number of declared strides
        strides: usize,
    },

    /// DType mismatch between a buffer declaration and a bound value
    #[error("Argument '{arg}' expects dtype {expected}, got {got}")]
    DTypeMismatch {
        /// The argument name
        arg: String,
        /// Expected element type
        expected: DType,
        /// Actual element type
        got: DType,
    },

    /// A device-type code no backend is known for
    #[error("Unknown device type code {code}")]
    UnknownDeviceType {
        /// The unrecognized code
        code: i64,
    },

    /// A recognized device type with no registered backend
    #[error("No device API registered for device type '{device_type}'")]
    UnsupportedDevice {
        /// Canonical name of the device type
        device_type: &'static str,
    },

    /// Out of memory on a device
    #[error("Failed to allocate {size} bytes on {ctx}")]
    Allocation {
        /// Requested size in bytes
        size: usize,
        /// The device context the allocation targeted
        ctx: DeviceContext,
    },

    /// Backend-specific copy/sync error
    #[error("Backend error: {0}")]
    Backend(String),
}

impl Error {
    /// Create an undefined-variable error
    pub fn undefined_var(var: impl Into<String>, arg: impl Into<String>) -> Self {
        Self::UndefinedVar {
            var: var.into(),
            arg: arg.into(),
        }
    }

    /// Create a rank mismatch error
    pub fn rank_mismatch(arg: impl Into<String>, expected: usize, got: usize) -> Self {
        Self::RankMismatch {
            arg: arg.into(),
            expected,
            got,
        }
    }

    /// Create a dtype mismatch error
    pub fn dtype_mismatch(arg: impl Into<String>, expected: DType, got: DType) -> Self {
        Self::DTypeMismatch {
            arg: arg.into(),
            expected,
            got,
        }
    }
}
