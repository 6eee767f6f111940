//! # bindr
//!
//! **Argument binding and device abstraction for tensor-program compilation.**
//!
//! bindr is the bridge between a compiled function's symbolic signature
//! (named buffers with possibly-unknown shapes, strides, and device
//! placement) and the concrete values supplied at a call site. It covers
//! two tightly related layers:
//!
//! - **Argument binding**: a constrained unification engine that matches
//!   symbolic shape/stride/device expressions against call-time values,
//!   synthesizes variable definitions, and emits the runtime assertions
//!   guarding every inferred value — in an order that keeps every runtime
//!   handle read in bounds.
//! - **Device abstraction**: the uniform contract every hardware backend
//!   (CPU, GPU, OpenCL-class, Metal-class, simulator) satisfies for
//!   allocation, copy, and stream synchronization, dispatched from the
//!   device-type codes the binder extracted.
//!
//! ## Quick Start
//!
//! ```rust
//! use bindr::prelude::*;
//!
//! // Signature: one f32 buffer of shape [n], n decided by the caller.
//! let n = Var::new("n");
//! let buffer = BufferDecl::new(DType::F32, [Expr::var(&n)]);
//!
//! let mut def_map = DefMap::new();
//! let oracle = StructuralOracle;
//! let mut binder = ArgBinder::new(&mut def_map, &oracle);
//!
//! let data = Var::new("arg0");
//! binder.bind_dl_tensor(
//!     &buffer,
//!     &buffer.device_type,
//!     &buffer.device_id,
//!     &data,
//!     "arg0",
//! )?;
//!
//! let program = binder.into_program();
//! assert_eq!(program.defs[0].name(), "n");
//! # Ok::<(), bindr::error::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `cpu` (default): CPU device backend

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod binder;
pub mod buffer;
pub mod dtype;
pub mod error;
pub mod expr;
pub mod runtime;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::binder::{ArgBinder, Assertion, BindingProgram, DefMap, InitStep};
    pub use crate::buffer::{BufferDecl, HandleField, TensorHandle, compact_strides};
    pub use crate::dtype::DType;
    pub use crate::error::{Error, Result};
    pub use crate::expr::{EqualityOracle, EvalEnv, Expr, StructuralOracle, Var};
    pub use crate::runtime::{
        AttrKind, DeviceApi, DeviceApiRegistry, DeviceContext, DeviceType, device_name,
    };

    #[cfg(feature = "cpu")]
    pub use crate::runtime::cpu::CpuDeviceApi;
}
