//! Device abstraction for generated tensor programs
//!
//! This module defines the `DeviceApi` trait every hardware backend must
//! satisfy for allocation, copy, and synchronization, plus the dispatch
//! table that selects a backend from a device-type code.
//!
//! # Architecture
//!
//! ```text
//! DeviceApiRegistry (one boxed backend per DeviceType)
//! └── DeviceApi (allocation, copy, stream sync)
//!     ├── DeviceContext (which device an operation targets)
//!     └── AttrKind (device capability queries)
//! ```
//!
//! The binder itself never calls into this layer; generated code does, at
//! runtime, using the device-type/device-id values the binder extracted
//! from call arguments.

#[cfg(feature = "cpu")]
pub mod cpu;

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;

/// Recognized hardware backend classes
///
/// The discriminants are the stable device-type codes runtime handles
/// carry; [`DeviceType::from_code`] is the only decoding point.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
#[repr(i64)]
pub enum DeviceType {
    /// Host CPU
    Cpu = 1,
    /// CUDA-class GPU
    Gpu = 2,
    /// OpenCL-class accelerator
    OpenCl = 4,
    /// Metal-class accelerator
    Metal = 8,
    /// Verilog simulator backend
    Vpi = 9,
}

impl DeviceType {
    /// The stable device-type code
    #[inline]
    pub const fn code(self) -> i64 {
        self as i64
    }

    /// Decode a device-type code
    ///
    /// An unrecognized code is a configuration error: without it the
    /// system cannot know which backend to dispatch to.
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            1 => Ok(Self::Cpu),
            2 => Ok(Self::Gpu),
            4 => Ok(Self::OpenCl),
            8 => Ok(Self::Metal),
            9 => Ok(Self::Vpi),
            _ => Err(Error::UnknownDeviceType { code }),
        }
    }

    /// Canonical lowercase identifier, used for diagnostics and backend
    /// selection
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Gpu => "gpu",
            Self::OpenCl => "opencl",
            Self::Metal => "metal",
            Self::Vpi => "vpi",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Canonical name for a raw device-type code
pub fn device_name(code: i64) -> Result<&'static str> {
    Ok(DeviceType::from_code(code)?.name())
}

/// A specific hardware execution target: device type plus ordinal
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DeviceContext {
    /// Backend class
    pub device_type: DeviceType,
    /// Device ordinal within the backend
    pub device_id: usize,
}

impl DeviceContext {
    /// Create a context for the given device
    pub const fn new(device_type: DeviceType, device_id: usize) -> Self {
        Self {
            device_type,
            device_id,
        }
    }
}

impl fmt::Display for DeviceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.device_type, self.device_id)
    }
}

/// Device capability queries
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttrKind {
    /// Whether the device exists; answerable even for absent devices
    Exist,
    /// Maximum threads per block, for block-structured backends
    MaxThreadsPerBlock,
    /// SIMT warp width
    WarpSize,
}

/// Opaque stream identifier for asynchronous copies
pub type StreamHandle = u64;

/// The uniform contract every hardware backend satisfies
///
/// Implementations are selected per device-type code through a
/// [`DeviceApiRegistry`]; beyond that single dispatch point no runtime
/// type inspection is needed. Allocation and free on a given context must
/// be safe under concurrent use from multiple execution contexts unless a
/// backend documents otherwise. Two asynchronous copies on one stream
/// complete in FIFO order; ordering across streams requires an explicit
/// [`DeviceApi::stream_sync`].
pub trait DeviceApi: Send + Sync {
    /// Establish `device_id` as the active device for subsequent
    /// implicit-context operations on the calling execution context
    fn set_device(&self, device_id: usize);

    /// Query a device attribute
    ///
    /// [`AttrKind::Exist`] returns 0 for an absent device, never an error.
    fn get_attr(&self, device_id: usize, kind: AttrKind) -> i64;

    /// Allocate at least `size` bytes aligned to `alignment`
    ///
    /// Returns an opaque device-memory handle. An unsatisfiable request is
    /// an allocation error, never a null handle.
    fn alloc_data_space(&self, ctx: DeviceContext, size: usize, alignment: usize) -> Result<u64>;

    /// Release a handle previously returned by
    /// [`DeviceApi::alloc_data_space`] on the same context
    ///
    /// Freeing a foreign or already-freed handle is undefined behavior the
    /// caller must avoid; no backend is required to detect it.
    fn free_data_space(&self, ctx: DeviceContext, ptr: u64);

    /// Copy a byte range, possibly across device contexts
    ///
    /// With a stream the copy is asynchronous with respect to the issuing
    /// context; completion is only guaranteed after a matching
    /// [`DeviceApi::stream_sync`].
    #[allow(clippy::too_many_arguments)]
    fn copy_data_from_to(
        &self,
        from: u64,
        from_offset: usize,
        to: u64,
        to_offset: usize,
        size: usize,
        ctx_from: DeviceContext,
        ctx_to: DeviceContext,
        stream: Option<StreamHandle>,
    ) -> Result<()>;

    /// Block until everything previously enqueued on `stream` for `ctx`
    /// has completed
    fn stream_sync(&self, ctx: DeviceContext, stream: Option<StreamHandle>) -> Result<()>;
}

/// Dispatch table from device type to backend implementation
///
/// Populated at startup; owned by whoever drives the generated code. There
/// is deliberately no process-global registry.
#[derive(Default)]
pub struct DeviceApiRegistry {
    apis: HashMap<DeviceType, Box<dyn DeviceApi>>,
}

impl DeviceApiRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in backends registered
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();
        #[cfg(feature = "cpu")]
        registry.register(DeviceType::Cpu, Box::new(cpu::CpuDeviceApi::new()));
        registry
    }

    /// Register a backend for a device type, replacing any previous one
    pub fn register(&mut self, device_type: DeviceType, api: Box<dyn DeviceApi>) {
        self.apis.insert(device_type, api);
    }

    /// Look up the backend for a device type
    pub fn get(&self, device_type: DeviceType) -> Result<&dyn DeviceApi> {
        self.apis
            .get(&device_type)
            .map(|api| api.as_ref())
            .ok_or_else(|| Error::UnsupportedDevice {
                device_type: device_type.name(),
            })
    }

    /// Look up the backend for a raw device-type code
    pub fn get_by_code(&self, code: i64) -> Result<&dyn DeviceApi> {
        self.get(DeviceType::from_code(code)?)
    }
}
