//! CPU device API implementation
//!
//! Memory lives on the host heap, so every context pair a copy names
//! resolves to plain memory moves, and stream synchronization is a no-op:
//! host operations complete before the call returns.

use super::{AttrKind, DeviceApi, DeviceContext, StreamHandle};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::collections::HashMap;

/// Host-memory backend for the device API
///
/// `free_data_space` carries no size, so the backend keeps a table of live
/// allocations to recover each handle's layout at free time.
pub struct CpuDeviceApi {
    allocations: Mutex<HashMap<u64, Layout>>,
}

impl CpuDeviceApi {
    /// Create a new CPU device API
    pub fn new() -> Self {
        Self {
            allocations: Mutex::new(HashMap::new()),
        }
    }

    /// Number of live allocations
    pub fn live_allocations(&self) -> usize {
        self.allocations.lock().len()
    }
}

impl Default for CpuDeviceApi {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceApi for CpuDeviceApi {
    fn set_device(&self, _device_id: usize) {
        // There is only one host device.
    }

    fn get_attr(&self, device_id: usize, kind: AttrKind) -> i64 {
        match kind {
            AttrKind::Exist => i64::from(device_id == 0),
            // The host has no thread blocks and scalar "warps".
            AttrKind::MaxThreadsPerBlock => 0,
            AttrKind::WarpSize => 1,
        }
    }

    fn alloc_data_space(&self, ctx: DeviceContext, size: usize, alignment: usize) -> Result<u64> {
        let layout = Layout::from_size_align(size.max(1), alignment.max(1))
            .map_err(|_| Error::Allocation { size, ctx })?;

        let ptr = unsafe { alloc_zeroed(layout) };
        if ptr.is_null() {
            return Err(Error::Allocation { size, ctx });
        }

        self.allocations.lock().insert(ptr as u64, layout);
        Ok(ptr as u64)
    }

    fn free_data_space(&self, _ctx: DeviceContext, ptr: u64) {
        if let Some(layout) = self.allocations.lock().remove(&ptr) {
            unsafe {
                dealloc(ptr as *mut u8, layout);
            }
        }
    }

    fn copy_data_from_to(
        &self,
        from: u64,
        from_offset: usize,
        to: u64,
        to_offset: usize,
        size: usize,
        _ctx_from: DeviceContext,
        _ctx_to: DeviceContext,
        _stream: Option<StreamHandle>,
    ) -> Result<()> {
        if size == 0 {
            return Ok(());
        }
        if from == 0 || to == 0 {
            return Err(Error::Backend("copy through a null handle".to_string()));
        }

        let src = (from as usize + from_offset) as *const u8;
        let dst = (to as usize + to_offset) as *mut u8;
        unsafe {
            // Use copy (not copy_nonoverlapping) in case the ranges overlap
            std::ptr::copy(src, dst, size);
        }
        Ok(())
    }

    fn stream_sync(&self, _ctx: DeviceContext, _stream: Option<StreamHandle>) -> Result<()> {
        Ok(())
    }
}
