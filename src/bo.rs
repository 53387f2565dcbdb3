// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Buffer objects.
//!
//! Every live buffer object of a session is registered under its GEM handle, so importing a
//! buffer the session already knows returns the existing object. The object and its kernel
//! handle are released with the last `Bo` clone.

use std::ptr;
use std::sync::Arc;
use std::sync::Mutex;

use amdgpu_sys::AMDGPU_VA_OP_CLEAR;
use log::debug;
use log::error;

use crate::amdgpu_os::absolute_timeout;
use crate::amdgpu_os::MemoryMapping;
use crate::device::DeviceShared;
use crate::AmdgpuError;
use crate::AmdgpuResult;
use crate::BoAllocRequest;
use crate::BoExport;
use crate::BoHandleType;
use crate::BoImport;
use crate::BoInfo;
use crate::BoMetadata;
use crate::Device;
use crate::HostBlob;
use crate::VaOp;
use crate::AMDGPU_METADATA_MAX_BYTES;

#[derive(Default)]
struct CpuMap {
    mapping: Option<Arc<MemoryMapping>>,
    count: usize,
}

pub(crate) struct BoInner {
    device: Arc<DeviceShared>,
    blob: HostBlob,
    /// How the object was allocated. `None` for imports.
    alloc: Option<BoAllocRequest>,
    cpu_map: Mutex<CpuMap>,
}

impl Drop for BoInner {
    fn drop(&mut self) {
        self.cpu_map.get_mut().unwrap().mapping = None;

        // Queued requests may still name the resource. Flushed outside the table lock.
        if let Err(e) = self.device.transport.flush() {
            error!(
                "failed to flush requests for buffer object {}: {}",
                self.blob.handle, e
            );
        }

        // The entry may already belong to a newer import of the same handle, which then owns
        // the handle.
        let mut bos = self.device.bos.lock().unwrap();
        let ours = bos
            .get(&self.blob.handle)
            .is_some_and(|weak| ptr::eq(weak.as_ptr(), self));
        if !ours {
            debug!(
                "buffer object handle {} was taken over by a newer import",
                self.blob.handle
            );
            return;
        }

        bos.remove(&self.blob.handle);
        debug!(
            "releasing buffer object {} (resource {})",
            self.blob.handle, self.blob.res_id
        );
        if let Err(e) = self.device.transport.bo_close(&self.blob) {
            error!(
                "failed to release buffer object {}: {}",
                self.blob.handle, e
            );
        }
    }
}

/// A reference-counted buffer object. Clones share the object.
#[derive(Clone)]
pub struct Bo {
    inner: Arc<BoInner>,
}

/// A CPU mapping of a buffer object. The mapping is shared by every `BoMapping` of the object and
/// unmapped when the last one drops.
pub struct BoMapping<'a> {
    bo: &'a Bo,
    mapping: Arc<MemoryMapping>,
}

impl BoMapping<'_> {
    pub fn as_ptr(&self) -> *mut u8 {
        self.mapping.as_ptr()
    }

    pub fn size(&self) -> usize {
        self.mapping.size()
    }

    pub fn write_slice(&self, data: &[u8], offset: usize) -> AmdgpuResult<()> {
        self.mapping.write_slice(data, offset)
    }

    pub fn read_slice(&self, data: &mut [u8], offset: usize) -> AmdgpuResult<()> {
        self.mapping.read_slice(data, offset)
    }
}

impl Drop for BoMapping<'_> {
    fn drop(&mut self) {
        let mut map = self.bo.inner.cpu_map.lock().unwrap();
        map.count -= 1;
        if map.count == 0 {
            map.mapping = None;
        }
    }
}

impl Device {
    /// Allocates a new buffer object.
    pub fn alloc(&self, req: &BoAllocRequest) -> AmdgpuResult<Bo> {
        if req.alloc_size == 0 {
            return Err(AmdgpuError::InvalidArgument("zero-sized allocation"));
        }

        let blob_id = self.shared.next_blob_id();
        let blob = self.shared.transport.bo_create(blob_id, req)?;
        let inner = Arc::new(BoInner {
            device: self.shared.clone(),
            blob,
            alloc: Some(*req),
            cpu_map: Default::default(),
        });
        self.shared
            .bos
            .lock()
            .unwrap()
            .insert(blob.handle, Arc::downgrade(&inner));
        Ok(Bo { inner })
    }

    /// Imports an external buffer. A buffer the session already tracks comes back as the same
    /// object.
    pub fn import(&self, import: BoImport<'_>) -> AmdgpuResult<Bo> {
        // Held from handle resolution to registration, so the last drop of a tracked object
        // cannot close the handle in between.
        let mut bos = self.shared.bos.lock().unwrap();
        let handle = self.shared.transport.bo_import(&import)?;
        if let Some(inner) = bos.get(&handle).and_then(|weak| weak.upgrade()) {
            return Ok(Bo { inner });
        }

        let blob = match self.shared.transport.bo_info(handle) {
            Ok(blob) => blob,
            Err(e) => {
                if !matches!(import, BoImport::Kms(_)) {
                    if let Err(close_err) = self.shared.transport.bo_close(&HostBlob {
                        handle,
                        res_id: 0,
                        size: 0,
                    }) {
                        error!("failed to close imported handle {}: {}", handle, close_err);
                    }
                }
                return Err(e);
            }
        };

        let inner = Arc::new(BoInner {
            device: self.shared.clone(),
            blob,
            alloc: None,
            cpu_map: Default::default(),
        });
        bos.insert(handle, Arc::downgrade(&inner));
        Ok(Bo { inner })
    }
}

impl Bo {
    /// GEM handle on the session's file.
    pub fn handle(&self) -> u32 {
        self.inner.blob.handle
    }

    /// Host resource id. Equal to `handle` on the native transport.
    pub fn res_id(&self) -> u32 {
        self.inner.blob.res_id
    }

    pub fn size(&self) -> u64 {
        self.inner.blob.size
    }

    pub fn alloc_request(&self) -> Option<&BoAllocRequest> {
        self.inner.alloc.as_ref()
    }

    /// Number of `Bo` handles to this object.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub fn export(&self, kind: BoHandleType) -> AmdgpuResult<BoExport> {
        self.inner.device.transport.bo_export(&self.inner.blob, kind)
    }

    /// Maps the object for CPU access, or shares the mapping already established.
    pub fn cpu_map(&self) -> AmdgpuResult<BoMapping<'_>> {
        let mut map = self.inner.cpu_map.lock().unwrap();
        let mapping = match &map.mapping {
            Some(mapping) => mapping.clone(),
            None => {
                let mapping = Arc::new(self.inner.device.transport.bo_mmap(&self.inner.blob)?);
                map.mapping = Some(mapping.clone());
                mapping
            }
        };
        map.count += 1;
        Ok(BoMapping { bo: self, mapping })
    }

    /// Waits up to `timeout_ns` for the GPU to stop using the object. Returns true if it is
    /// still busy.
    pub fn wait_idle(&self, timeout_ns: u64) -> AmdgpuResult<bool> {
        self.inner
            .device
            .transport
            .bo_wait_idle(&self.inner.blob, absolute_timeout(timeout_ns))
    }

    pub fn set_metadata(&self, metadata: &BoMetadata) -> AmdgpuResult<()> {
        let size = metadata.size_metadata as usize;
        if size == 0 || size > AMDGPU_METADATA_MAX_BYTES {
            return Err(AmdgpuError::InvalidMetadataSize(size));
        }

        self.inner
            .device
            .transport
            .bo_set_metadata(&self.inner.blob, metadata)
    }

    pub fn query_info(&self) -> AmdgpuResult<BoInfo> {
        self.inner.device.transport.bo_query_info(&self.inner.blob)
    }

    /// Maps, unmaps or replaces a GPU virtual address range backed by this object.
    pub fn va_op(&self, op: &VaOp) -> AmdgpuResult<()> {
        if op.op == AMDGPU_VA_OP_CLEAR {
            return Err(AmdgpuError::InvalidArgument(
                "clearing a range is a device operation",
            ));
        }

        self.inner
            .device
            .transport
            .bo_va_op(Some(&self.inner.blob), op)
    }
}
