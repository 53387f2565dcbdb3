// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The guest kernel side of the virtio transport.

use std::mem::size_of;
use std::sync::Arc;

use amdgpu_sys::*;
use nix::errno::Errno;

use crate::amdgpu_os::ioctl_with_mut_ref;
use crate::amdgpu_os::FromRawDescriptor;
use crate::amdgpu_os::MemoryMapping;
use crate::amdgpu_os::OwnedDescriptor;
use crate::transport::DrmFile;
use crate::transport::DrmSyncobj;
use crate::AmdgpuError;
use crate::AmdgpuResult;

/// Arguments of `DRM_IOCTL_VIRTGPU_RESOURCE_CREATE_BLOB`.
#[derive(Copy, Clone, Debug, Default)]
pub struct BlobCreate<'a> {
    pub blob_mem: u32,
    pub blob_flags: u32,
    pub size: u64,
    pub blob_id: u64,
    /// A wire request the host executes while creating the blob.
    pub cmd: &'a [u8],
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceInfo {
    pub res_id: u32,
    pub size: u64,
}

/// Arguments of `DRM_IOCTL_VIRTGPU_EXECBUFFER`.
#[derive(Copy, Clone, Debug, Default)]
pub struct ExecBuffer<'a> {
    pub command: &'a [u8],
    pub ring_idx: Option<u32>,
    pub in_syncobjs: &'a [drm_virtgpu_execbuffer_syncobj],
    pub out_syncobjs: &'a [drm_virtgpu_execbuffer_syncobj],
    /// Ask for a fence descriptor that signals once the host has consumed `command`.
    pub fence_out: bool,
}

/// The virtio-gpu ioctls the native-context transport is built on.
///
/// `VirtGpuDrm` issues them against a real node. Anything else implementing this trait stands in
/// for the guest kernel and the host together.
pub trait VirtGpuDevice: Send + Sync {
    fn get_param(&self, param: u64) -> AmdgpuResult<u64>;

    fn get_caps(&self, capset_id: u32, out: &mut [u8]) -> AmdgpuResult<()>;

    /// Sets `(param, value)` pairs on the file's context. Only valid once per file.
    fn context_init(&self, params: &[(u64, u64)]) -> AmdgpuResult<()>;

    /// Returns the new GEM handle and host resource id.
    fn resource_create_blob(&self, create: &BlobCreate<'_>) -> AmdgpuResult<(u32, u32)>;

    fn resource_info(&self, handle: u32) -> AmdgpuResult<ResourceInfo>;

    fn mmap(&self, handle: u32, size: usize) -> AmdgpuResult<MemoryMapping>;

    fn execbuffer(&self, exec: &ExecBuffer<'_>) -> AmdgpuResult<Option<OwnedDescriptor>>;

    /// Returns true if the resource is still busy.
    fn wait(&self, handle: u32, nowait: bool) -> AmdgpuResult<bool>;

    fn gem_close(&self, handle: u32) -> AmdgpuResult<()>;

    fn prime_handle_to_fd(&self, handle: u32) -> AmdgpuResult<OwnedDescriptor>;

    fn prime_fd_to_handle(&self, fd: &OwnedDescriptor) -> AmdgpuResult<u32>;

    fn syncobjs(&self) -> &dyn DrmSyncobj;
}

/// `VirtGpuDevice` on an open virtio-gpu DRM node.
pub struct VirtGpuDrm {
    drm: DrmFile,
}

impl VirtGpuDrm {
    pub fn new(descriptor: Arc<OwnedDescriptor>) -> VirtGpuDrm {
        VirtGpuDrm {
            drm: DrmFile::new(descriptor),
        }
    }
}

impl VirtGpuDevice for VirtGpuDrm {
    fn get_param(&self, param: u64) -> AmdgpuResult<u64> {
        let mut value = 0u64;
        let mut get_param = drm_virtgpu_getparam {
            param,
            value: &mut value as *mut u64 as u64,
        };
        // SAFETY: The kernel writes one u64 through `value`, which outlives the call.
        unsafe {
            ioctl_with_mut_ref(
                self.drm.descriptor(),
                DRM_IOCTL_VIRTGPU_GETPARAM,
                &mut get_param,
            )?
        };
        Ok(value)
    }

    fn get_caps(&self, capset_id: u32, out: &mut [u8]) -> AmdgpuResult<()> {
        let mut get_caps = drm_virtgpu_get_caps {
            cap_set_id: capset_id,
            cap_set_ver: 0,
            addr: out.as_mut_ptr() as u64,
            size: out.len().try_into()?,
            pad: 0,
        };
        // SAFETY: The kernel writes at most `size` bytes into `out`.
        unsafe {
            ioctl_with_mut_ref(
                self.drm.descriptor(),
                DRM_IOCTL_VIRTGPU_GET_CAPS,
                &mut get_caps,
            )
        }
    }

    fn context_init(&self, params: &[(u64, u64)]) -> AmdgpuResult<()> {
        let params: Vec<drm_virtgpu_context_set_param> = params
            .iter()
            .map(|&(param, value)| drm_virtgpu_context_set_param { param, value })
            .collect();
        let mut init = drm_virtgpu_context_init {
            num_params: params.len().try_into()?,
            pad: 0,
            ctx_set_params: params.as_ptr() as u64,
        };
        // SAFETY: `params` outlives the call and holds `num_params` entries.
        unsafe {
            ioctl_with_mut_ref(
                self.drm.descriptor(),
                DRM_IOCTL_VIRTGPU_CONTEXT_INIT,
                &mut init,
            )
        }
    }

    fn resource_create_blob(&self, create: &BlobCreate<'_>) -> AmdgpuResult<(u32, u32)> {
        let mut blob = drm_virtgpu_resource_create_blob {
            blob_mem: create.blob_mem,
            blob_flags: create.blob_flags,
            size: create.size,
            cmd_size: create.cmd.len().try_into()?,
            cmd: create.cmd.as_ptr() as u64,
            blob_id: create.blob_id,
            ..Default::default()
        };
        // SAFETY: `cmd` outlives the call and is `cmd_size` bytes long.
        unsafe {
            ioctl_with_mut_ref(
                self.drm.descriptor(),
                DRM_IOCTL_VIRTGPU_RESOURCE_CREATE_BLOB,
                &mut blob,
            )?
        };
        Ok((blob.bo_handle, blob.res_handle))
    }

    fn resource_info(&self, handle: u32) -> AmdgpuResult<ResourceInfo> {
        let mut info = drm_virtgpu_resource_info {
            bo_handle: handle,
            ..Default::default()
        };
        // SAFETY: RESOURCE_INFO reads and writes a `drm_virtgpu_resource_info`.
        unsafe {
            ioctl_with_mut_ref(
                self.drm.descriptor(),
                DRM_IOCTL_VIRTGPU_RESOURCE_INFO,
                &mut info,
            )?
        };
        Ok(ResourceInfo {
            res_id: info.res_handle,
            size: info.size.into(),
        })
    }

    fn mmap(&self, handle: u32, size: usize) -> AmdgpuResult<MemoryMapping> {
        let mut map = drm_virtgpu_map {
            handle,
            ..Default::default()
        };
        // SAFETY: MAP reads and writes a `drm_virtgpu_map`.
        unsafe { ioctl_with_mut_ref(self.drm.descriptor(), DRM_IOCTL_VIRTGPU_MAP, &mut map)? };
        MemoryMapping::from_offset(self.drm.descriptor(), map.offset, size)
    }

    fn execbuffer(&self, exec: &ExecBuffer<'_>) -> AmdgpuResult<Option<OwnedDescriptor>> {
        let mut flags = 0;
        if exec.fence_out {
            flags |= VIRTGPU_EXECBUF_FENCE_FD_OUT;
        }
        if exec.ring_idx.is_some() {
            flags |= VIRTGPU_EXECBUF_RING_IDX;
        }

        let mut execbuffer = drm_virtgpu_execbuffer {
            flags,
            size: exec.command.len().try_into()?,
            command: exec.command.as_ptr() as u64,
            fence_fd: -1,
            ring_idx: exec.ring_idx.unwrap_or(0),
            syncobj_stride: size_of::<drm_virtgpu_execbuffer_syncobj>() as u32,
            num_in_syncobjs: exec.in_syncobjs.len().try_into()?,
            num_out_syncobjs: exec.out_syncobjs.len().try_into()?,
            in_syncobjs: exec.in_syncobjs.as_ptr() as u64,
            out_syncobjs: exec.out_syncobjs.as_ptr() as u64,
            ..Default::default()
        };
        // SAFETY: The command and both syncobj arrays outlive the call and match the counts.
        unsafe {
            ioctl_with_mut_ref(
                self.drm.descriptor(),
                DRM_IOCTL_VIRTGPU_EXECBUFFER,
                &mut execbuffer,
            )?
        };

        if exec.fence_out && execbuffer.fence_fd >= 0 {
            // SAFETY: The kernel handed us a new descriptor that nothing else owns.
            Ok(Some(unsafe {
                OwnedDescriptor::from_raw_descriptor(execbuffer.fence_fd)
            }))
        } else {
            Ok(None)
        }
    }

    fn wait(&self, handle: u32, nowait: bool) -> AmdgpuResult<bool> {
        let mut wait = drm_virtgpu_3d_wait {
            handle,
            flags: if nowait { VIRTGPU_WAIT_NOWAIT } else { 0 },
        };
        // SAFETY: WAIT reads a `drm_virtgpu_3d_wait`.
        let ret =
            unsafe { ioctl_with_mut_ref(self.drm.descriptor(), DRM_IOCTL_VIRTGPU_WAIT, &mut wait) };
        match ret {
            Ok(()) => Ok(false),
            Err(AmdgpuError::NixError(Errno::EBUSY)) => Ok(true),
            Err(e) => Err(e),
        }
    }

    fn gem_close(&self, handle: u32) -> AmdgpuResult<()> {
        self.drm.gem_close(handle)
    }

    fn prime_handle_to_fd(&self, handle: u32) -> AmdgpuResult<OwnedDescriptor> {
        self.drm.prime_handle_to_fd(handle)
    }

    fn prime_fd_to_handle(&self, fd: &OwnedDescriptor) -> AmdgpuResult<u32> {
        self.drm.prime_fd_to_handle(fd)
    }

    fn syncobjs(&self) -> &dyn DrmSyncobj {
        &self.drm
    }
}
