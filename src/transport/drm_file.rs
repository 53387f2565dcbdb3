// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::os::raw::c_char;
use std::sync::Arc;

use amdgpu_sys::*;

use crate::amdgpu_os::ioctl_with_mut_ref;
use crate::amdgpu_os::ioctl_with_ref;
use crate::amdgpu_os::AsRawDescriptor;
use crate::amdgpu_os::FromRawDescriptor;
use crate::amdgpu_os::OwnedDescriptor;
use crate::AmdgpuError;
use crate::AmdgpuResult;

/// Kernel sync object operations on a DRM file. Both transports expose the guest kernel's
/// syncobjs directly; only their use in submissions differs.
pub trait DrmSyncobj: Send + Sync {
    fn create(&self, flags: u32) -> AmdgpuResult<u32>;
    fn destroy(&self, handle: u32) -> AmdgpuResult<()>;
    fn handle_to_fd(&self, handle: u32, flags: u32) -> AmdgpuResult<OwnedDescriptor>;
    /// `handle` names the target syncobj when importing a sync file, and is ignored otherwise.
    fn fd_to_handle(&self, fd: &OwnedDescriptor, flags: u32, handle: u32) -> AmdgpuResult<u32>;
    /// Returns the index of the first signaled handle.
    fn wait(&self, handles: &[u32], timeout_nsec: i64, flags: u32) -> AmdgpuResult<u32>;
    fn timeline_wait(
        &self,
        handles: &[u32],
        points: &[u64],
        timeout_nsec: i64,
        flags: u32,
    ) -> AmdgpuResult<u32>;
    fn reset(&self, handles: &[u32]) -> AmdgpuResult<()>;
    fn signal(&self, handles: &[u32]) -> AmdgpuResult<()>;
    fn timeline_signal(&self, handles: &[u32], points: &[u64]) -> AmdgpuResult<()>;
    fn query(&self, handles: &[u32], points: &mut [u64], flags: u32) -> AmdgpuResult<()>;
    fn transfer(
        &self,
        dst: u32,
        dst_point: u64,
        src: u32,
        src_point: u64,
        flags: u32,
    ) -> AmdgpuResult<()>;
}

/// The DRM core ioctls every driver shares.
pub struct DrmFile {
    descriptor: Arc<OwnedDescriptor>,
}

fn check_points(handles: &[u32], points: &[u64]) -> AmdgpuResult<()> {
    if handles.len() != points.len() {
        return Err(AmdgpuError::InvalidArgument(
            "syncobj handles and points differ in length",
        ));
    }
    Ok(())
}

impl DrmFile {
    pub fn new(descriptor: Arc<OwnedDescriptor>) -> DrmFile {
        DrmFile { descriptor }
    }

    pub fn descriptor(&self) -> &OwnedDescriptor {
        &self.descriptor
    }

    fn fd(&self) -> &dyn AsRawDescriptor {
        &*self.descriptor
    }

    /// Name of the kernel driver bound to the node.
    pub fn driver_name(&self) -> AmdgpuResult<String> {
        let mut version: drm_version = Default::default();
        // SAFETY: All string pointers are null, the kernel only reports their lengths.
        unsafe { ioctl_with_mut_ref(self.fd(), DRM_IOCTL_VERSION, &mut version)? };

        let mut name = vec![0u8; version.name_len];
        version = drm_version {
            name_len: name.len(),
            name: name.as_mut_ptr() as *mut c_char,
            ..Default::default()
        };
        // SAFETY: `name` outlives the call and is `name_len` bytes long.
        unsafe { ioctl_with_mut_ref(self.fd(), DRM_IOCTL_VERSION, &mut version)? };

        name.truncate(version.name_len.min(name.len()));
        Ok(String::from_utf8_lossy(&name).into_owned())
    }

    pub fn gem_close(&self, handle: u32) -> AmdgpuResult<()> {
        let close = drm_gem_close { handle, pad: 0 };
        // SAFETY: GEM_CLOSE only reads a `drm_gem_close`.
        unsafe { ioctl_with_ref(self.fd(), DRM_IOCTL_GEM_CLOSE, &close) }
    }

    pub fn gem_flink(&self, handle: u32) -> AmdgpuResult<u32> {
        let mut flink = drm_gem_flink { handle, name: 0 };
        // SAFETY: GEM_FLINK reads and writes a `drm_gem_flink`.
        unsafe { ioctl_with_mut_ref(self.fd(), DRM_IOCTL_GEM_FLINK, &mut flink)? };
        Ok(flink.name)
    }

    /// Opens a flink name, returning the new handle and the object size.
    pub fn gem_open(&self, name: u32) -> AmdgpuResult<(u32, u64)> {
        let mut open = drm_gem_open {
            name,
            ..Default::default()
        };
        // SAFETY: GEM_OPEN reads and writes a `drm_gem_open`.
        unsafe { ioctl_with_mut_ref(self.fd(), DRM_IOCTL_GEM_OPEN, &mut open)? };
        Ok((open.handle, open.size))
    }

    pub fn prime_handle_to_fd(&self, handle: u32) -> AmdgpuResult<OwnedDescriptor> {
        let mut prime = drm_prime_handle {
            handle,
            flags: DRM_CLOEXEC | DRM_RDWR,
            fd: -1,
        };
        // SAFETY: PRIME_HANDLE_TO_FD reads and writes a `drm_prime_handle`.
        unsafe { ioctl_with_mut_ref(self.fd(), DRM_IOCTL_PRIME_HANDLE_TO_FD, &mut prime)? };
        // SAFETY: The kernel handed us a new descriptor that nothing else owns.
        Ok(unsafe { OwnedDescriptor::from_raw_descriptor(prime.fd) })
    }

    pub fn prime_fd_to_handle(&self, fd: &OwnedDescriptor) -> AmdgpuResult<u32> {
        let mut prime = drm_prime_handle {
            handle: 0,
            flags: 0,
            fd: fd.as_raw_descriptor(),
        };
        // SAFETY: PRIME_FD_TO_HANDLE reads and writes a `drm_prime_handle`.
        unsafe { ioctl_with_mut_ref(self.fd(), DRM_IOCTL_PRIME_FD_TO_HANDLE, &mut prime)? };
        Ok(prime.handle)
    }

    fn syncobj_array(&self, nr: IoctlNr, handles: &[u32]) -> AmdgpuResult<()> {
        let array = drm_syncobj_array {
            handles: handles.as_ptr() as u64,
            count_handles: handles.len().try_into()?,
            pad: 0,
        };
        // SAFETY: `handles` outlives the call and `count_handles` matches it.
        unsafe { ioctl_with_ref(self.fd(), nr, &array) }
    }
}

impl DrmSyncobj for DrmFile {
    fn create(&self, flags: u32) -> AmdgpuResult<u32> {
        let mut create = drm_syncobj_create { handle: 0, flags };
        // SAFETY: SYNCOBJ_CREATE reads and writes a `drm_syncobj_create`.
        unsafe { ioctl_with_mut_ref(self.fd(), DRM_IOCTL_SYNCOBJ_CREATE, &mut create)? };
        Ok(create.handle)
    }

    fn destroy(&self, handle: u32) -> AmdgpuResult<()> {
        let mut destroy = drm_syncobj_destroy { handle, pad: 0 };
        // SAFETY: SYNCOBJ_DESTROY reads a `drm_syncobj_destroy`.
        unsafe { ioctl_with_mut_ref(self.fd(), DRM_IOCTL_SYNCOBJ_DESTROY, &mut destroy) }
    }

    fn handle_to_fd(&self, handle: u32, flags: u32) -> AmdgpuResult<OwnedDescriptor> {
        let mut args = drm_syncobj_handle {
            handle,
            flags,
            fd: -1,
            pad: 0,
        };
        // SAFETY: SYNCOBJ_HANDLE_TO_FD reads and writes a `drm_syncobj_handle`.
        unsafe { ioctl_with_mut_ref(self.fd(), DRM_IOCTL_SYNCOBJ_HANDLE_TO_FD, &mut args)? };
        // SAFETY: The kernel handed us a new descriptor that nothing else owns.
        Ok(unsafe { OwnedDescriptor::from_raw_descriptor(args.fd) })
    }

    fn fd_to_handle(&self, fd: &OwnedDescriptor, flags: u32, handle: u32) -> AmdgpuResult<u32> {
        let mut args = drm_syncobj_handle {
            handle,
            flags,
            fd: fd.as_raw_descriptor(),
            pad: 0,
        };
        // SAFETY: SYNCOBJ_FD_TO_HANDLE reads and writes a `drm_syncobj_handle`.
        unsafe { ioctl_with_mut_ref(self.fd(), DRM_IOCTL_SYNCOBJ_FD_TO_HANDLE, &mut args)? };
        Ok(args.handle)
    }

    fn wait(&self, handles: &[u32], timeout_nsec: i64, flags: u32) -> AmdgpuResult<u32> {
        let mut wait = drm_syncobj_wait {
            handles: handles.as_ptr() as u64,
            timeout_nsec,
            count_handles: handles.len().try_into()?,
            flags,
            ..Default::default()
        };
        // SAFETY: `handles` outlives the call and `count_handles` matches it.
        unsafe { ioctl_with_mut_ref(self.fd(), DRM_IOCTL_SYNCOBJ_WAIT, &mut wait)? };
        Ok(wait.first_signaled)
    }

    fn timeline_wait(
        &self,
        handles: &[u32],
        points: &[u64],
        timeout_nsec: i64,
        flags: u32,
    ) -> AmdgpuResult<u32> {
        check_points(handles, points)?;
        let mut wait = drm_syncobj_timeline_wait {
            handles: handles.as_ptr() as u64,
            points: points.as_ptr() as u64,
            timeout_nsec,
            count_handles: handles.len().try_into()?,
            flags,
            ..Default::default()
        };
        // SAFETY: Both arrays outlive the call and hold `count_handles` entries.
        unsafe { ioctl_with_mut_ref(self.fd(), DRM_IOCTL_SYNCOBJ_TIMELINE_WAIT, &mut wait)? };
        Ok(wait.first_signaled)
    }

    fn reset(&self, handles: &[u32]) -> AmdgpuResult<()> {
        self.syncobj_array(DRM_IOCTL_SYNCOBJ_RESET, handles)
    }

    fn signal(&self, handles: &[u32]) -> AmdgpuResult<()> {
        self.syncobj_array(DRM_IOCTL_SYNCOBJ_SIGNAL, handles)
    }

    fn timeline_signal(&self, handles: &[u32], points: &[u64]) -> AmdgpuResult<()> {
        check_points(handles, points)?;
        let array = drm_syncobj_timeline_array {
            handles: handles.as_ptr() as u64,
            points: points.as_ptr() as u64,
            count_handles: handles.len().try_into()?,
            flags: 0,
        };
        // SAFETY: Both arrays outlive the call and hold `count_handles` entries.
        unsafe { ioctl_with_ref(self.fd(), DRM_IOCTL_SYNCOBJ_TIMELINE_SIGNAL, &array) }
    }

    fn query(&self, handles: &[u32], points: &mut [u64], flags: u32) -> AmdgpuResult<()> {
        check_points(handles, points)?;
        let array = drm_syncobj_timeline_array {
            handles: handles.as_ptr() as u64,
            points: points.as_mut_ptr() as u64,
            count_handles: handles.len().try_into()?,
            flags,
        };
        // SAFETY: Both arrays outlive the call, and the kernel writes at most `count_handles`
        // points.
        unsafe { ioctl_with_ref(self.fd(), DRM_IOCTL_SYNCOBJ_QUERY, &array) }
    }

    fn transfer(
        &self,
        dst: u32,
        dst_point: u64,
        src: u32,
        src_point: u64,
        flags: u32,
    ) -> AmdgpuResult<()> {
        let transfer = drm_syncobj_transfer {
            src_handle: src,
            dst_handle: dst,
            src_point,
            dst_point,
            flags,
            pad: 0,
        };
        // SAFETY: SYNCOBJ_TRANSFER only reads a `drm_syncobj_transfer`.
        unsafe { ioctl_with_ref(self.fd(), DRM_IOCTL_SYNCOBJ_TRANSFER, &transfer) }
    }
}
