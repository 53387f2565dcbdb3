// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! DRM sync objects of the session's file.
//!
//! Both transports expose the guest kernel's syncobjs directly. Waits take relative timeouts
//! and turn them into the absolute deadlines the kernel expects.

use amdgpu_sys::DRM_SYNCOBJ_FD_TO_HANDLE_FLAGS_IMPORT_SYNC_FILE;
use amdgpu_sys::DRM_SYNCOBJ_HANDLE_TO_FD_FLAGS_EXPORT_SYNC_FILE;
use log::error;

use crate::amdgpu_os::absolute_timeout;
use crate::amdgpu_os::OwnedDescriptor;
use crate::transport::DrmSyncobj;
use crate::AmdgpuResult;
use crate::Device;
use crate::AMDGPU_TIMEOUT_INFINITE;

fn deadline(timeout_ns: u64) -> i64 {
    match absolute_timeout(timeout_ns) {
        AMDGPU_TIMEOUT_INFINITE => i64::MAX,
        deadline => i64::try_from(deadline).unwrap_or(i64::MAX),
    }
}

impl Device {
    fn syncobjs(&self) -> &dyn DrmSyncobj {
        self.shared.transport.syncobjs()
    }

    /// Runs `f` on a temporary binary syncobj.
    fn with_temp_syncobj<T, F>(&self, f: F) -> AmdgpuResult<T>
    where
        F: FnOnce(u32) -> AmdgpuResult<T>,
    {
        let temp = self.syncobjs().create(0)?;
        let result = f(temp);
        if let Err(e) = self.syncobjs().destroy(temp) {
            error!("failed to destroy temporary syncobj {}: {}", temp, e);
        }
        result
    }

    pub fn syncobj_create(&self, flags: u32) -> AmdgpuResult<u32> {
        self.syncobjs().create(flags)
    }

    pub fn syncobj_destroy(&self, handle: u32) -> AmdgpuResult<()> {
        self.syncobjs().destroy(handle)
    }

    /// Exports the syncobj itself, for import into another process.
    pub fn syncobj_export(&self, handle: u32) -> AmdgpuResult<OwnedDescriptor> {
        self.syncobjs().handle_to_fd(handle, 0)
    }

    pub fn syncobj_import(&self, fd: &OwnedDescriptor) -> AmdgpuResult<u32> {
        self.syncobjs().fd_to_handle(fd, 0, 0)
    }

    /// Exports the fence currently in a binary syncobj as a sync file.
    pub fn syncobj_export_sync_file(&self, handle: u32) -> AmdgpuResult<OwnedDescriptor> {
        self.syncobjs()
            .handle_to_fd(handle, DRM_SYNCOBJ_HANDLE_TO_FD_FLAGS_EXPORT_SYNC_FILE)
    }

    /// Replaces the fence of a binary syncobj with the one in a sync file.
    pub fn syncobj_import_sync_file(&self, handle: u32, fd: &OwnedDescriptor) -> AmdgpuResult<()> {
        self.syncobjs()
            .fd_to_handle(fd, DRM_SYNCOBJ_FD_TO_HANDLE_FLAGS_IMPORT_SYNC_FILE, handle)?;
        Ok(())
    }

    /// Exports `point` of a timeline syncobj as a sync file. Point 0 exports the syncobj as if it
    /// were binary.
    pub fn syncobj_export_sync_file2(
        &self,
        handle: u32,
        point: u64,
    ) -> AmdgpuResult<OwnedDescriptor> {
        if point == 0 {
            return self.syncobj_export_sync_file(handle);
        }

        self.with_temp_syncobj(|temp| {
            self.syncobjs().transfer(temp, 0, handle, point, 0)?;
            self.syncobj_export_sync_file(temp)
        })
    }

    /// Installs the fence of a sync file at `point` of a timeline syncobj.
    pub fn syncobj_import_sync_file2(
        &self,
        handle: u32,
        point: u64,
        fd: &OwnedDescriptor,
    ) -> AmdgpuResult<()> {
        if point == 0 {
            return self.syncobj_import_sync_file(handle, fd);
        }

        self.with_temp_syncobj(|temp| {
            self.syncobj_import_sync_file(temp, fd)?;
            self.syncobjs().transfer(handle, point, temp, 0, 0)
        })
    }

    /// Waits up to `timeout_ns` on binary syncobjs. Returns the index of the first signaled one.
    pub fn syncobj_wait(&self, handles: &[u32], timeout_ns: u64, flags: u32) -> AmdgpuResult<u32> {
        self.syncobjs().wait(handles, deadline(timeout_ns), flags)
    }

    /// Waits up to `timeout_ns` on timeline points, one per handle.
    pub fn syncobj_timeline_wait(
        &self,
        handles: &[u32],
        points: &[u64],
        timeout_ns: u64,
        flags: u32,
    ) -> AmdgpuResult<u32> {
        self.syncobjs()
            .timeline_wait(handles, points, deadline(timeout_ns), flags)
    }

    pub fn syncobj_reset(&self, handles: &[u32]) -> AmdgpuResult<()> {
        self.syncobjs().reset(handles)
    }

    pub fn syncobj_signal(&self, handles: &[u32]) -> AmdgpuResult<()> {
        self.syncobjs().signal(handles)
    }

    pub fn syncobj_timeline_signal(&self, handles: &[u32], points: &[u64]) -> AmdgpuResult<()> {
        self.syncobjs().timeline_signal(handles, points)
    }

    /// Last signaled point of every handle.
    pub fn syncobj_query(&self, handles: &[u32], flags: u32) -> AmdgpuResult<Vec<u64>> {
        let mut points = vec![0; handles.len()];
        self.syncobjs().query(handles, &mut points, flags)?;
        Ok(points)
    }

    /// Copies the fence at `src_point` of `src` to `dst_point` of `dst`.
    pub fn syncobj_transfer(
        &self,
        dst: u32,
        dst_point: u64,
        src: u32,
        src_point: u64,
        flags: u32,
    ) -> AmdgpuResult<()> {
        self.syncobjs()
            .transfer(dst, dst_point, src, src_point, flags)
    }
}
