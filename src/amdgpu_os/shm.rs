// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::ffi::CString;

use nix::sys::memfd::memfd_create;
use nix::sys::memfd::MemFdCreateFlag;
use nix::unistd::ftruncate;

use crate::amdgpu_os::AsRawDescriptor;
use crate::amdgpu_os::MemoryMapping;
use crate::amdgpu_os::OwnedDescriptor;
use crate::amdgpu_os::RawDescriptor;
use crate::AmdgpuError;
use crate::AmdgpuResult;

/// A memfd of fixed size. Stands in for device memory wherever a blob has to be backed by
/// something the kernel can map and pass around as a file descriptor.
pub struct SharedMemory {
    descriptor: OwnedDescriptor,
    size: u64,
}

impl SharedMemory {
    /// Creates a new shared memory file descriptor of `size` bytes.
    ///
    /// `debug_name` shows up in `/proc/self/fd/<shm fd>` and does not need to be unique.
    pub fn new(debug_name: &str, size: u64) -> AmdgpuResult<SharedMemory> {
        let name = CString::new(debug_name)
            .map_err(|_| AmdgpuError::InvalidArgument("shared memory name contains a nul"))?;
        let descriptor = memfd_create(&name, MemFdCreateFlag::MFD_CLOEXEC)?;
        ftruncate(&descriptor, size.try_into()?)?;
        Ok(SharedMemory { descriptor, size })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn descriptor(&self) -> &OwnedDescriptor {
        &self.descriptor
    }

    pub fn try_clone_descriptor(&self) -> AmdgpuResult<OwnedDescriptor> {
        Ok(self.descriptor.try_clone()?)
    }

    pub fn map(&self) -> AmdgpuResult<MemoryMapping> {
        MemoryMapping::from_offset(&self.descriptor, 0, self.size.try_into()?)
    }
}

impl AsRawDescriptor for SharedMemory {
    fn as_raw_descriptor(&self) -> RawDescriptor {
        self.descriptor.as_raw_descriptor()
    }
}

impl From<SharedMemory> for OwnedDescriptor {
    fn from(shm: SharedMemory) -> OwnedDescriptor {
        shm.descriptor
    }
}
