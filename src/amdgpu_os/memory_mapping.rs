// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::ffi::c_void;
use std::num::NonZeroUsize;
use std::ptr::copy_nonoverlapping;
use std::ptr::NonNull;

use log::error;
use nix::sys::mman::mmap;
use nix::sys::mman::munmap;
use nix::sys::mman::MapFlags;
use nix::sys::mman::ProtFlags;

use crate::amdgpu_os::OwnedDescriptor;
use crate::AmdgpuError;
use crate::AmdgpuResult;

/// Wraps a shared read/write mapping of a descriptor in the current process. Provides RAII
/// semantics including munmap when no longer needed.
#[derive(Debug)]
pub struct MemoryMapping {
    addr: NonNull<c_void>,
    size: usize,
}

// SAFETY: The mapping is plain shared memory. Callers synchronize access to its contents.
unsafe impl Send for MemoryMapping {}
// SAFETY: See above.
unsafe impl Sync for MemoryMapping {}

impl Drop for MemoryMapping {
    fn drop(&mut self) {
        // SAFETY:
        // This is safe because we mmap the area at addr ourselves, and nobody
        // else is holding a reference to it.
        if let Err(e) = unsafe { munmap(self.addr, self.size) } {
            error!("munmap of {} bytes failed: {}", self.size, e);
        }
    }
}

impl MemoryMapping {
    pub fn from_offset(
        descriptor: &OwnedDescriptor,
        offset: u64,
        size: usize,
    ) -> AmdgpuResult<MemoryMapping> {
        let length =
            NonZeroUsize::new(size).ok_or(AmdgpuError::InvalidArgument("empty mapping"))?;
        // SAFETY:
        // The inputs to the mmap() system call have been verified, and
        // the kernel is trusted to deliver a correct result.
        let addr = unsafe {
            mmap(
                None,
                length,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                descriptor,
                offset.try_into()?,
            )?
        };

        Ok(MemoryMapping { addr, size })
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.addr.as_ptr() as *mut u8
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn check_range(&self, offset: usize, len: usize) -> AmdgpuResult<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(AmdgpuError::InvalidArgument("access outside of mapping")),
        }
    }

    /// Copies `data` into the mapping at `offset`.
    pub fn write_slice(&self, data: &[u8], offset: usize) -> AmdgpuResult<()> {
        self.check_range(offset, data.len())?;
        // SAFETY: The destination range was checked to lie inside the mapping.
        unsafe { copy_nonoverlapping(data.as_ptr(), self.as_ptr().add(offset), data.len()) };
        Ok(())
    }

    /// Copies from the mapping at `offset` into `data`.
    pub fn read_slice(&self, data: &mut [u8], offset: usize) -> AmdgpuResult<()> {
        self.check_range(offset, data.len())?;
        // SAFETY: The source range was checked to lie inside the mapping.
        unsafe { copy_nonoverlapping(self.as_ptr().add(offset), data.as_mut_ptr(), data.len()) };
        Ok(())
    }
}
