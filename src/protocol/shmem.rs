// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::mem::offset_of;
use std::mem::size_of;
use std::ptr::read_volatile;
use std::ptr::write_volatile;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;

use crate::amdgpu_os::MemoryMapping;
use crate::protocol::AmdgpuShmem;
use crate::AmdgpuError;
use crate::AmdgpuResult;
use crate::HeapInfo;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SharedHeap {
    Gtt,
    Vram,
    VisibleVram,
}

/// A view of the shared host state block and the response area that follows it.
///
/// The host writes these fields concurrently with the guest, so every access goes through
/// atomics or volatile copies. Nothing is cached.
pub struct HostSharedState {
    mapping: MemoryMapping,
}

impl HostSharedState {
    /// Wraps the mapped block. A response area offset the host already published must be
    /// valid; one still zero is checked when responses are first used.
    pub fn new(mapping: MemoryMapping) -> AmdgpuResult<HostSharedState> {
        if mapping.size() < size_of::<AmdgpuShmem>() {
            return Err(AmdgpuError::InvalidCommandSize(mapping.size()));
        }

        let state = HostSharedState { mapping };
        if state.rsp_mem_offset() != 0 {
            state.rsp_mem_start()?;
        }
        Ok(state)
    }

    fn word(&self, offset: usize) -> &AtomicU32 {
        // SAFETY: `offset` is a 4-byte aligned field of `AmdgpuShmem`, which `new` checked fits
        // in the page-aligned mapping. The mapping lives as long as `self`.
        unsafe { &*(self.mapping.as_ptr().add(offset) as *const AtomicU32) }
    }

    pub fn seqno(&self) -> u32 {
        self.word(offset_of!(AmdgpuShmem, seqno))
            .load(Ordering::Acquire)
    }

    pub fn async_error(&self) -> u32 {
        self.word(offset_of!(AmdgpuShmem, async_error))
            .load(Ordering::Acquire)
    }

    pub fn rsp_mem_offset(&self) -> u32 {
        self.word(offset_of!(AmdgpuShmem, rsp_mem_offset))
            .load(Ordering::Acquire)
    }

    /// Publishes the last processed guest sequence number.
    pub fn set_seqno(&self, seqno: u32) {
        self.word(offset_of!(AmdgpuShmem, seqno))
            .store(seqno, Ordering::Release);
    }

    pub fn set_rsp_mem_offset(&self, offset: u32) {
        self.word(offset_of!(AmdgpuShmem, rsp_mem_offset))
            .store(offset, Ordering::Release);
    }

    /// Records a failure the guest could not observe synchronously.
    pub fn bump_async_error(&self) {
        self.word(offset_of!(AmdgpuShmem, async_error))
            .fetch_add(1, Ordering::AcqRel);
    }

    fn heap_offset(heap: SharedHeap) -> usize {
        match heap {
            SharedHeap::Gtt => offset_of!(AmdgpuShmem, gtt),
            SharedHeap::Vram => offset_of!(AmdgpuShmem, vram),
            SharedHeap::VisibleVram => offset_of!(AmdgpuShmem, vis_vram),
        }
    }

    pub fn heap_info(&self, heap: SharedHeap) -> HeapInfo {
        // SAFETY: The heap fields are 8-byte aligned and inside the mapping.
        unsafe {
            read_volatile(self.mapping.as_ptr().add(Self::heap_offset(heap)) as *const HeapInfo)
        }
    }

    pub fn set_heap_info(&self, heap: SharedHeap, info: HeapInfo) {
        // SAFETY: See `heap_info`.
        unsafe {
            write_volatile(
                self.mapping.as_ptr().add(Self::heap_offset(heap)) as *mut HeapInfo,
                info,
            )
        }
    }

    /// Start of the response area. It must follow the state block and stay inside the mapping.
    fn rsp_mem_start(&self) -> AmdgpuResult<usize> {
        let start = self.rsp_mem_offset() as usize;
        if start < size_of::<AmdgpuShmem>() || start > self.mapping.size() {
            return Err(AmdgpuError::InvalidArgument(
                "response area outside the shared state block",
            ));
        }
        Ok(start)
    }

    /// Length of the response area, as published by the host.
    pub fn rsp_mem_len(&self) -> AmdgpuResult<usize> {
        Ok(self.mapping.size() - self.rsp_mem_start()?)
    }

    fn rsp_range(&self, rsp_off: u32, len: usize) -> AmdgpuResult<usize> {
        let start = self.rsp_mem_start()? + rsp_off as usize;
        match start.checked_add(len) {
            Some(end) if end <= self.mapping.size() => Ok(start),
            _ => Err(AmdgpuError::InvalidCommandSize(len)),
        }
    }

    pub fn read_response(&self, rsp_off: u32, buf: &mut [u8]) -> AmdgpuResult<()> {
        let start = self.rsp_range(rsp_off, buf.len())?;
        self.mapping.read_slice(buf, start)
    }

    pub fn write_response(&self, rsp_off: u32, data: &[u8]) -> AmdgpuResult<()> {
        let start = self.rsp_range(rsp_off, data.len())?;
        self.mapping.write_slice(data, start)
    }
}
