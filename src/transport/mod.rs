// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The two ways of reaching the GPU: amdgpu ioctls on a local node, or the native-context wire
//! protocol tunnelled through a virtio-gpu node. A session picks one at open time and keeps it.

mod drm_file;
mod native;
mod virtgpu;
mod virtio;

use std::sync::atomic::AtomicU64;

use amdgpu_sys::drm_amdgpu_info;

pub use drm_file::DrmFile;
pub use drm_file::DrmSyncobj;
pub(crate) use native::NativeTransport;
pub use virtgpu::BlobCreate;
pub use virtgpu::ExecBuffer;
pub use virtgpu::ResourceInfo;
pub use virtgpu::VirtGpuDevice;
pub use virtgpu::VirtGpuDrm;
pub(crate) use virtio::VirtioTransport;

use crate::amdgpu_os::MemoryMapping;
use crate::cs::CsChunk;
use crate::AmdgpuError;
use crate::AmdgpuResult;
use crate::BoAllocRequest;
use crate::BoExport;
use crate::BoHandleType;
use crate::BoImport;
use crate::BoInfo;
use crate::BoMetadata;
use crate::CsFence;
use crate::HeapInfo;
use crate::HostBlob;
use crate::TransportKind;
use crate::VaOp;

/// One command submission, ready for a transport to encode.
pub struct CsRequest<'a> {
    pub ctx_id: u32,
    /// Flat ring the indirect buffers resolved to.
    pub ring_idx: u32,
    pub chunks: &'a [CsChunk<'a>],
    /// Sequence counter of `ring_idx` on the submitting context.
    pub ring_seqno: &'a AtomicU64,
}

/// A user-mode queue description for `userq_create`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct UserqCreate {
    pub ip_type: u32,
    pub doorbell_handle: u32,
    pub doorbell_offset: u32,
    pub flags: u32,
    pub queue_va: u64,
    pub queue_size: u64,
    pub rptr_va: u64,
    pub wptr_va: u64,
    pub mqd: u64,
    pub mqd_size: u64,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct UserqSignal<'a> {
    pub queue_id: u32,
    pub syncobj_handles: &'a [u32],
    pub bo_read_handles: &'a [u32],
    pub bo_write_handles: &'a [u32],
}

#[derive(Debug, Default)]
pub struct UserqWait<'a> {
    pub waitq_id: u32,
    pub syncobj_handles: &'a [u32],
    pub syncobj_timeline_handles: &'a [u32],
    pub syncobj_timeline_points: &'a [u64],
    pub bo_read_handles: &'a [u32],
    pub bo_write_handles: &'a [u32],
    /// Filled with `(va, value)` fence pairs. Its length caps how many the kernel returns.
    pub out_fences: Vec<(u64, u64)>,
}

/// Operations a device session needs from its transport.
///
/// Implementations never hold their own locks across a blocking wait on behalf of another
/// caller, except where the wire protocol requires request ordering.
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Runs one `AMDGPU_INFO` query and copies its result into `out`.
    fn query_info(&self, info: &drm_amdgpu_info, out: &mut [u8]) -> AmdgpuResult<()>;

    fn bo_create(&self, blob_id: u64, req: &BoAllocRequest) -> AmdgpuResult<HostBlob>;

    /// Resolves an external reference to a GEM handle on the session's file.
    fn bo_import(&self, import: &BoImport<'_>) -> AmdgpuResult<u32>;

    /// Size and host identity of a GEM handle.
    fn bo_info(&self, handle: u32) -> AmdgpuResult<HostBlob>;

    fn bo_export(&self, blob: &HostBlob, kind: BoHandleType) -> AmdgpuResult<BoExport>;

    /// Releases the GEM handle. Requests naming it must have been flushed.
    fn bo_close(&self, blob: &HostBlob) -> AmdgpuResult<()>;

    fn bo_mmap(&self, blob: &HostBlob) -> AmdgpuResult<MemoryMapping>;

    /// Returns true if the buffer is still busy at `deadline_ns`.
    fn bo_wait_idle(&self, blob: &HostBlob, deadline_ns: u64) -> AmdgpuResult<bool>;

    fn bo_set_metadata(&self, blob: &HostBlob, metadata: &BoMetadata) -> AmdgpuResult<()>;

    fn bo_query_info(&self, blob: &HostBlob) -> AmdgpuResult<BoInfo>;

    /// `blob` is `None` only for `AMDGPU_VA_OP_CLEAR`.
    fn bo_va_op(&self, blob: Option<&HostBlob>, op: &VaOp) -> AmdgpuResult<()>;

    fn ctx_create(&self, priority: i32) -> AmdgpuResult<u32>;

    fn ctx_destroy(&self, ctx_id: u32) -> AmdgpuResult<()>;

    /// `AMDGPU_CTX_QUERY2_FLAGS_*` of the context.
    fn ctx_query_reset_state(&self, ctx_id: u32) -> AmdgpuResult<u64>;

    fn ctx_stable_pstate(&self, ctx_id: u32, op: u32, flags: u32) -> AmdgpuResult<u32>;

    /// Submits and returns the sequence number of the submission on its ring.
    fn cs_submit(&self, req: &CsRequest<'_>) -> AmdgpuResult<u64>;

    /// Returns true once the fence has signaled. `deadline_ns` is absolute.
    fn query_fence_status(&self, fence: &CsFence, deadline_ns: u64) -> AmdgpuResult<bool>;

    fn vm_reserve_vmid(&self, unreserve: bool) -> AmdgpuResult<()>;

    fn heap_info(&self, heap: u32, flags: u64) -> AmdgpuResult<HeapInfo>;

    /// Pushes out anything queued for the host.
    fn flush(&self) -> AmdgpuResult<()>;

    fn syncobjs(&self) -> &dyn DrmSyncobj;

    fn userq_create(&self, _queue: &UserqCreate) -> AmdgpuResult<u32> {
        Err(AmdgpuError::Unsupported)
    }

    fn userq_free(&self, _queue_id: u32) -> AmdgpuResult<()> {
        Err(AmdgpuError::Unsupported)
    }

    fn userq_signal(&self, _signal: &UserqSignal<'_>) -> AmdgpuResult<()> {
        Err(AmdgpuError::Unsupported)
    }

    fn userq_wait(&self, _wait: &mut UserqWait<'_>) -> AmdgpuResult<()> {
        Err(AmdgpuError::Unsupported)
    }
}
