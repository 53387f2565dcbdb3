// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Hand-written wire structs. Every struct is a multiple of 8 bytes with explicit padding so the
//! layout is identical for 32-bit and 64-bit guests and hosts.

use std::mem::align_of;
use std::mem::size_of;

use amdgpu_sys::drm_amdgpu_info;
use static_assertions::const_assert;
use static_assertions::const_assert_eq;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;

use crate::HeapInfo;

/// Opcodes. Bit N of the synchronous-command mask refers to opcode N.
pub const AMDGPU_CCMD_QUERY_INFO: u32 = 1;
pub const AMDGPU_CCMD_GEM_NEW: u32 = 2;
pub const AMDGPU_CCMD_BO_VA_OP: u32 = 3;
pub const AMDGPU_CCMD_CS_SUBMIT: u32 = 4;
pub const AMDGPU_CCMD_SET_METADATA: u32 = 5;
pub const AMDGPU_CCMD_BO_QUERY_INFO: u32 = 6;
pub const AMDGPU_CCMD_CREATE_CTX: u32 = 7;
pub const AMDGPU_CCMD_RESERVE_VMID: u32 = 8;
pub const AMDGPU_CCMD_SET_PSTATE: u32 = 9;
pub const AMDGPU_CCMD_CS_QUERY_FENCE_STATUS: u32 = 10;

/// Capset `context_type` of an amdgpu native context.
pub const VIRTGPU_DRM_CONTEXT_AMDGPU: u32 = 2;

pub const AMDGPU_CCMD_CREATE_CTX_DESTROY: u32 = 1 << 0;
pub const AMDGPU_CCMD_RESERVE_VMID_UNRESERVE: u64 = 1 << 0;

/// Common header of every request.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct CcmdHeader {
    pub cmd: u32,
    /// Total request length in bytes, header and trailing payload included.
    pub len: u32,
    /// Guest sequence number, published back through shared state once the host is done.
    pub seqno: u32,
    /// Offset of the response slot in the response area, if the request has a response.
    pub rsp_off: u32,
}

impl CcmdHeader {
    pub fn new(cmd: u32, len: usize) -> CcmdHeader {
        CcmdHeader {
            cmd,
            len: len as u32,
            ..Default::default()
        }
    }
}

/// Common header of every response.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct CcmdResponse {
    pub len: u32,
    pub ret: i32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct QueryInfoReq {
    pub hdr: CcmdHeader,
    /// `return_pointer` is ignored, the result follows the response header.
    pub info: drm_amdgpu_info,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct GemNewRequest {
    pub alloc_size: u64,
    pub alignment: u64,
    pub preferred_heap: u32,
    pub pad: u32,
    pub flags: u64,
}

/// Carried as the command of a blob resource creation, never on its own.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct GemNewReq {
    pub hdr: CcmdHeader,
    pub blob_id: u64,
    pub r: GemNewRequest,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct BoVaOpReq {
    pub hdr: CcmdHeader,
    pub va: u64,
    pub vm_map_size: u64,
    /// `AMDGPU_VM_*` flags, handed to the kernel untouched.
    pub flags: u64,
    /// `AMDGPU_CCMD_BO_VA_OP_*` flags.
    pub flags2: u64,
    pub offset: u64,
    pub res_id: u32,
    pub op: u32,
}

/// Followed by `num_chunks` [`CsChunkDesc`] entries and then the chunk data they point at.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct CsSubmitReq {
    pub hdr: CcmdHeader,
    pub ctx_id: u32,
    pub num_chunks: u32,
    pub pad: u32,
    pub ring_idx: u32,
}

/// Locates one chunk inside the payload of a [`CsSubmitReq`].
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct CsChunkDesc {
    pub chunk_id: u32,
    /// Byte offset from the start of the payload.
    pub offset: u32,
    pub length_dw: u32,
    pub pad: u32,
}

/// Followed by `size_metadata` bytes of UMD metadata, padded to 8 bytes.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct SetMetadataReq {
    pub hdr: CcmdHeader,
    pub flags: u64,
    pub tiling_info: u64,
    pub res_id: u32,
    pub size_metadata: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct BoQueryInfoReq {
    pub hdr: CcmdHeader,
    pub res_id: u32,
    pub pad: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct BoMetadataWire {
    pub flags: u64,
    pub tiling_info: u64,
    pub size_metadata: u32,
    pub umd_metadata: [u32; 64],
    pub pad: u32,
}

impl Default for BoMetadataWire {
    fn default() -> Self {
        BoMetadataWire {
            flags: 0,
            tiling_info: 0,
            size_metadata: 0,
            umd_metadata: [0; 64],
            pad: 0,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct BoInfoWire {
    pub alloc_size: u64,
    pub phys_alignment: u64,
    pub preferred_heap: u32,
    pub pad: u32,
    pub alloc_flags: u64,
    pub metadata: BoMetadataWire,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct BoQueryInfoRsp {
    pub hdr: CcmdResponse,
    pub info: BoInfoWire,
}

/// Creates a context, or destroys `priority_or_id` when `AMDGPU_CCMD_CREATE_CTX_DESTROY` is set.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct CreateCtxReq {
    pub hdr: CcmdHeader,
    /// An `i32` priority on creation, the context id on destruction.
    pub priority_or_id: u32,
    pub flags: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct CreateCtxRsp {
    pub hdr: CcmdResponse,
    pub ctx_id: u32,
    pub pad: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct ReserveVmidReq {
    pub hdr: CcmdHeader,
    pub flags: u64,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct SetPstateReq {
    pub hdr: CcmdHeader,
    pub ctx_id: u32,
    pub op: u32,
    pub flags: u32,
    pub pad: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct SetPstateRsp {
    pub hdr: CcmdResponse,
    pub out_flags: u32,
    pub pad: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct CsQueryFenceStatusReq {
    pub hdr: CcmdHeader,
    pub ctx_id: u32,
    pub ip_type: u32,
    pub ip_instance: u32,
    pub ring: u32,
    pub fence: u64,
    pub timeout_ns: u64,
    pub flags: u64,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct CsQueryFenceStatusRsp {
    pub hdr: CcmdResponse,
    pub expired: u32,
    pub pad: u32,
}

/// Leading part of the DRM native-context capset.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct DrmCapset {
    pub wire_format_version: u32,
    pub version_major: u32,
    pub version_minor: u32,
    pub version_patchlevel: u32,
    pub context_type: u32,
    pub pad: u32,
}

/// The shared host state block, at offset 0 of the shared memory blob.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct AmdgpuShmem {
    /// Last guest sequence number the host has finished processing.
    pub seqno: u32,
    /// Start of the response area within the blob.
    pub rsp_mem_offset: u32,
    /// Bumped by the host on every failure it could not report synchronously.
    pub async_error: u32,
    pub pad: u32,
    pub gtt: HeapInfo,
    pub vram: HeapInfo,
    pub vis_vram: HeapInfo,
}

macro_rules! assert_wire_layout {
    ($($ty:ty = $size:expr),* $(,)?) => {
        $(
            const_assert_eq!(size_of::<$ty>(), $size);
            const_assert_eq!(size_of::<$ty>() % 8, 0);
            const_assert!(align_of::<$ty>() <= 8);
        )*
    };
}

assert_wire_layout!(
    CcmdHeader = 16,
    CcmdResponse = 8,
    QueryInfoReq = 48,
    GemNewReq = 56,
    BoVaOpReq = 64,
    CsSubmitReq = 32,
    CsChunkDesc = 16,
    SetMetadataReq = 40,
    BoQueryInfoReq = 24,
    BoQueryInfoRsp = 320,
    CreateCtxReq = 24,
    CreateCtxRsp = 16,
    ReserveVmidReq = 24,
    SetPstateReq = 32,
    SetPstateRsp = 16,
    CsQueryFenceStatusReq = 56,
    CsQueryFenceStatusRsp = 16,
    DrmCapset = 24,
    AmdgpuShmem = 88,
);
