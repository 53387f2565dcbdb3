// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! amdgpu driver-private ioctls.

// Translated from include/uapi/drm/amdgpu_drm.h

use std::mem::size_of;

use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;

use crate::drm::DRM_COMMAND_BASE;
use crate::drm::DRM_IOCTL_BASE;
use crate::IoctlNr;

pub const DRM_AMDGPU_GEM_CREATE: u32 = 0x00;
pub const DRM_AMDGPU_GEM_MMAP: u32 = 0x01;
pub const DRM_AMDGPU_CTX: u32 = 0x02;
pub const DRM_AMDGPU_BO_LIST: u32 = 0x03;
pub const DRM_AMDGPU_CS: u32 = 0x04;
pub const DRM_AMDGPU_INFO: u32 = 0x05;
pub const DRM_AMDGPU_GEM_METADATA: u32 = 0x06;
pub const DRM_AMDGPU_GEM_WAIT_IDLE: u32 = 0x07;
pub const DRM_AMDGPU_GEM_VA: u32 = 0x08;
pub const DRM_AMDGPU_WAIT_CS: u32 = 0x09;
pub const DRM_AMDGPU_GEM_OP: u32 = 0x10;
pub const DRM_AMDGPU_GEM_USERPTR: u32 = 0x11;
pub const DRM_AMDGPU_WAIT_FENCES: u32 = 0x12;
pub const DRM_AMDGPU_VM: u32 = 0x13;
pub const DRM_AMDGPU_FENCE_TO_HANDLE: u32 = 0x14;
pub const DRM_AMDGPU_SCHED: u32 = 0x15;
pub const DRM_AMDGPU_USERQ: u32 = 0x16;
pub const DRM_AMDGPU_USERQ_SIGNAL: u32 = 0x17;
pub const DRM_AMDGPU_USERQ_WAIT: u32 = 0x18;

pub const AMDGPU_GEM_DOMAIN_CPU: u32 = 0x1;
pub const AMDGPU_GEM_DOMAIN_GTT: u32 = 0x2;
pub const AMDGPU_GEM_DOMAIN_VRAM: u32 = 0x4;
pub const AMDGPU_GEM_DOMAIN_GDS: u32 = 0x8;
pub const AMDGPU_GEM_DOMAIN_GWS: u32 = 0x10;
pub const AMDGPU_GEM_DOMAIN_OA: u32 = 0x20;
pub const AMDGPU_GEM_DOMAIN_DOORBELL: u32 = 0x40;
pub const AMDGPU_GEM_DOMAIN_MASK: u32 = 0x7f;

pub const AMDGPU_GEM_CREATE_CPU_ACCESS_REQUIRED: u64 = 1 << 0;
pub const AMDGPU_GEM_CREATE_NO_CPU_ACCESS: u64 = 1 << 1;
pub const AMDGPU_GEM_CREATE_CPU_GTT_USWC: u64 = 1 << 2;
pub const AMDGPU_GEM_CREATE_VRAM_CLEARED: u64 = 1 << 3;
pub const AMDGPU_GEM_CREATE_VM_ALWAYS_VALID: u64 = 1 << 6;
pub const AMDGPU_GEM_CREATE_EXPLICIT_SYNC: u64 = 1 << 7;
pub const AMDGPU_GEM_CREATE_ENCRYPTED: u64 = 1 << 10;
pub const AMDGPU_GEM_CREATE_DISCARDABLE: u64 = 1 << 12;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct drm_amdgpu_gem_create_in {
    pub bo_size: u64,
    pub alignment: u64,
    pub domains: u64,
    pub domain_flags: u64,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_amdgpu_gem_create_out {
    pub handle: u32,
    pub _pad: u32,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub union drm_amdgpu_gem_create {
    pub in_: drm_amdgpu_gem_create_in,
    pub out: drm_amdgpu_gem_create_out,
}

impl Default for drm_amdgpu_gem_create {
    fn default() -> Self {
        drm_amdgpu_gem_create {
            in_: Default::default(),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_amdgpu_gem_mmap_in {
    pub handle: u32,
    pub _pad: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_amdgpu_gem_mmap_out {
    pub addr_ptr: u64,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub union drm_amdgpu_gem_mmap {
    pub in_: drm_amdgpu_gem_mmap_in,
    pub out: drm_amdgpu_gem_mmap_out,
}

impl Default for drm_amdgpu_gem_mmap {
    fn default() -> Self {
        drm_amdgpu_gem_mmap {
            out: Default::default(),
        }
    }
}

pub const AMDGPU_CTX_OP_ALLOC_CTX: u32 = 1;
pub const AMDGPU_CTX_OP_FREE_CTX: u32 = 2;
pub const AMDGPU_CTX_OP_QUERY_STATE: u32 = 3;
pub const AMDGPU_CTX_OP_QUERY_STATE2: u32 = 4;
pub const AMDGPU_CTX_OP_GET_STABLE_PSTATE: u32 = 5;
pub const AMDGPU_CTX_OP_SET_STABLE_PSTATE: u32 = 6;

pub const AMDGPU_CTX_NO_RESET: u32 = 0;
pub const AMDGPU_CTX_GUILTY_RESET: u32 = 1;
pub const AMDGPU_CTX_INNOCENT_RESET: u32 = 2;
pub const AMDGPU_CTX_UNKNOWN_RESET: u32 = 3;

pub const AMDGPU_CTX_QUERY2_FLAGS_RESET: u64 = 1 << 0;
pub const AMDGPU_CTX_QUERY2_FLAGS_VRAMLOST: u64 = 1 << 1;
pub const AMDGPU_CTX_QUERY2_FLAGS_GUILTY: u64 = 1 << 2;
pub const AMDGPU_CTX_QUERY2_FLAGS_RAS_CE: u64 = 1 << 3;
pub const AMDGPU_CTX_QUERY2_FLAGS_RAS_UE: u64 = 1 << 4;
pub const AMDGPU_CTX_QUERY2_FLAGS_RESET_IN_PROGRESS: u64 = 1 << 5;

pub const AMDGPU_CTX_PRIORITY_UNSET: i32 = -2048;
pub const AMDGPU_CTX_PRIORITY_VERY_LOW: i32 = -1023;
pub const AMDGPU_CTX_PRIORITY_LOW: i32 = -512;
pub const AMDGPU_CTX_PRIORITY_NORMAL: i32 = 0;
pub const AMDGPU_CTX_PRIORITY_HIGH: i32 = 512;
pub const AMDGPU_CTX_PRIORITY_VERY_HIGH: i32 = 1023;

pub const AMDGPU_CTX_STABLE_PSTATE_FLAGS_MASK: u32 = 0xf;
pub const AMDGPU_CTX_STABLE_PSTATE_NONE: u32 = 0;
pub const AMDGPU_CTX_STABLE_PSTATE_STANDARD: u32 = 1;
pub const AMDGPU_CTX_STABLE_PSTATE_MIN_SCLK: u32 = 2;
pub const AMDGPU_CTX_STABLE_PSTATE_MIN_MCLK: u32 = 3;
pub const AMDGPU_CTX_STABLE_PSTATE_PEAK: u32 = 4;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_amdgpu_ctx_in {
    pub op: u32,
    pub flags: u32,
    pub ctx_id: u32,
    pub priority: i32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_amdgpu_ctx_out_alloc {
    pub ctx_id: u32,
    pub _pad: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_amdgpu_ctx_out_state {
    pub flags: u64,
    pub hangs: u32,
    pub reset_status: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_amdgpu_ctx_out_pstate {
    pub flags: u32,
    pub _pad: u32,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub union drm_amdgpu_ctx_out {
    pub alloc: drm_amdgpu_ctx_out_alloc,
    pub state: drm_amdgpu_ctx_out_state,
    pub pstate: drm_amdgpu_ctx_out_pstate,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub union drm_amdgpu_ctx {
    pub in_: drm_amdgpu_ctx_in,
    pub out: drm_amdgpu_ctx_out,
}

impl Default for drm_amdgpu_ctx {
    fn default() -> Self {
        drm_amdgpu_ctx {
            in_: Default::default(),
        }
    }
}

pub const AMDGPU_VM_OP_RESERVE_VMID: u32 = 1;
pub const AMDGPU_VM_OP_UNRESERVE_VMID: u32 = 2;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_amdgpu_vm_in {
    pub op: u32,
    pub flags: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_amdgpu_vm_out {
    pub flags: u64,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub union drm_amdgpu_vm {
    pub in_: drm_amdgpu_vm_in,
    pub out: drm_amdgpu_vm_out,
}

impl Default for drm_amdgpu_vm {
    fn default() -> Self {
        drm_amdgpu_vm {
            out: Default::default(),
        }
    }
}

pub const AMDGPU_BO_LIST_OP_CREATE: u32 = 0;
pub const AMDGPU_BO_LIST_OP_DESTROY: u32 = 1;
pub const AMDGPU_BO_LIST_OP_UPDATE: u32 = 2;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct drm_amdgpu_bo_list_in {
    pub operation: u32,
    pub list_handle: u32,
    pub bo_number: u32,
    pub bo_info_size: u32,
    pub bo_info_ptr: u64,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct drm_amdgpu_bo_list_entry {
    pub bo_handle: u32,
    pub bo_priority: u32,
}

pub const AMDGPU_CHUNK_ID_IB: u32 = 0x01;
pub const AMDGPU_CHUNK_ID_FENCE: u32 = 0x02;
pub const AMDGPU_CHUNK_ID_DEPENDENCIES: u32 = 0x03;
pub const AMDGPU_CHUNK_ID_SYNCOBJ_IN: u32 = 0x04;
pub const AMDGPU_CHUNK_ID_SYNCOBJ_OUT: u32 = 0x05;
pub const AMDGPU_CHUNK_ID_BO_HANDLES: u32 = 0x06;
pub const AMDGPU_CHUNK_ID_SCHEDULED_DEPENDENCIES: u32 = 0x07;
pub const AMDGPU_CHUNK_ID_SYNCOBJ_TIMELINE_WAIT: u32 = 0x08;
pub const AMDGPU_CHUNK_ID_SYNCOBJ_TIMELINE_SIGNAL: u32 = 0x09;
pub const AMDGPU_CHUNK_ID_CP_GFX_SHADOW: u32 = 0x0a;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct drm_amdgpu_cs_chunk {
    pub chunk_id: u32,
    pub length_dw: u32,
    pub chunk_data: u64,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct drm_amdgpu_cs_in {
    pub ctx_id: u32,
    pub bo_list_handle: u32,
    pub num_chunks: u32,
    pub flags: u32,
    pub chunks: u64,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_amdgpu_cs_out {
    pub handle: u64,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub union drm_amdgpu_cs {
    pub in_: drm_amdgpu_cs_in,
    pub out: drm_amdgpu_cs_out,
}

impl Default for drm_amdgpu_cs {
    fn default() -> Self {
        drm_amdgpu_cs {
            in_: Default::default(),
        }
    }
}

pub const AMDGPU_IB_FLAG_CE: u32 = 1 << 0;
pub const AMDGPU_IB_FLAG_PREAMBLE: u32 = 1 << 1;
pub const AMDGPU_IB_FLAG_PREEMPT: u32 = 1 << 2;
pub const AMDGPU_IB_FLAG_TC_WB_NOT_INVALIDATE: u32 = 1 << 3;
pub const AMDGPU_IB_FLAG_RESET_GDS_MAX_WAVE_ID: u32 = 1 << 4;
pub const AMDGPU_IB_FLAGS_SECURE: u32 = 1 << 5;
pub const AMDGPU_IB_FLAG_EMIT_MEM_SYNC: u32 = 1 << 6;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct drm_amdgpu_cs_chunk_ib {
    pub _pad: u32,
    pub flags: u32,
    pub va_start: u64,
    pub ib_bytes: u32,
    pub ip_type: u32,
    pub ip_instance: u32,
    pub ring: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct drm_amdgpu_cs_chunk_dep {
    pub ip_type: u32,
    pub ip_instance: u32,
    pub ring: u32,
    pub ctx_id: u32,
    pub handle: u64,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct drm_amdgpu_cs_chunk_fence {
    pub handle: u32,
    pub offset: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct drm_amdgpu_cs_chunk_sem {
    pub handle: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct drm_amdgpu_cs_chunk_syncobj {
    pub handle: u32,
    pub flags: u32,
    pub point: u64,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct drm_amdgpu_cs_chunk_data_fence {
    pub bo_handle: u32,
    pub offset: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_amdgpu_wait_cs_in {
    pub handle: u64,
    pub timeout: u64,
    pub ip_type: u32,
    pub ip_instance: u32,
    pub ring: u32,
    pub ctx_id: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_amdgpu_wait_cs_out {
    pub status: u64,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub union drm_amdgpu_wait_cs {
    pub in_: drm_amdgpu_wait_cs_in,
    pub out: drm_amdgpu_wait_cs_out,
}

impl Default for drm_amdgpu_wait_cs {
    fn default() -> Self {
        drm_amdgpu_wait_cs {
            in_: Default::default(),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct drm_amdgpu_fence {
    pub ctx_id: u32,
    pub ip_type: u32,
    pub ip_instance: u32,
    pub ring: u32,
    pub seq_no: u64,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_amdgpu_gem_wait_idle_in {
    pub handle: u32,
    pub flags: u32,
    pub timeout: u64,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_amdgpu_gem_wait_idle_out {
    pub status: u32,
    pub domain: u32,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub union drm_amdgpu_gem_wait_idle {
    pub in_: drm_amdgpu_gem_wait_idle_in,
    pub out: drm_amdgpu_gem_wait_idle_out,
}

impl Default for drm_amdgpu_gem_wait_idle {
    fn default() -> Self {
        drm_amdgpu_gem_wait_idle {
            in_: Default::default(),
        }
    }
}

pub const AMDGPU_GEM_METADATA_OP_SET_METADATA: u32 = 1;
pub const AMDGPU_GEM_METADATA_OP_GET_METADATA: u32 = 2;

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct drm_amdgpu_gem_metadata_data {
    pub flags: u64,
    pub tiling_info: u64,
    pub data_size_bytes: u32,
    pub data: [u32; 64],
}

impl Default for drm_amdgpu_gem_metadata_data {
    fn default() -> Self {
        drm_amdgpu_gem_metadata_data {
            flags: 0,
            tiling_info: 0,
            data_size_bytes: 0,
            data: [0; 64],
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_amdgpu_gem_metadata {
    pub handle: u32,
    pub op: u32,
    pub data: drm_amdgpu_gem_metadata_data,
}

pub const AMDGPU_GEM_OP_GET_GEM_CREATE_INFO: u32 = 0;
pub const AMDGPU_GEM_OP_SET_PLACEMENT: u32 = 1;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_amdgpu_gem_op {
    pub handle: u32,
    pub op: u32,
    pub value: u64,
}

pub const AMDGPU_VA_OP_MAP: u32 = 1;
pub const AMDGPU_VA_OP_UNMAP: u32 = 2;
pub const AMDGPU_VA_OP_CLEAR: u32 = 3;
pub const AMDGPU_VA_OP_REPLACE: u32 = 4;

pub const AMDGPU_VM_DELAY_UPDATE: u32 = 1 << 0;
pub const AMDGPU_VM_PAGE_READABLE: u32 = 1 << 1;
pub const AMDGPU_VM_PAGE_WRITEABLE: u32 = 1 << 2;
pub const AMDGPU_VM_PAGE_EXECUTABLE: u32 = 1 << 3;
pub const AMDGPU_VM_PAGE_PRT: u32 = 1 << 4;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct drm_amdgpu_gem_va {
    pub handle: u32,
    pub _pad: u32,
    pub operation: u32,
    pub flags: u32,
    pub va_address: u64,
    pub offset_in_bo: u64,
    pub map_size: u64,
}

pub const AMDGPU_HW_IP_GFX: u32 = 0;
pub const AMDGPU_HW_IP_COMPUTE: u32 = 1;
pub const AMDGPU_HW_IP_DMA: u32 = 2;
pub const AMDGPU_HW_IP_UVD: u32 = 3;
pub const AMDGPU_HW_IP_VCE: u32 = 4;
pub const AMDGPU_HW_IP_UVD_ENC: u32 = 5;
pub const AMDGPU_HW_IP_VCN_DEC: u32 = 6;
pub const AMDGPU_HW_IP_VCN_ENC: u32 = 7;
pub const AMDGPU_HW_IP_VCN_JPEG: u32 = 8;
pub const AMDGPU_HW_IP_VPE: u32 = 9;
pub const AMDGPU_HW_IP_NUM: u32 = 10;

pub const AMDGPU_INFO_ACCEL_WORKING: u32 = 0x00;
pub const AMDGPU_INFO_CRTC_FROM_ID: u32 = 0x01;
pub const AMDGPU_INFO_HW_IP_INFO: u32 = 0x02;
pub const AMDGPU_INFO_HW_IP_COUNT: u32 = 0x03;
pub const AMDGPU_INFO_TIMESTAMP: u32 = 0x05;
pub const AMDGPU_INFO_FW_VERSION: u32 = 0x0e;
pub const AMDGPU_INFO_NUM_BYTES_MOVED: u32 = 0x0f;
pub const AMDGPU_INFO_VRAM_USAGE: u32 = 0x10;
pub const AMDGPU_INFO_GTT_USAGE: u32 = 0x11;
pub const AMDGPU_INFO_GDS_CONFIG: u32 = 0x13;
pub const AMDGPU_INFO_VRAM_GTT: u32 = 0x14;
pub const AMDGPU_INFO_READ_MMR_REG: u32 = 0x15;
pub const AMDGPU_INFO_DEV_INFO: u32 = 0x16;
pub const AMDGPU_INFO_VIS_VRAM_USAGE: u32 = 0x17;
pub const AMDGPU_INFO_NUM_EVICTIONS: u32 = 0x18;
pub const AMDGPU_INFO_MEMORY: u32 = 0x19;
pub const AMDGPU_INFO_VCE_CLOCK_TABLE: u32 = 0x1a;
pub const AMDGPU_INFO_VBIOS: u32 = 0x1b;
pub const AMDGPU_INFO_NUM_HANDLES: u32 = 0x1c;
pub const AMDGPU_INFO_SENSOR: u32 = 0x1d;
pub const AMDGPU_INFO_VRAM_LOST_COUNTER: u32 = 0x1f;
pub const AMDGPU_INFO_VIDEO_CAPS: u32 = 0x21;

pub const AMDGPU_INFO_FW_VCE: u32 = 0x1;
pub const AMDGPU_INFO_FW_UVD: u32 = 0x2;
pub const AMDGPU_INFO_FW_GMC: u32 = 0x03;
pub const AMDGPU_INFO_FW_GFX_ME: u32 = 0x04;
pub const AMDGPU_INFO_FW_GFX_PFP: u32 = 0x05;
pub const AMDGPU_INFO_FW_GFX_CE: u32 = 0x06;
pub const AMDGPU_INFO_FW_GFX_RLC: u32 = 0x07;
pub const AMDGPU_INFO_FW_GFX_MEC: u32 = 0x08;
pub const AMDGPU_INFO_FW_SMC: u32 = 0x0a;
pub const AMDGPU_INFO_FW_SDMA: u32 = 0x0b;
pub const AMDGPU_INFO_FW_SOS: u32 = 0x0c;
pub const AMDGPU_INFO_FW_ASD: u32 = 0x0d;
pub const AMDGPU_INFO_FW_VCN: u32 = 0x0e;

pub const AMDGPU_INFO_SENSOR_GFX_SCLK: u32 = 0x1;
pub const AMDGPU_INFO_SENSOR_GFX_MCLK: u32 = 0x2;
pub const AMDGPU_INFO_SENSOR_GPU_TEMP: u32 = 0x3;
pub const AMDGPU_INFO_SENSOR_GPU_LOAD: u32 = 0x4;
pub const AMDGPU_INFO_SENSOR_GPU_AVG_POWER: u32 = 0x5;
pub const AMDGPU_INFO_SENSOR_VDDNB: u32 = 0x6;
pub const AMDGPU_INFO_SENSOR_VDDGFX: u32 = 0x7;
pub const AMDGPU_INFO_SENSOR_STABLE_PSTATE_GFX_SCLK: u32 = 0x8;
pub const AMDGPU_INFO_SENSOR_STABLE_PSTATE_GFX_MCLK: u32 = 0x9;

pub const AMDGPU_INFO_MMR_SE_INDEX_SHIFT: u32 = 0;
pub const AMDGPU_INFO_MMR_SE_INDEX_MASK: u32 = 0xff;
pub const AMDGPU_INFO_MMR_SH_INDEX_SHIFT: u32 = 8;
pub const AMDGPU_INFO_MMR_SH_INDEX_MASK: u32 = 0xff;

/// `drm_amdgpu_info` with its query union flattened into four words. Each query kind gives the
/// words its own meaning (`hw_ip: {type, ip_instance}`, `read_mmr_reg: {dword_offset, count,
/// instance, flags}`, `query_fw: {fw_type, ip_instance, index}`, `sensor_info: {type}`).
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct drm_amdgpu_info {
    pub return_pointer: u64,
    pub return_size: u32,
    pub query: u32,
    pub value: [u32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct drm_amdgpu_info_hw_ip {
    pub hw_ip_version_major: u32,
    pub hw_ip_version_minor: u32,
    pub capabilities_flags: u64,
    pub ib_start_alignment: u32,
    pub ib_size_alignment: u32,
    pub available_rings: u32,
    pub ip_discovery_version: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct drm_amdgpu_info_firmware {
    pub ver: u32,
    pub feature: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct drm_amdgpu_info_vram_gtt {
    pub vram_size: u64,
    pub vram_cpu_accessible_size: u64,
    pub gtt_size: u64,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct drm_amdgpu_heap_info {
    pub total_heap_size: u64,
    pub usable_heap_size: u64,
    pub heap_usage: u64,
    pub max_allocation: u64,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct drm_amdgpu_memory_info {
    pub vram: drm_amdgpu_heap_info,
    pub cpu_accessible_vram: drm_amdgpu_heap_info,
    pub gtt: drm_amdgpu_heap_info,
}

pub const AMDGPU_IDS_FLAGS_FUSION: u64 = 0x1;
pub const AMDGPU_IDS_FLAGS_PREEMPTION: u64 = 0x2;
pub const AMDGPU_IDS_FLAGS_TMZ: u64 = 0x4;

/// Leading part of `drm_amdgpu_info_device`. The kernel copies `min(return_size, sizeof)`, so
/// newer kernels fill what is declared here and drop the rest.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct drm_amdgpu_info_device {
    pub device_id: u32,
    pub chip_rev: u32,
    pub external_rev: u32,
    pub pci_rev: u32,
    pub family: u32,
    pub num_shader_engines: u32,
    pub num_shader_arrays_per_engine: u32,
    pub gpu_counter_freq: u32,
    pub max_engine_clock: u64,
    pub max_memory_clock: u64,
    pub cu_active_number: u32,
    pub cu_ao_mask: u32,
    pub cu_bitmap: [[u32; 4]; 4],
    pub enabled_rb_pipes_mask: u32,
    pub num_rb_pipes: u32,
    pub num_hw_gfx_contexts: u32,
    pub pcie_gen: u32,
    pub ids_flags: u64,
    pub virtual_address_offset: u64,
    pub virtual_address_max: u64,
    pub virtual_address_alignment: u32,
    pub pte_fragment_size: u32,
    pub gart_page_size: u32,
    pub ce_ram_size: u32,
    pub vram_type: u32,
    pub vram_bit_width: u32,
    pub vce_harvest_config: u32,
    pub gc_double_offchip_lds_buf: u32,
    pub prim_buf_gpu_addr: u64,
    pub pos_buf_gpu_addr: u64,
    pub cntl_sb_buf_gpu_addr: u64,
    pub param_buf_gpu_addr: u64,
    pub prim_buf_size: u32,
    pub pos_buf_size: u32,
    pub cntl_sb_buf_size: u32,
    pub param_buf_size: u32,
    pub wave_front_size: u32,
    pub num_shader_visible_vgprs: u32,
    pub num_cu_per_sh: u32,
    pub num_tcc_blocks: u32,
    pub gs_vgt_table_depth: u32,
    pub gs_prim_buffer_depth: u32,
    pub max_gs_waves_per_vgt: u32,
    pub pcie_num_lanes: u32,
    pub cu_ao_bitmap: [[u32; 4]; 4],
    pub high_va_offset: u64,
    pub high_va_max: u64,
    pub pa_sc_tile_steering_override: u32,
    pub _pad: u32,
    pub tcc_disabled_mask: u64,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_amdgpu_sched_in {
    pub op: u32,
    pub fd: u32,
    pub priority: i32,
    pub ctx_id: u32,
}

pub const AMDGPU_USERQ_OP_CREATE: u32 = 1;
pub const AMDGPU_USERQ_OP_FREE: u32 = 2;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_amdgpu_userq_in {
    pub op: u32,
    pub queue_id: u32,
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

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_amdgpu_userq_out {
    pub queue_id: u32,
    pub _pad: u32,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub union drm_amdgpu_userq {
    pub in_: drm_amdgpu_userq_in,
    pub out: drm_amdgpu_userq_out,
}

impl Default for drm_amdgpu_userq {
    fn default() -> Self {
        drm_amdgpu_userq {
            in_: Default::default(),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_amdgpu_userq_signal {
    pub queue_id: u32,
    pub _pad: u32,
    pub syncobj_handles: u64,
    pub num_syncobj_handles: u64,
    pub bo_read_handles: u64,
    pub bo_write_handles: u64,
    pub num_bo_read_handles: u32,
    pub num_bo_write_handles: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_amdgpu_userq_fence_info {
    pub va: u64,
    pub value: u64,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_amdgpu_userq_wait {
    pub waitq_id: u32,
    pub _pad: u32,
    pub syncobj_handles: u64,
    pub syncobj_timeline_handles: u64,
    pub syncobj_timeline_points: u64,
    pub bo_read_handles: u64,
    pub bo_write_handles: u64,
    pub num_syncobj_timeline_handles: u16,
    pub num_fences: u16,
    pub num_syncobj_handles: u32,
    pub num_bo_read_handles: u32,
    pub num_bo_write_handles: u32,
    pub out_fences: u64,
}

macro_rules! amdgpu_iowr {
    ($nr:expr, $ty:ty) => {
        nix::request_code_readwrite!(DRM_IOCTL_BASE, DRM_COMMAND_BASE + $nr, size_of::<$ty>())
    };
}

macro_rules! amdgpu_iow {
    ($nr:expr, $ty:ty) => {
        nix::request_code_write!(DRM_IOCTL_BASE, DRM_COMMAND_BASE + $nr, size_of::<$ty>())
    };
}

pub const DRM_IOCTL_AMDGPU_GEM_CREATE: IoctlNr =
    amdgpu_iowr!(DRM_AMDGPU_GEM_CREATE, drm_amdgpu_gem_create);
pub const DRM_IOCTL_AMDGPU_GEM_MMAP: IoctlNr =
    amdgpu_iowr!(DRM_AMDGPU_GEM_MMAP, drm_amdgpu_gem_mmap);
pub const DRM_IOCTL_AMDGPU_CTX: IoctlNr = amdgpu_iowr!(DRM_AMDGPU_CTX, drm_amdgpu_ctx);
pub const DRM_IOCTL_AMDGPU_BO_LIST: IoctlNr =
    amdgpu_iowr!(DRM_AMDGPU_BO_LIST, drm_amdgpu_bo_list_in);
pub const DRM_IOCTL_AMDGPU_CS: IoctlNr = amdgpu_iowr!(DRM_AMDGPU_CS, drm_amdgpu_cs);
pub const DRM_IOCTL_AMDGPU_INFO: IoctlNr = amdgpu_iow!(DRM_AMDGPU_INFO, drm_amdgpu_info);
pub const DRM_IOCTL_AMDGPU_GEM_METADATA: IoctlNr =
    amdgpu_iowr!(DRM_AMDGPU_GEM_METADATA, drm_amdgpu_gem_metadata);
pub const DRM_IOCTL_AMDGPU_GEM_WAIT_IDLE: IoctlNr =
    amdgpu_iowr!(DRM_AMDGPU_GEM_WAIT_IDLE, drm_amdgpu_gem_wait_idle);
pub const DRM_IOCTL_AMDGPU_GEM_VA: IoctlNr = amdgpu_iow!(DRM_AMDGPU_GEM_VA, drm_amdgpu_gem_va);
pub const DRM_IOCTL_AMDGPU_WAIT_CS: IoctlNr = amdgpu_iowr!(DRM_AMDGPU_WAIT_CS, drm_amdgpu_wait_cs);
pub const DRM_IOCTL_AMDGPU_GEM_OP: IoctlNr = amdgpu_iowr!(DRM_AMDGPU_GEM_OP, drm_amdgpu_gem_op);
pub const DRM_IOCTL_AMDGPU_VM: IoctlNr = amdgpu_iowr!(DRM_AMDGPU_VM, drm_amdgpu_vm);
pub const DRM_IOCTL_AMDGPU_SCHED: IoctlNr = amdgpu_iow!(DRM_AMDGPU_SCHED, drm_amdgpu_sched_in);
pub const DRM_IOCTL_AMDGPU_USERQ: IoctlNr = amdgpu_iowr!(DRM_AMDGPU_USERQ, drm_amdgpu_userq);
pub const DRM_IOCTL_AMDGPU_USERQ_SIGNAL: IoctlNr =
    amdgpu_iowr!(DRM_AMDGPU_USERQ_SIGNAL, drm_amdgpu_userq_signal);
pub const DRM_IOCTL_AMDGPU_USERQ_WAIT: IoctlNr =
    amdgpu_iowr!(DRM_AMDGPU_USERQ_WAIT, drm_amdgpu_userq_wait);
