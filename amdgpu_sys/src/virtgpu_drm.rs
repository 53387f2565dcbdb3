// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

// Translated from include/uapi/drm/virtgpu_drm.h

use std::mem::size_of;

use crate::drm::DRM_COMMAND_BASE;
use crate::drm::DRM_IOCTL_BASE;
use crate::IoctlNr;

pub const DRM_VIRTGPU_MAP: u32 = 0x01;
pub const DRM_VIRTGPU_EXECBUFFER: u32 = 0x02;
pub const DRM_VIRTGPU_GETPARAM: u32 = 0x03;
pub const DRM_VIRTGPU_RESOURCE_CREATE: u32 = 0x04;
pub const DRM_VIRTGPU_RESOURCE_INFO: u32 = 0x05;
pub const DRM_VIRTGPU_TRANSFER_FROM_HOST: u32 = 0x06;
pub const DRM_VIRTGPU_TRANSFER_TO_HOST: u32 = 0x07;
pub const DRM_VIRTGPU_WAIT: u32 = 0x08;
pub const DRM_VIRTGPU_GET_CAPS: u32 = 0x09;
pub const DRM_VIRTGPU_RESOURCE_CREATE_BLOB: u32 = 0x0a;
pub const DRM_VIRTGPU_CONTEXT_INIT: u32 = 0x0b;

pub const VIRTGPU_EXECBUF_FENCE_FD_IN: u32 = 0x01;
pub const VIRTGPU_EXECBUF_FENCE_FD_OUT: u32 = 0x02;
pub const VIRTGPU_EXECBUF_RING_IDX: u32 = 0x04;
pub const VIRTGPU_EXECBUF_SHAREABLE_IN: u32 = 0x08;
pub const VIRTGPU_EXECBUF_FLAGS: u32 = VIRTGPU_EXECBUF_FENCE_FD_IN
    | VIRTGPU_EXECBUF_FENCE_FD_OUT
    | VIRTGPU_EXECBUF_RING_IDX
    | VIRTGPU_EXECBUF_SHAREABLE_IN;

pub const VIRTGPU_EXECBUF_SYNCOBJ_RESET: u32 = 0x01;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_virtgpu_execbuffer_syncobj {
    pub handle: u32,
    pub flags: u32,
    pub point: u64,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_virtgpu_execbuffer {
    pub flags: u32,
    pub size: u32,
    pub command: u64,
    pub bo_handles: u64,
    pub num_bo_handles: u32,
    pub fence_fd: i32,
    pub ring_idx: u32,
    pub syncobj_stride: u32,
    pub num_in_syncobjs: u32,
    pub num_out_syncobjs: u32,
    pub in_syncobjs: u64,
    pub out_syncobjs: u64,
}

pub const VIRTGPU_PARAM_3D_FEATURES: u64 = 1;
pub const VIRTGPU_PARAM_CAPSET_QUERY_FIX: u64 = 2;
pub const VIRTGPU_PARAM_RESOURCE_BLOB: u64 = 3;
pub const VIRTGPU_PARAM_HOST_VISIBLE: u64 = 4;
pub const VIRTGPU_PARAM_CROSS_DEVICE: u64 = 5;
pub const VIRTGPU_PARAM_CONTEXT_INIT: u64 = 6;
pub const VIRTGPU_PARAM_SUPPORTED_CAPSET_IDS: u64 = 7;
pub const VIRTGPU_PARAM_EXPLICIT_DEBUG_NAME: u64 = 8;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_virtgpu_getparam {
    pub param: u64,
    pub value: u64,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_virtgpu_map {
    pub offset: u64,
    pub handle: u32,
    pub pad: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_virtgpu_resource_info {
    pub bo_handle: u32,
    pub res_handle: u32,
    pub size: u32,
    pub blob_mem: u32,
}

pub const VIRTGPU_WAIT_NOWAIT: u32 = 1;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_virtgpu_3d_wait {
    pub handle: u32,
    pub flags: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_virtgpu_get_caps {
    pub cap_set_id: u32,
    pub cap_set_ver: u32,
    pub addr: u64,
    pub size: u32,
    pub pad: u32,
}

pub const VIRTGPU_BLOB_MEM_GUEST: u32 = 0x0001;
pub const VIRTGPU_BLOB_MEM_HOST3D: u32 = 0x0002;
pub const VIRTGPU_BLOB_MEM_HOST3D_GUEST: u32 = 0x0003;

pub const VIRTGPU_BLOB_FLAG_USE_MAPPABLE: u32 = 0x0001;
pub const VIRTGPU_BLOB_FLAG_USE_SHAREABLE: u32 = 0x0002;
pub const VIRTGPU_BLOB_FLAG_USE_CROSS_DEVICE: u32 = 0x0004;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_virtgpu_resource_create_blob {
    pub blob_mem: u32,
    pub blob_flags: u32,
    pub bo_handle: u32,
    pub res_handle: u32,
    pub size: u64,
    pub pad: u32,
    pub cmd_size: u32,
    pub cmd: u64,
    pub blob_id: u64,
}

pub const VIRTGPU_CONTEXT_PARAM_CAPSET_ID: u64 = 0x0001;
pub const VIRTGPU_CONTEXT_PARAM_NUM_RINGS: u64 = 0x0002;
pub const VIRTGPU_CONTEXT_PARAM_POLL_RINGS_MASK: u64 = 0x0003;
pub const VIRTGPU_CONTEXT_PARAM_DEBUG_NAME: u64 = 0x0004;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_virtgpu_context_set_param {
    pub param: u64,
    pub value: u64,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_virtgpu_context_init {
    pub num_params: u32,
    pub pad: u32,
    pub ctx_set_params: u64,
}

/// Capset id of the generic DRM native-context protocol.
pub const VIRTGPU_DRM_CAPSET_DRM: u32 = 6;

macro_rules! virtgpu_iowr {
    ($nr:expr, $ty:ty) => {
        nix::request_code_readwrite!(DRM_IOCTL_BASE, DRM_COMMAND_BASE + $nr, size_of::<$ty>())
    };
}

pub const DRM_IOCTL_VIRTGPU_MAP: IoctlNr = virtgpu_iowr!(DRM_VIRTGPU_MAP, drm_virtgpu_map);
pub const DRM_IOCTL_VIRTGPU_EXECBUFFER: IoctlNr =
    virtgpu_iowr!(DRM_VIRTGPU_EXECBUFFER, drm_virtgpu_execbuffer);
pub const DRM_IOCTL_VIRTGPU_GETPARAM: IoctlNr =
    virtgpu_iowr!(DRM_VIRTGPU_GETPARAM, drm_virtgpu_getparam);
pub const DRM_IOCTL_VIRTGPU_RESOURCE_INFO: IoctlNr =
    virtgpu_iowr!(DRM_VIRTGPU_RESOURCE_INFO, drm_virtgpu_resource_info);
pub const DRM_IOCTL_VIRTGPU_WAIT: IoctlNr = virtgpu_iowr!(DRM_VIRTGPU_WAIT, drm_virtgpu_3d_wait);
pub const DRM_IOCTL_VIRTGPU_GET_CAPS: IoctlNr =
    virtgpu_iowr!(DRM_VIRTGPU_GET_CAPS, drm_virtgpu_get_caps);
pub const DRM_IOCTL_VIRTGPU_RESOURCE_CREATE_BLOB: IoctlNr = virtgpu_iowr!(
    DRM_VIRTGPU_RESOURCE_CREATE_BLOB,
    drm_virtgpu_resource_create_blob
);
pub const DRM_IOCTL_VIRTGPU_CONTEXT_INIT: IoctlNr =
    virtgpu_iowr!(DRM_VIRTGPU_CONTEXT_INIT, drm_virtgpu_context_init);
