// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! DRM core bindings shared by every driver: versioning, GEM handles, PRIME and syncobjs.

// Translated from include/uapi/drm/drm.h

use std::mem::size_of;
use std::os::raw::c_char;
use std::os::raw::c_int;
use std::ptr::null_mut;

use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;

use crate::IoctlNr;

pub const DRM_IOCTL_BASE: u32 = b'd' as u32;
pub const DRM_COMMAND_BASE: u32 = 0x40;

pub const DRM_CLOEXEC: u32 = libc::O_CLOEXEC as u32;
pub const DRM_RDWR: u32 = libc::O_RDWR as u32;

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct drm_version {
    pub version_major: c_int,
    pub version_minor: c_int,
    pub version_patchlevel: c_int,
    pub name_len: libc::size_t,
    pub name: *mut c_char,
    pub date_len: libc::size_t,
    pub date: *mut c_char,
    pub desc_len: libc::size_t,
    pub desc: *mut c_char,
}

impl Default for drm_version {
    fn default() -> Self {
        drm_version {
            version_major: 0,
            version_minor: 0,
            version_patchlevel: 0,
            name_len: 0,
            name: null_mut(),
            date_len: 0,
            date: null_mut(),
            desc_len: 0,
            desc: null_mut(),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct drm_gem_close {
    pub handle: u32,
    pub pad: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct drm_gem_flink {
    pub handle: u32,
    pub name: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct drm_gem_open {
    pub name: u32,
    pub handle: u32,
    pub size: u64,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_prime_handle {
    pub handle: u32,
    pub flags: u32,
    pub fd: i32,
}

pub const DRM_SYNCOBJ_CREATE_SIGNALED: u32 = 1 << 0;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_syncobj_create {
    pub handle: u32,
    pub flags: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_syncobj_destroy {
    pub handle: u32,
    pub pad: u32,
}

pub const DRM_SYNCOBJ_FD_TO_HANDLE_FLAGS_IMPORT_SYNC_FILE: u32 = 1 << 0;
pub const DRM_SYNCOBJ_HANDLE_TO_FD_FLAGS_EXPORT_SYNC_FILE: u32 = 1 << 0;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_syncobj_handle {
    pub handle: u32,
    pub flags: u32,
    pub fd: i32,
    pub pad: u32,
}

pub const DRM_SYNCOBJ_WAIT_FLAGS_WAIT_ALL: u32 = 1 << 0;
pub const DRM_SYNCOBJ_WAIT_FLAGS_WAIT_FOR_SUBMIT: u32 = 1 << 1;
pub const DRM_SYNCOBJ_WAIT_FLAGS_WAIT_AVAILABLE: u32 = 1 << 2;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_syncobj_transfer {
    pub src_handle: u32,
    pub dst_handle: u32,
    pub src_point: u64,
    pub dst_point: u64,
    pub flags: u32,
    pub pad: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_syncobj_wait {
    pub handles: u64,
    pub timeout_nsec: i64,
    pub count_handles: u32,
    pub flags: u32,
    pub first_signaled: u32,
    pub pad: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_syncobj_timeline_wait {
    pub handles: u64,
    pub points: u64,
    pub timeout_nsec: i64,
    pub count_handles: u32,
    pub flags: u32,
    pub first_signaled: u32,
    pub pad: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_syncobj_array {
    pub handles: u64,
    pub count_handles: u32,
    pub pad: u32,
}

pub const DRM_SYNCOBJ_QUERY_FLAGS_LAST_SUBMITTED: u32 = 1 << 0;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct drm_syncobj_timeline_array {
    pub handles: u64,
    pub points: u64,
    pub count_handles: u32,
    pub flags: u32,
}

macro_rules! drm_iowr {
    ($nr:expr, $ty:ty) => {
        nix::request_code_readwrite!(DRM_IOCTL_BASE, $nr, size_of::<$ty>())
    };
}

macro_rules! drm_iow {
    ($nr:expr, $ty:ty) => {
        nix::request_code_write!(DRM_IOCTL_BASE, $nr, size_of::<$ty>())
    };
}

pub const DRM_IOCTL_VERSION: IoctlNr = drm_iowr!(0x00, drm_version);
pub const DRM_IOCTL_GEM_CLOSE: IoctlNr = drm_iow!(0x09, drm_gem_close);
pub const DRM_IOCTL_GEM_FLINK: IoctlNr = drm_iowr!(0x0a, drm_gem_flink);
pub const DRM_IOCTL_GEM_OPEN: IoctlNr = drm_iowr!(0x0b, drm_gem_open);
pub const DRM_IOCTL_PRIME_HANDLE_TO_FD: IoctlNr = drm_iowr!(0x2d, drm_prime_handle);
pub const DRM_IOCTL_PRIME_FD_TO_HANDLE: IoctlNr = drm_iowr!(0x2e, drm_prime_handle);
pub const DRM_IOCTL_SYNCOBJ_CREATE: IoctlNr = drm_iowr!(0xbf, drm_syncobj_create);
pub const DRM_IOCTL_SYNCOBJ_DESTROY: IoctlNr = drm_iowr!(0xc0, drm_syncobj_destroy);
pub const DRM_IOCTL_SYNCOBJ_HANDLE_TO_FD: IoctlNr = drm_iowr!(0xc1, drm_syncobj_handle);
pub const DRM_IOCTL_SYNCOBJ_FD_TO_HANDLE: IoctlNr = drm_iowr!(0xc2, drm_syncobj_handle);
pub const DRM_IOCTL_SYNCOBJ_WAIT: IoctlNr = drm_iowr!(0xc3, drm_syncobj_wait);
pub const DRM_IOCTL_SYNCOBJ_RESET: IoctlNr = drm_iowr!(0xc4, drm_syncobj_array);
pub const DRM_IOCTL_SYNCOBJ_SIGNAL: IoctlNr = drm_iowr!(0xc5, drm_syncobj_array);
pub const DRM_IOCTL_SYNCOBJ_TIMELINE_WAIT: IoctlNr = drm_iowr!(0xca, drm_syncobj_timeline_wait);
pub const DRM_IOCTL_SYNCOBJ_QUERY: IoctlNr = drm_iowr!(0xcb, drm_syncobj_timeline_array);
pub const DRM_IOCTL_SYNCOBJ_TRANSFER: IoctlNr = drm_iowr!(0xcc, drm_syncobj_transfer);
pub const DRM_IOCTL_SYNCOBJ_TIMELINE_SIGNAL: IoctlNr = drm_iowr!(0xcd, drm_syncobj_timeline_array);
