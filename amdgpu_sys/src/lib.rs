// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Linux DRM, amdgpu and virtio-gpu uAPI bindings.

#![cfg(any(target_os = "android", target_os = "linux"))]
#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]

pub mod amdgpu_drm;
pub mod drm;
pub mod virtgpu_drm;

pub use crate::amdgpu_drm::*;
pub use crate::drm::*;
pub use crate::virtgpu_drm::*;

/// Type of an ioctl request code on this platform.
pub type IoctlNr = nix::sys::ioctl::ioctl_num_type;
