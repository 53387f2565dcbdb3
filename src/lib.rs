// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! A user-space amdgpu device layer.
//!
//! Buffer objects, contexts, command submission and sync objects are driven either through the
//! amdgpu ioctls of a local DRM node, or through the amdgpu native-context protocol of a
//! virtio-gpu node when running as a guest. The transport is picked once per device session.

cfg_if::cfg_if! {
    if #[cfg(any(target_os = "android", target_os = "linux"))] {
        pub mod amdgpu_os;
        pub mod protocol;
        pub mod transport;

        mod amdgpu_utils;
        mod bo;
        mod config;
        mod context;
        mod cs;
        mod device;
        mod info;
        mod syncobj;
        mod userq;

        pub use crate::amdgpu_utils::*;
        pub use crate::bo::Bo;
        pub use crate::bo::BoMapping;
        pub use crate::config::DeviceConfig;
        pub use crate::config::TransportHint;
        pub use crate::config::DEFAULT_SHMEM_SIZE;
        pub use crate::context::Context;
        pub use crate::cs::fence_to_dep;
        pub use crate::cs::BoListEntry;
        pub use crate::cs::CsChunk;
        pub use crate::device::Device;
    } else {
        compile_error!("Unsupported platform");
    }
}
