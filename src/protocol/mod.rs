// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The amdgpu native-context protocol spoken between the guest shim and the host renderer over
//! virtio-gpu.

mod amdgpu_protocol;
mod shmem;

pub use amdgpu_protocol::*;
pub use shmem::HostSharedState;
pub use shmem::SharedHeap;
