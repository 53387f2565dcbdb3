// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

mod descriptor;
mod drm_node;
mod ioctl;
mod memory_mapping;
mod shm;
mod time;

pub use descriptor::AsRawDescriptor;
pub use descriptor::FromRawDescriptor;
pub use descriptor::OwnedDescriptor;
pub use descriptor::RawDescriptor;
pub use drm_node::device_identity;
pub use ioctl::ioctl_with_mut_ref;
pub use ioctl::ioctl_with_ref;
pub use memory_mapping::MemoryMapping;
pub use shm::SharedMemory;
pub use time::absolute_timeout;
pub use time::absolute_timeout_with;
pub use time::monotonic_now_ns;
pub use time::remaining_timeout;
