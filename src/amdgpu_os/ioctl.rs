// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::os::raw::c_void;

use amdgpu_sys::IoctlNr;
use nix::errno::Errno;

use crate::amdgpu_os::AsRawDescriptor;
use crate::AmdgpuResult;

// Interrupted calls never reached the driver and are restarted.
unsafe fn ioctl_restart(
    descriptor: &dyn AsRawDescriptor,
    nr: IoctlNr,
    arg: *mut c_void,
) -> AmdgpuResult<()> {
    loop {
        let ret = libc::ioctl(descriptor.as_raw_descriptor(), nr, arg);
        if ret >= 0 {
            return Ok(());
        }

        match Errno::last() {
            Errno::EINTR | Errno::EAGAIN => continue,
            e => return Err(e.into()),
        }
    }
}

/// Run an ioctl with an immutable reference.
///
/// # Safety
/// `nr` must be a request that only reads a `T` from `arg`.
pub unsafe fn ioctl_with_ref<T>(
    descriptor: &dyn AsRawDescriptor,
    nr: IoctlNr,
    arg: &T,
) -> AmdgpuResult<()> {
    ioctl_restart(descriptor, nr, arg as *const T as *mut c_void)
}

/// Run an ioctl with a mutable reference.
///
/// # Safety
/// `nr` must be a request whose argument layout is `T`. Any pointers embedded in `arg` must be
/// valid for the access the request performs.
pub unsafe fn ioctl_with_mut_ref<T>(
    descriptor: &dyn AsRawDescriptor,
    nr: IoctlNr,
    arg: &mut T,
) -> AmdgpuResult<()> {
    ioctl_restart(descriptor, nr, arg as *mut T as *mut c_void)
}
