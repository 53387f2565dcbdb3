// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Monotonic deadlines in nanoseconds, as the kernel's amdgpu and syncobj waits expect them.

use std::time::Duration;

use log::warn;
use nix::time::clock_gettime;
use nix::time::ClockId;

use crate::AmdgpuResult;
use crate::AMDGPU_TIMEOUT_INFINITE;

const NSEC_PER_SEC: u64 = 1_000_000_000;

pub fn monotonic_now_ns() -> AmdgpuResult<u64> {
    let now = clock_gettime(ClockId::CLOCK_MONOTONIC)?;
    let secs = u64::try_from(now.tv_sec())?;
    let nsecs = u64::try_from(now.tv_nsec())?;
    Ok(secs.saturating_mul(NSEC_PER_SEC).saturating_add(nsecs))
}

/// Converts a relative timeout into an absolute monotonic deadline.
///
/// `AMDGPU_TIMEOUT_INFINITE` stays infinite. A deadline that would overflow, or a clock that
/// cannot be read, also yields infinite.
pub fn absolute_timeout(timeout_ns: u64) -> u64 {
    absolute_timeout_with(timeout_ns, monotonic_now_ns)
}

/// `absolute_timeout` against a caller-provided clock.
pub fn absolute_timeout_with<F>(timeout_ns: u64, now: F) -> u64
where
    F: FnOnce() -> AmdgpuResult<u64>,
{
    if timeout_ns == AMDGPU_TIMEOUT_INFINITE {
        return AMDGPU_TIMEOUT_INFINITE;
    }

    match now() {
        Ok(current) => current
            .checked_add(timeout_ns)
            .unwrap_or(AMDGPU_TIMEOUT_INFINITE),
        Err(e) => {
            warn!("failed to read the monotonic clock, waiting forever: {}", e);
            AMDGPU_TIMEOUT_INFINITE
        }
    }
}

/// Time left until `deadline_ns`, or `None` for an infinite deadline. A clock that cannot be
/// read also yields `None`.
pub fn remaining_timeout(deadline_ns: u64) -> Option<Duration> {
    remaining_timeout_with(deadline_ns, monotonic_now_ns)
}

fn remaining_timeout_with<F>(deadline_ns: u64, now: F) -> Option<Duration>
where
    F: FnOnce() -> AmdgpuResult<u64>,
{
    if deadline_ns == AMDGPU_TIMEOUT_INFINITE {
        return None;
    }

    match now() {
        Ok(current) => Some(Duration::from_nanos(deadline_ns.saturating_sub(current))),
        Err(e) => {
            warn!("failed to read the monotonic clock, waiting forever: {}", e);
            None
        }
    }
}
