// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fs::read_dir;

use nix::sys::stat::fstat;
use nix::sys::stat::major;
use nix::sys::stat::minor;
use nix::sys::stat::SFlag;

use crate::amdgpu_os::AsRawDescriptor;
use crate::AmdgpuResult;

/// Resolves the canonical name of the device behind `descriptor`.
///
/// Render and primary nodes of one GPU resolve to the same `/dev/dri/cardN`. A character device
/// without a sysfs `drm` directory is named by its device number, and anything that is not a
/// character device by its inode.
pub fn device_identity(descriptor: &dyn AsRawDescriptor) -> AmdgpuResult<String> {
    let stat = fstat(descriptor.as_raw_descriptor())?;
    if SFlag::from_bits_truncate(stat.st_mode) & SFlag::S_IFMT != SFlag::S_IFCHR {
        return Ok(format!("inode:{}:{}", stat.st_dev, stat.st_ino));
    }

    let (maj, min) = (major(stat.st_rdev), minor(stat.st_rdev));
    if let Ok(entries) = read_dir(format!("/sys/dev/char/{}:{}/device/drm", maj, min)) {
        let mut cards: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.starts_with("card"))
            .collect();
        cards.sort();
        if let Some(card) = cards.first() {
            return Ok(format!("/dev/dri/{}", card));
        }
    }

    Ok(format!("drm-char:{}:{}", maj, min))
}
