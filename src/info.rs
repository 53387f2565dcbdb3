// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! `AMDGPU_INFO` queries.

use amdgpu_sys::*;
use zerocopy::FromBytes;
use zerocopy::IntoBytes;

use crate::transport::Transport;
use crate::AmdgpuError;
use crate::AmdgpuResult;
use crate::Device;
use crate::HeapInfo;

/// Runs `query` with the four query-specific words in `value` and decodes the result as `T`.
pub(crate) fn query_struct<T>(
    transport: &dyn Transport,
    query: u32,
    value: [u32; 4],
) -> AmdgpuResult<T>
where
    T: FromBytes + IntoBytes,
{
    let info = drm_amdgpu_info {
        query,
        value,
        ..Default::default()
    };
    let mut out = T::new_zeroed();
    transport.query_info(&info, out.as_mut_bytes())?;
    Ok(out)
}

impl Device {
    /// Runs an arbitrary query. `out` receives at most `out.len()` bytes of the result.
    pub fn query_info(&self, query: u32, value: [u32; 4], out: &mut [u8]) -> AmdgpuResult<()> {
        let info = drm_amdgpu_info {
            query,
            value,
            ..Default::default()
        };
        self.shared.transport.query_info(&info, out)
    }

    /// Device info as read when the session was opened.
    pub fn device_info(&self) -> &drm_amdgpu_info_device {
        &self.shared.dev_info
    }

    pub fn hw_ip_info(
        &self,
        ip_type: u32,
        ip_instance: u32,
    ) -> AmdgpuResult<drm_amdgpu_info_hw_ip> {
        query_struct(
            &*self.shared.transport,
            AMDGPU_INFO_HW_IP_INFO,
            [ip_type, ip_instance, 0, 0],
        )
    }

    /// Number of instances of `ip_type`.
    pub fn hw_ip_count(&self, ip_type: u32) -> AmdgpuResult<u32> {
        query_struct(
            &*self.shared.transport,
            AMDGPU_INFO_HW_IP_COUNT,
            [ip_type, 0, 0, 0],
        )
    }

    /// Returns `(version, feature)` of one firmware.
    pub fn firmware_version(
        &self,
        fw_type: u32,
        ip_instance: u32,
        index: u32,
    ) -> AmdgpuResult<(u32, u32)> {
        let fw: drm_amdgpu_info_firmware = query_struct(
            &*self.shared.transport,
            AMDGPU_INFO_FW_VERSION,
            [fw_type, ip_instance, index, 0],
        )?;
        Ok((fw.ver, fw.feature))
    }

    pub fn sensor_info(&self, sensor_type: u32) -> AmdgpuResult<u32> {
        query_struct(
            &*self.shared.transport,
            AMDGPU_INFO_SENSOR,
            [sensor_type, 0, 0, 0],
        )
    }

    /// Reads `count` consecutive registers starting at `dword_offset`. `instance` selects the
    /// shader engine and array, `0xffffffff` broadcasts.
    pub fn read_mm_registers(
        &self,
        dword_offset: u32,
        count: u32,
        instance: u32,
        flags: u32,
    ) -> AmdgpuResult<Vec<u32>> {
        if count == 0 {
            return Err(AmdgpuError::InvalidArgument("no registers to read"));
        }

        let mut values = vec![0u32; count.try_into()?];
        self.query_info(
            AMDGPU_INFO_READ_MMR_REG,
            [dword_offset, count, instance, flags],
            values.as_mut_bytes(),
        )?;
        Ok(values)
    }

    pub fn vram_gtt_info(&self) -> AmdgpuResult<drm_amdgpu_info_vram_gtt> {
        query_struct(&*self.shared.transport, AMDGPU_INFO_VRAM_GTT, [0; 4])
    }

    /// Size and usage of the heap `heap` (`AMDGPU_GEM_DOMAIN_VRAM` or `AMDGPU_GEM_DOMAIN_GTT`).
    /// `AMDGPU_GEM_CREATE_CPU_ACCESS_REQUIRED` in `flags` narrows VRAM to its CPU-visible part.
    pub fn heap_info(&self, heap: u32, flags: u64) -> AmdgpuResult<HeapInfo> {
        self.shared.transport.heap_info(heap, flags)
    }
}
