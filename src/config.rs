// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Tunables of a device session, read once when the session is opened.

use std::env;
use std::str::FromStr;

use log::info;
use serde::Deserialize;
use serde::Serialize;

/// Size of the shared host state blob on the virtio transport.
pub const DEFAULT_SHMEM_SIZE: u64 = 0x4000;

const AMD_PRIORITY: &str = "AMD_PRIORITY";
const MULTIPLE_AMDGPU_CTX: &str = "MULTIPLE_AMDGPU_CTX";
const VIRTIO_SYNC_CMD: &str = "VIRTIO_SYNC_CMD";

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportHint {
    /// Pick the transport from the driver bound to the node.
    #[default]
    Auto,
    Native,
    Virtio,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default, rename_all = "kebab-case")]
pub struct DeviceConfig {
    pub transport: TransportHint,
    /// Give every context request its own host context instead of sharing one per session.
    pub allow_multiple_contexts: bool,
    /// Replaces the priority of every context created through the session.
    pub priority_override: Option<i32>,
    /// Bit N makes wire opcode N synchronous.
    pub sync_cmd_mask: u64,
    pub shmem_size: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            transport: TransportHint::Auto,
            allow_multiple_contexts: false,
            priority_override: None,
            sync_cmd_mask: 0,
            shmem_size: DEFAULT_SHMEM_SIZE,
        }
    }
}

impl DeviceConfig {
    /// Reads `AMD_PRIORITY`, `MULTIPLE_AMDGPU_CTX` and `VIRTIO_SYNC_CMD`. Malformed values are
    /// ignored and leave the default in place.
    pub fn from_env() -> DeviceConfig {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> DeviceConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = DeviceConfig::default();
        if let Some(priority) = lookup(AMD_PRIORITY).and_then(|v| parse_c_int(&v)) {
            config.priority_override = i32::try_from(priority).ok();
        }

        if let Some(multiple) = lookup(MULTIPLE_AMDGPU_CTX).and_then(|v| parse_bool(&v)) {
            config.allow_multiple_contexts = multiple;
        }

        if let Some(mask) = lookup(VIRTIO_SYNC_CMD).and_then(|v| parse_c_int(&v)) {
            config.sync_cmd_mask = mask as u64;
        }

        config
    }

    /// Whether requests with wire opcode `cmd` wait for the host before returning.
    pub fn is_sync_cmd(&self, cmd: u32) -> bool {
        cmd < u64::BITS && self.sync_cmd_mask & (1 << cmd) != 0
    }

    /// The priority a context is actually created with.
    pub fn effective_priority(&self, requested: i32) -> i32 {
        match self.priority_override {
            Some(priority) if priority != requested => {
                info!(
                    "context priority overridden from {} to {}",
                    requested, priority
                );
                priority
            }
            _ => requested,
        }
    }
}

impl FromStr for DeviceConfig {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(input).map_err(|e| e.to_string())
    }
}

/// Parses the leading integer of `s` the way `scanf("%i")` does: optional sign, then `0x` hex,
/// `0` octal or decimal digits. Trailing characters are ignored.
fn parse_c_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, s) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let (radix, digits) = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
    {
        if hex.starts_with(|c: char| c.is_ascii_hexdigit()) {
            (16, hex)
        } else {
            // "0x" without hex digits scans as the octal zero.
            (8, &s[..1])
        }
    } else if s.starts_with('0') {
        (8, s)
    } else {
        (10, s)
    };

    let end = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let value = i64::from_str_radix(&digits[..end], radix).ok()?;
    Some(if negative { -value } else { value })
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "y" | "yes" | "t" | "true" | "on" => Some(true),
        "0" | "n" | "no" | "f" | "false" | "off" => Some(false),
        _ => None,
    }
}
