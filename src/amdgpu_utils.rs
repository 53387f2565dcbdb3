// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Shared error type, constants and plain data types used across the crate.

use std::io::Error as IoError;
use std::num::TryFromIntError;

use nix::errno::Errno;
use remain::sorted;
use thiserror::Error;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;

use crate::amdgpu_os::OwnedDescriptor;

/// Sentinel for "never time out", shared by fence, idle and syncobj waits.
pub const AMDGPU_TIMEOUT_INFINITE: u64 = u64::MAX;

/// `query_fence_status` flag: the timeout is already an absolute monotonic deadline.
pub const AMDGPU_QUERY_FENCE_TIMEOUT_IS_ABSOLUTE: u64 = 1 << 0;

/// Upper bound on flat ring indices, ring 0 included.
pub const AMDGPU_MAX_RINGS: u32 = 64;

/// Largest UMD metadata blob attached to a buffer object, in bytes.
pub const AMDGPU_METADATA_MAX_BYTES: usize = 256;

/// An error generated while using this crate.
#[sorted]
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum AmdgpuError {
    /// The host executed the command and reported a failure.
    #[error("host rejected command {cmd}: {ret}")]
    HostError { cmd: u32, ret: i32 },
    /// A caller-supplied value is malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// A wire command or response does not have the expected size.
    #[error("invalid command size: {0}")]
    InvalidCommandSize(usize),
    /// Metadata is empty or larger than the protocol permits.
    #[error("invalid metadata size: {0} bytes")]
    InvalidMetadataSize(usize),
    /// No flat ring exists for the requested hardware IP and ring.
    #[error("no ring {ring} for hardware ip {ip_type}")]
    InvalidRing { ip_type: u32, ring: u32 },
    /// An input/output error occurred.
    #[error("an input/output error occurred: {0}")]
    IoError(IoError),
    /// A system call failed.
    #[error("the errno is {0}")]
    NixError(Errno),
    /// The transport has no host resource behind a kernel handle.
    #[error("buffer object has no backing host blob")]
    NoBackingBlob,
    /// The device exposes more rings than a flat ring index can address.
    #[error("device needs {0} rings, more than a flat ring index can address")]
    TooManyRings(u32),
    /// An attempted integer conversion failed.
    #[error("int conversion failed: {0}")]
    TryFromIntError(TryFromIntError),
    /// The DRM node is driven by something other than amdgpu or virtio_gpu.
    #[error("unsupported drm driver: {0}")]
    UnknownDriver(String),
    /// An export or import named a handle type this transport cannot produce.
    #[error("unknown handle type: {0}")]
    UnknownHandleType(u32),
    /// The operation is not available on the active transport.
    #[error("the requested function is not implemented")]
    Unsupported,
}

impl AmdgpuError {
    /// Negative errno equivalent, for callers that speak the C convention.
    pub fn errno(&self) -> i32 {
        let errno = match self {
            AmdgpuError::HostError { ret, .. } if *ret < 0 => return *ret,
            AmdgpuError::HostError { .. } => Errno::EIO,
            AmdgpuError::IoError(e) => e.raw_os_error().map(Errno::from_raw).unwrap_or(Errno::EIO),
            AmdgpuError::NixError(e) => *e,
            AmdgpuError::UnknownDriver(_) => Errno::ENODEV,
            AmdgpuError::Unsupported => Errno::EOPNOTSUPP,
            AmdgpuError::InvalidArgument(_)
            | AmdgpuError::InvalidCommandSize(_)
            | AmdgpuError::InvalidMetadataSize(_)
            | AmdgpuError::InvalidRing { .. }
            | AmdgpuError::NoBackingBlob
            | AmdgpuError::TooManyRings(_)
            | AmdgpuError::TryFromIntError(_)
            | AmdgpuError::UnknownHandleType(_) => Errno::EINVAL,
        };
        -(errno as i32)
    }
}

impl From<Errno> for AmdgpuError {
    fn from(e: Errno) -> AmdgpuError {
        AmdgpuError::NixError(e)
    }
}

impl From<IoError> for AmdgpuError {
    fn from(e: IoError) -> AmdgpuError {
        AmdgpuError::IoError(e)
    }
}

impl From<TryFromIntError> for AmdgpuError {
    fn from(e: TryFromIntError) -> AmdgpuError {
        AmdgpuError::TryFromIntError(e)
    }
}

/// The result of an operation in this crate.
pub type AmdgpuResult<T> = std::result::Result<T, AmdgpuError>;

/// Which transport a device session talks through. Fixed for the session's lifetime.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransportKind {
    Native,
    Virtio,
}

/// Parameters of a buffer object allocation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BoAllocRequest {
    pub alloc_size: u64,
    pub phys_alignment: u64,
    /// One of the `AMDGPU_GEM_DOMAIN_*` values.
    pub preferred_heap: u32,
    /// `AMDGPU_GEM_CREATE_*` flags.
    pub flags: u64,
}

/// The kernel and host identity of a buffer object's backing storage.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HostBlob {
    /// GEM handle on the session's file.
    pub handle: u32,
    /// Host resource id. Equal to `handle` on the native transport.
    pub res_id: u32,
    pub size: u64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BoMetadata {
    pub flags: u64,
    pub tiling_info: u64,
    pub size_metadata: u32,
    pub umd_metadata: [u32; 64],
}

impl Default for BoMetadata {
    fn default() -> Self {
        BoMetadata {
            flags: 0,
            tiling_info: 0,
            size_metadata: 0,
            umd_metadata: [0; 64],
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BoInfo {
    pub alloc_size: u64,
    pub phys_alignment: u64,
    pub preferred_heap: u32,
    pub alloc_flags: u64,
    pub metadata: BoMetadata,
}

/// Size and usage of one memory heap. Also the layout the host publishes in shared state.
#[repr(C)]
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, FromBytes, Immutable, IntoBytes, KnownLayout,
)]
pub struct HeapInfo {
    pub heap_size: u64,
    pub heap_usage: u64,
    pub max_allocation: u64,
}

/// How a buffer object is handed out by `Bo::export`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BoHandleType {
    /// A handle usable with this session. The host resource id on virtio.
    Kms,
    /// The GEM handle of the underlying file, never the host resource id.
    KmsNoImport,
    /// A dma-buf file descriptor for cross-process sharing.
    DmaBuf,
    /// A global GEM flink name.
    Flink,
}

impl TryFrom<u32> for BoHandleType {
    type Error = AmdgpuError;

    fn try_from(value: u32) -> AmdgpuResult<Self> {
        match value {
            0 => Ok(BoHandleType::Flink),
            1 => Ok(BoHandleType::Kms),
            2 => Ok(BoHandleType::DmaBuf),
            3 => Ok(BoHandleType::KmsNoImport),
            _ => Err(AmdgpuError::UnknownHandleType(value)),
        }
    }
}

#[derive(Debug)]
pub enum BoExport {
    Handle(u32),
    Fd(OwnedDescriptor),
}

/// An external reference to a buffer object.
#[derive(Debug)]
pub enum BoImport<'a> {
    Kms(u32),
    Flink(u32),
    DmaBuf(&'a OwnedDescriptor),
}

/// One GPU virtual address operation on a buffer object.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct VaOp {
    /// One of the `AMDGPU_VA_OP_*` values.
    pub op: u32,
    /// `AMDGPU_VM_*` page flags.
    pub flags: u32,
    pub va: u64,
    pub offset: u64,
    pub size: u64,
}

/// Identifies one submission on one ring of a context.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CsFence {
    pub ctx_id: u32,
    pub ip_type: u32,
    pub ip_instance: u32,
    pub ring: u32,
    pub seq_no: u64,
}
