// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Device sessions.
//!
//! A session is keyed by the canonical identity of the GPU behind a descriptor, so every open of
//! one GPU in a process shares one transport, one handle table and one context table. The
//! registry only holds weak references: the session dies with its last `Device`, `Bo` or
//! `Context`.

use std::collections::BTreeMap as Map;
use std::os::fd::AsFd;
use std::os::fd::BorrowedFd;
use std::ptr;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::Weak;

use amdgpu_sys::*;
use log::debug;

use crate::amdgpu_os::absolute_timeout;
use crate::amdgpu_os::device_identity;
use crate::amdgpu_os::OwnedDescriptor;
use crate::bo::BoInner;
use crate::context::ContextInner;
use crate::info::query_struct;
use crate::transport::DrmFile;
use crate::transport::NativeTransport;
use crate::transport::Transport;
use crate::transport::VirtGpuDevice;
use crate::transport::VirtGpuDrm;
use crate::transport::VirtioTransport;
use crate::AmdgpuError;
use crate::AmdgpuResult;
use crate::CsFence;
use crate::DeviceConfig;
use crate::TransportHint;
use crate::TransportKind;
use crate::VaOp;
use crate::AMDGPU_MAX_RINGS;
use crate::AMDGPU_QUERY_FENCE_TIMEOUT_IS_ABSOLUTE;

const NUM_HW_IPS: usize = AMDGPU_HW_IP_NUM as usize;

static DEVICES: Mutex<Map<String, Weak<DeviceShared>>> = Mutex::new(Map::new());
static NEXT_COOKIE: AtomicU64 = AtomicU64::new(1);

/// Maps `(ip_type, ring)` to the flat ring index used by the virtio context. Index 0 is kept for
/// work the host runs on the CPU, so the first ring of the first IP is 1.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct RingMap {
    first: [u32; NUM_HW_IPS],
    count: [u32; NUM_HW_IPS],
    num_rings: u32,
}

impl RingMap {
    /// Builds the map from the `available_rings` mask of every IP type.
    pub fn new(available_rings: &[u32; NUM_HW_IPS]) -> AmdgpuResult<RingMap> {
        let mut first = [0; NUM_HW_IPS];
        let mut count = [0; NUM_HW_IPS];
        let mut next = 1;
        for (ip, mask) in available_rings.iter().enumerate() {
            first[ip] = next;
            count[ip] = mask.count_ones();
            next += count[ip];
        }

        if next > AMDGPU_MAX_RINGS {
            return Err(AmdgpuError::TooManyRings(next));
        }

        Ok(RingMap {
            first,
            count,
            num_rings: next,
        })
    }

    pub fn flat_index(&self, ip_type: u32, ring: u32) -> AmdgpuResult<u32> {
        match self.count.get(ip_type as usize) {
            Some(&count) if ring < count => Ok(self.first[ip_type as usize] + ring),
            _ => Err(AmdgpuError::InvalidRing { ip_type, ring }),
        }
    }

    /// Number of flat indices in use, index 0 included.
    pub fn num_rings(&self) -> u32 {
        self.num_rings
    }
}

/// State shared by every handle to one session.
pub(crate) struct DeviceShared {
    // Dropped before `descriptor`, which the transport issues its last ioctls on.
    pub(crate) transport: Box<dyn Transport>,
    descriptor: Arc<OwnedDescriptor>,
    identity: String,
    cookie: u64,
    pub(crate) config: DeviceConfig,
    pub(crate) rings: RingMap,
    pub(crate) dev_info: drm_amdgpu_info_device,
    next_blob_id: AtomicU64,
    /// Live buffer objects by GEM handle.
    pub(crate) bos: Mutex<Map<u32, Weak<BoInner>>>,
    /// Live contexts by context id.
    pub(crate) contexts: Mutex<Map<u32, Weak<ContextInner>>>,
    open_count: AtomicUsize,
}

impl DeviceShared {
    pub(crate) fn next_blob_id(&self) -> u64 {
        self.next_blob_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Drop for DeviceShared {
    fn drop(&mut self) {
        debug!("closing device session for {}", self.identity);
        let mut devices = DEVICES.lock().unwrap();
        if devices
            .get(&self.identity)
            .is_some_and(|weak| ptr::eq(weak.as_ptr(), self))
        {
            devices.remove(&self.identity);
        }
    }
}

/// An open amdgpu device.
///
/// Cloning or reopening the same GPU shares the session; `ref_count` counts those handles.
/// Buffer objects and contexts keep the session alive on their own.
pub struct Device {
    pub(crate) shared: Arc<DeviceShared>,
}

impl Clone for Device {
    fn clone(&self) -> Self {
        self.shared.open_count.fetch_add(1, Ordering::AcqRel);
        Device {
            shared: self.shared.clone(),
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.shared.open_count.fetch_sub(1, Ordering::AcqRel);
    }
}

fn connect_drm(
    descriptor: &Arc<OwnedDescriptor>,
    config: &DeviceConfig,
) -> AmdgpuResult<Box<dyn Transport>> {
    let kind = match config.transport {
        TransportHint::Native => TransportKind::Native,
        TransportHint::Virtio => TransportKind::Virtio,
        TransportHint::Auto => {
            let driver = DrmFile::new(descriptor.clone()).driver_name()?;
            match driver.as_str() {
                "amdgpu" => TransportKind::Native,
                "virtio_gpu" => TransportKind::Virtio,
                _ => return Err(AmdgpuError::UnknownDriver(driver)),
            }
        }
    };

    debug!("using the {:?} transport", kind);
    Ok(match kind {
        TransportKind::Native => Box::new(NativeTransport::new(descriptor.clone())),
        TransportKind::Virtio => Box::new(VirtioTransport::connect(
            Box::new(VirtGpuDrm::new(descriptor.clone())),
            config,
        )?),
    })
}

impl Device {
    /// Opens the GPU behind `fd`, or joins the session already open for it. `fd` is duplicated,
    /// the caller keeps ownership of theirs.
    ///
    /// When the session already exists, `config` is ignored.
    pub fn open<F: AsFd>(fd: F, config: DeviceConfig) -> AmdgpuResult<Device> {
        Self::open_with(fd.as_fd(), config, connect_drm)
    }

    /// Like `open`, but talks to the virtio-gpu kernel interface through `gpu` instead of
    /// issuing ioctls on `fd`. `fd` still decides the identity of the session.
    pub fn open_with_virtgpu<F: AsFd>(
        fd: F,
        config: DeviceConfig,
        gpu: Box<dyn VirtGpuDevice>,
    ) -> AmdgpuResult<Device> {
        Self::open_with(fd.as_fd(), config, move |_, config| {
            Ok(Box::new(VirtioTransport::connect(gpu, config)?) as Box<dyn Transport>)
        })
    }

    fn open_with<C>(fd: BorrowedFd<'_>, config: DeviceConfig, connect: C) -> AmdgpuResult<Device>
    where
        C: FnOnce(&Arc<OwnedDescriptor>, &DeviceConfig) -> AmdgpuResult<Box<dyn Transport>>,
    {
        let descriptor = fd.try_clone_to_owned()?;
        let identity = device_identity(&descriptor)?;

        let mut devices = DEVICES.lock().unwrap();
        devices.retain(|_, weak| weak.strong_count() > 0);
        if let Some(shared) = devices.get(&identity).and_then(Weak::upgrade) {
            shared.open_count.fetch_add(1, Ordering::AcqRel);
            debug!("joining device session for {}", identity);
            return Ok(Device { shared });
        }

        let descriptor = Arc::new(descriptor);
        let transport = connect(&descriptor, &config)?;

        let dev_info = query_struct(&*transport, AMDGPU_INFO_DEV_INFO, [0; 4])?;
        let mut available_rings = [0; NUM_HW_IPS];
        for (ip, rings) in available_rings.iter_mut().enumerate() {
            let hw_ip: AmdgpuResult<drm_amdgpu_info_hw_ip> =
                query_struct(&*transport, AMDGPU_INFO_HW_IP_INFO, [ip as u32, 0, 0, 0]);
            match hw_ip {
                Ok(info) => *rings = info.available_rings,
                Err(e) => debug!("hardware ip {} unavailable: {}", ip, e),
            }
        }
        let rings = RingMap::new(&available_rings)?;

        debug!(
            "opened device session for {}: {} rings",
            identity,
            rings.num_rings()
        );
        let shared = Arc::new(DeviceShared {
            transport,
            descriptor,
            identity: identity.clone(),
            cookie: NEXT_COOKIE.fetch_add(1, Ordering::Relaxed),
            config,
            rings,
            dev_info,
            next_blob_id: AtomicU64::new(1),
            bos: Mutex::new(Map::new()),
            contexts: Mutex::new(Map::new()),
            open_count: AtomicUsize::new(1),
        });
        devices.insert(identity, Arc::downgrade(&shared));
        Ok(Device { shared })
    }

    /// The session's own duplicate of the descriptor it was opened with.
    pub fn fd(&self) -> BorrowedFd<'_> {
        self.shared.descriptor.as_fd()
    }

    /// A value unique to this session among all sessions of the process.
    pub fn cookie(&self) -> u64 {
        self.shared.cookie
    }

    pub fn identity(&self) -> &str {
        &self.shared.identity
    }

    /// Number of `Device` handles to this session.
    pub fn ref_count(&self) -> usize {
        self.shared.open_count.load(Ordering::Acquire)
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.shared.transport.kind()
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.shared.config
    }

    /// Pushes out every request the transport has queued.
    pub fn flush(&self) -> AmdgpuResult<()> {
        self.shared.transport.flush()
    }

    /// Returns true once `fence` has signaled, waiting up to `timeout_ns`. With
    /// `AMDGPU_QUERY_FENCE_TIMEOUT_IS_ABSOLUTE` in `flags` the timeout is a monotonic deadline.
    pub fn query_fence_status(
        &self,
        fence: &CsFence,
        timeout_ns: u64,
        flags: u64,
    ) -> AmdgpuResult<bool> {
        if fence.seq_no == 0 {
            return Ok(true);
        }

        let deadline_ns = if flags & AMDGPU_QUERY_FENCE_TIMEOUT_IS_ABSOLUTE != 0 {
            timeout_ns
        } else {
            absolute_timeout(timeout_ns)
        };
        self.shared.transport.query_fence_status(fence, deadline_ns)
    }

    pub fn reserve_vmid(&self) -> AmdgpuResult<()> {
        self.shared.transport.vm_reserve_vmid(false)
    }

    pub fn unreserve_vmid(&self) -> AmdgpuResult<()> {
        self.shared.transport.vm_reserve_vmid(true)
    }

    /// Unmaps everything in `[va, va + size)` regardless of which buffer objects back it.
    pub fn va_clear(&self, va: u64, size: u64) -> AmdgpuResult<()> {
        let op = VaOp {
            op: AMDGPU_VA_OP_CLEAR,
            va,
            size,
            ..Default::default()
        };
        self.shared.transport.bo_va_op(None, &op)
    }
}
