// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! GPU contexts and their per-ring submission counters.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use amdgpu_sys::AMDGPU_CTX_OP_GET_STABLE_PSTATE;
use amdgpu_sys::AMDGPU_CTX_OP_SET_STABLE_PSTATE;
use amdgpu_sys::AMDGPU_CTX_STABLE_PSTATE_FLAGS_MASK;
use log::debug;
use log::error;

use crate::device::DeviceShared;
use crate::AmdgpuError;
use crate::AmdgpuResult;
use crate::Device;

pub(crate) struct ContextInner {
    device: Arc<DeviceShared>,
    id: u32,
    priority: i32,
    /// Next sequence number of every flat ring.
    seqnos: Vec<AtomicU64>,
    /// Set once the host context was destroyed explicitly.
    destroyed: bool,
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        {
            let mut contexts = self.device.contexts.lock().unwrap();
            // A live entry under the same id is a newer context the host reused the id for.
            if contexts
                .get(&self.id)
                .is_some_and(|weak| weak.strong_count() == 0)
            {
                contexts.remove(&self.id);
            }
        }

        if self.destroyed {
            return;
        }
        debug!("destroying context {}", self.id);
        if let Err(e) = self.device.transport.ctx_destroy(self.id) {
            error!("failed to destroy context {}: {}", self.id, e);
        }
    }
}

/// A reference-counted GPU context. Clones share the context, and the host context is destroyed
/// with the last one.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Device {
    /// Creates a context with `priority`, one of `AMDGPU_CTX_PRIORITY_*`.
    ///
    /// Unless the session allows multiple contexts, every call returns the same context while it
    /// is alive.
    pub fn create_context(&self, priority: i32) -> AmdgpuResult<Context> {
        let priority = self.shared.config.effective_priority(priority);
        let single = !self.shared.config.allow_multiple_contexts;

        if single {
            if let Some(ctx) = self.live_context() {
                return Ok(ctx);
            }
        }

        let id = self.shared.transport.ctx_create(priority)?;
        let inner = Arc::new(ContextInner {
            device: self.shared.clone(),
            id,
            priority,
            seqnos: (0..self.shared.rings.num_rings())
                .map(|_| AtomicU64::new(1))
                .collect(),
            destroyed: false,
        });

        let existing = {
            let mut contexts = self.shared.contexts.lock().unwrap();
            let existing = if single {
                contexts.values().find_map(|weak| weak.upgrade())
            } else {
                None
            };
            if existing.is_none() {
                contexts.insert(id, Arc::downgrade(&inner));
            }
            existing
        };

        match existing {
            // Lost a race with another creator. Ours is destroyed again when it drops.
            Some(existing) => Ok(Context { inner: existing }),
            None => Ok(Context { inner }),
        }
    }

    fn live_context(&self) -> Option<Context> {
        let contexts = self.shared.contexts.lock().unwrap();
        contexts
            .values()
            .find_map(|weak| weak.upgrade())
            .map(|inner| Context { inner })
    }
}

impl Context {
    pub fn id(&self) -> u32 {
        self.inner.id
    }

    pub fn priority(&self) -> i32 {
        self.inner.priority
    }

    /// Number of `Context` handles to this context.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub(crate) fn belongs_to(&self, device: &Arc<DeviceShared>) -> bool {
        Arc::ptr_eq(&self.inner.device, device)
    }

    pub(crate) fn ring_seqno(&self, ring_idx: u32) -> AmdgpuResult<&AtomicU64> {
        self.inner
            .seqnos
            .get(ring_idx as usize)
            .ok_or(AmdgpuError::InvalidArgument("ring index out of range"))
    }

    /// Takes the sequence number of the next submission on `ring_idx`. Submissions on one ring
    /// complete in order, so this is known without asking the host.
    pub fn next_seqno(&self, ring_idx: u32) -> AmdgpuResult<u64> {
        Ok(self.ring_seqno(ring_idx)?.fetch_add(1, Ordering::Relaxed))
    }

    /// `AMDGPU_CTX_QUERY2_FLAGS_*` describing resets that hit this context.
    pub fn query_reset_state(&self) -> AmdgpuResult<u64> {
        self.inner.device.transport.ctx_query_reset_state(self.inner.id)
    }

    pub fn stable_pstate(&self) -> AmdgpuResult<u32> {
        self.inner.device.transport.ctx_stable_pstate(
            self.inner.id,
            AMDGPU_CTX_OP_GET_STABLE_PSTATE,
            0,
        )
    }

    /// Pins the clocks while this context is alive. `pstate` is one of
    /// `AMDGPU_CTX_STABLE_PSTATE_*`.
    pub fn set_stable_pstate(&self, pstate: u32) -> AmdgpuResult<()> {
        if pstate & !AMDGPU_CTX_STABLE_PSTATE_FLAGS_MASK != 0 {
            return Err(AmdgpuError::InvalidArgument("unknown stable pstate"));
        }

        self.inner.device.transport.ctx_stable_pstate(
            self.inner.id,
            AMDGPU_CTX_OP_SET_STABLE_PSTATE,
            pstate,
        )?;
        Ok(())
    }

    /// Drops this handle. If it was the last one, the host context is destroyed and a failure to
    /// do so is returned instead of logged.
    pub fn destroy(self) -> AmdgpuResult<()> {
        let mut inner = match Arc::try_unwrap(self.inner) {
            Ok(inner) => inner,
            Err(_) => return Ok(()),
        };

        // The host context is gone either way, `inner` only unregisters when it drops.
        inner.destroyed = true;
        debug!("destroying context {}", inner.id);
        inner.device.transport.ctx_destroy(inner.id)
    }
}
