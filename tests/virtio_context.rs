// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

mod fake_virtgpu;

use std::sync::Mutex;
use std::thread;

use amdgpu_sys::*;
use amdvgpu::protocol::AMDGPU_CCMD_CREATE_CTX;
use amdvgpu::AmdgpuError;
use amdvgpu::CsChunk;
use amdvgpu::DeviceConfig;

fn multiple_contexts() -> DeviceConfig {
    DeviceConfig {
        allow_multiple_contexts: true,
        ..Default::default()
    }
}

fn gfx_ib() -> drm_amdgpu_cs_chunk_ib {
    drm_amdgpu_cs_chunk_ib {
        va_start: 0x40_0000,
        ib_bytes: 256,
        ip_type: AMDGPU_HW_IP_GFX,
        ring: 0,
        ..Default::default()
    }
}

#[test]
fn one_context_per_session_by_default() {
    let (device, host, _node) = fake_virtgpu::open_default();

    let first = device.create_context(AMDGPU_CTX_PRIORITY_NORMAL).unwrap();
    let second = device.create_context(AMDGPU_CTX_PRIORITY_HIGH).unwrap();
    assert_eq!(first.id(), second.id());
    assert_eq!(first.ref_count(), 2);
    assert_eq!(host.live_contexts().len(), 1);

    let id = first.id();
    drop(first);
    drop(second);
    device.flush().unwrap();
    assert_eq!(host.destroyed_contexts(), vec![id]);

    // With the shared context gone, the next request creates a new one.
    let third = device.create_context(AMDGPU_CTX_PRIORITY_NORMAL).unwrap();
    assert_ne!(third.id(), id);
}

#[test]
fn multiple_contexts_when_allowed() {
    let (device, host, _node) = fake_virtgpu::open(multiple_contexts());

    let low = device.create_context(AMDGPU_CTX_PRIORITY_LOW).unwrap();
    let high = device.create_context(AMDGPU_CTX_PRIORITY_HIGH).unwrap();
    assert_ne!(low.id(), high.id());
    assert_eq!(low.ref_count(), 1);
    assert_eq!(
        host.live_contexts(),
        vec![
            (low.id(), AMDGPU_CTX_PRIORITY_LOW),
            (high.id(), AMDGPU_CTX_PRIORITY_HIGH)
        ]
    );
}

#[test]
fn priority_override_applies_to_every_context() {
    let (device, host, _node) = fake_virtgpu::open(DeviceConfig {
        priority_override: Some(AMDGPU_CTX_PRIORITY_VERY_HIGH),
        ..multiple_contexts()
    });

    let ctx = device.create_context(AMDGPU_CTX_PRIORITY_NORMAL).unwrap();
    assert_eq!(ctx.priority(), AMDGPU_CTX_PRIORITY_VERY_HIGH);
    assert_eq!(
        host.live_contexts(),
        vec![(ctx.id(), AMDGPU_CTX_PRIORITY_VERY_HIGH)]
    );
}

#[test]
fn host_failure_to_create_a_context() {
    let (device, host, _node) = fake_virtgpu::open_default();
    host.fail_ctx_create(true);

    let err = device
        .create_context(AMDGPU_CTX_PRIORITY_NORMAL)
        .err()
        .unwrap();
    assert!(matches!(
        err,
        AmdgpuError::HostError { cmd, ret }
            if cmd == AMDGPU_CCMD_CREATE_CTX && ret == -libc::ENOMEM
    ));
    assert_eq!(err.errno(), -libc::ENOMEM);
    assert!(host.live_contexts().is_empty());

    host.fail_ctx_create(false);
    assert!(device.create_context(AMDGPU_CTX_PRIORITY_NORMAL).is_ok());
}

#[test]
fn explicit_destroy() {
    let (device, host, _node) = fake_virtgpu::open_default();

    let ctx = device.create_context(AMDGPU_CTX_PRIORITY_NORMAL).unwrap();
    let clone = ctx.clone();
    let id = ctx.id();

    // Another handle is still alive, so nothing happens yet.
    ctx.destroy().unwrap();
    device.flush().unwrap();
    assert!(host.destroyed_contexts().is_empty());

    clone.destroy().unwrap();
    device.flush().unwrap();
    assert_eq!(host.destroyed_contexts(), vec![id]);
    assert!(host.live_contexts().is_empty());
}

#[test]
fn reset_state_comes_from_shared_state() {
    let (device, host, _node) = fake_virtgpu::open_default();
    let ctx = device.create_context(AMDGPU_CTX_PRIORITY_NORMAL).unwrap();
    assert_eq!(ctx.query_reset_state().unwrap(), 0);

    let execbuffers = host.execbuffer_count();
    host.report_async_error();
    let flags = ctx.query_reset_state().unwrap();
    assert_eq!(
        flags,
        AMDGPU_CTX_QUERY2_FLAGS_RESET | AMDGPU_CTX_QUERY2_FLAGS_VRAMLOST
    );
    // Asking again keeps reporting the reset.
    assert_eq!(ctx.query_reset_state().unwrap(), flags);
    assert_eq!(host.execbuffer_count(), execbuffers);
}

#[test]
fn stable_pstate() {
    let (device, _host, _node) = fake_virtgpu::open_default();
    let ctx = device.create_context(AMDGPU_CTX_PRIORITY_NORMAL).unwrap();

    assert_eq!(ctx.stable_pstate().unwrap(), AMDGPU_CTX_STABLE_PSTATE_NONE);
    ctx.set_stable_pstate(AMDGPU_CTX_STABLE_PSTATE_PEAK).unwrap();
    assert_eq!(ctx.stable_pstate().unwrap(), AMDGPU_CTX_STABLE_PSTATE_PEAK);
    assert!(matches!(
        ctx.set_stable_pstate(0x10),
        Err(AmdgpuError::InvalidArgument(_))
    ));
}

#[test]
fn next_seqno_counts_per_ring() {
    let (device, _host, _node) = fake_virtgpu::open_default();
    let ctx = device.create_context(AMDGPU_CTX_PRIORITY_NORMAL).unwrap();

    assert_eq!(ctx.next_seqno(1).unwrap(), 1);
    assert_eq!(ctx.next_seqno(1).unwrap(), 2);
    assert_eq!(ctx.next_seqno(2).unwrap(), 1);
    // One gfx, four compute and two dma rings after ring 0.
    assert!(ctx.next_seqno(7).is_ok());
    assert!(matches!(
        ctx.next_seqno(8),
        Err(AmdgpuError::InvalidArgument(_))
    ));
}

#[test]
fn concurrent_submissions_get_unique_ordered_seqnos() {
    const THREADS: usize = 8;
    const SUBMITS: usize = 50;

    let (device, host, _node) = fake_virtgpu::open_default();
    let ctx = device.create_context(AMDGPU_CTX_PRIORITY_NORMAL).unwrap();
    let seqnos = Mutex::new(Vec::new());

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for _ in 0..SUBMITS {
                    let seqno = device.submit(&ctx, &[CsChunk::Ib(gfx_ib())]).unwrap();
                    seqnos.lock().unwrap().push(seqno);
                }
            });
        }
    });

    let mut seqnos = seqnos.into_inner().unwrap();
    seqnos.sort_unstable();
    let expected: Vec<u64> = (1..=(THREADS * SUBMITS) as u64).collect();
    assert_eq!(seqnos, expected);

    // The host saw the submissions in the order their sequence numbers were handed out.
    let submissions = host.submissions();
    assert_eq!(submissions.len(), THREADS * SUBMITS);
    assert!(submissions.windows(2).all(|w| w[0].seqno < w[1].seqno));
    assert!(submissions
        .iter()
        .all(|s| s.ring_idx == 1 && s.exec_ring_idx == Some(1)));
}
