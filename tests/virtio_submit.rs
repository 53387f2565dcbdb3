// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

mod fake_virtgpu;

use amdgpu_sys::*;
use amdvgpu::amdgpu_os::monotonic_now_ns;
use amdvgpu::protocol::AMDGPU_CCMD_CS_SUBMIT;
use amdvgpu::AmdgpuError;
use amdvgpu::BoAllocRequest;
use amdvgpu::BoListEntry;
use amdvgpu::CsChunk;
use amdvgpu::CsFence;
use amdvgpu::DeviceConfig;
use amdvgpu::AMDGPU_QUERY_FENCE_TIMEOUT_IS_ABSOLUTE;
use amdvgpu::AMDGPU_TIMEOUT_INFINITE;

fn ib(ip_type: u32, ring: u32) -> drm_amdgpu_cs_chunk_ib {
    drm_amdgpu_cs_chunk_ib {
        va_start: 0x40_0000,
        ib_bytes: 256,
        ip_type,
        ring,
        ..Default::default()
    }
}

fn gfx_fence(ctx_id: u32, seq_no: u64) -> CsFence {
    CsFence {
        ctx_id,
        ip_type: AMDGPU_HW_IP_GFX,
        ip_instance: 0,
        ring: 0,
        seq_no,
    }
}

#[test]
fn submission_reaches_the_host_ring() {
    let (device, host, _node) = fake_virtgpu::open_default();
    let ctx = device.create_context(AMDGPU_CTX_PRIORITY_NORMAL).unwrap();
    let bo = device
        .alloc(&BoAllocRequest {
            alloc_size: 0x1000,
            preferred_heap: AMDGPU_GEM_DOMAIN_GTT,
            ..Default::default()
        })
        .unwrap();

    let bo_list = [BoListEntry { bo: &bo, priority: 0 }];
    let wait = [drm_amdgpu_cs_chunk_sem { handle: 11 }];
    let signal = [drm_amdgpu_cs_chunk_sem { handle: 12 }];
    let timeline = [drm_amdgpu_cs_chunk_syncobj {
        handle: 13,
        flags: 0,
        point: 7,
    }];
    let chunks = [
        CsChunk::BoHandles(&bo_list),
        CsChunk::Ib(ib(AMDGPU_HW_IP_COMPUTE, 2)),
        CsChunk::SyncobjIn(&wait),
        CsChunk::SyncobjOut(&signal),
        CsChunk::TimelineSignal(&timeline),
    ];

    assert_eq!(device.submit(&ctx, &chunks).unwrap(), 1);
    assert_eq!(device.submit(&ctx, &chunks).unwrap(), 2);

    let submissions = host.submissions();
    assert_eq!(submissions.len(), 2);
    let sub = &submissions[0];
    assert_eq!(sub.ctx_id, ctx.id());
    // Ring 0 is reserved, gfx takes 1 and compute starts at 2.
    assert_eq!(sub.ring_idx, 4);
    assert_eq!(sub.exec_ring_idx, Some(4));
    // Syncobjs ride on the execbuffer rather than in the request.
    assert_eq!(
        sub.chunk_ids,
        vec![AMDGPU_CHUNK_ID_BO_HANDLES, AMDGPU_CHUNK_ID_IB]
    );
    assert_eq!(sub.in_syncobjs, vec![(11, 0)]);
    assert_eq!(sub.out_syncobjs, vec![(12, 0), (13, 7)]);
}

#[test]
fn seqnos_are_per_ring() {
    let (device, _host, _node) = fake_virtgpu::open_default();
    let ctx = device.create_context(AMDGPU_CTX_PRIORITY_NORMAL).unwrap();

    let gfx = [CsChunk::Ib(ib(AMDGPU_HW_IP_GFX, 0))];
    let dma = [CsChunk::Ib(ib(AMDGPU_HW_IP_DMA, 1))];
    assert_eq!(device.submit(&ctx, &gfx).unwrap(), 1);
    assert_eq!(device.submit(&ctx, &dma).unwrap(), 1);
    assert_eq!(device.submit(&ctx, &gfx).unwrap(), 2);
}

#[test]
fn invalid_submissions() {
    let (device, host, _node) = fake_virtgpu::open(DeviceConfig {
        allow_multiple_contexts: true,
        ..Default::default()
    });
    let ctx = device.create_context(AMDGPU_CTX_PRIORITY_NORMAL).unwrap();

    assert!(matches!(
        device.submit(&ctx, &[CsChunk::Ib(ib(AMDGPU_HW_IP_DMA, 5))]),
        Err(AmdgpuError::InvalidRing { ip_type, ring: 5 }) if ip_type == AMDGPU_HW_IP_DMA
    ));
    assert!(matches!(
        device.submit(&ctx, &[]),
        Err(AmdgpuError::InvalidArgument(_))
    ));
    assert!(matches!(
        device.submit(
            &ctx,
            &[
                CsChunk::Ib(ib(AMDGPU_HW_IP_GFX, 0)),
                CsChunk::Ib(ib(AMDGPU_HW_IP_COMPUTE, 0)),
            ]
        ),
        Err(AmdgpuError::InvalidArgument(_))
    ));

    let (other, _other_host, _other_node) = fake_virtgpu::open_default();
    let foreign = other.create_context(AMDGPU_CTX_PRIORITY_NORMAL).unwrap();
    assert!(matches!(
        device.submit(&foreign, &[CsChunk::Ib(ib(AMDGPU_HW_IP_GFX, 0))]),
        Err(AmdgpuError::InvalidArgument(_))
    ));

    assert!(host.submissions().is_empty());
}

#[test]
fn synchronous_submission() {
    let (device, host, _node) = fake_virtgpu::open(DeviceConfig {
        sync_cmd_mask: 1 << AMDGPU_CCMD_CS_SUBMIT,
        ..Default::default()
    });
    let ctx = device.create_context(AMDGPU_CTX_PRIORITY_NORMAL).unwrap();

    let seqno = device
        .submit(&ctx, &[CsChunk::Ib(ib(AMDGPU_HW_IP_GFX, 0))])
        .unwrap();
    assert_eq!(seqno, 1);
    assert_eq!(host.submissions().len(), 1);
}

#[test]
fn seqno_zero_is_always_signaled() {
    let (device, host, _node) = fake_virtgpu::open_default();
    let execbuffers = host.execbuffer_count();

    assert!(device
        .query_fence_status(&gfx_fence(1, 0), AMDGPU_TIMEOUT_INFINITE, 0)
        .unwrap());
    assert_eq!(host.execbuffer_count(), execbuffers);
    assert!(host.fence_queries().is_empty());
}

#[test]
fn fence_status_sends_the_time_left() {
    let (device, host, _node) = fake_virtgpu::open_default();
    let ctx = device.create_context(AMDGPU_CTX_PRIORITY_NORMAL).unwrap();
    let seqno = device
        .submit(&ctx, &[CsChunk::Ib(ib(AMDGPU_HW_IP_GFX, 0))])
        .unwrap();

    let one_second = 1_000_000_000;
    assert!(device
        .query_fence_status(&gfx_fence(ctx.id(), seqno), one_second, 0)
        .unwrap());
    assert!(!device
        .query_fence_status(&gfx_fence(ctx.id(), seqno + 1), 0, 0)
        .unwrap());

    device
        .query_fence_status(&gfx_fence(ctx.id(), seqno), AMDGPU_TIMEOUT_INFINITE, 0)
        .unwrap();
    // A deadline already in the past leaves no time at all.
    let past = monotonic_now_ns().unwrap();
    device
        .query_fence_status(
            &gfx_fence(ctx.id(), seqno),
            past,
            AMDGPU_QUERY_FENCE_TIMEOUT_IS_ABSOLUTE,
        )
        .unwrap();

    let queries = host.fence_queries();
    assert_eq!(queries.len(), 4);
    assert_eq!(queries[0].ctx_id, ctx.id());
    assert_eq!(queries[0].ip_type, AMDGPU_HW_IP_GFX);
    assert_eq!(queries[0].fence, seqno);
    assert!(queries[0].timeout_ns > 0 && queries[0].timeout_ns <= one_second);
    assert_eq!(queries[0].flags, 0);
    assert_eq!(queries[1].timeout_ns, 0);
    assert_eq!(queries[2].timeout_ns, AMDGPU_TIMEOUT_INFINITE);
    assert_eq!(queries[3].timeout_ns, 0);
}

#[test]
fn timeline_point_export_goes_through_a_temporary() {
    let (device, host, _node) = fake_virtgpu::open_default();
    let syncobj = device.syncobj_create(0).unwrap();

    device.syncobj_export_sync_file2(syncobj, 5).unwrap();
    assert_eq!(
        host.syncobj_ops(),
        vec![
            "create 1 0",
            "create 2 0",
            "transfer 2@0 <- 1@5",
            "export-sync-file 2",
            "destroy 2",
        ]
    );

    device.syncobj_export_sync_file2(syncobj, 0).unwrap();
    assert_eq!(host.syncobj_ops().last().unwrap(), "export-sync-file 1");
}

#[test]
fn timeline_point_import_goes_through_a_temporary() {
    let (device, host, _node) = fake_virtgpu::open_default();
    let syncobj = device.syncobj_create(0).unwrap();
    let sync_file = device.syncobj_export_sync_file(syncobj).unwrap();

    device
        .syncobj_import_sync_file2(syncobj, 3, &sync_file)
        .unwrap();
    assert_eq!(
        host.syncobj_ops()[2..],
        [
            "create 2 0",
            "import-sync-file 2",
            "transfer 1@3 <- 2@0",
            "destroy 2",
        ]
    );
    assert_eq!(device.syncobj_query(&[syncobj], 0).unwrap(), vec![3]);
}

#[test]
fn syncobj_waits_use_absolute_deadlines() {
    let (device, host, _node) = fake_virtgpu::open_default();
    let syncobj = device.syncobj_create(0).unwrap();

    device
        .syncobj_wait(&[syncobj], AMDGPU_TIMEOUT_INFINITE, 0)
        .unwrap();
    assert_eq!(host.last_syncobj_deadline(), Some(i64::MAX));

    let before = monotonic_now_ns().unwrap() as i64;
    device.syncobj_wait(&[syncobj], 1_000_000, 0).unwrap();
    let deadline = host.last_syncobj_deadline().unwrap();
    assert!(deadline >= before + 1_000_000);
    assert!(deadline < i64::MAX);
}

#[test]
fn timeline_signal_and_wait() {
    let (device, _host, _node) = fake_virtgpu::open_default();
    let a = device.syncobj_create(0).unwrap();
    let b = device.syncobj_create(0).unwrap();

    device.syncobj_timeline_signal(&[a, b], &[4, 9]).unwrap();
    assert_eq!(device.syncobj_query(&[a, b], 0).unwrap(), vec![4, 9]);
    assert_eq!(
        device
            .syncobj_timeline_wait(&[a, b], &[5, 9], 0, 0)
            .unwrap(),
        1
    );

    device.syncobj_destroy(a).unwrap();
    assert!(device.syncobj_destroy(a).is_err());
}
