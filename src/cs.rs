// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Command submission: the chunk model callers build, the ring a submission lands on, and the
//! two encodings of it (amdgpu CS ioctl arrays, or a descriptor table plus payload on the wire).

use std::mem::size_of;

use amdgpu_sys::*;
use zerocopy::IntoBytes;

use crate::device::RingMap;
use crate::protocol::CcmdHeader;
use crate::protocol::CsChunkDesc;
use crate::protocol::CsSubmitReq;
use crate::protocol::AMDGPU_CCMD_CS_SUBMIT;
use crate::transport::CsRequest;
use crate::AmdgpuError;
use crate::AmdgpuResult;
use crate::Bo;
use crate::Context;
use crate::CsFence;
use crate::Device;

/// A buffer object referenced by a submission.
#[derive(Copy, Clone)]
pub struct BoListEntry<'a> {
    pub bo: &'a Bo,
    pub priority: u32,
}

/// One piece of a command submission.
#[derive(Copy, Clone)]
pub enum CsChunk<'a> {
    /// Buffer objects the indirect buffers reference.
    BoHandles(&'a [BoListEntry<'a>]),
    /// An indirect buffer. Its IP type and ring select the ring of the submission.
    Ib(drm_amdgpu_cs_chunk_ib),
    /// Where the kernel writes the user fence: `slot` is the index of a 64-bit word in `bo`.
    Fence { bo: &'a Bo, slot: u32 },
    Dependencies(&'a [drm_amdgpu_cs_chunk_dep]),
    ScheduledDependencies(&'a [drm_amdgpu_cs_chunk_dep]),
    SyncobjIn(&'a [drm_amdgpu_cs_chunk_sem]),
    SyncobjOut(&'a [drm_amdgpu_cs_chunk_sem]),
    TimelineWait(&'a [drm_amdgpu_cs_chunk_syncobj]),
    TimelineSignal(&'a [drm_amdgpu_cs_chunk_syncobj]),
    /// Any other chunk, passed through untouched. `data` must be a whole number of dwords.
    Raw { chunk_id: u32, data: &'a [u8] },
}

impl CsChunk<'_> {
    pub fn chunk_id(&self) -> u32 {
        match self {
            CsChunk::BoHandles(_) => AMDGPU_CHUNK_ID_BO_HANDLES,
            CsChunk::Ib(_) => AMDGPU_CHUNK_ID_IB,
            CsChunk::Fence { .. } => AMDGPU_CHUNK_ID_FENCE,
            CsChunk::Dependencies(_) => AMDGPU_CHUNK_ID_DEPENDENCIES,
            CsChunk::ScheduledDependencies(_) => AMDGPU_CHUNK_ID_SCHEDULED_DEPENDENCIES,
            CsChunk::SyncobjIn(_) => AMDGPU_CHUNK_ID_SYNCOBJ_IN,
            CsChunk::SyncobjOut(_) => AMDGPU_CHUNK_ID_SYNCOBJ_OUT,
            CsChunk::TimelineWait(_) => AMDGPU_CHUNK_ID_SYNCOBJ_TIMELINE_WAIT,
            CsChunk::TimelineSignal(_) => AMDGPU_CHUNK_ID_SYNCOBJ_TIMELINE_SIGNAL,
            CsChunk::Raw { chunk_id, .. } => *chunk_id,
        }
    }
}

/// Turns a fence of an earlier submission into a dependency entry.
pub fn fence_to_dep(fence: &CsFence) -> drm_amdgpu_cs_chunk_dep {
    drm_amdgpu_cs_chunk_dep {
        ip_type: fence.ip_type,
        ip_instance: fence.ip_instance,
        ring: fence.ring,
        ctx_id: fence.ctx_id,
        handle: fence.seq_no,
    }
}

/// The flat ring every indirect buffer of `chunks` targets.
pub(crate) fn resolve_ring(rings: &RingMap, chunks: &[CsChunk<'_>]) -> AmdgpuResult<u32> {
    let mut resolved = None;
    for chunk in chunks {
        if let CsChunk::Ib(ib) = chunk {
            let ring_idx = rings.flat_index(ib.ip_type, ib.ring)?;
            match resolved {
                Some(prev) if prev != ring_idx => {
                    return Err(AmdgpuError::InvalidArgument(
                        "indirect buffers target different rings",
                    ))
                }
                _ => resolved = Some(ring_idx),
            }
        }
    }

    resolved.ok_or(AmdgpuError::InvalidArgument(
        "submission has no indirect buffer",
    ))
}

fn length_dw(data: &[u8]) -> AmdgpuResult<u32> {
    if data.len() % 4 != 0 {
        return Err(AmdgpuError::InvalidArgument(
            "chunk data is not a whole number of dwords",
        ));
    }
    Ok((data.len() / 4).try_into()?)
}

fn bo_entries<F>(list: &[BoListEntry<'_>], handle_of: F) -> Vec<drm_amdgpu_bo_list_entry>
where
    F: Fn(&Bo) -> u32,
{
    list.iter()
        .map(|entry| drm_amdgpu_bo_list_entry {
            bo_handle: handle_of(entry.bo),
            bo_priority: entry.priority,
        })
        .collect()
}

fn bo_list_in(count: usize, bo_info_ptr: u64) -> AmdgpuResult<drm_amdgpu_bo_list_in> {
    Ok(drm_amdgpu_bo_list_in {
        operation: !0,
        list_handle: !0,
        bo_number: count.try_into()?,
        bo_info_size: size_of::<drm_amdgpu_bo_list_entry>() as u32,
        bo_info_ptr,
    })
}

fn fence_chunk<F>(bo: &Bo, slot: u32, handle_of: F) -> AmdgpuResult<drm_amdgpu_cs_chunk_fence>
where
    F: Fn(&Bo) -> u32,
{
    let offset = slot
        .checked_mul(size_of::<u64>() as u32)
        .ok_or(AmdgpuError::InvalidArgument("fence slot out of range"))?;
    Ok(drm_amdgpu_cs_chunk_fence {
        handle: handle_of(bo),
        offset,
    })
}

/// Chunk arrays for `DRM_IOCTL_AMDGPU_CS`. Every pointer the kernel follows points into memory
/// owned here.
pub(crate) struct NativeSubmission {
    _storage: Vec<Vec<u8>>,
    chunks: Vec<drm_amdgpu_cs_chunk>,
    chunk_ptrs: Vec<u64>,
}

impl NativeSubmission {
    pub fn num_chunks(&self) -> u32 {
        self.chunks.len() as u32
    }

    pub fn chunks_ptr(&self) -> u64 {
        self.chunk_ptrs.as_ptr() as u64
    }

    #[cfg(test)]
    fn chunks(&self) -> &[drm_amdgpu_cs_chunk] {
        &self.chunks
    }
}

pub(crate) fn encode_native(chunks: &[CsChunk<'_>]) -> AmdgpuResult<NativeSubmission> {
    encode_native_with(chunks, |bo| bo.handle())
}

fn encode_native_with<F>(chunks: &[CsChunk<'_>], handle_of: F) -> AmdgpuResult<NativeSubmission>
where
    F: Fn(&Bo) -> u32,
{
    // Moving an inner Vec into `storage` leaves its heap buffer, and so every pointer into it,
    // in place.
    let mut storage: Vec<Vec<u8>> = Vec::with_capacity(chunks.len() + 1);
    let mut cs_chunks = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        let data = match chunk {
            CsChunk::BoHandles(list) => {
                let entries = bo_entries(list, &handle_of).as_bytes().to_vec();
                let header = bo_list_in(list.len(), entries.as_ptr() as u64)?;
                storage.push(entries);
                header.as_bytes().to_vec()
            }
            CsChunk::Ib(ib) => ib.as_bytes().to_vec(),
            CsChunk::Fence { bo, slot } => fence_chunk(bo, *slot, &handle_of)?.as_bytes().to_vec(),
            CsChunk::Dependencies(deps) | CsChunk::ScheduledDependencies(deps) => {
                deps.as_bytes().to_vec()
            }
            CsChunk::SyncobjIn(sems) | CsChunk::SyncobjOut(sems) => sems.as_bytes().to_vec(),
            CsChunk::TimelineWait(syncobjs) | CsChunk::TimelineSignal(syncobjs) => {
                syncobjs.as_bytes().to_vec()
            }
            CsChunk::Raw { data, .. } => data.to_vec(),
        };

        cs_chunks.push(drm_amdgpu_cs_chunk {
            chunk_id: chunk.chunk_id(),
            length_dw: length_dw(&data)?,
            chunk_data: data.as_ptr() as u64,
        });
        storage.push(data);
    }

    let chunk_ptrs = cs_chunks
        .iter()
        .map(|c| c as *const drm_amdgpu_cs_chunk as u64)
        .collect();

    Ok(NativeSubmission {
        _storage: storage,
        chunks: cs_chunks,
        chunk_ptrs,
    })
}

/// A `CS_SUBMIT` wire request and the syncobjs that ride along on the execbuffer.
pub(crate) struct WireSubmission {
    pub command: Vec<u8>,
    pub in_syncobjs: Vec<drm_virtgpu_execbuffer_syncobj>,
    pub out_syncobjs: Vec<drm_virtgpu_execbuffer_syncobj>,
}

fn binary_syncobjs(
    sems: &[drm_amdgpu_cs_chunk_sem],
) -> impl Iterator<Item = drm_virtgpu_execbuffer_syncobj> + '_ {
    sems.iter().map(|sem| drm_virtgpu_execbuffer_syncobj {
        handle: sem.handle,
        flags: 0,
        point: 0,
    })
}

fn timeline_syncobjs(
    syncobjs: &[drm_amdgpu_cs_chunk_syncobj],
) -> impl Iterator<Item = drm_virtgpu_execbuffer_syncobj> + '_ {
    syncobjs.iter().map(|s| drm_virtgpu_execbuffer_syncobj {
        handle: s.handle,
        flags: 0,
        point: s.point,
    })
}

pub(crate) fn encode_wire(req: &CsRequest<'_>) -> AmdgpuResult<WireSubmission> {
    encode_wire_with(req.ctx_id, req.ring_idx, req.chunks, |bo| bo.res_id())
}

fn encode_wire_with<F>(
    ctx_id: u32,
    ring_idx: u32,
    chunks: &[CsChunk<'_>],
    res_id_of: F,
) -> AmdgpuResult<WireSubmission>
where
    F: Fn(&Bo) -> u32,
{
    let mut in_syncobjs = Vec::new();
    let mut out_syncobjs = Vec::new();
    let mut forwarded: Vec<(u32, Vec<u8>)> = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        let data = match chunk {
            CsChunk::SyncobjIn(sems) => {
                in_syncobjs.extend(binary_syncobjs(sems));
                continue;
            }
            CsChunk::SyncobjOut(sems) => {
                out_syncobjs.extend(binary_syncobjs(sems));
                continue;
            }
            CsChunk::TimelineWait(syncobjs) => {
                in_syncobjs.extend(timeline_syncobjs(syncobjs));
                continue;
            }
            CsChunk::TimelineSignal(syncobjs) => {
                out_syncobjs.extend(timeline_syncobjs(syncobjs));
                continue;
            }
            // The host rebuilds the entry pointer, so the entries follow the header inline.
            CsChunk::BoHandles(list) => {
                let mut data = bo_list_in(list.len(), 0)?.as_bytes().to_vec();
                data.extend_from_slice(bo_entries(list, &res_id_of).as_bytes());
                data
            }
            CsChunk::Ib(ib) => ib.as_bytes().to_vec(),
            CsChunk::Fence { bo, slot } => fence_chunk(bo, *slot, &res_id_of)?.as_bytes().to_vec(),
            CsChunk::Dependencies(deps) | CsChunk::ScheduledDependencies(deps) => {
                deps.as_bytes().to_vec()
            }
            CsChunk::Raw { data, .. } => data.to_vec(),
        };
        forwarded.push((chunk.chunk_id(), data));
    }

    let desc_len = forwarded.len() * size_of::<CsChunkDesc>();
    let mut descs = Vec::with_capacity(forwarded.len());
    let mut data = Vec::new();
    for (chunk_id, chunk) in &forwarded {
        descs.push(CsChunkDesc {
            chunk_id: *chunk_id,
            offset: (desc_len + data.len()).try_into()?,
            length_dw: length_dw(chunk)?,
            pad: 0,
        });
        data.extend_from_slice(chunk);
        data.resize(data.len().next_multiple_of(8), 0);
    }

    let len = size_of::<CsSubmitReq>() + desc_len + data.len();
    let req = CsSubmitReq {
        hdr: CcmdHeader::new(AMDGPU_CCMD_CS_SUBMIT, len),
        ctx_id,
        num_chunks: forwarded.len().try_into()?,
        pad: 0,
        ring_idx,
    };

    let mut command = Vec::with_capacity(len);
    command.extend_from_slice(req.as_bytes());
    command.extend_from_slice(descs.as_bytes());
    command.extend_from_slice(&data);

    Ok(WireSubmission {
        command,
        in_syncobjs,
        out_syncobjs,
    })
}

impl Device {
    /// Submits `chunks` on `ctx` and returns the sequence number of the submission on its ring.
    pub fn submit(&self, ctx: &Context, chunks: &[CsChunk<'_>]) -> AmdgpuResult<u64> {
        if !ctx.belongs_to(&self.shared) {
            return Err(AmdgpuError::InvalidArgument(
                "context belongs to another device",
            ));
        }

        let ring_idx = resolve_ring(&self.shared.rings, chunks)?;
        let req = CsRequest {
            ctx_id: ctx.id(),
            ring_idx,
            chunks,
            ring_seqno: ctx.ring_seqno(ring_idx)?,
        };
        self.shared.transport.cs_submit(&req)
    }
}

#[cfg(test)]
mod tests {
    use std::slice;

    use zerocopy::FromBytes;

    use super::*;

    fn rings() -> RingMap {
        let mut available = [0u32; AMDGPU_HW_IP_NUM as usize];
        available[AMDGPU_HW_IP_GFX as usize] = 0b1;
        available[AMDGPU_HW_IP_COMPUTE as usize] = 0b1111;
        available[AMDGPU_HW_IP_DMA as usize] = 0b11;
        RingMap::new(&available).unwrap()
    }

    fn ib(ip_type: u32, ring: u32) -> drm_amdgpu_cs_chunk_ib {
        drm_amdgpu_cs_chunk_ib {
            va_start: 0x10_0000,
            ib_bytes: 64,
            ip_type,
            ring,
            ..Default::default()
        }
    }

    fn no_bo(_: &Bo) -> u32 {
        unreachable!("no buffer objects in this submission")
    }

    fn descs(payload: &[u8], count: usize) -> Vec<CsChunkDesc> {
        payload
            .chunks_exact(size_of::<CsChunkDesc>())
            .take(count)
            .map(|d| CsChunkDesc::read_from_bytes(d).unwrap())
            .collect()
    }

    #[test]
    fn ring_from_indirect_buffer() {
        let rings = rings();
        let chunks = [CsChunk::Ib(ib(AMDGPU_HW_IP_COMPUTE, 2))];
        // gfx takes ring 1, compute starts at 2.
        assert_eq!(resolve_ring(&rings, &chunks).unwrap(), 4);

        let chunks = [
            CsChunk::Ib(ib(AMDGPU_HW_IP_GFX, 0)),
            CsChunk::Ib(ib(AMDGPU_HW_IP_GFX, 0)),
        ];
        assert_eq!(resolve_ring(&rings, &chunks).unwrap(), 1);
    }

    #[test]
    fn ring_resolution_failures() {
        let rings = rings();
        let sems = [drm_amdgpu_cs_chunk_sem { handle: 1 }];
        assert!(matches!(
            resolve_ring(&rings, &[CsChunk::SyncobjIn(&sems)]),
            Err(AmdgpuError::InvalidArgument(_))
        ));

        let conflicting = [
            CsChunk::Ib(ib(AMDGPU_HW_IP_GFX, 0)),
            CsChunk::Ib(ib(AMDGPU_HW_IP_DMA, 1)),
        ];
        assert!(matches!(
            resolve_ring(&rings, &conflicting),
            Err(AmdgpuError::InvalidArgument(_))
        ));

        assert!(matches!(
            resolve_ring(&rings, &[CsChunk::Ib(ib(AMDGPU_HW_IP_DMA, 2))]),
            Err(AmdgpuError::InvalidRing { ip_type: 2, ring: 2 })
        ));
    }

    #[test]
    fn native_chunks_point_at_their_data() {
        let sems = [
            drm_amdgpu_cs_chunk_sem { handle: 7 },
            drm_amdgpu_cs_chunk_sem { handle: 9 },
        ];
        let chunks = [
            CsChunk::Ib(ib(AMDGPU_HW_IP_GFX, 0)),
            CsChunk::SyncobjIn(&sems),
        ];
        let submission = encode_native_with(&chunks, no_bo).unwrap();
        assert_eq!(submission.num_chunks(), 2);

        let encoded = submission.chunks();
        assert_eq!(encoded[0].chunk_id, AMDGPU_CHUNK_ID_IB);
        assert_eq!(encoded[0].length_dw, 8);
        assert_eq!(encoded[1].chunk_id, AMDGPU_CHUNK_ID_SYNCOBJ_IN);
        assert_eq!(encoded[1].length_dw, 2);

        // SAFETY: The chunk data is owned by `submission` and `length_dw` dwords long.
        let handles = unsafe {
            slice::from_raw_parts(
                encoded[1].chunk_data as *const u32,
                encoded[1].length_dw as usize,
            )
        };
        assert_eq!(handles, &[7, 9]);

        // SAFETY: `chunks_ptr` points at `num_chunks` chunk addresses.
        let ptrs = unsafe {
            slice::from_raw_parts(submission.chunks_ptr() as *const u64, 2)
        };
        assert_eq!(ptrs[1], &encoded[1] as *const drm_amdgpu_cs_chunk as u64);
    }

    #[test]
    fn wire_syncobjs_leave_the_payload() {
        let deps = [drm_amdgpu_cs_chunk_dep {
            ip_type: AMDGPU_HW_IP_GFX,
            ctx_id: 3,
            handle: 41,
            ..Default::default()
        }];
        let sems = [drm_amdgpu_cs_chunk_sem { handle: 5 }];
        let signal = [drm_amdgpu_cs_chunk_syncobj {
            handle: 6,
            flags: 0,
            point: 12,
        }];
        let chunks = [
            CsChunk::SyncobjIn(&sems),
            CsChunk::Ib(ib(AMDGPU_HW_IP_GFX, 0)),
            CsChunk::Dependencies(&deps),
            CsChunk::TimelineSignal(&signal),
        ];

        let wire = encode_wire_with(3, 1, &chunks, no_bo).unwrap();
        assert_eq!(wire.in_syncobjs.len(), 1);
        assert_eq!(wire.in_syncobjs[0].handle, 5);
        assert_eq!(wire.out_syncobjs.len(), 1);
        assert_eq!(wire.out_syncobjs[0].point, 12);

        let (req, rest) = CsSubmitReq::read_from_prefix(&wire.command).unwrap();
        assert_eq!(req.hdr.cmd, AMDGPU_CCMD_CS_SUBMIT);
        assert_eq!(req.hdr.len as usize, wire.command.len());
        assert_eq!(req.num_chunks, 2);
        assert_eq!(req.ring_idx, 1);
        assert_eq!(req.ctx_id, 3);

        let descs = descs(rest, 2);
        assert_eq!(descs[0].chunk_id, AMDGPU_CHUNK_ID_IB);
        assert_eq!(descs[0].offset, 32);
        assert_eq!(descs[0].length_dw, 8);
        assert_eq!(descs[1].chunk_id, AMDGPU_CHUNK_ID_DEPENDENCIES);
        assert_eq!(descs[1].offset, 64);
        assert_eq!(descs[1].length_dw, 6);

        let dep_start = descs[1].offset as usize;
        let (dep, _) = drm_amdgpu_cs_chunk_dep::read_from_prefix(&rest[dep_start..]).unwrap();
        assert_eq!(dep.handle, 41);
    }

    #[test]
    fn raw_chunks_are_padded_on_the_wire() {
        let shadow = [0xabu8; 12];
        let chunks = [
            CsChunk::Raw {
                chunk_id: AMDGPU_CHUNK_ID_CP_GFX_SHADOW,
                data: &shadow,
            },
            CsChunk::Ib(ib(AMDGPU_HW_IP_GFX, 0)),
        ];
        let wire = encode_wire_with(1, 1, &chunks, no_bo).unwrap();
        let header = size_of::<CsSubmitReq>();
        let descs = descs(&wire.command[header..], 2);
        assert_eq!(descs[0].length_dw, 3);
        // 12 bytes of shadow data padded to 16.
        assert_eq!(descs[1].offset, descs[0].offset + 16);
        assert_eq!(wire.command.len() % 8, 0);

        let odd = [CsChunk::Raw {
            chunk_id: AMDGPU_CHUNK_ID_CP_GFX_SHADOW,
            data: &shadow[..5],
        }];
        assert!(encode_wire_with(1, 1, &odd, no_bo).is_err());
        assert!(encode_native_with(&odd, no_bo).is_err());
    }

    #[test]
    fn fence_dependency_matches_fence() {
        let fence = CsFence {
            ctx_id: 2,
            ip_type: AMDGPU_HW_IP_DMA,
            ip_instance: 0,
            ring: 1,
            seq_no: 99,
        };
        let dep = fence_to_dep(&fence);
        assert_eq!(dep.ctx_id, 2);
        assert_eq!(dep.ring, 1);
        assert_eq!(dep.handle, 99);
    }
}
