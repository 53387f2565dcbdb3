// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! amdgpu over the virtio-gpu native context.
//!
//! Every operation becomes a wire request executed by the host. Requests nobody waits on are
//! batched in a small queue and pushed with one execbuffer. A request that needs an answer
//! flushes the queue, waits for the host to publish its sequence number in the shared state
//! block, and reads the response the host left in the block's response area.

use std::mem::size_of;
use std::os::fd::AsFd;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::sync::Condvar;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use amdgpu_sys::*;
use log::error;
use log::warn;
use nix::errno::Errno;
use nix::poll::poll;
use nix::poll::PollFd;
use nix::poll::PollFlags;
use nix::poll::PollTimeout;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;

use crate::amdgpu_os::remaining_timeout;
use crate::amdgpu_os::MemoryMapping;
use crate::amdgpu_os::OwnedDescriptor;
use crate::cs::encode_wire;
use crate::protocol::*;
use crate::transport::BlobCreate;
use crate::transport::CsRequest;
use crate::transport::DrmSyncobj;
use crate::transport::ExecBuffer;
use crate::transport::Transport;
use crate::transport::VirtGpuDevice;
use crate::AmdgpuError;
use crate::AmdgpuResult;
use crate::BoAllocRequest;
use crate::BoExport;
use crate::BoHandleType;
use crate::BoImport;
use crate::BoInfo;
use crate::BoMetadata;
use crate::CsFence;
use crate::DeviceConfig;
use crate::HeapInfo;
use crate::HostBlob;
use crate::TransportKind;
use crate::VaOp;
use crate::AMDGPU_MAX_RINGS;
use crate::AMDGPU_TIMEOUT_INFINITE;

/// Queued requests are pushed once they would grow past this.
const QUEUE_SIZE: usize = 4096;

const SHMEM_BLOB_ID: u64 = 0;

const WAIT_IDLE_POLL: Duration = Duration::from_millis(1);

fn read_header(cmd: &[u8]) -> AmdgpuResult<CcmdHeader> {
    CcmdHeader::read_from_prefix(cmd)
        .map(|(hdr, _)| hdr)
        .map_err(|_| AmdgpuError::InvalidCommandSize(cmd.len()))
}

fn write_header(hdr: &CcmdHeader, cmd: &mut [u8]) -> AmdgpuResult<()> {
    hdr.write_to_prefix(cmd)
        .map_err(|_| AmdgpuError::InvalidCommandSize(cmd.len()))
}

fn wait_fence(fence: &OwnedDescriptor) -> AmdgpuResult<()> {
    let mut fds = [PollFd::new(fence.as_fd(), PollFlags::POLLIN)];
    loop {
        match poll(&mut fds, PollTimeout::NONE) {
            Ok(_) => return Ok(()),
            Err(Errno::EINTR) | Err(Errno::EAGAIN) => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

struct RequestQueue {
    buf: Vec<u8>,
    last_seqno: u32,
}

impl RequestQueue {
    fn next_seqno(&mut self) -> u32 {
        self.last_seqno = self.last_seqno.wrapping_add(1);
        self.last_seqno
    }
}

/// Pieces of the response area reserved by synchronous requests still in flight.
#[derive(Default)]
struct ResponseSlots {
    next_off: usize,
    /// `(offset, length)` of every reserved piece.
    in_flight: Vec<(usize, usize)>,
}

impl ResponseSlots {
    /// Reserves `len` bytes of an `area` byte response area, wrapping to its start when the tail
    /// is too short. Returns `None` while the piece overlaps one still in flight.
    fn reserve(&mut self, len: usize, area: usize) -> Option<usize> {
        let mut off = self.next_off;
        if off + len > area {
            off = 0;
        }
        let end = off + len;
        if self
            .in_flight
            .iter()
            .any(|&(o, l)| o < end && off < o + l)
        {
            return None;
        }

        self.next_off = end;
        self.in_flight.push((off, len));
        Some(off)
    }

    fn release(&mut self, off: usize) {
        self.in_flight.retain(|&(o, _)| o != off);
    }
}

/// A reserved piece of the response area, released on drop.
struct ResponseSlot<'a> {
    transport: &'a VirtioTransport,
    off: u32,
}

impl Drop for ResponseSlot<'_> {
    fn drop(&mut self) {
        let mut slots = self.transport.rsp_slots.lock().unwrap();
        slots.release(self.off as usize);
        self.transport.rsp_slot_freed.notify_all();
    }
}

pub(crate) struct VirtioTransport {
    shmem: HostSharedState,
    shmem_handle: u32,
    gpu: Box<dyn VirtGpuDevice>,
    config: DeviceConfig,
    queue: Mutex<RequestQueue>,
    rsp_slots: Mutex<ResponseSlots>,
    rsp_slot_freed: Condvar,
    reported_async_error: AtomicU32,
}

impl VirtioTransport {
    /// Checks that the host speaks the amdgpu native context, creates the context on the file
    /// and maps the shared state block.
    pub fn connect(
        gpu: Box<dyn VirtGpuDevice>,
        config: &DeviceConfig,
    ) -> AmdgpuResult<VirtioTransport> {
        for param in [
            VIRTGPU_PARAM_RESOURCE_BLOB,
            VIRTGPU_PARAM_HOST_VISIBLE,
            VIRTGPU_PARAM_CONTEXT_INIT,
        ] {
            if gpu.get_param(param)? == 0 {
                return Err(AmdgpuError::Unsupported);
            }
        }

        if gpu.get_param(VIRTGPU_PARAM_SUPPORTED_CAPSET_IDS)? & (1 << VIRTGPU_DRM_CAPSET_DRM) == 0 {
            return Err(AmdgpuError::Unsupported);
        }

        let mut caps = DrmCapset::default();
        gpu.get_caps(VIRTGPU_DRM_CAPSET_DRM, caps.as_mut_bytes())?;
        if caps.context_type != VIRTGPU_DRM_CONTEXT_AMDGPU {
            return Err(AmdgpuError::UnknownDriver(format!(
                "native context type {}",
                caps.context_type
            )));
        }

        gpu.context_init(&[
            (
                VIRTGPU_CONTEXT_PARAM_CAPSET_ID,
                VIRTGPU_DRM_CAPSET_DRM.into(),
            ),
            (VIRTGPU_CONTEXT_PARAM_NUM_RINGS, AMDGPU_MAX_RINGS.into()),
        ])?;

        let (shmem_handle, _) = gpu.resource_create_blob(&BlobCreate {
            blob_mem: VIRTGPU_BLOB_MEM_HOST3D,
            blob_flags: VIRTGPU_BLOB_FLAG_USE_MAPPABLE,
            size: config.shmem_size,
            blob_id: SHMEM_BLOB_ID,
            cmd: &[],
        })?;

        let shmem = config
            .shmem_size
            .try_into()
            .map_err(AmdgpuError::from)
            .and_then(|size| gpu.mmap(shmem_handle, size))
            .and_then(HostSharedState::new);
        let shmem = match shmem {
            Ok(shmem) => shmem,
            Err(e) => {
                if let Err(close_err) = gpu.gem_close(shmem_handle) {
                    error!("failed to close shared state blob: {}", close_err);
                }
                return Err(e);
            }
        };

        Ok(VirtioTransport {
            shmem,
            shmem_handle,
            gpu,
            config: config.clone(),
            queue: Mutex::new(RequestQueue {
                buf: Vec::with_capacity(QUEUE_SIZE),
                last_seqno: 0,
            }),
            rsp_slots: Mutex::new(ResponseSlots::default()),
            rsp_slot_freed: Condvar::new(),
            reported_async_error: AtomicU32::new(0),
        })
    }

    fn flush_queue(
        &self,
        queue: &mut RequestQueue,
        fence_out: bool,
    ) -> AmdgpuResult<Option<OwnedDescriptor>> {
        if queue.buf.is_empty() {
            return Ok(None);
        }

        let result = self.gpu.execbuffer(&ExecBuffer {
            command: &queue.buf,
            fence_out,
            ..Default::default()
        });
        queue.buf.clear();
        result
    }

    /// Stamps `cmd` with the next sequence number and queues it.
    fn enqueue(&self, queue: &mut RequestQueue, cmd: &mut [u8]) -> AmdgpuResult<u32> {
        let mut hdr = read_header(cmd)?;
        if hdr.len as usize != cmd.len() || cmd.len() % 8 != 0 {
            return Err(AmdgpuError::InvalidCommandSize(cmd.len()));
        }

        if !queue.buf.is_empty() && queue.buf.len() + cmd.len() > QUEUE_SIZE {
            self.flush_queue(queue, false)?;
        }

        hdr.seqno = queue.next_seqno();
        write_header(&hdr, cmd)?;
        queue.buf.extend_from_slice(cmd);
        Ok(hdr.seqno)
    }

    fn wait_host_seqno(&self, seqno: u32) {
        while (self.shmem.seqno().wrapping_sub(seqno) as i32) < 0 {
            thread::yield_now();
        }
    }

    /// Reserves room for a `len` byte response, waiting while the area is taken by requests in
    /// flight.
    fn alloc_rsp(&self, len: usize) -> AmdgpuResult<ResponseSlot<'_>> {
        let len = len.max(1).next_multiple_of(8);
        // Offsets inside the area fit the header's `rsp_off`.
        let area = u32::try_from(self.shmem.rsp_mem_len()?)? as usize;
        if len > area {
            return Err(AmdgpuError::InvalidCommandSize(len));
        }

        let mut slots = self.rsp_slots.lock().unwrap();
        loop {
            if let Some(off) = slots.reserve(len, area) {
                return Ok(ResponseSlot {
                    transport: self,
                    off: off as u32,
                });
            }
            slots = self.rsp_slot_freed.wait(slots).unwrap();
        }
    }

    /// Sends `cmd` and waits until the host has executed it. With `rsp`, the host's response is
    /// copied into it and a negative result becomes `HostError`.
    fn send_sync(&self, cmd: &mut [u8], rsp: Option<&mut [u8]>) -> AmdgpuResult<()> {
        let mut hdr = read_header(cmd)?;

        // Released once the response has been read back.
        let slot = match &rsp {
            Some(rsp) => {
                let slot = self.alloc_rsp(rsp.len())?;
                self.shmem.write_response(slot.off, &vec![0u8; rsp.len()])?;
                hdr.rsp_off = slot.off;
                write_header(&hdr, cmd)?;
                Some(slot)
            }
            None => None,
        };

        let (seqno, fence) = {
            let mut queue = self.queue.lock().unwrap();
            let seqno = self.enqueue(&mut queue, cmd)?;
            (seqno, self.flush_queue(&mut queue, true)?)
        };

        if let Some(fence) = fence {
            wait_fence(&fence)?;
        }
        self.wait_host_seqno(seqno);

        if let (Some(rsp), Some(slot)) = (rsp, &slot) {
            self.shmem.read_response(slot.off, rsp)?;
            let (response, _) = CcmdResponse::read_from_prefix(rsp)
                .map_err(|_| AmdgpuError::InvalidCommandSize(rsp.len()))?;
            if response.ret < 0 {
                return Err(AmdgpuError::HostError {
                    cmd: hdr.cmd,
                    ret: response.ret,
                });
            }
        }
        Ok(())
    }

    /// Sends a request nobody waits on, unless its opcode was configured as synchronous.
    fn send_async(&self, cmd: &mut [u8]) -> AmdgpuResult<()> {
        if self.config.is_sync_cmd(read_header(cmd)?.cmd) {
            return self.send_sync(cmd, None);
        }

        let mut queue = self.queue.lock().unwrap();
        self.enqueue(&mut queue, cmd)?;
        Ok(())
    }

    fn execute<Req, Rsp>(&self, req: &Req) -> AmdgpuResult<Rsp>
    where
        Req: IntoBytes + Immutable,
        Rsp: FromBytes + IntoBytes,
    {
        let mut cmd = req.as_bytes().to_vec();
        let mut rsp = Rsp::new_zeroed();
        self.send_sync(&mut cmd, Some(rsp.as_mut_bytes()))?;
        Ok(rsp)
    }
}

impl Drop for VirtioTransport {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            error!("failed to flush queued requests: {}", e);
        }
        if let Err(e) = self.gpu.gem_close(self.shmem_handle) {
            error!("failed to close shared state blob: {}", e);
        }
    }
}

impl Transport for VirtioTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Virtio
    }

    fn query_info(&self, info: &drm_amdgpu_info, out: &mut [u8]) -> AmdgpuResult<()> {
        let req = QueryInfoReq {
            hdr: CcmdHeader::new(AMDGPU_CCMD_QUERY_INFO, size_of::<QueryInfoReq>()),
            info: drm_amdgpu_info {
                return_pointer: 0,
                return_size: out.len().try_into()?,
                ..*info
            },
        };

        let mut cmd = req.as_bytes().to_vec();
        let mut rsp = vec![0u8; size_of::<CcmdResponse>() + out.len()];
        self.send_sync(&mut cmd, Some(&mut rsp))?;
        out.copy_from_slice(&rsp[size_of::<CcmdResponse>()..]);
        Ok(())
    }

    fn bo_create(&self, blob_id: u64, req: &BoAllocRequest) -> AmdgpuResult<HostBlob> {
        let mut gem_new = GemNewReq {
            hdr: CcmdHeader::new(AMDGPU_CCMD_GEM_NEW, size_of::<GemNewReq>()),
            blob_id,
            r: GemNewRequest {
                alloc_size: req.alloc_size,
                alignment: req.phys_alignment,
                preferred_heap: req.preferred_heap,
                pad: 0,
                flags: req.flags,
            },
        };

        let mut blob_flags = 0;
        if req.flags & AMDGPU_GEM_CREATE_NO_CPU_ACCESS == 0 {
            blob_flags |= VIRTGPU_BLOB_FLAG_USE_MAPPABLE;
        }
        if req.flags & AMDGPU_GEM_CREATE_VM_ALWAYS_VALID == 0 {
            blob_flags |= VIRTGPU_BLOB_FLAG_USE_SHAREABLE;
        }

        // The embedded request must reach the host after everything queued before it.
        let (handle, res_id) = {
            let mut queue = self.queue.lock().unwrap();
            self.flush_queue(&mut queue, false)?;
            gem_new.hdr.seqno = queue.next_seqno();
            self.gpu.resource_create_blob(&BlobCreate {
                blob_mem: VIRTGPU_BLOB_MEM_HOST3D,
                blob_flags,
                size: req.alloc_size,
                blob_id,
                cmd: gem_new.as_bytes(),
            })?
        };

        if self.config.is_sync_cmd(AMDGPU_CCMD_GEM_NEW) {
            self.wait_host_seqno(gem_new.hdr.seqno);
        }

        Ok(HostBlob {
            handle,
            res_id,
            size: req.alloc_size,
        })
    }

    fn bo_import(&self, import: &BoImport<'_>) -> AmdgpuResult<u32> {
        match *import {
            BoImport::Kms(handle) => Ok(handle),
            BoImport::DmaBuf(fd) => self.gpu.prime_fd_to_handle(fd),
            BoImport::Flink(_) => Err(AmdgpuError::Unsupported),
        }
    }

    fn bo_info(&self, handle: u32) -> AmdgpuResult<HostBlob> {
        let info = self.gpu.resource_info(handle)?;
        if info.res_id == 0 {
            return Err(AmdgpuError::NoBackingBlob);
        }

        Ok(HostBlob {
            handle,
            res_id: info.res_id,
            size: info.size,
        })
    }

    fn bo_export(&self, blob: &HostBlob, kind: BoHandleType) -> AmdgpuResult<BoExport> {
        match kind {
            BoHandleType::Kms => Ok(BoExport::Handle(blob.res_id)),
            BoHandleType::KmsNoImport => Ok(BoExport::Handle(blob.handle)),
            BoHandleType::DmaBuf => Ok(BoExport::Fd(self.gpu.prime_handle_to_fd(blob.handle)?)),
            BoHandleType::Flink => Err(AmdgpuError::Unsupported),
        }
    }

    fn bo_close(&self, blob: &HostBlob) -> AmdgpuResult<()> {
        self.gpu.gem_close(blob.handle)
    }

    fn bo_mmap(&self, blob: &HostBlob) -> AmdgpuResult<MemoryMapping> {
        self.gpu.mmap(blob.handle, blob.size.try_into()?)
    }

    fn bo_wait_idle(&self, blob: &HostBlob, deadline_ns: u64) -> AmdgpuResult<bool> {
        self.flush()?;
        loop {
            if !self.gpu.wait(blob.handle, true)? {
                return Ok(false);
            }

            match remaining_timeout(deadline_ns) {
                Some(remaining) if remaining.is_zero() => return Ok(true),
                Some(remaining) => thread::sleep(remaining.min(WAIT_IDLE_POLL)),
                None => {
                    if !self.gpu.wait(blob.handle, false)? {
                        return Ok(false);
                    }
                }
            }
        }
    }

    fn bo_set_metadata(&self, blob: &HostBlob, metadata: &BoMetadata) -> AmdgpuResult<()> {
        let umd = metadata.umd_metadata.as_bytes();
        let payload_len = (metadata.size_metadata as usize).next_multiple_of(8);
        if payload_len > umd.len() {
            return Err(AmdgpuError::InvalidMetadataSize(
                metadata.size_metadata as usize,
            ));
        }

        let len = size_of::<SetMetadataReq>() + payload_len;
        let req = SetMetadataReq {
            hdr: CcmdHeader::new(AMDGPU_CCMD_SET_METADATA, len),
            flags: metadata.flags,
            tiling_info: metadata.tiling_info,
            res_id: blob.res_id,
            size_metadata: metadata.size_metadata,
        };

        let mut cmd = Vec::with_capacity(len);
        cmd.extend_from_slice(req.as_bytes());
        cmd.extend_from_slice(&umd[..payload_len]);
        let mut rsp = CcmdResponse::default();
        self.send_sync(&mut cmd, Some(rsp.as_mut_bytes()))
    }

    fn bo_query_info(&self, blob: &HostBlob) -> AmdgpuResult<BoInfo> {
        let req = BoQueryInfoReq {
            hdr: CcmdHeader::new(AMDGPU_CCMD_BO_QUERY_INFO, size_of::<BoQueryInfoReq>()),
            res_id: blob.res_id,
            pad: 0,
        };
        let rsp: BoQueryInfoRsp = self.execute(&req)?;
        let info = rsp.info;
        Ok(BoInfo {
            alloc_size: info.alloc_size,
            phys_alignment: info.phys_alignment,
            preferred_heap: info.preferred_heap,
            alloc_flags: info.alloc_flags,
            metadata: BoMetadata {
                flags: info.metadata.flags,
                tiling_info: info.metadata.tiling_info,
                size_metadata: info.metadata.size_metadata,
                umd_metadata: info.metadata.umd_metadata,
            },
        })
    }

    fn bo_va_op(&self, blob: Option<&HostBlob>, op: &VaOp) -> AmdgpuResult<()> {
        let req = BoVaOpReq {
            hdr: CcmdHeader::new(AMDGPU_CCMD_BO_VA_OP, size_of::<BoVaOpReq>()),
            va: op.va,
            vm_map_size: op.size,
            flags: op.flags.into(),
            flags2: 0,
            offset: op.offset,
            res_id: blob.map(|b| b.res_id).unwrap_or(0),
            op: op.op,
        };
        self.send_async(&mut req.as_bytes().to_vec())
    }

    fn ctx_create(&self, priority: i32) -> AmdgpuResult<u32> {
        let req = CreateCtxReq {
            hdr: CcmdHeader::new(AMDGPU_CCMD_CREATE_CTX, size_of::<CreateCtxReq>()),
            priority_or_id: priority as u32,
            flags: 0,
        };
        let rsp: CreateCtxRsp = self.execute(&req)?;
        Ok(rsp.ctx_id)
    }

    fn ctx_destroy(&self, ctx_id: u32) -> AmdgpuResult<()> {
        let req = CreateCtxReq {
            hdr: CcmdHeader::new(AMDGPU_CCMD_CREATE_CTX, size_of::<CreateCtxReq>()),
            priority_or_id: ctx_id,
            flags: AMDGPU_CCMD_CREATE_CTX_DESTROY,
        };
        self.send_async(&mut req.as_bytes().to_vec())
    }

    fn ctx_query_reset_state(&self, ctx_id: u32) -> AmdgpuResult<u64> {
        let errors = self.shmem.async_error();
        if errors == 0 {
            return Ok(0);
        }

        let reported = self
            .reported_async_error
            .fetch_max(errors, Ordering::AcqRel);
        if errors > reported {
            warn!(
                "host reported {} asynchronous errors, context {} is lost",
                errors, ctx_id
            );
        }
        Ok(AMDGPU_CTX_QUERY2_FLAGS_RESET | AMDGPU_CTX_QUERY2_FLAGS_VRAMLOST)
    }

    fn ctx_stable_pstate(&self, ctx_id: u32, op: u32, flags: u32) -> AmdgpuResult<u32> {
        let req = SetPstateReq {
            hdr: CcmdHeader::new(AMDGPU_CCMD_SET_PSTATE, size_of::<SetPstateReq>()),
            ctx_id,
            op,
            flags,
            pad: 0,
        };
        let rsp: SetPstateRsp = self.execute(&req)?;
        Ok(rsp.out_flags)
    }

    fn cs_submit(&self, req: &CsRequest<'_>) -> AmdgpuResult<u64> {
        let mut wire = encode_wire(req)?;
        let sync = self.config.is_sync_cmd(AMDGPU_CCMD_CS_SUBMIT);

        let (seqno, host_seqno, fence) = {
            let mut queue = self.queue.lock().unwrap();
            self.flush_queue(&mut queue, false)?;

            let mut hdr = read_header(&wire.command)?;
            hdr.seqno = queue.next_seqno();
            write_header(&hdr, &mut wire.command)?;

            let fence = self.gpu.execbuffer(&ExecBuffer {
                command: &wire.command,
                ring_idx: Some(req.ring_idx),
                in_syncobjs: &wire.in_syncobjs,
                out_syncobjs: &wire.out_syncobjs,
                fence_out: sync,
            })?;
            // Submissions on one ring reach the host in queue order, so the host assigns the
            // same sequence number.
            let seqno = req.ring_seqno.fetch_add(1, Ordering::Relaxed);
            (seqno, hdr.seqno, fence)
        };

        if sync {
            if let Some(fence) = fence {
                wait_fence(&fence)?;
            }
            self.wait_host_seqno(host_seqno);
        }
        Ok(seqno)
    }

    fn query_fence_status(&self, fence: &CsFence, deadline_ns: u64) -> AmdgpuResult<bool> {
        // The host runs on its own clock and takes a relative timeout.
        let timeout_ns = match remaining_timeout(deadline_ns) {
            Some(remaining) => {
                u64::try_from(remaining.as_nanos()).unwrap_or(AMDGPU_TIMEOUT_INFINITE)
            }
            None => AMDGPU_TIMEOUT_INFINITE,
        };

        let req = CsQueryFenceStatusReq {
            hdr: CcmdHeader::new(
                AMDGPU_CCMD_CS_QUERY_FENCE_STATUS,
                size_of::<CsQueryFenceStatusReq>(),
            ),
            ctx_id: fence.ctx_id,
            ip_type: fence.ip_type,
            ip_instance: fence.ip_instance,
            ring: fence.ring,
            fence: fence.seq_no,
            timeout_ns,
            flags: 0,
        };
        let rsp: CsQueryFenceStatusRsp = self.execute(&req)?;
        Ok(rsp.expired != 0)
    }

    fn vm_reserve_vmid(&self, unreserve: bool) -> AmdgpuResult<()> {
        let req = ReserveVmidReq {
            hdr: CcmdHeader::new(AMDGPU_CCMD_RESERVE_VMID, size_of::<ReserveVmidReq>()),
            flags: if unreserve {
                AMDGPU_CCMD_RESERVE_VMID_UNRESERVE
            } else {
                0
            },
        };
        let _: CcmdResponse = self.execute(&req)?;
        Ok(())
    }

    fn heap_info(&self, heap: u32, flags: u64) -> AmdgpuResult<HeapInfo> {
        let heap = match heap {
            AMDGPU_GEM_DOMAIN_VRAM if flags & AMDGPU_GEM_CREATE_CPU_ACCESS_REQUIRED != 0 => {
                SharedHeap::VisibleVram
            }
            AMDGPU_GEM_DOMAIN_VRAM => SharedHeap::Vram,
            AMDGPU_GEM_DOMAIN_GTT => SharedHeap::Gtt,
            _ => return Err(AmdgpuError::InvalidArgument("heap is neither VRAM nor GTT")),
        };
        Ok(self.shmem.heap_info(heap))
    }

    fn flush(&self) -> AmdgpuResult<()> {
        let mut queue = self.queue.lock().unwrap();
        self.flush_queue(&mut queue, false)?;
        Ok(())
    }

    fn syncobjs(&self) -> &dyn DrmSyncobj {
        self.gpu.syncobjs()
    }
}
