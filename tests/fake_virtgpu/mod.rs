// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! An in-process virtio-gpu node running the amdgpu native context.
//!
//! `FakeVirtGpu` plays the guest kernel and `FakeHost` the host renderer. Requests are executed
//! synchronously inside `execbuffer`, so the shared state block is always current once a call
//! returns.

#![allow(dead_code)]

use std::collections::BTreeMap as Map;
use std::collections::BTreeSet;
use std::fs::File;
use std::mem::size_of;
use std::os::fd::OwnedFd;
use std::os::unix::fs::MetadataExt;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use amdgpu_sys::*;
use amdvgpu::amdgpu_os::MemoryMapping;
use amdvgpu::amdgpu_os::OwnedDescriptor;
use amdvgpu::amdgpu_os::SharedMemory;
use amdvgpu::protocol::*;
use amdvgpu::transport::BlobCreate;
use amdvgpu::transport::DrmSyncobj;
use amdvgpu::transport::ExecBuffer;
use amdvgpu::transport::ResourceInfo;
use amdvgpu::transport::VirtGpuDevice;
use amdvgpu::AmdgpuError;
use amdvgpu::AmdgpuResult;
use amdvgpu::Device;
use amdvgpu::DeviceConfig;
use amdvgpu::HeapInfo;
use amdvgpu::DEFAULT_SHMEM_SIZE;
use nix::errno::Errno;
use zerocopy::FromBytes;
use zerocopy::FromZeros;
use zerocopy::Immutable;
use zerocopy::IntoBytes;

pub const FAKE_DEVICE_ID: u32 = 0x73bf;
pub const FAKE_SCLK_MHZ: u32 = 2000;
const RSP_MEM_OFFSET: u32 = 256;

pub const GTT_HEAP: HeapInfo = HeapInfo {
    heap_size: 16 << 30,
    heap_usage: 0,
    max_allocation: 12 << 30,
};
pub const VRAM_HEAP: HeapInfo = HeapInfo {
    heap_size: 8 << 30,
    heap_usage: 1 << 20,
    max_allocation: 6 << 30,
};
pub const VISIBLE_VRAM_HEAP: HeapInfo = HeapInfo {
    heap_size: 256 << 20,
    heap_usage: 0,
    max_allocation: 256 << 20,
};

/// Rings the fake exposes: one gfx, four compute and two dma rings.
pub fn available_rings(ip_type: u32) -> Option<u32> {
    match ip_type {
        AMDGPU_HW_IP_GFX => Some(0b1),
        AMDGPU_HW_IP_COMPUTE => Some(0b1111),
        AMDGPU_HW_IP_DMA => Some(0b11),
        _ => None,
    }
}

fn inode(fd: &OwnedFd) -> u64 {
    File::from(fd.try_clone().unwrap())
        .metadata()
        .unwrap()
        .ino()
}

fn bad_command(cmd: &[u8]) -> AmdgpuError {
    AmdgpuError::InvalidCommandSize(cmd.len())
}

type ExecHook = Box<dyn FnOnce() + Send>;

struct Resource {
    memory: Arc<SharedMemory>,
    alloc: GemNewRequest,
    blob_flags: u32,
    metadata: BoMetadataWire,
}

/// A `CS_SUBMIT` as the host received it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submission {
    pub ctx_id: u32,
    /// Ring of the execbuffer carrying the request.
    pub exec_ring_idx: Option<u32>,
    /// Ring named inside the request.
    pub ring_idx: u32,
    pub seqno: u32,
    pub chunk_ids: Vec<u32>,
    pub in_syncobjs: Vec<(u32, u64)>,
    pub out_syncobjs: Vec<(u32, u64)>,
}

struct HostState {
    next_handle: u32,
    next_res_id: u32,
    resources: Map<u32, Resource>,
    /// GEM handle to resource id.
    handles: Map<u32, u32>,
    closed_handles: Vec<u32>,
    busy: BTreeSet<u32>,
    context_params: Option<Vec<(u64, u64)>>,
    next_ctx: u32,
    contexts: Map<u32, i32>,
    destroyed_contexts: Vec<u32>,
    fail_ctx_create: bool,
    fail_blob_create: bool,
    fail_resource_info: bool,
    /// Opcodes of every request executed, in order.
    opcodes: Vec<u32>,
    va_ops: Vec<BoVaOpReq>,
    submissions: Vec<Submission>,
    fence_queries: Vec<CsQueryFenceStatusReq>,
    vmid_reserved: bool,
    pstate: u32,
}

pub struct FakeHost {
    shmem: Arc<SharedMemory>,
    shared: HostSharedState,
    state: Mutex<HostState>,
    execbuffers: AtomicUsize,
    exec_hook: Mutex<Option<ExecHook>>,
    syncobjs: FakeSyncobjs,
}

impl FakeHost {
    pub fn new() -> Arc<FakeHost> {
        let shmem = SharedMemory::new("fake-amdgpu-shmem", DEFAULT_SHMEM_SIZE).unwrap();
        let shared = HostSharedState::new(shmem.map().unwrap()).unwrap();
        shared.set_rsp_mem_offset(RSP_MEM_OFFSET);
        shared.set_heap_info(SharedHeap::Gtt, GTT_HEAP);
        shared.set_heap_info(SharedHeap::Vram, VRAM_HEAP);
        shared.set_heap_info(SharedHeap::VisibleVram, VISIBLE_VRAM_HEAP);

        Arc::new(FakeHost {
            shmem: Arc::new(shmem),
            shared,
            state: Mutex::new(HostState {
                next_handle: 1,
                next_res_id: 1,
                resources: Map::new(),
                handles: Map::new(),
                closed_handles: Vec::new(),
                busy: BTreeSet::new(),
                context_params: None,
                next_ctx: 1,
                contexts: Map::new(),
                destroyed_contexts: Vec::new(),
                fail_ctx_create: false,
                fail_blob_create: false,
                fail_resource_info: false,
                opcodes: Vec::new(),
                va_ops: Vec::new(),
                submissions: Vec::new(),
                fence_queries: Vec::new(),
                vmid_reserved: false,
                pstate: AMDGPU_CTX_STABLE_PSTATE_NONE,
            }),
            execbuffers: AtomicUsize::new(0),
            exec_hook: Mutex::new(None),
            syncobjs: FakeSyncobjs::default(),
        })
    }

    pub fn execbuffer_count(&self) -> usize {
        self.execbuffers.load(Ordering::SeqCst)
    }

    pub fn opcodes(&self) -> Vec<u32> {
        self.state.lock().unwrap().opcodes.clone()
    }

    pub fn context_params(&self) -> Option<Vec<(u64, u64)>> {
        self.state.lock().unwrap().context_params.clone()
    }

    pub fn va_ops(&self) -> Vec<BoVaOpReq> {
        self.state.lock().unwrap().va_ops.clone()
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn fence_queries(&self) -> Vec<CsQueryFenceStatusReq> {
        self.state.lock().unwrap().fence_queries.clone()
    }

    pub fn live_contexts(&self) -> Vec<(u32, i32)> {
        let state = self.state.lock().unwrap();
        state.contexts.iter().map(|(&id, &prio)| (id, prio)).collect()
    }

    pub fn destroyed_contexts(&self) -> Vec<u32> {
        self.state.lock().unwrap().destroyed_contexts.clone()
    }

    pub fn closed_handles(&self) -> Vec<u32> {
        self.state.lock().unwrap().closed_handles.clone()
    }

    pub fn open_handles(&self) -> Vec<u32> {
        self.state.lock().unwrap().handles.keys().copied().collect()
    }

    pub fn blob_flags(&self, res_id: u32) -> Option<u32> {
        let state = self.state.lock().unwrap();
        state.resources.get(&res_id).map(|r| r.blob_flags)
    }

    pub fn vmid_reserved(&self) -> bool {
        self.state.lock().unwrap().vmid_reserved
    }

    pub fn set_busy(&self, res_id: u32, busy: bool) {
        let mut state = self.state.lock().unwrap();
        if busy {
            state.busy.insert(res_id);
        } else {
            state.busy.remove(&res_id);
        }
    }

    pub fn fail_ctx_create(&self, fail: bool) {
        self.state.lock().unwrap().fail_ctx_create = fail;
    }

    /// Makes `GEM_NEW` blob creation fail before any handle is assigned.
    pub fn fail_blob_create(&self, fail: bool) {
        self.state.lock().unwrap().fail_blob_create = fail;
    }

    pub fn fail_resource_info(&self, fail: bool) {
        self.state.lock().unwrap().fail_resource_info = fail;
    }

    /// Runs `hook` at the start of the next execbuffer, before the host executes anything.
    pub fn on_next_execbuffer<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        *self.exec_hook.lock().unwrap() = Some(Box::new(hook));
    }

    /// Simulates a GPU hang the guest learns about through the shared state block.
    pub fn report_async_error(&self) {
        self.shared.bump_async_error();
    }

    pub fn async_error(&self) -> u32 {
        self.shared.async_error()
    }

    pub fn syncobj_ops(&self) -> Vec<String> {
        self.syncobjs.state.lock().unwrap().ops.clone()
    }

    pub fn last_syncobj_deadline(&self) -> Option<i64> {
        self.syncobjs.state.lock().unwrap().last_deadline
    }

    fn respond<T: IntoBytes + Immutable>(&self, hdr: &CcmdHeader, rsp: &T) {
        self.shared.write_response(hdr.rsp_off, rsp.as_bytes()).unwrap();
    }

    fn respond_status(&self, hdr: &CcmdHeader, ret: i32) {
        self.respond(
            hdr,
            &CcmdResponse {
                len: size_of::<CcmdResponse>() as u32,
                ret,
            },
        );
    }

    fn answer_query(&self, info: &drm_amdgpu_info) -> Result<Vec<u8>, Errno> {
        match info.query {
            AMDGPU_INFO_DEV_INFO => {
                let mut dev = drm_amdgpu_info_device::new_zeroed();
                dev.device_id = FAKE_DEVICE_ID;
                dev.family = 143;
                dev.num_shader_engines = 2;
                Ok(dev.as_bytes().to_vec())
            }
            AMDGPU_INFO_HW_IP_INFO => {
                let rings = available_rings(info.value[0]).ok_or(Errno::EINVAL)?;
                let hw_ip = drm_amdgpu_info_hw_ip {
                    hw_ip_version_major: 11,
                    available_rings: rings,
                    ..Default::default()
                };
                Ok(hw_ip.as_bytes().to_vec())
            }
            AMDGPU_INFO_HW_IP_COUNT => {
                let count: u32 = available_rings(info.value[0]).map_or(0, |_| 1);
                Ok(count.as_bytes().to_vec())
            }
            AMDGPU_INFO_SENSOR if info.value[0] == AMDGPU_INFO_SENSOR_GFX_SCLK => {
                Ok(FAKE_SCLK_MHZ.as_bytes().to_vec())
            }
            AMDGPU_INFO_READ_MMR_REG => {
                let [offset, count, ..] = info.value;
                let values: Vec<u32> = (offset..offset + count).collect();
                Ok(values.as_bytes().to_vec())
            }
            _ => Err(Errno::EINVAL),
        }
    }

    fn execute(&self, state: &mut HostState, hdr: &CcmdHeader, cmd: &[u8], exec: &ExecBuffer) {
        state.opcodes.push(hdr.cmd);
        match hdr.cmd {
            AMDGPU_CCMD_QUERY_INFO => {
                let (req, _) = QueryInfoReq::read_from_prefix(cmd).unwrap();
                match self.answer_query(&req.info) {
                    Ok(mut data) => {
                        data.resize(req.info.return_size as usize, 0);
                        let mut rsp = CcmdResponse {
                            len: (size_of::<CcmdResponse>() + data.len()) as u32,
                            ret: 0,
                        }
                        .as_bytes()
                        .to_vec();
                        rsp.extend_from_slice(&data);
                        self.shared.write_response(hdr.rsp_off, &rsp).unwrap();
                    }
                    Err(e) => self.respond_status(hdr, -(e as i32)),
                }
            }
            AMDGPU_CCMD_BO_VA_OP => {
                let (req, _) = BoVaOpReq::read_from_prefix(cmd).unwrap();
                state.va_ops.push(req);
            }
            AMDGPU_CCMD_SET_METADATA => {
                let (req, payload) = SetMetadataReq::read_from_prefix(cmd).unwrap();
                let size = req.size_metadata as usize;
                match state.resources.get_mut(&req.res_id) {
                    Some(res) => {
                        res.metadata.flags = req.flags;
                        res.metadata.tiling_info = req.tiling_info;
                        res.metadata.size_metadata = req.size_metadata;
                        res.metadata.umd_metadata = [0; 64];
                        res.metadata.umd_metadata.as_mut_bytes()[..size]
                            .copy_from_slice(&payload[..size]);
                        self.respond_status(hdr, 0);
                    }
                    None => self.respond_status(hdr, -libc::ENOENT),
                }
            }
            AMDGPU_CCMD_BO_QUERY_INFO => {
                let (req, _) = BoQueryInfoReq::read_from_prefix(cmd).unwrap();
                let Some(res) = state.resources.get(&req.res_id) else {
                    return self.respond_status(hdr, -libc::ENOENT);
                };
                let mut rsp = BoQueryInfoRsp::new_zeroed();
                rsp.hdr.len = size_of::<BoQueryInfoRsp>() as u32;
                rsp.info.alloc_size = res.alloc.alloc_size;
                rsp.info.phys_alignment = res.alloc.alignment;
                rsp.info.preferred_heap = res.alloc.preferred_heap;
                rsp.info.alloc_flags = res.alloc.flags;
                rsp.info.metadata = res.metadata;
                self.respond(hdr, &rsp);
            }
            AMDGPU_CCMD_CREATE_CTX => {
                let (req, _) = CreateCtxReq::read_from_prefix(cmd).unwrap();
                if req.flags & AMDGPU_CCMD_CREATE_CTX_DESTROY != 0 {
                    state.contexts.remove(&req.priority_or_id);
                    state.destroyed_contexts.push(req.priority_or_id);
                    return;
                }
                if state.fail_ctx_create {
                    return self.respond_status(hdr, -libc::ENOMEM);
                }

                let ctx_id = state.next_ctx;
                state.next_ctx += 1;
                state.contexts.insert(ctx_id, req.priority_or_id as i32);
                self.respond(
                    hdr,
                    &CreateCtxRsp {
                        hdr: CcmdResponse {
                            len: size_of::<CreateCtxRsp>() as u32,
                            ret: 0,
                        },
                        ctx_id,
                        pad: 0,
                    },
                );
            }
            AMDGPU_CCMD_RESERVE_VMID => {
                let (req, _) = ReserveVmidReq::read_from_prefix(cmd).unwrap();
                state.vmid_reserved = req.flags & AMDGPU_CCMD_RESERVE_VMID_UNRESERVE == 0;
                self.respond_status(hdr, 0);
            }
            AMDGPU_CCMD_SET_PSTATE => {
                let (req, _) = SetPstateReq::read_from_prefix(cmd).unwrap();
                if !state.contexts.contains_key(&req.ctx_id) {
                    return self.respond_status(hdr, -libc::EINVAL);
                }
                if req.op == AMDGPU_CTX_OP_SET_STABLE_PSTATE {
                    state.pstate = req.flags;
                }
                self.respond(
                    hdr,
                    &SetPstateRsp {
                        hdr: CcmdResponse {
                            len: size_of::<SetPstateRsp>() as u32,
                            ret: 0,
                        },
                        out_flags: state.pstate,
                        pad: 0,
                    },
                );
            }
            AMDGPU_CCMD_CS_QUERY_FENCE_STATUS => {
                let (req, _) = CsQueryFenceStatusReq::read_from_prefix(cmd).unwrap();
                state.fence_queries.push(req);
                // Everything submitted so far has completed.
                let submitted = state
                    .submissions
                    .iter()
                    .filter(|s| s.ctx_id == req.ctx_id)
                    .count() as u64;
                self.respond(
                    hdr,
                    &CsQueryFenceStatusRsp {
                        hdr: CcmdResponse {
                            len: size_of::<CsQueryFenceStatusRsp>() as u32,
                            ret: 0,
                        },
                        expired: (req.fence <= submitted) as u32,
                        pad: 0,
                    },
                );
            }
            AMDGPU_CCMD_CS_SUBMIT => {
                let (req, rest) = CsSubmitReq::read_from_prefix(cmd).unwrap();
                if !state.contexts.contains_key(&req.ctx_id) {
                    self.shared.bump_async_error();
                }
                let chunk_ids = rest
                    .chunks_exact(size_of::<CsChunkDesc>())
                    .take(req.num_chunks as usize)
                    .map(|d| CsChunkDesc::read_from_bytes(d).unwrap().chunk_id)
                    .collect();
                state.submissions.push(Submission {
                    ctx_id: req.ctx_id,
                    exec_ring_idx: exec.ring_idx,
                    ring_idx: req.ring_idx,
                    seqno: hdr.seqno,
                    chunk_ids,
                    in_syncobjs: exec.in_syncobjs.iter().map(|s| (s.handle, s.point)).collect(),
                    out_syncobjs: exec
                        .out_syncobjs
                        .iter()
                        .map(|s| (s.handle, s.point))
                        .collect(),
                });
            }
            _ => {
                if hdr.rsp_off != 0 {
                    self.respond_status(hdr, -libc::EINVAL);
                }
            }
        }
    }

    fn add_handle(state: &mut HostState, res_id: u32) -> u32 {
        let handle = state.next_handle;
        state.next_handle += 1;
        state.handles.insert(handle, res_id);
        handle
    }

    fn memory_of(&self, handle: u32) -> AmdgpuResult<Arc<SharedMemory>> {
        let state = self.state.lock().unwrap();
        state
            .handles
            .get(&handle)
            .and_then(|res_id| state.resources.get(res_id))
            .map(|res| res.memory.clone())
            .ok_or(AmdgpuError::NixError(Errno::ENOENT))
    }
}

/// The guest kernel side: `VirtGpuDevice` on top of a `FakeHost`.
pub struct FakeVirtGpu {
    host: Arc<FakeHost>,
}

impl FakeVirtGpu {
    pub fn new(host: Arc<FakeHost>) -> FakeVirtGpu {
        FakeVirtGpu { host }
    }
}

impl VirtGpuDevice for FakeVirtGpu {
    fn get_param(&self, param: u64) -> AmdgpuResult<u64> {
        Ok(match param {
            VIRTGPU_PARAM_SUPPORTED_CAPSET_IDS => 1 << VIRTGPU_DRM_CAPSET_DRM,
            _ => 1,
        })
    }

    fn get_caps(&self, capset_id: u32, out: &mut [u8]) -> AmdgpuResult<()> {
        if capset_id != VIRTGPU_DRM_CAPSET_DRM {
            return Err(AmdgpuError::NixError(Errno::EINVAL));
        }

        let caps = DrmCapset {
            wire_format_version: 1,
            context_type: VIRTGPU_DRM_CONTEXT_AMDGPU,
            ..Default::default()
        };
        let len = out.len().min(size_of::<DrmCapset>());
        out[..len].copy_from_slice(&caps.as_bytes()[..len]);
        Ok(())
    }

    fn context_init(&self, params: &[(u64, u64)]) -> AmdgpuResult<()> {
        let mut state = self.host.state.lock().unwrap();
        if state.context_params.is_some() {
            return Err(AmdgpuError::NixError(Errno::EBUSY));
        }
        state.context_params = Some(params.to_vec());
        Ok(())
    }

    fn resource_create_blob(&self, create: &BlobCreate<'_>) -> AmdgpuResult<(u32, u32)> {
        let (memory, alloc) = if create.cmd.is_empty() {
            if create.blob_id != 0 || create.size > self.host.shmem.size() {
                return Err(AmdgpuError::NixError(Errno::EINVAL));
            }
            (self.host.shmem.clone(), GemNewRequest::default())
        } else {
            let (req, _) = GemNewReq::read_from_prefix(create.cmd)
                .map_err(|_| bad_command(create.cmd))?;
            if req.hdr.cmd != AMDGPU_CCMD_GEM_NEW || req.blob_id != create.blob_id {
                return Err(AmdgpuError::NixError(Errno::EINVAL));
            }
            if self.host.state.lock().unwrap().fail_blob_create {
                return Err(AmdgpuError::NixError(Errno::ENOMEM));
            }
            let memory = SharedMemory::new("fake-amdgpu-bo", create.size)?;
            (Arc::new(memory), req.r)
        };

        let mut state = self.host.state.lock().unwrap();
        let res_id = state.next_res_id;
        state.next_res_id += 1;
        state.resources.insert(
            res_id,
            Resource {
                memory,
                alloc,
                blob_flags: create.blob_flags,
                metadata: BoMetadataWire::new_zeroed(),
            },
        );
        let handle = FakeHost::add_handle(&mut state, res_id);

        if let Ok((hdr, _)) = CcmdHeader::read_from_prefix(create.cmd) {
            state.opcodes.push(hdr.cmd);
            self.host.shared.set_seqno(hdr.seqno);
        }
        Ok((handle, res_id))
    }

    fn resource_info(&self, handle: u32) -> AmdgpuResult<ResourceInfo> {
        let state = self.host.state.lock().unwrap();
        if state.fail_resource_info {
            return Err(AmdgpuError::NixError(Errno::EIO));
        }
        let res_id = *state
            .handles
            .get(&handle)
            .ok_or(AmdgpuError::NixError(Errno::ENOENT))?;
        Ok(ResourceInfo {
            res_id,
            size: state.resources[&res_id].memory.size(),
        })
    }

    fn mmap(&self, handle: u32, size: usize) -> AmdgpuResult<MemoryMapping> {
        let memory = self.host.memory_of(handle)?;
        MemoryMapping::from_offset(memory.descriptor(), 0, size)
    }

    fn execbuffer(&self, exec: &ExecBuffer<'_>) -> AmdgpuResult<Option<OwnedDescriptor>> {
        self.host.execbuffers.fetch_add(1, Ordering::SeqCst);
        let hook = self.host.exec_hook.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }

        let mut state = self.host.state.lock().unwrap();
        let mut cmd = exec.command;
        while !cmd.is_empty() {
            let (hdr, _) = CcmdHeader::read_from_prefix(cmd).map_err(|_| bad_command(cmd))?;
            let len = hdr.len as usize;
            if len < size_of::<CcmdHeader>() || len > cmd.len() {
                return Err(bad_command(cmd));
            }
            self.host.execute(&mut state, &hdr, &cmd[..len], exec);
            self.host.shared.set_seqno(hdr.seqno);
            cmd = &cmd[len..];
        }

        if exec.fence_out {
            // A regular file polls readable at once, like an already signaled fence.
            let fence = tempfile::tempfile().map_err(AmdgpuError::IoError)?;
            Ok(Some(OwnedFd::from(fence)))
        } else {
            Ok(None)
        }
    }

    fn wait(&self, handle: u32, nowait: bool) -> AmdgpuResult<bool> {
        let mut state = self.host.state.lock().unwrap();
        let res_id = *state
            .handles
            .get(&handle)
            .ok_or(AmdgpuError::NixError(Errno::ENOENT))?;
        if nowait {
            return Ok(state.busy.contains(&res_id));
        }
        // A blocking wait lasts until the GPU is done with the resource.
        state.busy.remove(&res_id);
        Ok(false)
    }

    fn gem_close(&self, handle: u32) -> AmdgpuResult<()> {
        let mut state = self.host.state.lock().unwrap();
        state
            .handles
            .remove(&handle)
            .ok_or(AmdgpuError::NixError(Errno::EINVAL))?;
        state.closed_handles.push(handle);
        Ok(())
    }

    fn prime_handle_to_fd(&self, handle: u32) -> AmdgpuResult<OwnedDescriptor> {
        self.host.memory_of(handle)?.try_clone_descriptor()
    }

    fn prime_fd_to_handle(&self, fd: &OwnedDescriptor) -> AmdgpuResult<u32> {
        let ino = inode(fd);
        let mut state = self.host.state.lock().unwrap();
        let res_id = state
            .resources
            .iter()
            .find(|(_, res)| inode(res.memory.descriptor()) == ino)
            .map(|(&res_id, _)| res_id)
            .ok_or(AmdgpuError::NixError(Errno::EINVAL))?;

        // Importing a buffer the file already has a handle for returns that handle.
        if let Some((&handle, _)) = state.handles.iter().find(|(_, &r)| r == res_id) {
            return Ok(handle);
        }
        Ok(FakeHost::add_handle(&mut state, res_id))
    }

    fn syncobjs(&self) -> &dyn DrmSyncobj {
        &self.host.syncobjs
    }
}

#[derive(Default)]
struct SyncobjState {
    last_handle: u32,
    live: BTreeSet<u32>,
    points: Map<u32, u64>,
    /// Every call, in order.
    ops: Vec<String>,
    last_deadline: Option<i64>,
}

impl SyncobjState {
    fn check(&self, handle: u32) -> AmdgpuResult<()> {
        if self.live.contains(&handle) {
            Ok(())
        } else {
            Err(AmdgpuError::NixError(Errno::ENOENT))
        }
    }

    fn create(&mut self) -> u32 {
        self.last_handle += 1;
        self.live.insert(self.last_handle);
        self.last_handle
    }
}

/// Syncobjs that record what was done to them.
#[derive(Default)]
pub struct FakeSyncobjs {
    state: Mutex<SyncobjState>,
}

impl DrmSyncobj for FakeSyncobjs {
    fn create(&self, flags: u32) -> AmdgpuResult<u32> {
        let mut state = self.state.lock().unwrap();
        let handle = state.create();
        state.ops.push(format!("create {} {}", handle, flags));
        Ok(handle)
    }

    fn destroy(&self, handle: u32) -> AmdgpuResult<()> {
        let mut state = self.state.lock().unwrap();
        state.check(handle)?;
        state.live.remove(&handle);
        state.ops.push(format!("destroy {}", handle));
        Ok(())
    }

    fn handle_to_fd(&self, handle: u32, flags: u32) -> AmdgpuResult<OwnedDescriptor> {
        let mut state = self.state.lock().unwrap();
        state.check(handle)?;
        if flags & DRM_SYNCOBJ_HANDLE_TO_FD_FLAGS_EXPORT_SYNC_FILE != 0 {
            state.ops.push(format!("export-sync-file {}", handle));
        } else {
            state.ops.push(format!("export {}", handle));
        }
        let file = tempfile::tempfile().map_err(AmdgpuError::IoError)?;
        Ok(OwnedFd::from(file))
    }

    fn fd_to_handle(&self, _fd: &OwnedDescriptor, flags: u32, handle: u32) -> AmdgpuResult<u32> {
        let mut state = self.state.lock().unwrap();
        if flags & DRM_SYNCOBJ_FD_TO_HANDLE_FLAGS_IMPORT_SYNC_FILE != 0 {
            state.check(handle)?;
            state.ops.push(format!("import-sync-file {}", handle));
            return Ok(handle);
        }
        let handle = state.create();
        state.ops.push(format!("import {}", handle));
        Ok(handle)
    }

    fn wait(&self, handles: &[u32], timeout_nsec: i64, _flags: u32) -> AmdgpuResult<u32> {
        let mut state = self.state.lock().unwrap();
        for &handle in handles {
            state.check(handle)?;
        }
        state.ops.push(format!("wait {:?}", handles));
        state.last_deadline = Some(timeout_nsec);
        Ok(0)
    }

    fn timeline_wait(
        &self,
        handles: &[u32],
        points: &[u64],
        timeout_nsec: i64,
        _flags: u32,
    ) -> AmdgpuResult<u32> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(format!("timeline-wait {:?} {:?}", handles, points));
        state.last_deadline = Some(timeout_nsec);
        let first = handles
            .iter()
            .zip(points)
            .position(|(h, &p)| state.points.get(h).copied().unwrap_or(0) >= p)
            .ok_or(AmdgpuError::NixError(Errno::ETIME))?;
        Ok(first as u32)
    }

    fn reset(&self, handles: &[u32]) -> AmdgpuResult<()> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(format!("reset {:?}", handles));
        Ok(())
    }

    fn signal(&self, handles: &[u32]) -> AmdgpuResult<()> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(format!("signal {:?}", handles));
        Ok(())
    }

    fn timeline_signal(&self, handles: &[u32], points: &[u64]) -> AmdgpuResult<()> {
        let mut state = self.state.lock().unwrap();
        for (&handle, &point) in handles.iter().zip(points) {
            state.check(handle)?;
            state.points.insert(handle, point);
        }
        state.ops.push(format!("timeline-signal {:?} {:?}", handles, points));
        Ok(())
    }

    fn query(&self, handles: &[u32], points: &mut [u64], _flags: u32) -> AmdgpuResult<()> {
        let state = self.state.lock().unwrap();
        for (handle, point) in handles.iter().zip(points.iter_mut()) {
            state.check(*handle)?;
            *point = state.points.get(handle).copied().unwrap_or(0);
        }
        Ok(())
    }

    fn transfer(
        &self,
        dst: u32,
        dst_point: u64,
        src: u32,
        src_point: u64,
        _flags: u32,
    ) -> AmdgpuResult<()> {
        let mut state = self.state.lock().unwrap();
        state.check(dst)?;
        state.check(src)?;
        state.ops.push(format!(
            "transfer {}@{} <- {}@{}",
            dst, dst_point, src, src_point
        ));
        if dst_point != 0 {
            state.points.insert(dst, dst_point);
        }
        Ok(())
    }
}

/// Opens a session on a fresh fake node. The returned file is the node the session is keyed on.
pub fn open(config: DeviceConfig) -> (Device, Arc<FakeHost>, File) {
    let node = tempfile::tempfile().unwrap();
    let host = FakeHost::new();
    let device =
        Device::open_with_virtgpu(&node, config, Box::new(FakeVirtGpu::new(host.clone())))
            .unwrap();
    (device, host, node)
}

pub fn open_default() -> (Device, Arc<FakeHost>, File) {
    open(DeviceConfig::default())
}
