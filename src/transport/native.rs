// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! amdgpu ioctls on a node the process can reach directly.

use std::sync::Arc;

use amdgpu_sys::*;
use zerocopy::IntoBytes;

use crate::amdgpu_os::ioctl_with_mut_ref;
use crate::amdgpu_os::ioctl_with_ref;
use crate::amdgpu_os::MemoryMapping;
use crate::amdgpu_os::OwnedDescriptor;
use crate::cs::encode_native;
use crate::transport::CsRequest;
use crate::transport::DrmFile;
use crate::transport::DrmSyncobj;
use crate::transport::Transport;
use crate::transport::UserqCreate;
use crate::transport::UserqSignal;
use crate::transport::UserqWait;
use crate::AmdgpuError;
use crate::AmdgpuResult;
use crate::BoAllocRequest;
use crate::BoExport;
use crate::BoHandleType;
use crate::BoImport;
use crate::BoInfo;
use crate::BoMetadata;
use crate::CsFence;
use crate::HeapInfo;
use crate::HostBlob;
use crate::TransportKind;
use crate::VaOp;

pub(crate) struct NativeTransport {
    drm: DrmFile,
}

impl NativeTransport {
    pub fn new(descriptor: Arc<OwnedDescriptor>) -> NativeTransport {
        NativeTransport {
            drm: DrmFile::new(descriptor),
        }
    }

    fn fd(&self) -> &OwnedDescriptor {
        self.drm.descriptor()
    }

    fn ctx_op(
        &self,
        op: u32,
        ctx_id: u32,
        flags: u32,
        priority: i32,
    ) -> AmdgpuResult<drm_amdgpu_ctx> {
        let mut ctx = drm_amdgpu_ctx {
            in_: drm_amdgpu_ctx_in {
                op,
                flags,
                ctx_id,
                priority,
            },
        };
        // SAFETY: CTX reads and writes a `drm_amdgpu_ctx`.
        unsafe { ioctl_with_mut_ref(self.fd(), DRM_IOCTL_AMDGPU_CTX, &mut ctx)? };
        Ok(ctx)
    }

    fn gem_create_info(&self, handle: u32) -> AmdgpuResult<drm_amdgpu_gem_create_in> {
        let mut info = drm_amdgpu_gem_create_in::default();
        let mut op = drm_amdgpu_gem_op {
            handle,
            op: AMDGPU_GEM_OP_GET_GEM_CREATE_INFO,
            value: &mut info as *mut drm_amdgpu_gem_create_in as u64,
        };
        // SAFETY: The kernel writes one `drm_amdgpu_gem_create_in` through `value`.
        unsafe { ioctl_with_mut_ref(self.fd(), DRM_IOCTL_AMDGPU_GEM_OP, &mut op)? };
        Ok(info)
    }

    fn gem_metadata(&self, handle: u32) -> AmdgpuResult<drm_amdgpu_gem_metadata_data> {
        let mut metadata = drm_amdgpu_gem_metadata {
            handle,
            op: AMDGPU_GEM_METADATA_OP_GET_METADATA,
            ..Default::default()
        };
        // SAFETY: GEM_METADATA reads and writes a `drm_amdgpu_gem_metadata`.
        unsafe { ioctl_with_mut_ref(self.fd(), DRM_IOCTL_AMDGPU_GEM_METADATA, &mut metadata)? };
        Ok(metadata.data)
    }
}

impl Transport for NativeTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Native
    }

    fn query_info(&self, info: &drm_amdgpu_info, out: &mut [u8]) -> AmdgpuResult<()> {
        let request = drm_amdgpu_info {
            return_pointer: out.as_mut_ptr() as u64,
            return_size: out.len().try_into()?,
            ..*info
        };
        // SAFETY: The kernel writes at most `return_size` bytes into `out`.
        unsafe { ioctl_with_ref(self.fd(), DRM_IOCTL_AMDGPU_INFO, &request) }
    }

    fn bo_create(&self, _blob_id: u64, req: &BoAllocRequest) -> AmdgpuResult<HostBlob> {
        let mut create = drm_amdgpu_gem_create {
            in_: drm_amdgpu_gem_create_in {
                bo_size: req.alloc_size,
                alignment: req.phys_alignment,
                domains: req.preferred_heap.into(),
                domain_flags: req.flags,
            },
        };
        // SAFETY: GEM_CREATE reads and writes a `drm_amdgpu_gem_create`.
        unsafe { ioctl_with_mut_ref(self.fd(), DRM_IOCTL_AMDGPU_GEM_CREATE, &mut create)? };
        // SAFETY: A successful GEM_CREATE fills in `out`.
        let handle = unsafe { create.out.handle };
        Ok(HostBlob {
            handle,
            res_id: handle,
            size: req.alloc_size,
        })
    }

    fn bo_import(&self, import: &BoImport<'_>) -> AmdgpuResult<u32> {
        match *import {
            BoImport::Kms(handle) => Ok(handle),
            BoImport::Flink(name) => Ok(self.drm.gem_open(name)?.0),
            BoImport::DmaBuf(fd) => self.drm.prime_fd_to_handle(fd),
        }
    }

    fn bo_info(&self, handle: u32) -> AmdgpuResult<HostBlob> {
        let info = self.gem_create_info(handle)?;
        Ok(HostBlob {
            handle,
            res_id: handle,
            size: info.bo_size,
        })
    }

    fn bo_export(&self, blob: &HostBlob, kind: BoHandleType) -> AmdgpuResult<BoExport> {
        match kind {
            BoHandleType::Kms | BoHandleType::KmsNoImport => Ok(BoExport::Handle(blob.handle)),
            BoHandleType::Flink => Ok(BoExport::Handle(self.drm.gem_flink(blob.handle)?)),
            BoHandleType::DmaBuf => Ok(BoExport::Fd(self.drm.prime_handle_to_fd(blob.handle)?)),
        }
    }

    fn bo_close(&self, blob: &HostBlob) -> AmdgpuResult<()> {
        self.drm.gem_close(blob.handle)
    }

    fn bo_mmap(&self, blob: &HostBlob) -> AmdgpuResult<MemoryMapping> {
        let mut mmap = drm_amdgpu_gem_mmap {
            in_: drm_amdgpu_gem_mmap_in {
                handle: blob.handle,
                _pad: 0,
            },
        };
        // SAFETY: GEM_MMAP reads and writes a `drm_amdgpu_gem_mmap`.
        unsafe { ioctl_with_mut_ref(self.fd(), DRM_IOCTL_AMDGPU_GEM_MMAP, &mut mmap)? };
        // SAFETY: A successful GEM_MMAP fills in `out`.
        let offset = unsafe { mmap.out.addr_ptr };
        MemoryMapping::from_offset(self.fd(), offset, blob.size.try_into()?)
    }

    fn bo_wait_idle(&self, blob: &HostBlob, deadline_ns: u64) -> AmdgpuResult<bool> {
        let mut wait = drm_amdgpu_gem_wait_idle {
            in_: drm_amdgpu_gem_wait_idle_in {
                handle: blob.handle,
                flags: 0,
                timeout: deadline_ns,
            },
        };
        // SAFETY: GEM_WAIT_IDLE reads and writes a `drm_amdgpu_gem_wait_idle`.
        unsafe { ioctl_with_mut_ref(self.fd(), DRM_IOCTL_AMDGPU_GEM_WAIT_IDLE, &mut wait)? };
        // SAFETY: A successful GEM_WAIT_IDLE fills in `out`.
        Ok(unsafe { wait.out.status } != 0)
    }

    fn bo_set_metadata(&self, blob: &HostBlob, metadata: &BoMetadata) -> AmdgpuResult<()> {
        let mut request = drm_amdgpu_gem_metadata {
            handle: blob.handle,
            op: AMDGPU_GEM_METADATA_OP_SET_METADATA,
            data: drm_amdgpu_gem_metadata_data {
                flags: metadata.flags,
                tiling_info: metadata.tiling_info,
                data_size_bytes: metadata.size_metadata,
                data: metadata.umd_metadata,
            },
        };
        // SAFETY: GEM_METADATA reads and writes a `drm_amdgpu_gem_metadata`.
        unsafe { ioctl_with_mut_ref(self.fd(), DRM_IOCTL_AMDGPU_GEM_METADATA, &mut request) }
    }

    fn bo_query_info(&self, blob: &HostBlob) -> AmdgpuResult<BoInfo> {
        let create = self.gem_create_info(blob.handle)?;
        let metadata = self.gem_metadata(blob.handle)?;
        Ok(BoInfo {
            alloc_size: create.bo_size,
            phys_alignment: create.alignment,
            preferred_heap: create.domains.try_into()?,
            alloc_flags: create.domain_flags,
            metadata: BoMetadata {
                flags: metadata.flags,
                tiling_info: metadata.tiling_info,
                size_metadata: metadata.data_size_bytes,
                umd_metadata: metadata.data,
            },
        })
    }

    fn bo_va_op(&self, blob: Option<&HostBlob>, op: &VaOp) -> AmdgpuResult<()> {
        let va = drm_amdgpu_gem_va {
            handle: blob.map(|b| b.handle).unwrap_or(0),
            _pad: 0,
            operation: op.op,
            flags: op.flags,
            va_address: op.va,
            offset_in_bo: op.offset,
            map_size: op.size,
        };
        // SAFETY: GEM_VA only reads a `drm_amdgpu_gem_va`.
        unsafe { ioctl_with_ref(self.fd(), DRM_IOCTL_AMDGPU_GEM_VA, &va) }
    }

    fn ctx_create(&self, priority: i32) -> AmdgpuResult<u32> {
        let ctx = self.ctx_op(AMDGPU_CTX_OP_ALLOC_CTX, 0, 0, priority)?;
        // SAFETY: ALLOC_CTX fills in `out.alloc`.
        Ok(unsafe { ctx.out.alloc.ctx_id })
    }

    fn ctx_destroy(&self, ctx_id: u32) -> AmdgpuResult<()> {
        self.ctx_op(AMDGPU_CTX_OP_FREE_CTX, ctx_id, 0, 0)?;
        Ok(())
    }

    fn ctx_query_reset_state(&self, ctx_id: u32) -> AmdgpuResult<u64> {
        let ctx = self.ctx_op(AMDGPU_CTX_OP_QUERY_STATE2, ctx_id, 0, 0)?;
        // SAFETY: QUERY_STATE2 fills in `out.state`.
        Ok(unsafe { ctx.out.state.flags })
    }

    fn ctx_stable_pstate(&self, ctx_id: u32, op: u32, flags: u32) -> AmdgpuResult<u32> {
        let ctx = self.ctx_op(op, ctx_id, flags, 0)?;
        // SAFETY: The pstate ops fill in `out.pstate`.
        Ok(unsafe { ctx.out.pstate.flags })
    }

    fn cs_submit(&self, req: &CsRequest<'_>) -> AmdgpuResult<u64> {
        let submission = encode_native(req.chunks)?;
        let mut cs = drm_amdgpu_cs {
            in_: drm_amdgpu_cs_in {
                ctx_id: req.ctx_id,
                bo_list_handle: 0,
                num_chunks: submission.num_chunks(),
                flags: 0,
                chunks: submission.chunks_ptr(),
            },
        };
        // SAFETY: `submission` owns every array the chunk pointers refer to and outlives the call.
        unsafe { ioctl_with_mut_ref(self.fd(), DRM_IOCTL_AMDGPU_CS, &mut cs)? };
        // SAFETY: A successful CS fills in `out`.
        Ok(unsafe { cs.out.handle })
    }

    fn query_fence_status(&self, fence: &CsFence, deadline_ns: u64) -> AmdgpuResult<bool> {
        let mut wait = drm_amdgpu_wait_cs {
            in_: drm_amdgpu_wait_cs_in {
                handle: fence.seq_no,
                timeout: deadline_ns,
                ip_type: fence.ip_type,
                ip_instance: fence.ip_instance,
                ring: fence.ring,
                ctx_id: fence.ctx_id,
            },
        };
        // SAFETY: WAIT_CS reads and writes a `drm_amdgpu_wait_cs`.
        unsafe { ioctl_with_mut_ref(self.fd(), DRM_IOCTL_AMDGPU_WAIT_CS, &mut wait)? };
        // SAFETY: A successful WAIT_CS fills in `out`.
        Ok(unsafe { wait.out.status } == 0)
    }

    fn vm_reserve_vmid(&self, unreserve: bool) -> AmdgpuResult<()> {
        let mut vm = drm_amdgpu_vm {
            in_: drm_amdgpu_vm_in {
                op: if unreserve {
                    AMDGPU_VM_OP_UNRESERVE_VMID
                } else {
                    AMDGPU_VM_OP_RESERVE_VMID
                },
                flags: 0,
            },
        };
        // SAFETY: VM reads and writes a `drm_amdgpu_vm`.
        unsafe { ioctl_with_mut_ref(self.fd(), DRM_IOCTL_AMDGPU_VM, &mut vm) }
    }

    fn heap_info(&self, heap: u32, flags: u64) -> AmdgpuResult<HeapInfo> {
        let mut memory = drm_amdgpu_memory_info::default();
        let info = drm_amdgpu_info {
            query: AMDGPU_INFO_MEMORY,
            ..Default::default()
        };
        self.query_info(&info, memory.as_mut_bytes())?;

        let heap = match heap {
            AMDGPU_GEM_DOMAIN_VRAM if flags & AMDGPU_GEM_CREATE_CPU_ACCESS_REQUIRED != 0 => {
                memory.cpu_accessible_vram
            }
            AMDGPU_GEM_DOMAIN_VRAM => memory.vram,
            AMDGPU_GEM_DOMAIN_GTT => memory.gtt,
            _ => return Err(AmdgpuError::InvalidArgument("heap is neither VRAM nor GTT")),
        };
        Ok(HeapInfo {
            heap_size: heap.total_heap_size,
            heap_usage: heap.heap_usage,
            max_allocation: heap.max_allocation,
        })
    }

    fn flush(&self) -> AmdgpuResult<()> {
        Ok(())
    }

    fn syncobjs(&self) -> &dyn DrmSyncobj {
        &self.drm
    }

    fn userq_create(&self, queue: &UserqCreate) -> AmdgpuResult<u32> {
        let mut userq = drm_amdgpu_userq {
            in_: drm_amdgpu_userq_in {
                op: AMDGPU_USERQ_OP_CREATE,
                queue_id: 0,
                ip_type: queue.ip_type,
                doorbell_handle: queue.doorbell_handle,
                doorbell_offset: queue.doorbell_offset,
                flags: queue.flags,
                queue_va: queue.queue_va,
                queue_size: queue.queue_size,
                rptr_va: queue.rptr_va,
                wptr_va: queue.wptr_va,
                mqd: queue.mqd,
                mqd_size: queue.mqd_size,
            },
        };
        // SAFETY: USERQ reads and writes a `drm_amdgpu_userq`. `mqd` points to caller memory of
        // `mqd_size` bytes.
        unsafe { ioctl_with_mut_ref(self.fd(), DRM_IOCTL_AMDGPU_USERQ, &mut userq)? };
        // SAFETY: A successful create fills in `out`.
        Ok(unsafe { userq.out.queue_id })
    }

    fn userq_free(&self, queue_id: u32) -> AmdgpuResult<()> {
        let mut userq = drm_amdgpu_userq {
            in_: drm_amdgpu_userq_in {
                op: AMDGPU_USERQ_OP_FREE,
                queue_id,
                ..Default::default()
            },
        };
        // SAFETY: USERQ reads and writes a `drm_amdgpu_userq`.
        unsafe { ioctl_with_mut_ref(self.fd(), DRM_IOCTL_AMDGPU_USERQ, &mut userq) }
    }

    fn userq_signal(&self, signal: &UserqSignal<'_>) -> AmdgpuResult<()> {
        let mut args = drm_amdgpu_userq_signal {
            queue_id: signal.queue_id,
            _pad: 0,
            syncobj_handles: signal.syncobj_handles.as_ptr() as u64,
            num_syncobj_handles: signal.syncobj_handles.len().try_into()?,
            bo_read_handles: signal.bo_read_handles.as_ptr() as u64,
            bo_write_handles: signal.bo_write_handles.as_ptr() as u64,
            num_bo_read_handles: signal.bo_read_handles.len().try_into()?,
            num_bo_write_handles: signal.bo_write_handles.len().try_into()?,
        };
        // SAFETY: Every array outlives the call and matches its count.
        unsafe { ioctl_with_mut_ref(self.fd(), DRM_IOCTL_AMDGPU_USERQ_SIGNAL, &mut args) }
    }

    fn userq_wait(&self, wait: &mut UserqWait<'_>) -> AmdgpuResult<()> {
        if wait.syncobj_timeline_handles.len() != wait.syncobj_timeline_points.len() {
            return Err(AmdgpuError::InvalidArgument(
                "timeline handles and points differ in length",
            ));
        }

        let mut fences = vec![drm_amdgpu_userq_fence_info::default(); wait.out_fences.len()];
        let mut args = drm_amdgpu_userq_wait {
            waitq_id: wait.waitq_id,
            _pad: 0,
            syncobj_handles: wait.syncobj_handles.as_ptr() as u64,
            syncobj_timeline_handles: wait.syncobj_timeline_handles.as_ptr() as u64,
            syncobj_timeline_points: wait.syncobj_timeline_points.as_ptr() as u64,
            bo_read_handles: wait.bo_read_handles.as_ptr() as u64,
            bo_write_handles: wait.bo_write_handles.as_ptr() as u64,
            num_syncobj_timeline_handles: wait.syncobj_timeline_handles.len().try_into()?,
            num_fences: fences.len().try_into()?,
            num_syncobj_handles: wait.syncobj_handles.len().try_into()?,
            num_bo_read_handles: wait.bo_read_handles.len().try_into()?,
            num_bo_write_handles: wait.bo_write_handles.len().try_into()?,
            out_fences: fences.as_mut_ptr() as u64,
        };
        // SAFETY: Every array outlives the call and matches its count. The kernel writes at most
        // `num_fences` entries into `fences`.
        unsafe { ioctl_with_mut_ref(self.fd(), DRM_IOCTL_AMDGPU_USERQ_WAIT, &mut args)? };

        // With no room for fences the kernel only reports how many there are.
        let count = usize::from(args.num_fences);
        fences.resize(count, Default::default());
        wait.out_fences = fences.iter().map(|f| (f.va, f.value)).collect();
        Ok(())
    }
}
