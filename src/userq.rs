// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! User-mode queues. Only the native transport has them.

use crate::transport::UserqCreate;
use crate::transport::UserqSignal;
use crate::transport::UserqWait;
use crate::AmdgpuResult;
use crate::Device;

impl Device {
    /// Creates a user-mode queue and returns its id.
    pub fn userq_create(&self, queue: &UserqCreate) -> AmdgpuResult<u32> {
        self.shared.transport.userq_create(queue)
    }

    pub fn userq_free(&self, queue_id: u32) -> AmdgpuResult<()> {
        self.shared.transport.userq_free(queue_id)
    }

    pub fn userq_signal(&self, signal: &UserqSignal<'_>) -> AmdgpuResult<()> {
        self.shared.transport.userq_signal(signal)
    }

    /// Collects the fences a queue must wait for into `wait.out_fences`.
    pub fn userq_wait(&self, wait: &mut UserqWait<'_>) -> AmdgpuResult<()> {
        self.shared.transport.userq_wait(wait)
    }
}
