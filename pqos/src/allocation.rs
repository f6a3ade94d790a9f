/*
 * Copyright 2024 Fluence Labs Limited
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use cpu_info::CPUTopology;
use cpu_info::SocketId;

use crate::capability::CapabilitySnapshot;
use crate::errors::PqosError;
use crate::PqosResult;

/// Allocation runtime state: the logical class budget and the sockets the
/// class masks are programmed on.
#[derive(Debug)]
pub struct Allocation {
    num_classes: u32,
    sockets: Vec<SocketId>,
}

impl Allocation {
    pub(crate) fn init(
        topology: &CPUTopology,
        snapshot: &CapabilitySnapshot,
    ) -> PqosResult<Self> {
        let l3ca = snapshot.l3ca().ok_or(PqosError::NotSupported)?;
        let sockets = topology.sockets();

        tracing::info!(
            "allocation init OK: {} classes on {} sockets",
            l3ca.num_classes,
            sockets.len()
        );

        Ok(Self {
            num_classes: l3ca.num_classes,
            sockets,
        })
    }

    pub fn num_classes(&self) -> u32 {
        self.num_classes
    }

    pub fn sockets(&self) -> &[SocketId] {
        &self.sockets
    }

    /// Class ids programmable on this platform.
    pub fn classes(&self) -> impl Iterator<Item = u32> {
        0..self.num_classes
    }

    pub(crate) fn fini(self) -> PqosResult<()> {
        tracing::info!("allocation subsystem shut down");
        Ok(())
    }
}
