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

use std::collections::HashMap;

use cpu_info::ClusterId;
use cpu_info::CPUTopology;

use crate::capability::CapabilitySnapshot;
use crate::capability::MonitorEvent;
use crate::errors::PqosError;
use crate::PqosResult;

/// RMID every core runs on by default; never handed out.
const DEFAULT_RMID: u32 = 0;

/// Monitoring runtime state: the discovered events plus a free-RMID pool per
/// L3 cluster, sized by the capability's RMID ceiling.
#[derive(Debug)]
pub struct Monitoring {
    events: Vec<MonitorEvent>,
    rmid_pools: HashMap<ClusterId, RmidPool>,
}

#[derive(Debug)]
struct RmidPool {
    free: Vec<u32>,
}

impl RmidPool {
    fn new(max_rmid: u32) -> Self {
        let free = (DEFAULT_RMID + 1..max_rmid).rev().collect();
        Self { free }
    }

    fn assign(&mut self) -> Option<u32> {
        self.free.pop()
    }

    fn release(&mut self, rmid: u32) {
        if rmid != DEFAULT_RMID && !self.free.contains(&rmid) {
            self.free.push(rmid);
        }
    }
}

impl Monitoring {
    pub(crate) fn init(
        topology: &CPUTopology,
        snapshot: &CapabilitySnapshot,
    ) -> PqosResult<Self> {
        let mon = snapshot.mon().ok_or(PqosError::NotSupported)?;

        let clusters = topology.clusters();
        let rmid_pools = clusters
            .iter()
            .map(|&cluster| (cluster, RmidPool::new(mon.max_rmid())))
            .collect();

        tracing::info!(
            "monitoring init OK: max RMID {}, {} clusters",
            mon.max_rmid(),
            clusters.len()
        );

        Ok(Self {
            events: mon.events().to_vec(),
            rmid_pools,
        })
    }

    pub fn events(&self) -> &[MonitorEvent] {
        &self.events
    }

    /// Grabs a free RMID on the cluster; RMID 0 stays reserved as default.
    pub fn assign_rmid(&mut self, cluster: ClusterId) -> Option<u32> {
        self.rmid_pools.get_mut(&cluster)?.assign()
    }

    pub fn release_rmid(&mut self, cluster: ClusterId, rmid: u32) {
        if let Some(pool) = self.rmid_pools.get_mut(&cluster) {
            pool.release(rmid);
        }
    }

    pub(crate) fn fini(self) -> PqosResult<()> {
        tracing::info!("monitoring subsystem shut down");
        Ok(())
    }
}
