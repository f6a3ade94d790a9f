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

mod discovery;

pub(crate) use discovery::CapabilityDiscovery;

use serde::Deserialize;
use serde::Serialize;

/// Version stamped into every capability snapshot.
pub const CAPABILITY_VERSION: u32 = 1;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MonitorEventType {
    /// L3 cache occupancy per RMID.
    L3Occupancy,
    /// Local memory bandwidth per RMID.
    LocalMemBandwidth,
    /// Total memory bandwidth per RMID.
    TotalMemBandwidth,
    /// Remote memory bandwidth, virtual: total minus local.
    RemoteMemBandwidth,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorEvent {
    pub event_type: MonitorEventType,
    pub max_rmid: u32,
    pub scale_factor: u32,
}

/// Monitoring capability as discovered: the socket-wide RMID ceiling, the L3
/// size the occupancy counters are scaled against and the supported events.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonCapability {
    max_rmid: u32,
    l3_size_bytes: u32,
    events: Vec<MonitorEvent>,
}

impl MonCapability {
    pub(crate) fn new(max_rmid: u32, l3_size_bytes: u32, events: Vec<MonitorEvent>) -> Self {
        Self {
            max_rmid,
            l3_size_bytes,
            events,
        }
    }

    pub fn max_rmid(&self) -> u32 {
        self.max_rmid
    }

    pub fn l3_size_bytes(&self) -> u32 {
        self.l3_size_bytes
    }

    pub fn events(&self) -> &[MonitorEvent] {
        &self.events
    }

    pub fn event(&self, event_type: MonitorEventType) -> Option<&MonitorEvent> {
        self.events
            .iter()
            .find(|event| event.event_type == event_type)
    }
}

/// L3 cache allocation capability.
///
/// `num_classes` counts logical classes: when CDP is on, each logical class
/// pairs a code and a data mask in hardware, so the count is half of what
/// the hardware enumerates.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct L3CaCapability {
    pub num_classes: u32,
    pub num_ways: u32,
    pub way_size_bytes: u32,
    pub way_contention_mask: u64,
    pub cdp_supported: bool,
    pub cdp_on: bool,
}

/// Immutable aggregate of everything discovery found; built exactly once per
/// init, borrowed by consumers until fini.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySnapshot {
    version: u32,
    mon: Option<MonCapability>,
    l3ca: Option<L3CaCapability>,
}

impl CapabilitySnapshot {
    pub(crate) fn new(mon: Option<MonCapability>, l3ca: Option<L3CaCapability>) -> Self {
        Self {
            version: CAPABILITY_VERSION,
            mon,
            l3ca,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn mon(&self) -> Option<&MonCapability> {
        self.mon.as_ref()
    }

    pub fn l3ca(&self) -> Option<&L3CaCapability> {
        self.l3ca.as_ref()
    }
}
