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
use pqos_machine::CpuidOut;
use pqos_machine::Machine;

use super::CapabilitySnapshot;
use super::L3CaCapability;
use super::MonCapability;
use super::MonitorEvent;
use super::MonitorEventType;
use crate::config::CdpConfig;
use crate::configurator::CatConfigurator;
use crate::errors::PqosError;
use crate::registers::bit_set;
use crate::registers::cpuid;
use crate::PqosResult;

/// Brand substrings of parts that carry L3 allocation without advertising it
/// through CPUID. All of them expose 4 classes of service and no CDP.
const CAT_CAPABLE_BRANDS: [&str; 8] = [
    "E5-2658 v3",
    "E5-2648L v3",
    "E5-2628L v3",
    "E5-2618L v3",
    "E5-2608L v3",
    "E5-2658A v3",
    "E3-1258L v4",
    "E3-1278L v4",
];

const BRAND_FALLBACK_CLASSES: u32 = 4;

/// L3 geometry decoded from the deterministic cache parameters leaf.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct L3CacheGeometry {
    pub(crate) num_ways: u32,
    pub(crate) line_size: u32,
    pub(crate) num_partitions: u32,
    pub(crate) num_sets: u32,
}

impl L3CacheGeometry {
    pub(crate) fn decode(registers: CpuidOut) -> Self {
        Self {
            num_ways: ((registers.ebx >> 22) & 0x3FF) + 1,
            line_size: (registers.ebx & 0xFFF) + 1,
            num_partitions: ((registers.ebx >> 12) & 0x3FF) + 1,
            num_sets: registers.ecx + 1,
        }
    }

    pub(crate) fn total_size(&self) -> u32 {
        self.num_ways * self.num_partitions * self.line_size * self.num_sets
    }
}

/// Probes CPUID for monitoring and allocation capabilities and reconciles
/// the requested CDP state with what the hardware currently runs.
pub(crate) struct CapabilityDiscovery<'caps> {
    machine: &'caps dyn Machine,
    topology: &'caps CPUTopology,
}

impl<'caps> CapabilityDiscovery<'caps> {
    pub(crate) fn new(machine: &'caps dyn Machine, topology: &'caps CPUTopology) -> Self {
        Self { machine, topology }
    }

    /// Runs full discovery; at least one capability must be present.
    pub(crate) fn discover(&self, cdp_config: CdpConfig) -> PqosResult<CapabilitySnapshot> {
        let mon = self.discover_monitoring()?;
        match &mon {
            Some(mon) => tracing::info!(
                "monitoring capability detected: {} events, max RMID {}",
                mon.events().len(),
                mon.max_rmid()
            ),
            None => tracing::info!("monitoring capability not detected"),
        }

        let l3ca = self.discover_l3ca(cdp_config)?;
        match &l3ca {
            Some(l3ca) => tracing::info!(
                "L3 allocation detected: CDP support={}, CDP on={}, #COS={}, #ways={}, \
                 ways contention bit-mask {:#X}",
                l3ca.cdp_supported,
                l3ca.cdp_on,
                l3ca.num_classes,
                l3ca.num_ways,
                l3ca.way_contention_mask
            ),
            None => tracing::info!("L3 allocation capability not detected"),
        }

        if mon.is_none() && l3ca.is_none() {
            tracing::error!("no platform QoS capability discovered");
            return Err(PqosError::NotSupported);
        }

        Ok(CapabilitySnapshot::new(mon, l3ca))
    }

    fn l3_geometry(&self) -> PqosResult<L3CacheGeometry> {
        let registers = self
            .machine
            .cpuid(cpuid::LEAF_CACHE_PARAMS, cpuid::SUBLEAF_L3_CACHE)?;

        Ok(L3CacheGeometry::decode(registers))
    }

    fn discover_monitoring(&self) -> PqosResult<Option<MonCapability>> {
        let features = self.machine.cpuid(cpuid::LEAF_EXTENDED_FEATURES, 0)?;
        if !bit_set(features.ebx, cpuid::MONITORING_BIT) {
            tracing::warn!("cache monitoring capability not supported");
            return Ok(None);
        }

        let mon_caps = self.machine.cpuid(cpuid::LEAF_MONITORING, 0)?;
        let max_rmid = mon_caps.ebx + 1;
        if !bit_set(mon_caps.edx, cpuid::L3_MONITORING_BIT) {
            tracing::warn!("L3 resource monitoring not supported");
            return Ok(None);
        }

        let l3_size = self.l3_geometry()?.total_size();

        let events_leaf = self.machine.cpuid(cpuid::LEAF_MONITORING, 1)?;
        let event_max_rmid = events_leaf.ecx + 1;
        let scale_factor = events_leaf.ebx;
        let event = |event_type| MonitorEvent {
            event_type,
            max_rmid: event_max_rmid,
            scale_factor,
        };

        let local_bw = bit_set(events_leaf.edx, cpuid::LOCAL_MEM_BW_BIT);
        let total_bw = bit_set(events_leaf.edx, cpuid::TOTAL_MEM_BW_BIT);

        let mut events = Vec::new();
        if bit_set(events_leaf.edx, cpuid::L3_OCCUPANCY_BIT) {
            events.push(event(MonitorEventType::L3Occupancy));
        }
        if local_bw {
            events.push(event(MonitorEventType::LocalMemBandwidth));
        }
        if total_bw {
            events.push(event(MonitorEventType::TotalMemBandwidth));
        }
        if local_bw && total_bw {
            // Remote bandwidth is synthesized as total minus local.
            events.push(event(MonitorEventType::RemoteMemBandwidth));
        }

        if events.is_empty() {
            return Ok(None);
        }

        Ok(Some(MonCapability::new(max_rmid, l3_size, events)))
    }

    fn discover_l3ca(&self, cdp_config: CdpConfig) -> PqosResult<Option<L3CaCapability>> {
        let features = self.machine.cpuid(cpuid::LEAF_EXTENDED_FEATURES, 0)?;

        let detected = if bit_set(features.ebx, cpuid::ALLOCATION_BIT) {
            tracing::info!("CPUID reports L3 allocation support");
            self.discover_l3ca_cpuid(cdp_config)?
        } else {
            tracing::info!("CPUID does not report L3 allocation, checking the brand string");
            self.discover_l3ca_brand_string(cdp_config)?
        };

        let mut l3ca = match detected {
            Some(l3ca) => l3ca,
            None => return Ok(None),
        };

        // The geometry probe runs on both detection paths: it supplies the
        // way count for brand-detected parts and the way size everywhere.
        let geometry = self.l3_geometry()?;
        let l3_size = geometry.total_size();
        l3ca.num_ways = geometry.num_ways;
        l3ca.way_size_bytes = l3_size / geometry.num_ways;
        tracing::info!(
            "L3 cache: {l3_size} bytes, {} ways of {} bytes",
            l3ca.num_ways,
            l3ca.way_size_bytes
        );

        Ok(Some(l3ca))
    }

    fn discover_l3ca_cpuid(&self, cdp_config: CdpConfig) -> PqosResult<Option<L3CaCapability>> {
        let resources = self.machine.cpuid(cpuid::LEAF_ALLOCATION, 0)?;
        let mut res_id = resources.ebx;

        if !bit_set(res_id, cpuid::L3_ALLOCATION_RES_ID) {
            if res_id != 0 {
                tracing::info!(
                    "unsupported resource ids detected: CPUID({:#X}, 0).ebx = {res_id:#X}",
                    cpuid::LEAF_ALLOCATION
                );
            }
            tracing::info!("no supported resource allocation capability detected");
            return Ok(None);
        }

        let l3_leaf = self
            .machine
            .cpuid(cpuid::LEAF_ALLOCATION, cpuid::L3_ALLOCATION_RES_ID)?;
        let num_classes = l3_leaf.edx + 1;
        let num_ways = l3_leaf.eax + 1;
        let way_contention_mask = l3_leaf.ebx as u64;
        let cdp_supported = bit_set(l3_leaf.ecx, cpuid::CDP_BIT);

        res_id &= !(1 << cpuid::L3_ALLOCATION_RES_ID);
        if res_id != 0 {
            tracing::warn!(
                "unsupported resource ids detected: CPUID({:#X}, 0).ebx = {res_id:#X}",
                cpuid::LEAF_ALLOCATION
            );
        }

        let configurator = CatConfigurator::new(self.machine, self.topology);

        let mut cdp_on = false;
        if cdp_supported {
            cdp_on = configurator.cdp_is_enabled()?;
            tracing::info!("CDP is {}", if cdp_on { "enabled" } else { "disabled" });
        }

        match cdp_config {
            CdpConfig::RequireOn => {
                if !cdp_supported {
                    tracing::error!("CDP requested but not supported by the platform");
                    return Err(PqosError::invalid_param(
                        "CDP requested but not supported by the platform",
                    ));
                }
                if !cdp_on {
                    tracing::info!("turning CDP on");
                    configurator.cat_reset(num_classes, num_ways)?;
                    configurator.cdp_enable(true)?;
                    cdp_on = true;
                }
            }
            CdpConfig::RequireOff => {
                if cdp_supported && cdp_on {
                    tracing::info!("turning CDP off");
                    configurator.cat_reset(num_classes, num_ways)?;
                    configurator.cdp_enable(false)?;
                    cdp_on = false;
                }
            }
            CdpConfig::Any => {}
        }

        // CDP pairs a code and a data mask per class, halving the usable count.
        let num_classes = if cdp_on { num_classes / 2 } else { num_classes };

        if !matches!(num_classes, 4 | 8 | 16) {
            tracing::warn!("unexpected class-of-service count {num_classes}");
        }

        Ok(Some(L3CaCapability {
            num_classes,
            num_ways,
            way_size_bytes: 0,
            way_contention_mask,
            cdp_supported,
            cdp_on,
        }))
    }

    fn discover_l3ca_brand_string(
        &self,
        cdp_config: CdpConfig,
    ) -> PqosResult<Option<L3CaCapability>> {
        if cdp_config == CdpConfig::RequireOn {
            tracing::error!("CDP requested but not supported by the platform");
            return Err(PqosError::invalid_param(
                "CDP requested but not supported by the platform",
            ));
        }

        let brand = match self.brand_string()? {
            Some(brand) => brand,
            None => return Ok(None),
        };
        tracing::info!("CPU brand string '{brand}'");

        if !CAT_CAPABLE_BRANDS.iter().any(|known| brand.contains(known)) {
            tracing::warn!("cache allocation not supported on model name '{brand}'");
            return Ok(None);
        }

        tracing::info!("cache allocation detected for model name '{brand}'");

        // Way count and way size are filled in by the geometry probe.
        Ok(Some(L3CaCapability {
            num_classes: BRAND_FALLBACK_CLASSES,
            num_ways: 0,
            way_size_bytes: 0,
            way_contention_mask: 0,
            cdp_supported: false,
            cdp_on: false,
        }))
    }

    /// The 48-byte brand string from the extended function leaves.
    fn brand_string(&self) -> PqosResult<Option<String>> {
        let extended = self.machine.cpuid(cpuid::LEAF_EXTENDED_MAX, 0)?;
        if extended.eax < cpuid::LEAF_BRAND_LAST {
            tracing::warn!("brand string extended CPUID functions not supported");
            return Ok(None);
        }

        let mut bytes = Vec::with_capacity(48);
        for leaf in cpuid::LEAF_BRAND_FIRST..=cpuid::LEAF_BRAND_LAST {
            let registers = self.machine.cpuid(leaf, 0)?;
            for value in [registers.eax, registers.ebx, registers.ecx, registers.edx] {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }

        let end = bytes.iter().position(|&byte| byte == 0).unwrap_or(bytes.len());
        Ok(Some(String::from_utf8_lossy(&bytes[..end]).into_owned()))
    }
}
