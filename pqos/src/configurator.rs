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
use cpu_info::LogicalCoreId;
use pqos_machine::Machine;

use crate::errors::HwError;
use crate::registers::all_ways_mask;
use crate::registers::l3ca_mask_register;
use crate::registers::msr;
use crate::registers::L3QosCfg;
use crate::registers::PqrAssoc;
use crate::registers::RegisterLayout;
use crate::PqosResult;

/// Applies CAT/CDP transitions across sockets.
///
/// The write sequences mutate machine-global state and are not rolled back:
/// a mid-sequence failure leaves the earlier sockets reconfigured, which the
/// log reports before the error propagates.
pub(crate) struct CatConfigurator<'caps> {
    machine: &'caps dyn Machine,
    topology: &'caps CPUTopology,
}

impl<'caps> CatConfigurator<'caps> {
    pub(crate) fn new(machine: &'caps dyn Machine, topology: &'caps CPUTopology) -> Self {
        Self { machine, topology }
    }

    /// One core per socket for socket-scoped MSRs.
    fn socket_representatives(&self) -> Vec<LogicalCoreId> {
        self.topology
            .sockets()
            .into_iter()
            .filter_map(|socket| self.topology.first_core_on_socket(socket))
            .collect()
    }

    /// Opens every way to every class on all sockets, then parks every core
    /// back on class 0.
    pub(crate) fn cat_reset(&self, num_classes: u32, num_ways: u32) -> PqosResult<()> {
        tracing::info!("resetting CAT configuration across all sockets");

        let ways_mask = all_ways_mask(num_ways);
        for core_id in self.socket_representatives() {
            for class_id in 0..num_classes {
                self.machine
                    .msr_write(core_id, l3ca_mask_register(class_id), ways_mask)?;
            }
        }

        for core in self.topology.cores() {
            let value = self.machine.msr_read(core.lcore, msr::IA32_PQR_ASSOC)?;
            let assoc = PqrAssoc::from_msr_value(value).with_class(0);
            self.machine
                .msr_write(core.lcore, msr::IA32_PQR_ASSOC, assoc.to_msr_value())?;
        }

        Ok(())
    }

    /// Flips the CDP enable bit on every socket.
    pub(crate) fn cdp_enable(&self, enable: bool) -> PqosResult<()> {
        tracing::info!(
            "{} CDP across all sockets",
            if enable { "enabling" } else { "disabling" }
        );

        for core_id in self.socket_representatives() {
            let value = self.machine.msr_read(core_id, msr::IA32_L3_QOS_CFG)?;
            let value = L3QosCfg { cdp_enabled: enable }.apply_to(value);
            self.machine
                .msr_write(core_id, msr::IA32_L3_QOS_CFG, value)?;
        }

        Ok(())
    }

    /// Reads the CDP enable bit on every socket. Sockets that disagree are
    /// an error only a reboot clears; no convergence is attempted.
    pub(crate) fn cdp_is_enabled(&self) -> PqosResult<bool> {
        let mut enabled_num = 0u32;
        let mut disabled_num = 0u32;

        for core_id in self.socket_representatives() {
            let value = self.machine.msr_read(core_id, msr::IA32_L3_QOS_CFG)?;
            if L3QosCfg::from_msr_value(value).cdp_enabled {
                enabled_num += 1;
            } else {
                disabled_num += 1;
            }
        }

        if enabled_num > 0 && disabled_num > 0 {
            tracing::error!("inconsistent CDP settings across sockets, please reboot your system");
            return Err(HwError::CdpInconsistent.into());
        }

        Ok(enabled_num > 0)
    }
}
