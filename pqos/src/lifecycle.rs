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

#[cfg(test)]
mod tests;

use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use cpu_info::CPUTopology;
use pqos_machine::Machine;
use pqos_machine::PlatformMachine;

use crate::allocation::Allocation;
use crate::capability::CapabilityDiscovery;
use crate::capability::CapabilitySnapshot;
use crate::config::PqosConfig;
use crate::errors::PqosError;
use crate::log;
use crate::monitoring::Monitoring;
use crate::PqosResult;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum LifecycleState {
    Uninit,
    Init,
}

/// There is one resource-control interface per machine, so at most one live
/// `Pqos` value per process.
static LIFECYCLE: Mutex<LifecycleState> = Mutex::new(LifecycleState::Uninit);

fn lifecycle() -> MutexGuard<'static, LifecycleState> {
    LIFECYCLE.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Releases the process-wide slot when the owning `Pqos` goes away.
#[derive(Debug)]
struct LifecycleSlot;

impl Drop for LifecycleSlot {
    fn drop(&mut self) {
        *lifecycle() = LifecycleState::Uninit;
    }
}

/// The initialized library: owns the topology, the machine backend, the
/// capability snapshot and the monitoring/allocation subsystems.
///
/// Consumers borrow the snapshot and topology through [`Pqos::capabilities`];
/// the borrows end when the value is finalized or dropped.
pub struct Pqos {
    topology: CPUTopology,
    machine: Box<dyn Machine>,
    snapshot: CapabilitySnapshot,
    monitoring: Option<Monitoring>,
    allocation: Option<Allocation>,
    _slot: LifecycleSlot,
}

impl Pqos {
    /// Initializes the library against the platform hardware.
    pub fn init(config: PqosConfig) -> PqosResult<Self> {
        Self::init_inner(config, |topology| {
            Ok(Box::new(PlatformMachine::new(topology.max_core_id())))
        })
    }

    /// Initializes the library on a caller-supplied machine backend.
    pub fn init_with_machine(config: PqosConfig, machine: Box<dyn Machine>) -> PqosResult<Self> {
        Self::init_inner(config, move |_topology| Ok(machine))
    }

    fn init_inner(
        config: PqosConfig,
        machine_for: impl FnOnce(&CPUTopology) -> PqosResult<Box<dyn Machine>>,
    ) -> PqosResult<Self> {
        // The state lock is held through the whole bring-up: concurrent
        // callers either win it first or observe the initialized state.
        // Any failure exit drops the partially built stages in reverse.
        let mut state = lifecycle();
        if *state == LifecycleState::Init {
            tracing::error!("the library is already initialized");
            return Err(PqosError::InitState);
        }

        log::setup(&config.logs)?;

        let topology = match config.topology {
            Some(cores) => {
                if cores.is_empty() {
                    tracing::error!("provided CPU topology is empty");
                    return Err(PqosError::invalid_param("provided CPU topology is empty"));
                }
                CPUTopology::from_cores(cores)
                    .map_err(|error| PqosError::invalid_param(error.to_string()))?
            }
            None => CPUTopology::detect()?,
        };
        tracing::info!("topology ready: {} logical cores", topology.num_cores());

        let machine = machine_for(&topology)?;

        let discovery = CapabilityDiscovery::new(machine.as_ref(), &topology);
        let snapshot = discovery.discover(config.cdp)?;

        let monitoring = match Monitoring::init(&topology, &snapshot) {
            Ok(monitoring) => Some(monitoring),
            Err(error) => {
                tracing::warn!("monitoring init failed: {error}");
                None
            }
        };

        let allocation = match Allocation::init(&topology, &snapshot) {
            Ok(allocation) => Some(allocation),
            Err(error) => {
                tracing::warn!("allocation init failed: {error}");
                None
            }
        };

        if monitoring.is_none() && allocation.is_none() {
            tracing::error!("none of the discovered capabilities could be initialized");
            return Err(PqosError::SubsystemInit);
        }

        *state = LifecycleState::Init;
        tracing::info!("library initialized");

        Ok(Self {
            topology,
            machine,
            snapshot,
            monitoring,
            allocation,
            _slot: LifecycleSlot,
        })
    }

    /// Capability snapshot and topology; both valid until the value is
    /// finalized or dropped.
    pub fn capabilities(&self) -> (&CapabilitySnapshot, &CPUTopology) {
        (&self.snapshot, &self.topology)
    }

    pub fn machine(&self) -> &dyn Machine {
        self.machine.as_ref()
    }

    pub fn monitoring(&self) -> Option<&Monitoring> {
        self.monitoring.as_ref()
    }

    pub fn monitoring_mut(&mut self) -> Option<&mut Monitoring> {
        self.monitoring.as_mut()
    }

    pub fn allocation(&self) -> Option<&Allocation> {
        self.allocation.as_ref()
    }

    /// Tears the library down in reverse bring-up order. Every stage runs
    /// even if an earlier one failed; the first error is returned.
    pub fn fini(mut self) -> PqosResult<()> {
        let mut result = Ok(());

        if let Some(allocation) = self.allocation.take() {
            if let Err(error) = allocation.fini() {
                tracing::error!("allocation fini failed: {error}");
                result = Err(error);
            }
        }

        if let Some(monitoring) = self.monitoring.take() {
            if let Err(error) = monitoring.fini() {
                tracing::error!("monitoring fini failed: {error}");
                if result.is_ok() {
                    result = Err(error);
                }
            }
        }

        tracing::info!("library shut down");

        // Dropping self frees the snapshot, the topology, the machine
        // backend, and releases the process-wide slot.
        result
    }
}
