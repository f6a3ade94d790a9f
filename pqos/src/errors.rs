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

use thiserror::Error as ThisError;

use cpu_info::CPUTopologyError;
use pqos_machine::MachineError;

#[derive(ThisError, Debug)]
pub enum PqosError {
    /// The caller violated a precondition.
    #[error("invalid parameter: {reason}")]
    InvalidParam { reason: String },

    /// Neither monitoring nor allocation is available on this platform.
    #[error("no platform QoS capability discovered")]
    NotSupported,

    #[error(transparent)]
    Hw(#[from] HwError),

    #[error(transparent)]
    Topology(#[from] CPUTopologyError),

    #[error("failed to open the log sink: {0}")]
    LogSink(#[source] std::io::Error),

    /// An operation was issued in the wrong lifecycle state.
    #[error("the library is already initialized")]
    InitState,

    /// Capabilities were discovered but no subsystem could be brought up.
    #[error("none of the discovered capabilities could be initialized")]
    SubsystemInit,
}

#[derive(ThisError, Debug)]
pub enum HwError {
    #[error(transparent)]
    Machine(#[from] MachineError),

    /// Sockets disagree on the CDP enable bit; only a reboot converges them.
    #[error("inconsistent CDP settings across sockets, please reboot your system")]
    CdpInconsistent,
}

impl From<MachineError> for PqosError {
    fn from(error: MachineError) -> Self {
        Self::Hw(HwError::Machine(error))
    }
}

impl PqosError {
    pub(crate) fn invalid_param(reason: impl Into<String>) -> Self {
        Self::InvalidParam {
            reason: reason.into(),
        }
    }
}
