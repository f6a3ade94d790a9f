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

#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![deny(
    dead_code,
    nonstandard_style,
    unused_imports,
    unused_mut,
    unused_variables,
    unused_unsafe,
    unreachable_patterns
)]

mod allocation;
mod capability;
mod config;
mod configurator;
mod errors;
mod lifecycle;
mod log;
mod monitoring;
pub mod registers;

pub use allocation::Allocation;
pub use capability::CapabilitySnapshot;
pub use capability::L3CaCapability;
pub use capability::MonCapability;
pub use capability::MonitorEvent;
pub use capability::MonitorEventType;
pub use capability::CAPABILITY_VERSION;
pub use config::CdpConfig;
pub use config::Logs;
pub use config::LogSink;
pub use config::PqosConfig;
pub use errors::HwError;
pub use errors::PqosError;
pub use lifecycle::Pqos;
pub use monitoring::Monitoring;

pub use cpu_info::ClusterId;
pub use cpu_info::CoreInfo;
pub use cpu_info::CPUTopology;
pub use cpu_info::LogicalCoreId;
pub use cpu_info::SocketId;
pub use pqos_machine::CpuidOut;
pub use pqos_machine::Machine;

pub type PqosResult<T> = Result<T, PqosError>;
