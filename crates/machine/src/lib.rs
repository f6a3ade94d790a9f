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

mod errors;
mod machine;

#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
mod linux_x86_64;
#[cfg(not(all(target_os = "linux", target_arch = "x86_64")))]
mod other;

pub use errors::MachineError;
pub use machine::CpuidOut;
pub use machine::Machine;

#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
pub use linux_x86_64::LinuxMachine;
#[cfg(not(all(target_os = "linux", target_arch = "x86_64")))]
pub use other::UnsupportedMachine;

/// The implementation matching the build target.
#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
pub type PlatformMachine = LinuxMachine;
#[cfg(not(all(target_os = "linux", target_arch = "x86_64")))]
pub type PlatformMachine = UnsupportedMachine;

pub type MachineResult<T> = Result<T, MachineError>;
