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

use cpu_info::LogicalCoreId;

use crate::MachineResult;

/// Output registers of a single CPUID invocation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CpuidOut {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
}

/// Access to the identification and model-specific registers of the machine.
///
/// MSR operations take effect on the supplied logical core. CPUID executes
/// on whichever core runs the caller.
///
/// Operations are not retried here; a failed probe aborts the enclosing
/// discovery or configuration sequence.
pub trait Machine: Send + Sync {
    fn cpuid(&self, leaf: u32, subleaf: u32) -> MachineResult<CpuidOut>;

    fn msr_read(&self, core_id: LogicalCoreId, register_id: u32) -> MachineResult<u64>;

    fn msr_write(
        &self,
        core_id: LogicalCoreId,
        register_id: u32,
        value: u64,
    ) -> MachineResult<()>;
}
