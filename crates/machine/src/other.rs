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

use crate::errors::MachineError;
use crate::machine::CpuidOut;
use crate::machine::Machine;
use crate::MachineResult;

/// Stub for targets without CPUID/MSR support; every operation fails.
#[derive(Clone, Debug, Default)]
pub struct UnsupportedMachine;

impl UnsupportedMachine {
    pub fn new(_max_core_id: LogicalCoreId) -> Self {
        Self
    }
}

impl Machine for UnsupportedMachine {
    fn cpuid(&self, _leaf: u32, _subleaf: u32) -> MachineResult<CpuidOut> {
        Err(MachineError::UnsupportedPlatform)
    }

    fn msr_read(&self, _core_id: LogicalCoreId, _register_id: u32) -> MachineResult<u64> {
        Err(MachineError::UnsupportedPlatform)
    }

    fn msr_write(
        &self,
        _core_id: LogicalCoreId,
        _register_id: u32,
        _value: u64,
    ) -> MachineResult<()> {
        Err(MachineError::UnsupportedPlatform)
    }
}
