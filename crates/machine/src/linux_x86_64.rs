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

use std::fs::File;
use std::fs::OpenOptions;

use cpu_info::LogicalCoreId;

use crate::errors::MachineError;
use crate::machine::CpuidOut;
use crate::machine::Machine;
use crate::MachineResult;

/// CPUID and `/dev/cpu/N/msr` backed implementation.
///
/// The MSR device of a core is opened per operation; the kernel routes each
/// access to the core the device belongs to, so no thread pinning is
/// involved.
#[derive(Clone, Debug)]
pub struct LinuxMachine {
    max_core_id: LogicalCoreId,
}

impl LinuxMachine {
    pub fn new(max_core_id: LogicalCoreId) -> Self {
        Self { max_core_id }
    }

    /// Opens the MSR device of `core_id` with the requested access,
    /// rejecting cores beyond the initialized range.
    fn msr_device(&self, core_id: LogicalCoreId, writable: bool) -> MachineResult<File> {
        if core_id > self.max_core_id {
            return Err(MachineError::CoreOutOfRange {
                core_id,
                max_core_id: self.max_core_id,
            });
        }

        OpenOptions::new()
            .read(!writable)
            .write(writable)
            .open(format!("/dev/cpu/{core_id}/msr"))
            .map_err(|io_error| MachineError::open_device(core_id, writable, io_error))
    }
}

impl Machine for LinuxMachine {
    fn cpuid(&self, leaf: u32, subleaf: u32) -> MachineResult<CpuidOut> {
        let registers = raw_cpuid::cpuid!(leaf, subleaf);

        Ok(CpuidOut {
            eax: registers.eax,
            ebx: registers.ebx,
            ecx: registers.ecx,
            edx: registers.edx,
        })
    }

    fn msr_read(&self, core_id: LogicalCoreId, register_id: u32) -> MachineResult<u64> {
        use nix::sys::uio::pread;

        let device = self.msr_device(core_id, false)?;

        let mut value = [0u8; 8];
        pread(device, &mut value, register_id as i64)
            .map_err(|errno| MachineError::read_failed(register_id, core_id, errno))?;
        let result = u64::from_le_bytes(value);

        tracing::debug!(
            "Read MSR register_id {register_id:#X} value {result:#X} at core id {core_id}"
        );

        Ok(result)
    }

    fn msr_write(
        &self,
        core_id: LogicalCoreId,
        register_id: u32,
        value: u64,
    ) -> MachineResult<()> {
        use nix::sys::uio::pwrite;

        let device = self.msr_device(core_id, true)?;

        let value_as_bytes = value.to_le_bytes();
        pwrite(device, &value_as_bytes, register_id as i64)
            .map_err(|errno| MachineError::write_failed(value, register_id, core_id, errno))?;

        tracing::debug!(
            "Write MSR register_id {register_id:#X} value {value:#X} at core id {core_id}"
        );

        Ok(())
    }
}
