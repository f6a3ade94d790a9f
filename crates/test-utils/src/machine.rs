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

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use nix::errno::Errno;

use cpu_info::LogicalCoreId;
use pqos_machine::CpuidOut;
use pqos_machine::Machine;
use pqos_machine::MachineError;
use pqos_machine::MachineResult;

/// Programmable stand-in for the hardware.
///
/// CPUID leaves and the MSR space are plain maps shared between clones, so a
/// test can keep one handle for assertions while the library owns another.
/// Unprogrammed CPUID leaves read as all-zero registers, the way unsupported
/// leaves behave on real parts; unprogrammed MSRs read as zero.
#[derive(Clone, Debug, Default)]
pub struct FakeMachine {
    state: Arc<Mutex<FakeMachineState>>,
}

#[derive(Debug, Default)]
struct FakeMachineState {
    cpuid_leaves: HashMap<(u32, u32), CpuidOut>,
    msrs: HashMap<(LogicalCoreId, u32), u64>,
    failing_registers: HashSet<u32>,
    msr_writes: u64,
}

impl FakeMachine {
    pub fn new() -> Self {
        <_>::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeMachineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_leaf(&self, leaf: u32, subleaf: u32, registers: CpuidOut) {
        self.state().cpuid_leaves.insert((leaf, subleaf), registers);
    }

    /// Encodes `brand` into the extended leaves the way hardware reports it:
    /// 16 bytes per leaf across `0x80000002..4`, little-endian in eax..edx.
    pub fn set_brand_string(&self, brand: &str) {
        let mut bytes = [0u8; 48];
        let len = brand.len().min(bytes.len());
        bytes[..len].copy_from_slice(&brand.as_bytes()[..len]);

        self.set_leaf(
            0x8000_0000,
            0,
            CpuidOut {
                eax: 0x8000_0004,
                ..<_>::default()
            },
        );

        for (leaf_idx, chunk) in bytes.chunks(16).enumerate() {
            let word = |word_idx: usize| {
                let word_bytes = &chunk[word_idx * 4..word_idx * 4 + 4];
                u32::from_le_bytes([word_bytes[0], word_bytes[1], word_bytes[2], word_bytes[3]])
            };
            self.set_leaf(
                0x8000_0002 + leaf_idx as u32,
                0,
                CpuidOut {
                    eax: word(0),
                    ebx: word(1),
                    ecx: word(2),
                    edx: word(3),
                },
            );
        }
    }

    pub fn set_msr(&self, core_id: LogicalCoreId, register_id: u32, value: u64) {
        self.state().msrs.insert((core_id, register_id), value);
    }

    pub fn msr(&self, core_id: LogicalCoreId, register_id: u32) -> Option<u64> {
        self.state().msrs.get(&(core_id, register_id)).copied()
    }

    /// Every subsequent access to `register_id` on any core fails.
    pub fn fail_register(&self, register_id: u32) {
        self.state().failing_registers.insert(register_id);
    }

    pub fn msr_write_count(&self) -> u64 {
        self.state().msr_writes
    }
}

impl Machine for FakeMachine {
    fn cpuid(&self, leaf: u32, subleaf: u32) -> MachineResult<CpuidOut> {
        let registers = self
            .state()
            .cpuid_leaves
            .get(&(leaf, subleaf))
            .copied()
            .unwrap_or_default();

        Ok(registers)
    }

    fn msr_read(&self, core_id: LogicalCoreId, register_id: u32) -> MachineResult<u64> {
        let state = self.state();
        if state.failing_registers.contains(&register_id) {
            return Err(MachineError::Read {
                register_id,
                core_id,
                errno: Errno::EIO,
            });
        }

        Ok(state.msrs.get(&(core_id, register_id)).copied().unwrap_or(0))
    }

    fn msr_write(
        &self,
        core_id: LogicalCoreId,
        register_id: u32,
        value: u64,
    ) -> MachineResult<()> {
        let mut state = self.state();
        if state.failing_registers.contains(&register_id) {
            return Err(MachineError::Write {
                value,
                register_id,
                core_id,
                errno: Errno::EIO,
            });
        }

        state.msrs.insert((core_id, register_id), value);
        state.msr_writes += 1;

        Ok(())
    }
}
