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

use nix::errno::Errno;
use thiserror::Error as ThisError;

use cpu_info::LogicalCoreId;

#[derive(ThisError, Debug)]
pub enum MachineError {
    #[error("cannot open the MSR device of logical core {core_id} for reading: {io_error}")]
    OpenForRead {
        core_id: LogicalCoreId,
        io_error: std::io::Error,
    },

    #[error("cannot open the MSR device of logical core {core_id} for writing: {io_error}")]
    OpenForWrite {
        core_id: LogicalCoreId,
        io_error: std::io::Error,
    },

    #[error("MSR {register_id:#X} could not be read on logical core {core_id}: {errno:?}")]
    Read {
        register_id: u32,
        core_id: LogicalCoreId,
        errno: Errno,
    },

    #[error(
        "MSR {register_id:#X} could not be written with {value:#X} on logical core {core_id}: {errno:?}"
    )]
    Write {
        value: u64,
        register_id: u32,
        core_id: LogicalCoreId,
        errno: Errno,
    },

    #[error("logical core {core_id} is outside of the initialized range, max is {max_core_id}")]
    CoreOutOfRange {
        core_id: LogicalCoreId,
        max_core_id: LogicalCoreId,
    },

    #[error("CPUID and MSR access is not supported on this platform")]
    UnsupportedPlatform,
}

#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
impl MachineError {
    pub(crate) fn open_device(
        core_id: LogicalCoreId,
        writable: bool,
        io_error: std::io::Error,
    ) -> Self {
        if writable {
            Self::OpenForWrite { core_id, io_error }
        } else {
            Self::OpenForRead { core_id, io_error }
        }
    }

    pub(crate) fn read_failed(register_id: u32, core_id: LogicalCoreId, errno: Errno) -> Self {
        Self::Read {
            register_id,
            core_id,
            errno,
        }
    }

    pub(crate) fn write_failed(
        value: u64,
        register_id: u32,
        core_id: LogicalCoreId,
        errno: Errno,
    ) -> Self {
        Self::Write {
            value,
            register_id,
            core_id,
            errno,
        }
    }
}
