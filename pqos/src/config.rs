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

use std::path::PathBuf;

use tracing_subscriber::filter::LevelFilter;

use cpu_info::CoreInfo;

/// Library configuration; read once during init, owned by the caller.
#[derive(Clone, Debug, Default)]
pub struct PqosConfig {
    /// Requested CDP state, reconciled against the hardware during discovery.
    pub cdp: CdpConfig,

    /// Caller-supplied topology; bypasses platform enumeration when present.
    /// The descriptor is trusted apart from emptiness and duplicate checks.
    pub topology: Option<Vec<CoreInfo>>,

    pub logs: Logs,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum CdpConfig {
    /// Take the platform as it is.
    #[default]
    Any,

    /// Enable CDP, reconfiguring the platform when it is off.
    RequireOn,

    /// Disable CDP, reconfiguring the platform when it is on.
    RequireOff,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Logs {
    pub log_level: LevelFilter,

    /// Promotes the level to at least INFO.
    pub verbose: bool,

    pub sink: LogSink,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum LogSink {
    #[default]
    Stderr,
    Stdout,
    File(PathBuf),
}

impl Default for Logs {
    fn default() -> Self {
        Self {
            log_level: LevelFilter::WARN,
            verbose: false,
            sink: <_>::default(),
        }
    }
}

impl Logs {
    pub(crate) fn effective_level(&self) -> LevelFilter {
        if self.verbose {
            std::cmp::max(self.log_level, LevelFilter::INFO)
        } else {
            self.log_level
        }
    }
}
