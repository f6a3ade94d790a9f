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

use cpu_info::ClusterId;
use cpu_info::CoreInfo;
use cpu_info::CPUTopology;
use cpu_info::LogicalCoreId;
use cpu_info::SocketId;

/// Core descriptors from `(lcore, socket, cluster)` triples,
/// in the shape the library config accepts for injection.
pub fn cores_of(cores: &[(u32, u32, u32)]) -> Vec<CoreInfo> {
    cores
        .iter()
        .map(|&(lcore, socket, cluster)| {
            CoreInfo::new(
                LogicalCoreId::new(lcore),
                SocketId::new(socket),
                ClusterId::new(cluster),
            )
        })
        .collect()
}

pub fn topology_of(cores: &[(u32, u32, u32)]) -> CPUTopology {
    CPUTopology::from_cores(cores_of(cores)).expect("test topology must be valid")
}

/// `num_cores` cores on a single socket and cluster.
pub fn single_socket(num_cores: u32) -> CPUTopology {
    let cores = (0..num_cores).map(|lcore| (lcore, 0, 0)).collect::<Vec<_>>();
    topology_of(&cores)
}

/// `cores_per_socket` cores on each of `num_sockets` sockets,
/// one cluster per socket.
pub fn multi_socket(num_sockets: u32, cores_per_socket: u32) -> CPUTopology {
    let mut cores = Vec::new();
    for socket in 0..num_sockets {
        for core in 0..cores_per_socket {
            cores.push((socket * cores_per_socket + core, socket, socket));
        }
    }
    topology_of(&cores)
}
