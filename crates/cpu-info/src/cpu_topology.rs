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

use nonempty::NonEmpty;

use crate::errors::CPUTopologyError;
use crate::types::CoreInfo;
use crate::ClusterId;
use crate::CTResult;
use crate::LogicalCoreId;
use crate::SocketId;

/// CPU topology in the shape the rest of the library works with:
/// an ordered list of logical cores, each tagged with its socket
/// and L3 cluster.
///
/// The list is sorted by logical core id and contains no duplicates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CPUTopology {
    cores: NonEmpty<CoreInfo>,
}

impl CPUTopology {
    /// Enumerates the platform topology.
    pub fn detect() -> CTResult<Self> {
        use hwlocality::object::types::ObjectType;

        let topology = hwlocality::Topology::new()?;

        let mut socket_of = HashMap::new();
        for (socket_idx, package) in topology
            .objects_with_type(ObjectType::Package)
            .enumerate()
        {
            let cpuset = match package.cpuset() {
                Some(cpuset) => cpuset,
                None => continue,
            };
            for lcore in cpuset.into_iter().map(usize::from) {
                socket_of.insert(lcore as u32, socket_idx as u32);
            }
        }

        if socket_of.is_empty() {
            // Containers and stripped-down VMs may expose no package objects.
            for pu in topology.objects_with_type(ObjectType::PU) {
                let cpuset = match pu.cpuset() {
                    Some(cpuset) => cpuset,
                    None => continue,
                };
                for lcore in cpuset.into_iter().map(usize::from) {
                    socket_of.insert(lcore as u32, 0);
                }
            }
        }

        let mut cluster_of = HashMap::new();
        for (cluster_idx, cache) in topology
            .objects_with_type(ObjectType::L3Cache)
            .enumerate()
        {
            let cpuset = match cache.cpuset() {
                Some(cpuset) => cpuset,
                None => continue,
            };
            for lcore in cpuset.into_iter().map(usize::from) {
                cluster_of.insert(lcore as u32, cluster_idx as u32);
            }
        }

        let cores = socket_of
            .iter()
            .map(|(&lcore, &socket)| {
                // Without L3 objects the socket doubles as the cluster.
                let cluster = cluster_of.get(&lcore).copied().unwrap_or(socket);
                CoreInfo::new(
                    LogicalCoreId::new(lcore),
                    SocketId::new(socket),
                    ClusterId::new(cluster),
                )
            })
            .collect::<Vec<_>>();

        Self::from_cores(cores)
    }

    /// Builds a topology from a caller-supplied core list.
    /// The list is trusted apart from emptiness and duplicate checks.
    pub fn from_cores(mut cores: Vec<CoreInfo>) -> CTResult<Self> {
        cores.sort_by_key(|core| core.lcore);
        for pair in cores.windows(2) {
            if pair[0].lcore == pair[1].lcore {
                return Err(CPUTopologyError::duplicate_core(pair[0].lcore));
            }
        }

        NonEmpty::from_vec(cores)
            .map(|cores| Self { cores })
            .ok_or(CPUTopologyError::NoCoresFound)
    }

    pub fn cores(&self) -> impl Iterator<Item = &CoreInfo> {
        self.cores.iter()
    }

    pub fn num_cores(&self) -> usize {
        self.cores.len()
    }

    /// The highest logical core id present in the topology.
    pub fn max_core_id(&self) -> LogicalCoreId {
        self.cores.last().lcore
    }

    /// Socket ids present in the topology, sorted, deduplicated.
    pub fn sockets(&self) -> Vec<SocketId> {
        let mut sockets = self
            .cores
            .iter()
            .map(|core| core.socket)
            .collect::<Vec<_>>();
        sockets.sort();
        sockets.dedup();
        sockets
    }

    /// Cluster ids present in the topology, sorted, deduplicated.
    pub fn clusters(&self) -> Vec<ClusterId> {
        let mut clusters = self
            .cores
            .iter()
            .map(|core| core.cluster)
            .collect::<Vec<_>>();
        clusters.sort();
        clusters.dedup();
        clusters
    }

    pub fn cores_on_socket(&self, socket: SocketId) -> impl Iterator<Item = &CoreInfo> {
        self.cores.iter().filter(move |core| core.socket == socket)
    }

    /// A representative core for per-socket MSR programming.
    pub fn first_core_on_socket(&self, socket: SocketId) -> Option<LogicalCoreId> {
        self.cores_on_socket(socket).next().map(|core| core.lcore)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core(lcore: u32, socket: u32, cluster: u32) -> CoreInfo {
        CoreInfo::new(
            LogicalCoreId::new(lcore),
            SocketId::new(socket),
            ClusterId::new(cluster),
        )
    }

    #[test]
    fn empty_core_list_is_rejected() {
        let result = CPUTopology::from_cores(vec![]);
        assert!(matches!(result, Err(CPUTopologyError::NoCoresFound)));
    }

    #[test]
    fn duplicate_lcore_is_rejected() {
        let result = CPUTopology::from_cores(vec![core(0, 0, 0), core(0, 0, 0)]);
        assert!(matches!(
            result,
            Err(CPUTopologyError::DuplicateCore { .. })
        ));
    }

    #[test]
    fn cores_are_sorted_by_lcore() {
        let topology = CPUTopology::from_cores(vec![core(3, 1, 1), core(0, 0, 0), core(1, 0, 0)])
            .unwrap();

        let lcores = topology
            .cores()
            .map(|core| core.lcore)
            .collect::<Vec<_>>();
        assert_eq!(
            lcores,
            vec![
                LogicalCoreId::new(0),
                LogicalCoreId::new(1),
                LogicalCoreId::new(3)
            ]
        );
        assert_eq!(topology.max_core_id(), LogicalCoreId::new(3));
    }

    #[test]
    fn socket_queries() {
        let topology = CPUTopology::from_cores(vec![
            core(0, 0, 0),
            core(1, 0, 0),
            core(2, 1, 1),
            core(3, 1, 1),
        ])
        .unwrap();

        assert_eq!(
            topology.sockets(),
            vec![SocketId::new(0), SocketId::new(1)]
        );
        assert_eq!(
            topology.clusters(),
            vec![ClusterId::new(0), ClusterId::new(1)]
        );
        assert_eq!(
            topology.first_core_on_socket(SocketId::new(1)),
            Some(LogicalCoreId::new(2))
        );
        assert_eq!(topology.first_core_on_socket(SocketId::new(7)), None);
        assert_eq!(topology.cores_on_socket(SocketId::new(0)).count(), 2);
    }
}
