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

use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use cpu_info::ClusterId;
use pqos_machine::CpuidOut;
use pqos_test_utils::cores_of;
use pqos_test_utils::FakeMachine;

use super::Pqos;
use crate::capability::CAPABILITY_VERSION;
use crate::config::CdpConfig;
use crate::config::PqosConfig;
use crate::errors::HwError;
use crate::errors::PqosError;
use crate::registers::msr;

// The library slot is process-wide, so these tests run one at a time.
static TEST_LOCK: Mutex<()> = Mutex::new(());

fn serialize_test() -> MutexGuard<'static, ()> {
    TEST_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

fn regs(eax: u32, ebx: u32, ecx: u32, edx: u32) -> CpuidOut {
    CpuidOut { eax, ebx, ecx, edx }
}

/// Two sockets, CMT+MBM plus CDP-capable CAT, CDP off.
fn cmt_cat_machine() -> FakeMachine {
    let machine = FakeMachine::new();
    machine.set_leaf(0x7, 0, regs(0, (1 << 12) | (1 << 15), 0, 0));
    machine.set_leaf(0x4, 0x3, regs(0, (19 << 22) | 63, 16383, 0));
    machine.set_leaf(0xF, 0, regs(0, 127, 0, 1 << 1));
    machine.set_leaf(0xF, 1, regs(0, 65536, 127, 0b111));
    machine.set_leaf(0x10, 0, regs(0, 1 << 1, 0, 0));
    machine.set_leaf(0x10, 1, regs(19, 0x600, 0b100, 15));
    machine
}

fn cmt_only_machine() -> FakeMachine {
    let machine = FakeMachine::new();
    machine.set_leaf(0x7, 0, regs(0, 1 << 12, 0, 0));
    machine.set_leaf(0x4, 0x3, regs(0, (19 << 22) | 63, 16383, 0));
    machine.set_leaf(0xF, 0, regs(0, 127, 0, 1 << 1));
    machine.set_leaf(0xF, 1, regs(0, 65536, 127, 0b001));
    machine
}

fn config_with_topology(cdp: CdpConfig) -> PqosConfig {
    PqosConfig {
        cdp,
        topology: Some(cores_of(&[(0, 0, 0), (1, 0, 0), (2, 1, 1), (3, 1, 1)])),
        logs: <_>::default(),
    }
}

fn init(machine: &FakeMachine, cdp: CdpConfig) -> Result<Pqos, PqosError> {
    Pqos::init_with_machine(config_with_topology(cdp), Box::new(machine.clone()))
}

#[test]
fn init_publishes_capabilities_and_reinit_reproduces_them() {
    let _guard = serialize_test();
    let machine = cmt_cat_machine();

    let pqos = init(&machine, CdpConfig::Any).unwrap();
    let (snapshot, topology) = pqos.capabilities();
    assert_eq!(snapshot.version(), CAPABILITY_VERSION);
    assert!(snapshot.mon().is_some());
    assert!(snapshot.l3ca().is_some());
    assert_eq!(topology.num_cores(), 4);

    let first_snapshot = snapshot.clone();
    pqos.fini().unwrap();

    let pqos = init(&machine, CdpConfig::Any).unwrap();
    assert_eq!(pqos.capabilities().0, &first_snapshot);
    pqos.fini().unwrap();
}

#[test]
fn second_init_fails_while_the_first_is_alive() {
    let _guard = serialize_test();
    let machine = cmt_cat_machine();

    let pqos = init(&machine, CdpConfig::Any).unwrap();
    let second = init(&machine, CdpConfig::Any);
    assert!(matches!(second, Err(PqosError::InitState)));

    pqos.fini().unwrap();
}

#[test]
fn dropping_the_value_releases_the_slot() {
    let _guard = serialize_test();
    let machine = cmt_cat_machine();

    let pqos = init(&machine, CdpConfig::Any).unwrap();
    drop(pqos);

    let pqos = init(&machine, CdpConfig::Any).unwrap();
    pqos.fini().unwrap();
}

#[test]
fn empty_injected_topology_is_rejected() {
    let _guard = serialize_test();
    let machine = cmt_cat_machine();

    let config = PqosConfig {
        topology: Some(vec![]),
        ..<_>::default()
    };
    let result = Pqos::init_with_machine(config, Box::new(machine));
    assert!(matches!(result, Err(PqosError::InvalidParam { .. })));
}

#[test]
fn requiring_cdp_twice_reconfigures_only_once() {
    let _guard = serialize_test();
    let machine = cmt_cat_machine();

    let pqos = init(&machine, CdpConfig::RequireOn).unwrap();
    assert!(pqos.capabilities().0.l3ca().unwrap().cdp_on);
    let writes_after_first = machine.msr_write_count();
    assert!(writes_after_first > 0);
    pqos.fini().unwrap();

    let pqos = init(&machine, CdpConfig::RequireOn).unwrap();
    assert!(pqos.capabilities().0.l3ca().unwrap().cdp_on);
    assert_eq!(machine.msr_write_count(), writes_after_first);
    pqos.fini().unwrap();
}

#[test]
fn monitoring_only_platform_brings_up_monitoring_alone() {
    let _guard = serialize_test();
    let machine = cmt_only_machine();

    let mut pqos = init(&machine, CdpConfig::Any).unwrap();
    assert!(pqos.allocation().is_none());

    let monitoring = pqos.monitoring_mut().unwrap();
    let rmid = monitoring.assign_rmid(ClusterId::new(0)).unwrap();
    assert_eq!(rmid, 1);
    monitoring.release_rmid(ClusterId::new(0), rmid);

    assert!(pqos
        .monitoring()
        .unwrap()
        .events()
        .iter()
        .all(|event| event.max_rmid == 128));

    pqos.fini().unwrap();
}

#[test]
fn allocation_subsystem_reports_logical_classes() {
    let _guard = serialize_test();
    let machine = cmt_cat_machine();

    let pqos = init(&machine, CdpConfig::RequireOn).unwrap();
    let allocation = pqos.allocation().unwrap();
    assert_eq!(allocation.num_classes(), 8);
    assert_eq!(allocation.sockets().len(), 2);
    assert_eq!(allocation.classes().count(), 8);
    pqos.fini().unwrap();
}

#[test]
fn discovery_failure_unwinds_the_init() {
    let _guard = serialize_test();
    let machine = cmt_cat_machine();
    machine.set_msr(0u32.into(), msr::IA32_L3_QOS_CFG, 1);
    machine.set_msr(2u32.into(), msr::IA32_L3_QOS_CFG, 0);

    let result = init(&machine, CdpConfig::Any);
    assert!(matches!(
        result,
        Err(PqosError::Hw(HwError::CdpInconsistent))
    ));

    // The failed attempt must not leave the slot occupied.
    let machine = cmt_cat_machine();
    let pqos = init(&machine, CdpConfig::Any).unwrap();
    pqos.fini().unwrap();
}

#[test]
fn concurrent_init_has_exactly_one_winner() {
    let _guard = serialize_test();
    let machine = cmt_cat_machine();

    let handles = (0..4)
        .map(|_| {
            let machine = machine.clone();
            std::thread::spawn(move || {
                Pqos::init_with_machine(
                    config_with_topology(CdpConfig::Any),
                    Box::new(machine),
                )
            })
        })
        .collect::<Vec<_>>();

    let results = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect::<Vec<_>>();

    let winners = results.iter().filter(|result| result.is_ok()).count();
    let losers = results
        .iter()
        .filter(|result| matches!(result, Err(PqosError::InitState)))
        .count();
    assert_eq!(winners, 1);
    assert_eq!(losers, results.len() - 1);

    for result in results {
        if let Ok(pqos) = result {
            pqos.fini().unwrap();
        }
    }
}
