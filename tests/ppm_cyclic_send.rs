//! End-to-end PPM activation and cyclic send (spec.md §8 scenarios 4-6).

mod support;

use std::sync::Arc;

use pn_rt_core::ppm::{PpmInstance, PpmParams, PpmPool, ProviderStateIndication, SubslotDescriptor};
use pn_rt_core::timer::HostTimingClass;
use pn_rt_core::types::{ArHandle, EthAddr};

use support::FakeEth;

fn params() -> PpmParams {
    PpmParams {
        send_clock_factor: 32,
        reduction_ratio: 1,
        c_sdu_length: 4,
        frame_id: 0xC000,
        vlan_priority: 6,
        vlan_id: 0,
        descriptors: vec![SubslotDescriptor {
            api: 0,
            slot: 1,
            subslot: 1,
            data_offset: 0,
            data_length: 2,
            iops_offset: 2,
            iops_length: 1,
            iocs_offset: 3,
            iocs_length: 1,
            is_input_or_mc_provider: true,
        }],
    }
}

#[test]
fn activated_instance_sends_process_data_with_a_fresh_cycle_counter() {
    let pool = Arc::new(PpmPool::new());
    let handle = ArHandle { ar_index: 0, crep: 0 };
    let mut ppm = PpmInstance::new(handle, pool, params());
    ppm.activate(
        EthAddr([0xAA; 6]),
        EthAddr([0xBB; 6]),
        1000,
        HostTimingClass::BestEffort,
    )
    .unwrap();

    let eth = FakeEth::new();
    ppm.set_data_and_iops(0, 1, 1, &[0x01, 0x02], &[0x80]).unwrap();
    assert_eq!(
        ppm.cyclic_send(1_000_000, &eth).unwrap(),
        Some(ProviderStateIndication { handle, error: false })
    );

    let sent = eth.cyclic.lock().unwrap();
    assert_eq!(sent.len(), 1);
    let frame = &sent[0];
    // destination (6) + source (6) + VLAN TPID(2)+TCI(2) + EtherType(2) +
    // Frame ID(2) = 20 bytes of header before the c_sdu payload.
    assert_eq!(&frame[0..6], &[0xAA; 6]);
    assert_eq!(&frame[6..12], &[0xBB; 6]);
    assert_eq!(&frame[20..22], &[0x01, 0x02]);

    let mut data_out = [0u8; 2];
    let mut iops_out = [0u8; 1];
    ppm.get_data_and_iops(0, 1, 1, &mut data_out, &mut iops_out)
        .unwrap();
    assert_eq!(data_out, [0x01, 0x02]);
    assert_eq!(iops_out, [0x80]);
}

#[test]
fn close_releases_the_process_wide_buffer_lock() {
    let pool = Arc::new(PpmPool::new());
    let handle = ArHandle { ar_index: 0, crep: 0 };
    let mut ppm = PpmInstance::new(handle, Arc::clone(&pool), params());
    ppm.activate(EthAddr::default(), EthAddr::default(), 1000, HostTimingClass::BestEffort)
        .unwrap();
    assert_eq!(pool.active_instance_count(), 1);
    ppm.close();
    assert_eq!(pool.active_instance_count(), 0);
    assert!(!pool.has_lock());
}
