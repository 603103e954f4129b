//! Demonstrates how a host stack wires its own raw-Ethernet socket, AR
//! table, and diagnostic registry to [`pn_rt_core`]'s traits, then drives
//! one PPM cycle and one LLDP transmit/receive round trip end to end.
//!
//! This is not a real network driver: `StdoutEthernet` just prints the
//! frames it would have sent. A host would replace it with a raw socket
//! (AF_PACKET, DPDK, or similar) bound to the PROFINET EtherType.

use std::sync::{Arc, RwLock};

use pn_rt_core::alarm::{self, PortLocation};
use pn_rt_core::collaborators::{
    diag, AddressSource, Ar, ArTable, DeviceConfig, DiagnosticItem, DiagnosticRegistry,
    ExpectedSubmodule, PeerBoundary, RawEthernet,
};
use pn_rt_core::lldp::{self, tx::compose_frame, LldpTransmitter, PeerRecord};
use pn_rt_core::ppm::{PpmInstance, PpmParams, PpmPool, SubslotDescriptor};
use pn_rt_core::timer::HostTimingClass;
use pn_rt_core::types::{ArHandle, EthAddr};

/// Stands in for a raw AF_PACKET (or DPDK) socket bound to the PROFINET
/// EtherType; a real implementation writes `frame` straight to the wire.
struct StdoutEthernet;

impl RawEthernet for StdoutEthernet {
    fn send(&self, frame: &[u8]) -> std::io::Result<usize> {
        println!("cyclic frame, {} bytes: {:02x?}", frame.len(), frame);
        Ok(frame.len())
    }

    fn send_lldp(&self, frame: &[u8]) -> std::io::Result<usize> {
        println!("lldp frame, {} bytes: {:02x?}", frame.len(), frame);
        Ok(frame.len())
    }
}

/// A fixed IPv4 address; a real host reads this out of its DCP/interface
/// configuration instead.
struct StaticAddress(u32);

impl AddressSource for StaticAddress {
    fn ipv4(&self) -> u32 {
        self.0
    }
}

/// The host's AR table, normally backed by the CMRPC/DCP stack's own
/// connection records.
struct StaticArTable {
    ars: Vec<Ar>,
}

impl ArTable for StaticArTable {
    fn ars(&self) -> &[Ar] {
        &self.ars
    }
}

/// A minimal diagnostic sink that just logs what it was asked to do.
struct LoggingDiagnosticRegistry;

impl DiagnosticRegistry for LoggingDiagnosticRegistry {
    fn diag_update(
        &self,
        ar_index: usize,
        _api: u32,
        slot: u16,
        subslot: u16,
        item: &DiagnosticItem,
    ) -> bool {
        println!("diag_update ar={ar_index} slot={slot} subslot={subslot} item={item:?}");
        false
    }

    fn diag_add(&self, ar_index: usize, _api: u32, slot: u16, subslot: u16, item: &DiagnosticItem) {
        println!("diag_add ar={ar_index} slot={slot} subslot={subslot} item={item:?}");
    }

    fn alarm_send_port_change_notification(
        &self,
        ar_index: usize,
        _api: u32,
        slot: u16,
        subslot: u16,
        module_ident: u32,
        submodule_ident: u32,
        _item: &DiagnosticItem,
    ) {
        println!(
            "alarm_send_port_change_notification ar={ar_index} slot={slot} subslot={subslot} \
             module_ident={module_ident} submodule_ident={submodule_ident}"
        );
    }
}

fn device_config() -> DeviceConfig {
    DeviceConfig {
        chassis_id: "dut".into(),
        port_id: "port-001".into(),
        ttl_seconds: 20,
        rt_class_2_status: 0x0001,
        rt_class_3_status: 0,
        cap_aneg: 3,
        cap_phy: 0x8000,
        mau_type: 0x0010,
        eth_addr: EthAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]),
        peer_boundary: PeerBoundary {
            not_send_lldp_frames: false,
        },
    }
}

fn ppm_params() -> PpmParams {
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

fn main() {
    tracing_subscriber::fmt::init();

    let eth = Arc::new(StdoutEthernet);
    let handle = ArHandle { ar_index: 0, crep: 0 };

    // PPM: activate one provider instance and run a couple of cycles.
    let pool = Arc::new(PpmPool::new());
    let mut ppm = PpmInstance::new(handle, pool, ppm_params());
    ppm.activate(
        EthAddr([0xAA; 6]),
        EthAddr([0xBB; 6]),
        1000,
        HostTimingClass::BestEffort,
    )
    .unwrap();
    ppm.set_data_and_iops(0, 1, 1, &[0x01, 0x02], &[0x80]).unwrap();

    for now_us in [1_000_000, 1_032_000, 1_064_000] {
        if let Some(indication) = ppm.cyclic_send(now_us, eth.as_ref()).unwrap() {
            println!("provider state indication: {indication:?}");
        }
    }

    // LLDP: start the periodic announcer and feed back its own frame as a
    // stand-in for a received frame from a wired peer.
    let config = Arc::new(RwLock::new(device_config()));
    let address = Arc::new(StaticAddress(0xC0A8_0001));
    let transmitter = LldpTransmitter::start(Arc::clone(&eth), Arc::clone(&config), address)
        .expect("failed to start lldp transmitter");
    println!("lldp transmitter active: {}", transmitter.is_active());

    let snapshot = config.read().unwrap().clone();
    let frame = compose_frame(&snapshot, &StaticAddress(0xC0A8_0001)).unwrap();
    let mut peer = PeerRecord::new();
    let events = lldp::receive(&mut peer, &frame).unwrap();

    let table = StaticArTable {
        ars: vec![Ar {
            in_use: true,
            cm_initiator_mac: EthAddr::default(),
            cm_responder_mac: EthAddr::default(),
            exp_apis: vec![ExpectedSubmodule {
                slot: 0,
                subslot: diag::SUBSLOT_PORT_0,
                module_ident: 1,
                submodule_ident: 1,
            }],
        }],
    };
    let registry = LoggingDiagnosticRegistry;
    let location = PortLocation {
        api: 0,
        slot: 0,
        subslot: diag::SUBSLOT_PORT_0,
        module_ident: 1,
        submodule_ident: 1,
    };
    for event in events {
        alarm::handle_event(&registry, table.ars(), &mut peer, location, event);
    }

    println!("peer alias after reception: {}", peer.alias.temp);
}
