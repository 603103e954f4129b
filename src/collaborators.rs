//! Host collaborator traits (spec §6): the opaque providers the core treats
//! as external — an AR table, a diagnostic-item registry, raw Ethernet
//! send, a monotonic clock, and address/configuration accessors. The core
//! is generic over these so the embedding application can back them with
//! whatever DCP/CMRPC/driver layer it has (deliberately out of scope here,
//! spec §1).

use crate::types::EthAddr;
use std::io;

/// A monotonic microsecond clock (spec §6).
pub trait Clock: Send + Sync {
    fn now_us(&self) -> u64;
}

/// Raw-Ethernet send primitive (spec §6).
pub trait RawEthernet: Send + Sync {
    /// Send a cyclic (VLAN-tagged PROFINET) frame. Returns the number of
    /// bytes sent, or an I/O error.
    fn send(&self, frame: &[u8]) -> io::Result<usize>;

    /// Send an LLDP frame.
    fn send_lldp(&self, frame: &[u8]) -> io::Result<usize>;
}

/// Address-configuration accessor (spec §6).
pub trait AddressSource: Send + Sync {
    fn ipv4(&self) -> u32;
}

/// The PROFINET peer-boundary configuration flag that gates LLDP
/// transmission (spec §4.D).
#[derive(Clone, Copy, Debug, Default)]
pub struct PeerBoundary {
    pub not_send_lldp_frames: bool,
}

/// The device configuration fields consumed by the core (spec §6).
#[derive(Clone, Debug)]
pub struct DeviceConfig {
    pub chassis_id: String,
    pub port_id: String,
    pub ttl_seconds: u16,
    pub rt_class_2_status: u16,
    pub rt_class_3_status: u16,
    pub cap_aneg: u8,
    pub cap_phy: u16,
    pub mau_type: u16,
    pub eth_addr: EthAddr,
    pub peer_boundary: PeerBoundary,
}

/// A single diagnostic item, as handed to the diagnostic registry (spec
/// §3). `usi` is the user structure identifier; the rest narrow down the
/// channel/extended-channel error being reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlarmSpec {
    pub manufacturer_diagnosis: bool,
    pub channel_diagnosis: bool,
    pub submodule_diagnosis: bool,
    pub ar_diagnosis: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiagnosticItem {
    pub usi: u16,
    pub channel_number: u16,
    pub channel_properties: u16,
    pub channel_error_type: u16,
    pub ext_channel_error_type: u16,
    pub ext_channel_add_value: u32,
    pub alarm_spec: AlarmSpec,
}

/// Well-known `usi`/error-type constants used by the alarm bridge (spec
/// §4.F).
pub mod diag {
    pub const USI_EXTENDED_CHANNEL_DIAGNOSIS: u16 = 0x8000;
    pub const CHANNEL_ERROR_TYPE_REMOTE_MISMATCH: u16 = 0x4000;
    pub const EXT_CHANNEL_ERROR_TYPE_PORTID_MISMATCH: u16 = 0x0002;
    pub const EXT_CHANNEL_ERROR_TYPE_NO_PEER_DETECTED: u16 = 0x0003;

    /// `channel_properties` bit meaning "the condition appeared" vs.
    /// "disappeared" (spec §4.F).
    pub const CHANNEL_PROPERTIES_APPEARS: u16 = 1 << 0;
    pub const CHANNEL_PROPERTIES_DISAPPEARS: u16 = 0;

    pub const SLOT_DAP: u16 = 0;
    pub const SUBSLOT_PORT_0: u16 = 0x8001;
}

/// Diagnostic-item registry and alarm sink (spec §6). `diag_update` fails
/// (returns `Ok(false)`) when no existing entry matches, in which case the
/// caller falls back to `diag_add` (spec §4.F).
pub trait DiagnosticRegistry: Send + Sync {
    fn diag_update(
        &self,
        ar_index: usize,
        api: u32,
        slot: u16,
        subslot: u16,
        item: &DiagnosticItem,
    ) -> bool;

    fn diag_add(&self, ar_index: usize, api: u32, slot: u16, subslot: u16, item: &DiagnosticItem);

    fn alarm_send_port_change_notification(
        &self,
        ar_index: usize,
        api: u32,
        slot: u16,
        subslot: u16,
        module_ident: u32,
        submodule_ident: u32,
        item: &DiagnosticItem,
    );
}

/// An expected submodule slot/subslot pair within an AR's module
/// configuration (spec §9: the `exp_apis[0]` one-dimensional scan).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpectedSubmodule {
    pub slot: u16,
    pub subslot: u16,
    pub module_ident: u32,
    pub submodule_ident: u32,
}

/// One Application Relationship, as seen by the alarm bridge and PPM (spec
/// §3/§6). Owned by the host; the core only ever reads `in_use`,
/// `cm_initiator_mac`/`cm_responder_mac`, and `exp_apis`.
#[derive(Clone, Debug)]
pub struct Ar {
    pub in_use: bool,
    pub cm_initiator_mac: EthAddr,
    pub cm_responder_mac: EthAddr,
    /// `exp_apis[0]`'s expected-submodule list (spec §9 treats `api = 0`
    /// as a constant and the list as one-dimensional).
    pub exp_apis: Vec<ExpectedSubmodule>,
}

impl Ar {
    pub fn find_submodule(&self, slot: u16, subslot: u16) -> Option<&ExpectedSubmodule> {
        self.exp_apis
            .iter()
            .find(|m| m.slot == slot && m.subslot == subslot)
    }
}

/// The AR table accessor (spec §6): a fixed-size collection of AR records
/// with an `in_use` flag.
pub trait ArTable: Send + Sync {
    fn ars(&self) -> &[Ar];
}
