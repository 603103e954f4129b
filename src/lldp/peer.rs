//! Peer record and alias-name derivation (spec §3).

use crate::types::EthAddr;

/// The two alias copies tracked per peer: `temp` (most recently observed)
/// and `perm` (last committed). Change detection compares the two (spec
/// §3/§4.E).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Alias {
    pub temp: String,
    pub perm: String,
}

impl Alias {
    /// Derive the alias from a received Port ID (and, if undotted, the
    /// Chassis ID) per spec §3: if `port_id` contains `.`, use it verbatim;
    /// otherwise concatenate `port_id + "." + chassis_id`.
    pub fn derive(port_id: &str, chassis_id: &str) -> String {
        if port_id.contains('.') {
            port_id.to_string()
        } else {
            format!("{port_id}.{chassis_id}")
        }
    }
}

/// The 802.3 MACPHY configuration record (spec §4.E), with the 16-bit
/// `OperationalMAUType` already byte-swapped to host order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PeerMacPhyConfig {
    pub aneg_capability: u8,
    pub phy_capability: u16,
    pub mau_type: u16,
}

/// The PROFINET port-status record (spec §4.D/§4.E).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PeerPortStatus {
    pub rt_class2_status: u16,
    pub rt_class3_status: u16,
}

/// One per-port peer record (spec §3). Strings are modeled as owned byte
/// vectors per the Design Notes (§9): the terminator the original writes
/// after `len` is a debug-consumer courtesy, not an invariant, so this
/// model stores plain `String`/`Vec<u8>` instead of a raw buffer+length
/// pair.
#[derive(Clone, Debug, Default)]
pub struct PeerRecord {
    pub peer_chassis_id: Vec<u8>,
    pub peer_port_id: Vec<u8>,
    pub ttl_secs: u16,
    pub peer_delay: [u32; 4],
    pub peer_port_status: PeerPortStatus,
    pub peer_mac: EthAddr,
    pub peer_macphy_config: PeerMacPhyConfig,
    pub alias: Alias,
}

impl PeerRecord {
    pub fn new() -> PeerRecord {
        PeerRecord::default()
    }

    pub fn chassis_id_str(&self) -> String {
        String::from_utf8_lossy(&self.peer_chassis_id).into_owned()
    }

    pub fn port_id_str(&self) -> String {
        String::from_utf8_lossy(&self.peer_port_id).into_owned()
    }

    /// Commit `temp` into `perm`, as done once no AR is in use to notify
    /// (spec §4.F "Remote mismatch").
    pub fn commit_alias(&mut self) {
        self.alias.perm = self.alias.temp.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_port_id_is_used_verbatim() {
        assert_eq!(Alias::derive("port-001.test", "dut"), "port-001.test");
    }

    #[test]
    fn undotted_port_id_is_combined_with_chassis_id() {
        assert_eq!(Alias::derive("port-003", "dut"), "port-003.dut");
    }
}
