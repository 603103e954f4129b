//! LLDP frame reception and peer-record update (spec §4.E).
//!
//! `receive` only updates the [`PeerRecord`] and reports what changed; it
//! never calls into an alarm or diagnostic API itself, since the alarm
//! bridge must not be invoked while any LLDP-internal state is locked
//! (spec §5). The caller is expected to act on the returned events after
//! this function returns.

use byteorder::{BigEndian, ByteOrder};

use super::peer::{Alias, PeerMacPhyConfig, PeerRecord};
use super::{ieee8023_subtype, profinet_subtype};
use crate::codec::{decode_tlv_header, FrameCursor, TLV_TYPE_CHASSIS_ID, TLV_TYPE_END, TLV_TYPE_ORG_SPECIFIC, TLV_TYPE_PORT_ID, TLV_TYPE_TTL};
use crate::error::Result;
use crate::types::{oui, EthAddr};

/// What changed in a [`PeerRecord`] as a result of [`receive`]. The caller
/// correlates `AliasChanged` against whether an AR currently uses this port
/// to decide between "first peer detected" and "remote mismatch" (spec
/// §4.F).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LldpEvent {
    /// The derived alias no longer matches the last-committed one.
    /// `appeared` is true when there was no previously committed alias at
    /// all (a peer was detected on a previously silent port).
    AliasChanged { appeared: bool },
    /// The TTL watchdog expired with no frame received in time (spec
    /// §4.F). Never produced by [`receive`]; constructed by the watchdog
    /// timer that owns the peer's `ttl_secs`.
    PeerLost,
}

/// Parse one received LLDP frame (starting at the Chassis ID TLV, i.e.
/// after the Ethernet header and EtherType) into `peer`, returning the
/// events that resulted.
///
/// Unknown TLV types are skipped; malformed TLVs that would read past the
/// frame return [`crate::error::Error::BufferOverflow`] rather than
/// panicking (spec §9).
pub fn receive(peer: &mut PeerRecord, frame: &[u8]) -> Result<Vec<LldpEvent>> {
    let mut cur = FrameCursor::new(frame);
    let mut chassis_id: Option<Vec<u8>> = None;
    let mut port_id: Option<Vec<u8>> = None;

    loop {
        if cur.remaining() < 2 {
            break;
        }
        let word = cur.read_u16_be()?;
        let (ty, len) = decode_tlv_header(word);
        if ty == TLV_TYPE_END {
            break;
        }
        let payload = cur.take(len)?;

        match ty {
            TLV_TYPE_CHASSIS_ID if !payload.is_empty() => {
                chassis_id = Some(payload[1..].to_vec());
            }
            TLV_TYPE_PORT_ID if !payload.is_empty() => {
                port_id = Some(payload[1..].to_vec());
            }
            TLV_TYPE_TTL if payload.len() >= 2 => {
                peer.ttl_secs = BigEndian::read_u16(&payload[0..2]);
            }
            TLV_TYPE_ORG_SPECIFIC if payload.len() >= 4 => {
                let tlv_oui = [payload[0], payload[1], payload[2]];
                let subtype = payload[3];
                let data = &payload[4..];
                if tlv_oui == oui::PROFINET {
                    apply_profinet_tlv(peer, subtype, data);
                } else if tlv_oui == oui::IEEE_802_3 {
                    apply_ieee8023_tlv(peer, subtype, data);
                }
            }
            _ => {}
        }
    }

    let mut events = Vec::new();
    if let (Some(chassis), Some(port)) = (chassis_id, port_id) {
        peer.peer_chassis_id = chassis;
        peer.peer_port_id = port;
        let alias = Alias::derive(&peer.port_id_str(), &peer.chassis_id_str());
        let old_temp = std::mem::replace(&mut peer.alias.temp, alias);
        if peer.alias.temp != old_temp {
            events.push(LldpEvent::AliasChanged {
                appeared: old_temp.is_empty(),
            });
        }
    }
    Ok(events)
}

fn apply_profinet_tlv(peer: &mut PeerRecord, subtype: u8, data: &[u8]) {
    match subtype {
        profinet_subtype::PORT_STATUS if data.len() >= 4 => {
            peer.peer_port_status.rt_class2_status = BigEndian::read_u16(&data[0..2]);
            peer.peer_port_status.rt_class3_status = BigEndian::read_u16(&data[2..4]);
        }
        profinet_subtype::DELAY_VALUES if data.len() >= 16 => {
            for (i, slot) in peer.peer_delay.iter_mut().enumerate() {
                *slot = BigEndian::read_u32(&data[i * 4..i * 4 + 4]);
            }
        }
        profinet_subtype::CHASSIS_MAC if data.len() >= 6 => {
            let mut mac = [0u8; 6];
            mac.copy_from_slice(&data[0..6]);
            peer.peer_mac = EthAddr(mac);
        }
        _ => {}
    }
}

fn apply_ieee8023_tlv(peer: &mut PeerRecord, subtype: u8, data: &[u8]) {
    if subtype == ieee8023_subtype::MACPHY_CONFIG && data.len() >= 5 {
        peer.peer_macphy_config = PeerMacPhyConfig {
            aneg_capability: data[0],
            phy_capability: BigEndian::read_u16(&data[1..3]),
            mau_type: BigEndian::read_u16(&data[3..5]),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FrameBuffer;
    use crate::lldp::id_subtype;

    fn frame_with(chassis: &str, port: &str, ttl: u16) -> Vec<u8> {
        let mut buf = FrameBuffer::zeroed(2 + 1 + chassis.len() + 2 + 1 + port.len() + 2 + 2 + 2);
        buf.tlv_header(TLV_TYPE_CHASSIS_ID, 1 + chassis.len() as u16).unwrap();
        buf.put_u8(id_subtype::LOCAL).unwrap();
        buf.put_bytes(chassis.as_bytes()).unwrap();
        buf.tlv_header(TLV_TYPE_PORT_ID, 1 + port.len() as u16).unwrap();
        buf.put_u8(id_subtype::LOCAL).unwrap();
        buf.put_bytes(port.as_bytes()).unwrap();
        buf.tlv_header(TLV_TYPE_TTL, 2).unwrap();
        buf.put_u16_be(ttl).unwrap();
        buf.tlv_header(TLV_TYPE_END, 0).unwrap();
        buf.as_slice().to_vec()
    }

    #[test]
    fn first_reception_reports_peer_appeared() {
        let mut peer = PeerRecord::new();
        let frame = frame_with("dut", "port-003", 10);
        let events = receive(&mut peer, &frame).unwrap();
        assert_eq!(peer.alias.temp, "port-003.dut");
        assert_eq!(peer.ttl_secs, 10);
        assert_eq!(events, vec![LldpEvent::AliasChanged { appeared: true }]);
    }

    #[test]
    fn alias_change_after_commit_is_reported_as_mismatch() {
        let mut peer = PeerRecord::new();
        let frame = frame_with("dut", "port-003", 10);
        receive(&mut peer, &frame).unwrap();
        peer.commit_alias();

        let frame2 = frame_with("other-dut", "port-003", 10);
        let events = receive(&mut peer, &frame2).unwrap();
        assert_eq!(events, vec![LldpEvent::AliasChanged { appeared: false }]);
    }

    #[test]
    fn repeated_identical_frame_reports_no_event() {
        let mut peer = PeerRecord::new();
        let frame = frame_with("dut", "port-003", 10);
        receive(&mut peer, &frame).unwrap();
        peer.commit_alias();

        let events = receive(&mut peer, &frame).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn truncated_tlv_is_rejected_rather_than_overrun() {
        let mut peer = PeerRecord::new();
        let mut buf = FrameBuffer::zeroed(4);
        buf.tlv_header(TLV_TYPE_CHASSIS_ID, 10).unwrap();
        let frame = buf.as_slice().to_vec();
        assert!(receive(&mut peer, &frame).is_err());
    }
}
