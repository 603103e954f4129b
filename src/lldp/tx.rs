//! Periodic LLDP frame composition and transmission (spec §4.D).

use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use super::{id_subtype, ieee8023_subtype, profinet_subtype, LLDP_BROADCAST_RATE_SECS};
use crate::codec::{
    FrameBuffer, TLV_TYPE_CHASSIS_ID, TLV_TYPE_END, TLV_TYPE_MANAGEMENT, TLV_TYPE_PORT_ID,
    TLV_TYPE_TTL,
};
use crate::collaborators::{AddressSource, DeviceConfig, RawEthernet};
use crate::error::Result;
use crate::timer::{CyclicTimer, TimerAction};
use crate::types::oui;

/// Compose one LLDPDU from `config`/`address`: mandatory Chassis ID/Port
/// ID/TTL TLVs, then the PROFINET and IEEE 802.3 organisation-specific
/// TLVs including the Management TLV carrying the device's IPv4 address,
/// then the End-of-LLDPDU TLV (spec §4.D).
pub fn compose_frame(config: &DeviceConfig, address: &dyn AddressSource) -> Result<Vec<u8>> {
    let chassis = config.chassis_id.as_bytes();
    let port = config.port_id.as_bytes();
    let capacity = (2 + 1 + chassis.len())
        + (2 + 1 + port.len())
        + (2 + 2)
        + (2 + 3 + 1 + 4)
        + (2 + 3 + 1 + 6)
        + (2 + 3 + 1 + 5)
        + (2 + 12)
        + 2;
    let mut buf = FrameBuffer::zeroed(capacity);

    buf.tlv_header(TLV_TYPE_CHASSIS_ID, 1 + chassis.len() as u16)?;
    buf.put_u8(id_subtype::LOCAL)?;
    buf.put_bytes(chassis)?;

    buf.tlv_header(TLV_TYPE_PORT_ID, 1 + port.len() as u16)?;
    buf.put_u8(id_subtype::LOCAL)?;
    buf.put_bytes(port)?;

    buf.tlv_header(TLV_TYPE_TTL, 2)?;
    buf.put_u16_be(config.ttl_seconds)?;

    buf.org_specific_tlv_header(oui::PROFINET, 1 + 4)?;
    buf.put_u8(profinet_subtype::PORT_STATUS)?;
    buf.put_u16_be(config.rt_class_2_status)?;
    buf.put_u16_be(config.rt_class_3_status)?;

    buf.org_specific_tlv_header(oui::PROFINET, 1 + 6)?;
    buf.put_u8(profinet_subtype::CHASSIS_MAC)?;
    buf.put_bytes(config.eth_addr.as_bytes())?;

    buf.org_specific_tlv_header(oui::IEEE_802_3, 1 + 5)?;
    buf.put_u8(ieee8023_subtype::MACPHY_CONFIG)?;
    buf.put_u8(config.cap_aneg)?;
    buf.put_u16_be(config.cap_phy)?;
    buf.put_u16_be(config.mau_type)?;

    // Management TLV (spec §4.D step 5): addr_string_len(1) |
    // addr_type=IPv4(1) | ipv4(4) | iface_subtype=1 | iface_number=0(4) |
    // oid_len=0(1) = 12 bytes, mandatory for PROFINET.
    buf.tlv_header(TLV_TYPE_MANAGEMENT, 12)?;
    buf.put_u8(5)?;
    buf.put_u8(1)?;
    buf.put_u32_be(address.ipv4())?;
    buf.put_u8(1)?;
    buf.put_u32_be(0)?;
    buf.put_u8(0)?;

    buf.tlv_header(TLV_TYPE_END, 0)?;

    Ok(buf.as_slice().to_vec())
}

/// Drives the periodic LLDP broadcast (spec §4.D). Transmission is
/// suppressed entirely when `config.peer_boundary.not_send_lldp_frames` is
/// set, matching the PROFINET peer-to-peer boundary behavior. The flag is
/// re-read from the shared `config` handle on every fire, not just once at
/// start, so toggling it at runtime stops the broadcast on its next period.
pub struct LldpTransmitter {
    timer: Option<CyclicTimer>,
}

impl LldpTransmitter {
    /// Start broadcasting `config`'s identity over `eth` every
    /// [`LLDP_BROADCAST_RATE_SECS`] seconds. Returns a transmitter with no
    /// running timer when the peer boundary disables LLDP frames.
    pub fn start<E, A>(
        eth: Arc<E>,
        config: Arc<RwLock<DeviceConfig>>,
        address: Arc<A>,
    ) -> Result<LldpTransmitter>
    where
        E: RawEthernet + 'static,
        A: AddressSource + 'static,
    {
        Self::start_with_interval_us(eth, config, address, LLDP_BROADCAST_RATE_SECS * 1_000_000)
    }

    fn start_with_interval_us<E, A>(
        eth: Arc<E>,
        config: Arc<RwLock<DeviceConfig>>,
        address: Arc<A>,
        interval_us: u64,
    ) -> Result<LldpTransmitter>
    where
        E: RawEthernet + 'static,
        A: AddressSource + 'static,
    {
        if config
            .read()
            .expect("device config poisoned")
            .peer_boundary
            .not_send_lldp_frames
        {
            debug!("lldp transmission suppressed by peer boundary configuration");
            return Ok(LldpTransmitter { timer: None });
        }

        let mut timer = CyclicTimer::create(
            interval_us,
            move || {
                let snapshot = config.read().expect("device config poisoned").clone();
                if snapshot.peer_boundary.not_send_lldp_frames {
                    debug!("peer boundary configuration set on fire, stopping lldp transmission");
                    return TimerAction::Stop;
                }
                match compose_frame(&snapshot, address.as_ref()) {
                    Ok(frame) => {
                        let _ = eth.send_lldp(&frame);
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to compose lldp frame");
                    }
                }
                TimerAction::Continue
            },
            false,
        )?;
        timer.start()?;
        Ok(LldpTransmitter { timer: Some(timer) })
    }

    pub fn is_active(&self) -> bool {
        self.timer.is_some()
    }

    pub fn stop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.destroy();
        }
    }
}

impl Drop for LldpTransmitter {
    fn drop(&mut self) {
        self.stop();
    }
}
