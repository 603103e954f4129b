//! Alarm bridge (spec §4.F): turns LLDP peer events into diagnostic items
//! and alarm notifications on every AR that has the affected port in its
//! expected-submodule list.
//!
//! Grounded on the same traits the PPM side reads (`collaborators::ArTable`,
//! `DiagnosticRegistry`); this module never touches LLDP-internal state
//! directly; it consumes the plain [`LldpEvent`] values `lldp::receive`
//! already produced, so it can call into the host's diagnostic API without
//! holding any lock (spec §5).

use tracing::info;

use crate::collaborators::{diag, Ar, AlarmSpec, DiagnosticItem, DiagnosticRegistry};
use crate::lldp::peer::PeerRecord;
use crate::lldp::LldpEvent;

/// The location of a port's diagnostic entries: the submodule the peer
/// record belongs to, plus the module/submodule identity to report on an
/// `alarm_send_port_change_notification` call (spec §4.F).
#[derive(Clone, Copy, Debug)]
pub struct PortLocation {
    pub api: u32,
    pub slot: u16,
    pub subslot: u16,
    pub module_ident: u32,
    pub submodule_ident: u32,
}

fn remote_mismatch_item(appears: bool, subslot: u16) -> DiagnosticItem {
    DiagnosticItem {
        usi: diag::USI_EXTENDED_CHANNEL_DIAGNOSIS,
        channel_number: subslot,
        channel_properties: if appears {
            diag::CHANNEL_PROPERTIES_APPEARS
        } else {
            diag::CHANNEL_PROPERTIES_DISAPPEARS
        },
        channel_error_type: diag::CHANNEL_ERROR_TYPE_REMOTE_MISMATCH,
        ext_channel_error_type: diag::EXT_CHANNEL_ERROR_TYPE_PORTID_MISMATCH,
        ext_channel_add_value: 0,
        alarm_spec: AlarmSpec {
            manufacturer_diagnosis: false,
            channel_diagnosis: appears,
            submodule_diagnosis: appears,
            ar_diagnosis: appears,
        },
    }
}

fn peer_lost_item(subslot: u16) -> DiagnosticItem {
    DiagnosticItem {
        usi: diag::USI_EXTENDED_CHANNEL_DIAGNOSIS,
        channel_number: subslot,
        channel_properties: diag::CHANNEL_PROPERTIES_APPEARS,
        channel_error_type: diag::CHANNEL_ERROR_TYPE_REMOTE_MISMATCH,
        ext_channel_error_type: diag::EXT_CHANNEL_ERROR_TYPE_NO_PEER_DETECTED,
        ext_channel_add_value: 0,
        alarm_spec: AlarmSpec {
            manufacturer_diagnosis: false,
            channel_diagnosis: true,
            submodule_diagnosis: true,
            ar_diagnosis: true,
        },
    }
}

/// Raise (or lower) the diagnostic entries for `event` on every AR that has
/// `location`'s slot/subslot in its expected-submodule list (spec §4.F).
/// An `AliasChanged { appeared: true }` event is a first-time peer
/// detection, not a mismatch, and is only logged.
///
/// For a remote-mismatch event, `peer.alias` is committed (`perm ← temp`)
/// only once every AR in `ars` has been scanned and none was found
/// `in_use` — mirroring `pf_lldp_send_remote_mismatch_alarm`'s `alarm_sent`
/// flag in `examples/original_source/src/common/pf_lldp.c`: the moment any
/// AR is in use, the mismatch alarm is the record of the identity change,
/// and the alias must not be silently committed over it.
pub fn handle_event<R: DiagnosticRegistry>(
    registry: &R,
    ars: &[Ar],
    peer: &mut PeerRecord,
    location: PortLocation,
    event: LldpEvent,
) {
    let is_remote_mismatch = matches!(event, LldpEvent::AliasChanged { appeared: false });
    let item = match event {
        LldpEvent::AliasChanged { appeared: true } => {
            info!(subslot = location.subslot, "lldp peer detected");
            return;
        }
        LldpEvent::AliasChanged { appeared: false } => remote_mismatch_item(true, location.subslot),
        LldpEvent::PeerLost => peer_lost_item(location.subslot),
    };

    let mut any_ar_in_use = false;
    for (ar_index, ar) in ars.iter().enumerate() {
        if !ar.in_use {
            continue;
        }
        any_ar_in_use = true;
        if ar.find_submodule(location.slot, location.subslot).is_none() {
            continue;
        }
        if !registry.diag_update(ar_index, location.api, location.slot, location.subslot, &item) {
            registry.diag_add(ar_index, location.api, location.slot, location.subslot, &item);
        }
        registry.alarm_send_port_change_notification(
            ar_index,
            location.api,
            location.slot,
            location.subslot,
            location.module_ident,
            location.submodule_ident,
            &item,
        );
    }

    if is_remote_mismatch && !any_ar_in_use {
        peer.commit_alias();
    }
}
