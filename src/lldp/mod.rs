//! Link Layer Discovery engine (spec §4.D/§4.E): periodic identity
//! broadcast plus peer observation, alias derivation, and TTL watchdog.

pub mod peer;
pub mod rx;
pub mod tx;

pub use peer::{Alias, PeerRecord};
pub use rx::{receive, LldpEvent};
pub use tx::LldpTransmitter;

use crate::error::{Error, Result};
use crate::timer::{CyclicTimer, TimerAction};

/// Default LLDP broadcast period, 5 seconds (spec §4.D).
pub const LLDP_BROADCAST_RATE_SECS: u64 = 5;

/// The peer TTL watchdog (spec §4.F): a one-shot timer re-armed for
/// `ttl_secs` on every received frame. If it ever fires, no frame arrived
/// within the advertised TTL and the peer is considered lost.
pub struct PeerWatchdog {
    timer: Option<CyclicTimer>,
}

impl PeerWatchdog {
    /// Arm a fresh watchdog for `ttl_secs` seconds, invoking `on_timeout`
    /// if it is not cancelled or re-armed first.
    pub fn arm<F>(ttl_secs: u16, on_timeout: F) -> Result<PeerWatchdog>
    where
        F: FnMut() -> TimerAction + Send + 'static,
    {
        if ttl_secs == 0 {
            return Err(Error::TimerCreateFailed);
        }
        let mut timer = CyclicTimer::create(u64::from(ttl_secs) * 1_000_000, on_timeout, true)?;
        timer.start()?;
        Ok(PeerWatchdog { timer: Some(timer) })
    }

    /// Cancel any running watchdog and arm a new one, as done every time a
    /// frame is received for this peer.
    pub fn rearm<F>(&mut self, ttl_secs: u16, on_timeout: F) -> Result<()>
    where
        F: FnMut() -> TimerAction + Send + 'static,
    {
        self.cancel();
        *self = PeerWatchdog::arm(ttl_secs, on_timeout)?;
        Ok(())
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_some()
    }

    pub fn cancel(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.destroy();
        }
    }
}

/// PROFINET LLDP organisation-specific subtypes (spec §4.D/§4.E).
pub mod profinet_subtype {
    pub const PORT_STATUS: u8 = 2;
    pub const DELAY_VALUES: u8 = 3;
    pub const CHASSIS_MAC: u8 = 5;
}

/// IEEE 802.3 organisation-specific subtypes.
pub mod ieee8023_subtype {
    pub const MACPHY_CONFIG: u8 = 1;
}

/// Chassis/Port ID TLV subtypes used by this core (spec §4.D).
pub mod id_subtype {
    pub const MAC: u8 = 4;
    pub const LOCAL: u8 = 7;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_ttl_is_rejected() {
        assert!(PeerWatchdog::arm(0, || TimerAction::Continue).is_err());
    }

    #[test]
    fn cancel_disarms_the_watchdog() {
        let mut watchdog = PeerWatchdog::arm(30, || TimerAction::Continue).unwrap();
        assert!(watchdog.is_armed());
        watchdog.cancel();
        assert!(!watchdog.is_armed());
    }

    #[test]
    fn rearm_replaces_the_running_timer() {
        let mut watchdog = PeerWatchdog::arm(30, || TimerAction::Continue).unwrap();
        watchdog.rearm(10, || TimerAction::Continue).unwrap();
        assert!(watchdog.is_armed());
    }
}
