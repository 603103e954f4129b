/*!

A host-agnostic implementation of two pieces of a PROFINET I/O device's
real-time core:

* the **Provider Protocol Machine** (PPM), the cyclic sender that puts a
  device's process data on the wire at a fixed `send_clock_factor *
  reduction_ratio` interval and carries the `data_status`/`cycle` fields the
  IO-controller's consumer side checks every cycle; and
* **LLDP neighborhood discovery**: a periodic identity broadcast, a receiver
  that derives a peer alias from the discovered Chassis ID/Port ID, and an
  alarm bridge that raises a diagnostic entry when a port's wired neighbor
  doesn't match what was last seen.

Everything this crate needs from the rest of a device stack — raw Ethernet
send, a monotonic clock, the AR table, the diagnostic/alarm sink — is
expressed as a trait in [`collaborators`]; this crate owns no socket, no
DCP/RPC layer, and no persistent configuration store. See each module's
documentation for the relevant IEC 61158 / IEEE 802.1AB details.

*/

pub mod alarm;
pub mod codec;
pub mod collaborators;
pub mod error;
pub mod lldp;
pub mod ppm;
pub mod timer;
pub mod types;

pub use error::{Error, Result};
pub use types::{ArHandle, Crep, DataStatus, EthAddr, PpmState};
