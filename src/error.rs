//! Error taxonomy for the PPM and LLDP core (spec §7).

use std::result;

pub type Result<T> = result::Result<T, Error>;

/// Errors surfaced to callers of the core. Each variant corresponds to an
/// error kind named in the specification's error-handling section.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("PPM instance is not in the expected state for this operation")]
    InvalidState,

    #[error("supplied length ({supplied}) does not match the descriptor length ({expected})")]
    LengthMismatch { expected: usize, supplied: usize },

    #[error("caller buffer ({supplied}) is smaller than the descriptor length ({expected})")]
    BufferTooSmall { expected: usize, supplied: usize },

    #[error("frame buffer overflow: tried to write {attempted} bytes at offset {offset} into a buffer of {capacity}")]
    BufferOverflow {
        offset: usize,
        attempted: usize,
        capacity: usize,
    },

    #[error("no per-subslot data descriptor found for api {api} slot {slot} subslot {subslot}")]
    NoDescriptor { api: u32, slot: u16, subslot: u16 },

    #[error("failed to create the cyclic timer")]
    TimerCreateFailed,

    #[error("raw-Ethernet send failed")]
    SendFailed,
}
