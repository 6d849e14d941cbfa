//! On-air encodings shared with the paired client.
//!
//! Outgoing notifications carry one signed 32-bit integer (little-endian).
//! The sign tells the client which stream a value belongs to:
//!
//! * `>= 0`: live step count for the unit that is still open.
//! * `< 0`: step count of a completed unit, negated.
//! * [`COMPLETED_ZERO_SENTINEL`]: a completed unit with zero steps, since `-0`
//!   would be indistinguishable from a live zero.
//!
//! Incoming resync writes are a big-endian unsigned integer of milliseconds
//! with no length prefix.

use crate::accumulator::MAX_UNIT_STEPS;

/// Wire value for "completed unit, zero steps".
pub const COMPLETED_ZERO_SENTINEL: i32 = -65_535;

/// Encoded size of an [`OutgoingValue`].
pub const OUTGOING_FRAME_LEN: usize = 4;

/// One outbound notification.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutgoingValue {
    /// Steps counted so far in the open unit.
    Live(u16),
    /// Final step count of a closed unit.
    Completed(u16),
}

impl OutgoingValue {
    /// Converts the value into its signed wire representation.
    #[must_use]
    pub fn to_wire(self) -> i32 {
        match self {
            OutgoingValue::Live(steps) => i32::from(steps),
            OutgoingValue::Completed(0) => COMPLETED_ZERO_SENTINEL,
            OutgoingValue::Completed(steps) => -i32::from(steps.min(MAX_UNIT_STEPS)),
        }
    }

    /// Little-endian frame handed to the transport.
    #[must_use]
    pub fn to_wire_bytes(self) -> [u8; OUTGOING_FRAME_LEN] {
        self.to_wire().to_le_bytes()
    }

    /// Interprets a signed wire value; out-of-range values yield `None`.
    #[must_use]
    pub fn from_wire(raw: i32) -> Option<Self> {
        if raw == COMPLETED_ZERO_SENTINEL {
            return Some(OutgoingValue::Completed(0));
        }
        if raw >= 0 {
            return u16::try_from(raw).ok().map(OutgoingValue::Live);
        }
        let steps = u16::try_from(raw.unsigned_abs()).ok()?;
        (steps <= MAX_UNIT_STEPS).then_some(OutgoingValue::Completed(steps))
    }

    /// Parses a 4-byte little-endian frame.
    #[must_use]
    pub fn from_wire_bytes(frame: &[u8]) -> Option<Self> {
        let bytes: [u8; OUTGOING_FRAME_LEN] = frame.try_into().ok()?;
        Self::from_wire(i32::from_le_bytes(bytes))
    }
}

/// Decodes a resync payload into milliseconds.
///
/// Bytes arrive most-significant first. An empty payload decodes to zero and
/// payloads longer than four bytes keep their four least-significant bytes.
#[must_use]
pub fn decode_resync_offset(payload: &[u8]) -> u32 {
    payload
        .iter()
        .fold(0u32, |acc, &byte| (acc << 8) | u32::from(byte))
}
