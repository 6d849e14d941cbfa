#![no_std]

// Shared logic for the step counter.
//
// Everything that decides when a unit closes, which bucket goes out next, and
// how the link is sampled lives here so the STM32 firmware and the host
// emulator run the exact same state machine.

pub mod accumulator;
pub mod clock;
pub mod config;
pub mod delivery;
pub mod device;
pub mod handoff;
pub mod ledger;
pub mod link;
pub mod pacer;
pub mod wire;

pub use accumulator::{MAX_UNIT_STEPS, UnitAccumulator, UnitClosed};
pub use clock::{ElapsedMillis, MonotonicClock};
pub use config::{ConfigError, DeviceConfig, LEDGER_CAPACITY};
pub use delivery::{DeliveryDriver, DeliveryOutcome};
pub use device::{MotionCounter, NotificationChannel, Pedometer, StatusLed, TickReport};
pub use handoff::LinkMailbox;
pub use ledger::BucketLedger;
pub use link::{ConnectionState, LinkEvent, LinkEventHandler, LinkMonitor, LinkTransition};
pub use pacer::RateDivider;
pub use wire::{
    COMPLETED_ZERO_SENTINEL, OUTGOING_FRAME_LEN, OutgoingValue, decode_resync_offset,
};
