//! Single-producer/single-consumer handoff between the link task and the poll loop.
//!
//! The link task only writes; the poll loop only reads. Each value lives in a
//! single atomic word so the loop can never observe half of an update. The
//! resync slot packs a pending flag above the 32-bit offset; a newer write
//! replaces an unconsumed older one.

use portable_atomic::{AtomicBool, AtomicU64, Ordering};

use crate::link::LinkEventHandler;
use crate::wire::decode_resync_offset;

const RESYNC_PENDING: u64 = 1 << 32;

/// Shared link state written by the transport and drained by the poll loop.
pub struct LinkMailbox {
    connected: AtomicBool,
    resync: AtomicU64,
}

impl LinkMailbox {
    /// Creates an empty mailbox in the disconnected state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            resync: AtomicU64::new(0),
        }
    }

    /// Records the latest connection state reported by the transport.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    /// Latest connection state reported by the transport.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Publishes a resync offset (milliseconds into the current unit).
    pub fn post_resync(&self, offset_ms: u32) {
        self.resync
            .store(RESYNC_PENDING | u64::from(offset_ms), Ordering::Release);
    }

    /// Takes the pending resync offset, if any.
    #[must_use]
    pub fn take_resync(&self) -> Option<u32> {
        let raw = self.resync.swap(0, Ordering::AcqRel);
        if raw & RESYNC_PENDING == 0 {
            return None;
        }
        u32::try_from(raw & u64::from(u32::MAX)).ok()
    }
}

impl LinkEventHandler for LinkMailbox {
    fn on_connect(&self) {
        self.set_connected(true);
    }

    fn on_disconnect(&self) {
        self.set_connected(false);
    }

    fn on_write(&self, payload: &[u8]) {
        self.post_resync(decode_resync_offset(payload));
    }
}

impl Default for LinkMailbox {
    fn default() -> Self {
        Self::new()
    }
}
