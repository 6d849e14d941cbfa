//! Chooses the single notification sent on each connected, settled poll.
//!
//! Closed units drain oldest first, one per poll, before any live update. If
//! the reader fell so far behind that its next unit was overwritten, the
//! cursor jumps to the oldest unit still held by the ledger and the number of
//! units given up is reported.

use crate::ledger::BucketLedger;
use crate::wire::OutgoingValue;

/// What a delivery poll decided to send.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeliveryOutcome {
    /// Nothing new to send.
    Idle,
    /// A closed unit was sent.
    Completed {
        unit: u32,
        value: OutgoingValue,
        /// Units skipped because the ledger had already overwritten them.
        lost: u32,
    },
    /// The open unit's count changed and was sent.
    Live(OutgoingValue),
}

impl DeliveryOutcome {
    /// Notification to hand to the transport, if any.
    #[must_use]
    pub const fn notification(&self) -> Option<OutgoingValue> {
        match self {
            DeliveryOutcome::Idle => None,
            DeliveryOutcome::Completed { value, .. } | DeliveryOutcome::Live(value) => Some(*value),
        }
    }
}

/// Delivery cursor over the [`BucketLedger`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DeliveryDriver {
    sent_unit: u32,
    last_live: Option<u16>,
    lost_units: u32,
}

impl DeliveryDriver {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sent_unit: 0,
            last_live: None,
            lost_units: 0,
        }
    }

    /// Next unit index waiting to be delivered.
    #[must_use]
    pub const fn sent_unit(&self) -> u32 {
        self.sent_unit
    }

    /// Total units dropped to backlog overflow since boot.
    #[must_use]
    pub const fn lost_units(&self) -> u32 {
        self.lost_units
    }

    /// Closed units not yet delivered (including any already overwritten).
    #[must_use]
    pub fn pending<const N: usize>(&self, ledger: &BucketLedger<N>) -> u32 {
        ledger.current_unit().saturating_sub(self.sent_unit)
    }

    /// Forgets the last live value so a new peer receives a fresh count.
    pub fn on_connected(&mut self) {
        self.last_live = None;
    }

    /// Picks at most one notification for this poll and advances the cursor.
    pub fn poll<const N: usize>(
        &mut self,
        ledger: &BucketLedger<N>,
        live_steps: u16,
    ) -> DeliveryOutcome {
        if self.sent_unit < ledger.current_unit() {
            let oldest = ledger.oldest_readable();
            let lost = oldest.saturating_sub(self.sent_unit);
            if lost > 0 {
                self.sent_unit = oldest;
                self.lost_units = self.lost_units.saturating_add(lost);
            }

            if let Some(steps) = ledger.get(self.sent_unit) {
                let unit = self.sent_unit;
                self.sent_unit += 1;
                return DeliveryOutcome::Completed {
                    unit,
                    value: OutgoingValue::Completed(steps),
                    lost,
                };
            }
        }

        if self.last_live == Some(live_steps) {
            return DeliveryOutcome::Idle;
        }
        self.last_live = Some(live_steps);
        DeliveryOutcome::Live(OutgoingValue::Live(live_steps))
    }
}
