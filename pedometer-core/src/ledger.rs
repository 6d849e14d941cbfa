//! Bounded ring of closed-unit step counts.
//!
//! Slot `i % N` holds unit `i` for as long as `i` stays inside the last `N`
//! closed units. Older units are overwritten without notice; [`BucketLedger::get`]
//! refuses to hand them out so a lagging reader never sees a newer unit's count
//! under an old index.

/// Fixed-capacity ledger keyed by unit index.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BucketLedger<const N: usize> {
    slots: [u16; N],
    unit: u32,
}

impl<const N: usize> BucketLedger<N> {
    /// Creates an empty ledger positioned at unit zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [0; N],
            unit: 0,
        }
    }

    /// Number of slots in the ring.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Index of the currently open unit (equals the number of closed units).
    #[must_use]
    pub const fn current_unit(&self) -> u32 {
        self.unit
    }

    /// Oldest unit index that can still be read.
    #[must_use]
    pub fn oldest_readable(&self) -> u32 {
        self.unit.saturating_sub(capacity_u32::<N>())
    }

    /// Closes the open unit with `steps` and advances by `units_elapsed`.
    ///
    /// Units skipped beyond the first are recorded as zero steps. A zero
    /// `units_elapsed` is treated as one.
    pub fn close(&mut self, steps: u16, units_elapsed: u32) {
        if N == 0 {
            self.unit = self.unit.wrapping_add(units_elapsed.max(1));
            return;
        }

        let units_elapsed = units_elapsed.max(1);
        self.write(self.unit, steps);

        let skipped = (units_elapsed - 1).min(capacity_u32::<N>());
        for offset in 1..=skipped {
            self.write(self.unit.wrapping_add(offset), 0);
        }

        self.unit = self.unit.wrapping_add(units_elapsed);
    }

    /// Returns the step count for a closed unit still inside the window.
    #[must_use]
    pub fn get(&self, index: u32) -> Option<u16> {
        if index >= self.unit || index < self.oldest_readable() {
            return None;
        }
        Some(self.slots[slot_for::<N>(index)])
    }

    fn write(&mut self, index: u32, value: u16) {
        self.slots[slot_for::<N>(index)] = value;
    }
}

impl<const N: usize> Default for BucketLedger<N> {
    fn default() -> Self {
        Self::new()
    }
}

fn capacity_u32<const N: usize>() -> u32 {
    u32::try_from(N).unwrap_or(u32::MAX)
}

fn slot_for<const N: usize>(index: u32) -> usize {
    index as usize % N
}
