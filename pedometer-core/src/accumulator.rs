//! Step accumulation for the open unit and unit-boundary bookkeeping.
//!
//! The accumulator owns the running count for the open unit and the absolute
//! deadline at which that unit closes. Closing hands the count to the
//! [`BucketLedger`], which also owns the unit index.

use crate::clock::{self, ElapsedMillis};
use crate::ledger::BucketLedger;

/// Highest per-unit count; keeps a completed count clear of the zero sentinel.
pub const MAX_UNIT_STEPS: u16 = u16::MAX - 1;

/// Summary of a unit that just closed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UnitClosed {
    /// Index of the unit that received `steps`.
    pub unit: u32,
    pub steps: u16,
    /// How far the unit index moved (1 plus any units missed while late).
    pub units_advanced: u32,
    /// How far past its deadline the unit was closed.
    pub lateness_ms: u32,
    pub next_deadline: ElapsedMillis,
}

/// Counts steps in the open unit and decides when it closes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnitAccumulator {
    unit_duration_ms: u32,
    deadline: ElapsedMillis,
    steps: u16,
    last_position: Option<i32>,
}

impl UnitAccumulator {
    /// Starts the first unit at `now`.
    #[must_use]
    pub const fn new(unit_duration_ms: u32, now: ElapsedMillis) -> Self {
        let unit_duration_ms = if unit_duration_ms == 0 {
            1
        } else {
            unit_duration_ms
        };
        Self {
            unit_duration_ms,
            deadline: now.wrapping_add(unit_duration_ms),
            steps: 0,
            last_position: None,
        }
    }

    /// Steps counted in the open unit.
    #[must_use]
    pub const fn steps(&self) -> u16 {
        self.steps
    }

    /// Instant at which the open unit is due to close.
    #[must_use]
    pub const fn deadline(&self) -> ElapsedMillis {
        self.deadline
    }

    #[must_use]
    pub const fn unit_duration_ms(&self) -> u32 {
        self.unit_duration_ms
    }

    /// Counts one step for any non-zero motion delta.
    ///
    /// Returns `true` when a step was recorded.
    pub fn on_motion_delta(&mut self, delta: i32) -> bool {
        if delta == 0 {
            return false;
        }
        self.steps = self.steps.saturating_add(1).min(MAX_UNIT_STEPS);
        true
    }

    /// Feeds a raw counter position; the first sample only primes the delta.
    pub fn observe_position(&mut self, position: i32) -> bool {
        let previous = self.last_position.replace(position);
        match previous {
            Some(previous) => self.on_motion_delta(position.wrapping_sub(previous)),
            None => false,
        }
    }

    /// Closes the open unit into `ledger` once its deadline has passed.
    pub fn on_poll<const N: usize>(
        &mut self,
        now: ElapsedMillis,
        ledger: &mut BucketLedger<N>,
    ) -> Option<UnitClosed> {
        let lateness_ms = clock::overdue_by(now, self.deadline, self.unit_duration_ms)?;
        let units_advanced = 1 + lateness_ms / self.unit_duration_ms;
        let closed_unit = ledger.current_unit();
        let steps = self.steps;

        ledger.close(steps, units_advanced);
        self.deadline = now.wrapping_add(self.unit_duration_ms - lateness_ms % self.unit_duration_ms);
        self.steps = 0;

        Some(UnitClosed {
            unit: closed_unit,
            steps,
            units_advanced,
            lateness_ms,
            next_deadline: self.deadline,
        })
    }

    /// Realigns the unit boundary to a peer clock.
    ///
    /// `offset_ms` is how far into the current unit the peer believes it is.
    /// Steps and the unit index are left alone.
    pub fn on_resync(&mut self, now: ElapsedMillis, offset_ms: u32) {
        let remaining = self.unit_duration_ms - offset_ms % self.unit_duration_ms;
        self.deadline = now.wrapping_add(remaining);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIT: u32 = 1_000;

    #[test]
    fn motion_counts_one_step_per_change_regardless_of_direction() {
        let mut acc = UnitAccumulator::new(UNIT, 0);
        assert!(!acc.observe_position(10), "first sample primes");
        assert!(acc.observe_position(14));
        assert!(acc.observe_position(9));
        assert!(!acc.observe_position(9));
        assert_eq!(acc.steps(), 2);
    }

    #[test]
    fn counter_rollover_is_still_motion() {
        let mut acc = UnitAccumulator::new(UNIT, 0);
        acc.observe_position(i32::MAX);
        assert!(acc.observe_position(i32::MIN));
        assert_eq!(acc.steps(), 1);
    }

    #[test]
    fn steps_saturate_below_sentinel() {
        let mut acc = UnitAccumulator::new(UNIT, 0);
        acc.steps = MAX_UNIT_STEPS;
        assert!(acc.on_motion_delta(1));
        assert_eq!(acc.steps(), MAX_UNIT_STEPS);
    }

    #[test]
    fn unit_closes_at_deadline() {
        let mut acc = UnitAccumulator::new(UNIT, 0);
        let mut ledger = BucketLedger::<8>::new();
        acc.on_motion_delta(1);
        acc.on_motion_delta(1);

        assert_eq!(acc.on_poll(999, &mut ledger), None);
        let closed = acc.on_poll(1_000, &mut ledger).expect("unit should close");

        assert_eq!(closed.unit, 0);
        assert_eq!(closed.steps, 2);
        assert_eq!(closed.units_advanced, 1);
        assert_eq!(closed.lateness_ms, 0);
        assert_eq!(acc.deadline(), 2_000);
        assert_eq!(acc.steps(), 0);
        assert_eq!(ledger.get(0), Some(2));
    }

    #[test]
    fn late_close_keeps_boundaries_on_grid() {
        let mut acc = UnitAccumulator::new(UNIT, 0);
        let mut ledger = BucketLedger::<8>::new();

        let closed = acc.on_poll(1_250, &mut ledger).expect("unit should close");
        assert_eq!(closed.lateness_ms, 250);
        assert_eq!(acc.deadline(), 2_000);
    }

    #[test]
    fn resync_moves_deadline_only() {
        let mut acc = UnitAccumulator::new(UNIT, 0);
        let mut ledger = BucketLedger::<8>::new();
        acc.on_motion_delta(1);

        acc.on_resync(400, 700);
        assert_eq!(acc.deadline(), 700);
        assert_eq!(acc.steps(), 1);
        assert_eq!(ledger.current_unit(), 0);

        acc.on_resync(400, 2_300);
        assert_eq!(acc.deadline(), 1_100, "offset wraps modulo the unit");

        assert!(acc.on_poll(1_100, &mut ledger).is_some());
    }

    #[test]
    fn unit_closes_after_suspend_longer_than_half_the_clock_range() {
        let mut acc = UnitAccumulator::new(UNIT, 0);
        let mut ledger = BucketLedger::<8>::new();
        acc.on_motion_delta(1);

        // 30 days asleep.
        let now = 30 * 24 * 3_600 * 1_000 + 250;
        let closed = acc.on_poll(now, &mut ledger).expect("overdue unit closes");
        assert_eq!(closed.steps, 1);
        assert_eq!(closed.lateness_ms, now - UNIT);
        assert_eq!(acc.deadline(), now + 750);
        assert_eq!(acc.on_poll(now + 749, &mut ledger), None);
    }

    #[test]
    fn deadline_survives_clock_rollover() {
        let start = u32::MAX - 400;
        let mut acc = UnitAccumulator::new(UNIT, start);
        let mut ledger = BucketLedger::<8>::new();

        assert_eq!(acc.deadline(), 599);
        assert_eq!(acc.on_poll(u32::MAX, &mut ledger), None);
        assert!(acc.on_poll(600, &mut ledger).is_some());
        assert_eq!(acc.deadline(), 1_599);
    }
}
