//! Wrap-safe helpers for the free-running millisecond counter.
//!
//! The counter is a `u32` that rolls over roughly every 49.7 days. Deadlines
//! are absolute values in the same frame, so every comparison goes through
//! `wrapping_sub` and treats differences below half the range as "not before".

/// Milliseconds since boot, wrapping on overflow.
pub type ElapsedMillis = u32;

/// Differences at or above this value are interpreted as negative.
///
/// A deadline overdue by 2^31 ms (about 24.8 days) or more therefore reads
/// as pending in [`deadline_reached`]. Unit boundaries, which can lag that far
/// behind a long suspend, go through [`overdue_by`] instead.
const HALF_RANGE: u32 = 1 << 31;

/// Source of the monotonic millisecond counter.
pub trait MonotonicClock {
    /// Returns the current elapsed time since boot.
    fn now_millis(&self) -> ElapsedMillis;
}

/// Returns `true` once `now` is at or after `deadline`.
#[must_use]
pub const fn deadline_reached(now: ElapsedMillis, deadline: ElapsedMillis) -> bool {
    now.wrapping_sub(deadline) < HALF_RANGE
}

/// Milliseconds remaining until `deadline`, or zero when it already passed.
#[must_use]
pub const fn millis_until(now: ElapsedMillis, deadline: ElapsedMillis) -> u32 {
    if deadline_reached(now, deadline) {
        0
    } else {
        deadline.wrapping_sub(now)
    }
}

/// Lateness of a deadline that is never armed more than `horizon` ahead.
///
/// Anything further ahead than `horizon` can only be a deadline that passed
/// long ago, so this stays correct for lateness up to a full counter period
/// minus `horizon`.
#[must_use]
pub const fn overdue_by(
    now: ElapsedMillis,
    deadline: ElapsedMillis,
    horizon: u32,
) -> Option<u32> {
    let ahead = deadline.wrapping_sub(now);
    if ahead != 0 && ahead <= horizon {
        None
    } else {
        Some(now.wrapping_sub(deadline))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_comparison_survives_rollover() {
        let deadline = u32::MAX - 10;
        assert!(!deadline_reached(u32::MAX - 11, deadline));
        assert!(deadline_reached(u32::MAX - 10, deadline));
        assert!(deadline_reached(5, deadline));
        assert_eq!(overdue_by(5, deadline, 1_000), Some(16));
    }

    #[test]
    fn pending_deadline_reports_remaining_time() {
        assert_eq!(millis_until(100, 250), 150);
        assert_eq!(millis_until(u32::MAX, 9), 10);
        assert_eq!(millis_until(300, 250), 0);
    }

    #[test]
    fn bounded_deadline_stays_overdue_past_half_range() {
        let deadline = 1_000;
        let now = deadline + HALF_RANGE + 5_000;
        assert!(!deadline_reached(now, deadline));
        assert_eq!(overdue_by(now, deadline, 1_000), Some(HALF_RANGE + 5_000));

        assert_eq!(overdue_by(500, deadline, 1_000), None);
        assert_eq!(overdue_by(1_000, deadline, 1_000), Some(0));
        assert_eq!(overdue_by(u32::MAX, 9, 1_000), None);
        assert_eq!(overdue_by(20, 9, 1_000), Some(11));
    }
}
