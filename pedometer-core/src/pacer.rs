//! Counted "run every Nth call" dividers for the poll loop.

/// Fires once every `period` calls to [`RateDivider::tick`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RateDivider {
    period: u32,
    count: u32,
}

impl RateDivider {
    /// Creates a divider; a zero period is treated as one.
    #[must_use]
    pub const fn new(period: u32) -> Self {
        Self {
            period: if period == 0 { 1 } else { period },
            count: 0,
        }
    }

    /// Advances the divider, returning `true` on every `period`-th call.
    pub fn tick(&mut self) -> bool {
        self.count += 1;
        if self.count >= self.period {
            self.count = 0;
            true
        } else {
            false
        }
    }

    /// Restarts the current period.
    pub fn reset(&mut self) {
        self.count = 0;
    }

    /// Calls counted toward the current period.
    #[must_use]
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// Configured period.
    #[must_use]
    pub const fn period(&self) -> u32 {
        self.period
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_on_every_nth_tick() {
        let mut divider = RateDivider::new(3);
        let fired: [bool; 6] = core::array::from_fn(|_| divider.tick());
        assert_eq!(fired, [false, false, true, false, false, true]);
    }

    #[test]
    fn reset_restarts_the_period() {
        let mut divider = RateDivider::new(2);
        assert!(!divider.tick());
        divider.reset();
        assert!(!divider.tick());
        assert!(divider.tick());
    }

    #[test]
    fn zero_period_fires_every_tick() {
        let mut divider = RateDivider::new(0);
        assert_eq!(divider.period(), 1);
        assert!(divider.tick());
        assert!(divider.tick());
    }
}
