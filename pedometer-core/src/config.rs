//! Compile-time tuning for the step counter.
//!
//! All cadence values are expressed either in milliseconds of the monotonic
//! clock or in counts of loop iterations ("samples") and poll cycles, so the
//! same configuration works for the firmware ticker and the emulator.

use core::fmt;

/// Number of closed units retained for delivery (one week of 5 minute units).
pub const LEDGER_CAPACITY: usize = 2016;

/// Length of a unit in the standard profile (5 minutes).
pub const STANDARD_UNIT_MILLIS: u32 = 5 * 60 * 1000;

/// Length of a unit in the rapid bench profile (6 seconds).
pub const RAPID_UNIT_MILLIS: u32 = 60 * 1000 / 10;

/// Longest unit the wrap-safe deadline arithmetic can represent.
pub const MAX_UNIT_MILLIS: u32 = (1 << 31) - 1;

/// Tuning values consumed by [`crate::Pedometer`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceConfig {
    /// Nominal length of one bucket.
    pub unit_duration_ms: u32,
    /// Motion samples per poll cycle.
    pub poll_divisor: u32,
    /// Poll cycles per LED toggle while disconnected.
    pub led_divisor: u32,
    /// Poll cycles without motion (while disconnected) before suspending.
    pub sleep_after_polls: u32,
    /// Pause after a new connection before anything is sent.
    pub settle_delay_ms: u32,
}

impl DeviceConfig {
    /// Production profile: 5 minute units.
    #[must_use]
    pub const fn standard() -> Self {
        Self {
            unit_duration_ms: STANDARD_UNIT_MILLIS,
            poll_divisor: 20,
            led_divisor: 25,
            sleep_after_polls: 3_000,
            settle_delay_ms: 1_000,
        }
    }

    /// Bench profile with 6 second units for quick end-to-end checks.
    #[must_use]
    pub const fn rapid() -> Self {
        Self {
            unit_duration_ms: RAPID_UNIT_MILLIS,
            ..Self::standard()
        }
    }

    /// Rejects values that would stall a divider or break deadline math.
    ///
    /// # Errors
    ///
    /// Returns the first offending field as a [`ConfigError`].
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.unit_duration_ms == 0 {
            return Err(ConfigError::UnitDurationZero);
        }
        if self.unit_duration_ms > MAX_UNIT_MILLIS {
            return Err(ConfigError::UnitDurationTooLong);
        }
        if self.poll_divisor == 0 {
            return Err(ConfigError::PollDivisorZero);
        }
        if self.led_divisor == 0 {
            return Err(ConfigError::LedDivisorZero);
        }
        if self.sleep_after_polls == 0 {
            return Err(ConfigError::SleepThresholdZero);
        }
        Ok(())
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::standard()
    }
}

/// Reasons a [`DeviceConfig`] is rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    UnitDurationZero,
    UnitDurationTooLong,
    PollDivisorZero,
    LedDivisorZero,
    SleepThresholdZero,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnitDurationZero => f.write_str("unit duration must be non-zero"),
            ConfigError::UnitDurationTooLong => {
                write!(f, "unit duration must not exceed {MAX_UNIT_MILLIS} ms")
            }
            ConfigError::PollDivisorZero => f.write_str("poll divisor must be non-zero"),
            ConfigError::LedDivisorZero => f.write_str("LED divisor must be non-zero"),
            ConfigError::SleepThresholdZero => f.write_str("sleep threshold must be non-zero"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_valid() {
        assert_eq!(DeviceConfig::standard().validate(), Ok(()));
        assert_eq!(DeviceConfig::rapid().validate(), Ok(()));
        assert_eq!(DeviceConfig::rapid().unit_duration_ms, 6_000);
    }

    #[test]
    fn zero_divisors_are_rejected() {
        let mut config = DeviceConfig::standard();
        config.poll_divisor = 0;
        assert_eq!(config.validate(), Err(ConfigError::PollDivisorZero));

        let mut config = DeviceConfig::standard();
        config.unit_duration_ms = 0;
        assert_eq!(config.validate(), Err(ConfigError::UnitDurationZero));

        let mut config = DeviceConfig::standard();
        config.unit_duration_ms = u32::MAX;
        assert_eq!(config.validate(), Err(ConfigError::UnitDurationTooLong));
    }
}
