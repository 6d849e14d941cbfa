//! The step counter as one owned aggregate.
//!
//! [`Pedometer`] is driven by a single loop: [`Pedometer::tick`] is called for
//! every motion sample and runs the poll cycle on every `poll_divisor`-th
//! call. Hardware sits behind three narrow traits so the same state machine
//! runs against real peripherals and the emulator's fakes.

use crate::accumulator::{UnitAccumulator, UnitClosed};
use crate::clock::ElapsedMillis;
use crate::config::{ConfigError, DeviceConfig, LEDGER_CAPACITY};
use crate::delivery::{DeliveryDriver, DeliveryOutcome};
use crate::handoff::LinkMailbox;
use crate::ledger::BucketLedger;
use crate::link::{LinkMonitor, LinkTransition};
use crate::pacer::RateDivider;
use crate::wire::OutgoingValue;

/// Source of raw encoder positions.
pub trait MotionCounter {
    /// Current counter position; only differences between samples matter.
    fn position(&mut self) -> i32;
}

/// Outbound side of the wireless link.
pub trait NotificationChannel {
    /// Sends one value to the peer. Delivery is fire-and-forget.
    fn notify(&mut self, value: OutgoingValue);

    /// Makes the device discoverable again after the peer went away.
    fn start_advertising(&mut self);
}

/// Single status LED.
pub trait StatusLed {
    fn set(&mut self, on: bool);
    fn toggle(&mut self);
}

/// What a single [`Pedometer::tick`] did, for the caller to log or act on.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickReport {
    /// The motion sample counted a step.
    pub stepped: bool,
    /// This tick ran the poll cycle.
    pub polled: bool,
    /// Resync offset applied during this poll.
    pub resynced: Option<u32>,
    pub closed: Option<UnitClosed>,
    pub transition: LinkTransition,
    pub delivery: DeliveryOutcome,
    /// No motion for too long while disconnected; the caller should sleep
    /// until the motion sensor wakes it and then call [`Pedometer::resume`].
    pub suspend: bool,
}

impl TickReport {
    const fn idle() -> Self {
        Self {
            stepped: false,
            polled: false,
            resynced: None,
            closed: None,
            transition: LinkTransition::Unchanged,
            delivery: DeliveryOutcome::Idle,
            suspend: false,
        }
    }
}

/// Step counter state plus its hardware collaborators.
pub struct Pedometer<M, C, L, const N: usize = LEDGER_CAPACITY> {
    config: DeviceConfig,
    accumulator: UnitAccumulator,
    ledger: BucketLedger<N>,
    delivery: DeliveryDriver,
    link: LinkMonitor,
    poll_pacer: RateDivider,
    led_pacer: RateDivider,
    inactivity: RateDivider,
    motion: M,
    channel: C,
    led: L,
}

impl<M, C, L, const N: usize> Pedometer<M, C, L, N>
where
    M: MotionCounter,
    C: NotificationChannel,
    L: StatusLed,
{
    /// Starts unit zero at `now` and primes the motion counter.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `config` fails validation.
    pub fn new(
        config: DeviceConfig,
        now: ElapsedMillis,
        mut motion: M,
        channel: C,
        mut led: L,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut accumulator = UnitAccumulator::new(config.unit_duration_ms, now);
        accumulator.observe_position(motion.position());
        led.set(false);

        Ok(Self {
            config,
            accumulator,
            ledger: BucketLedger::new(),
            delivery: DeliveryDriver::new(),
            link: LinkMonitor::new(config.settle_delay_ms),
            poll_pacer: RateDivider::new(config.poll_divisor),
            led_pacer: RateDivider::new(config.led_divisor),
            inactivity: RateDivider::new(config.sleep_after_polls),
            motion,
            channel,
            led,
        })
    }

    /// Samples motion and, every `poll_divisor` calls, runs the poll cycle.
    pub fn tick(&mut self, now: ElapsedMillis, mailbox: &LinkMailbox) -> TickReport {
        let mut report = TickReport::idle();

        report.stepped = self.accumulator.observe_position(self.motion.position());
        if report.stepped {
            self.inactivity.reset();
        }

        if self.poll_pacer.tick() {
            report.polled = true;
            self.poll(now, mailbox, &mut report);
        }
        report
    }

    /// Clears the inactivity count after the wake interrupt fired.
    ///
    /// Motion seen while asleep counts as one step, like any other sample.
    pub fn resume(&mut self) {
        self.inactivity.reset();
        self.accumulator.observe_position(self.motion.position());
    }

    fn poll(&mut self, now: ElapsedMillis, mailbox: &LinkMailbox, report: &mut TickReport) {
        if let Some(offset) = mailbox.take_resync() {
            self.accumulator.on_resync(now, offset);
            report.resynced = Some(offset);
        }

        report.closed = self.accumulator.on_poll(now, &mut self.ledger);

        report.transition = self.link.sample(mailbox.is_connected(), now);
        match report.transition {
            LinkTransition::Connected => {
                self.inactivity.reset();
                self.delivery.on_connected();
            }
            LinkTransition::Disconnected => {
                self.led_pacer.reset();
                self.channel.start_advertising();
            }
            LinkTransition::Unchanged => {}
        }

        if !self.link.state().is_connected() {
            if self.led_pacer.tick() {
                self.led.toggle();
            }
            if self.inactivity.tick() {
                self.led.set(false);
                report.suspend = true;
            }
            return;
        }

        self.led.set(true);
        if self.link.is_settling(now) {
            return;
        }

        report.delivery = self.delivery.poll(&self.ledger, self.accumulator.steps());
        if let Some(value) = report.delivery.notification() {
            self.channel.notify(value);
        }
    }

    #[must_use]
    pub const fn config(&self) -> &DeviceConfig {
        &self.config
    }

    #[must_use]
    pub const fn accumulator(&self) -> &UnitAccumulator {
        &self.accumulator
    }

    #[must_use]
    pub const fn ledger(&self) -> &BucketLedger<N> {
        &self.ledger
    }

    #[must_use]
    pub const fn delivery(&self) -> &DeliveryDriver {
        &self.delivery
    }

    #[must_use]
    pub const fn link(&self) -> &LinkMonitor {
        &self.link
    }

    /// Poll cycles without motion counted toward suspending.
    #[must_use]
    pub const fn idle_polls(&self) -> u32 {
        self.inactivity.count()
    }

    pub fn motion_mut(&mut self) -> &mut M {
        &mut self.motion
    }

    #[must_use]
    pub const fn channel(&self) -> &C {
        &self.channel
    }

    #[must_use]
    pub const fn led(&self) -> &L {
        &self.led
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Encoder(i32);

    impl MotionCounter for Encoder {
        fn position(&mut self) -> i32 {
            self.0
        }
    }

    #[derive(Default)]
    struct Radio {
        sent: heapless::Vec<OutgoingValue, 16>,
        advertised: u32,
    }

    impl NotificationChannel for Radio {
        fn notify(&mut self, value: OutgoingValue) {
            self.sent.push(value).expect("test radio full");
        }

        fn start_advertising(&mut self) {
            self.advertised += 1;
        }
    }

    #[derive(Default)]
    struct Led {
        on: bool,
        toggles: u32,
    }

    impl StatusLed for Led {
        fn set(&mut self, on: bool) {
            self.on = on;
        }

        fn toggle(&mut self) {
            self.on = !self.on;
            self.toggles += 1;
        }
    }

    type TestPedometer = Pedometer<Encoder, Radio, Led, 8>;

    fn config() -> DeviceConfig {
        DeviceConfig {
            unit_duration_ms: 1_000,
            poll_divisor: 1,
            led_divisor: 2,
            sleep_after_polls: 5,
            settle_delay_ms: 100,
        }
    }

    fn device() -> TestPedometer {
        Pedometer::new(config(), 0, Encoder::default(), Radio::default(), Led::default())
            .expect("valid config")
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = DeviceConfig {
            poll_divisor: 0,
            ..config()
        };
        let result: Result<TestPedometer, _> =
            Pedometer::new(config, 0, Encoder::default(), Radio::default(), Led::default());
        assert!(matches!(result, Err(ConfigError::PollDivisorZero)));
    }

    #[test]
    fn poll_cycle_runs_every_divisor_ticks() {
        let config = DeviceConfig {
            poll_divisor: 3,
            ..config()
        };
        let mut device: TestPedometer =
            Pedometer::new(config, 0, Encoder::default(), Radio::default(), Led::default())
                .expect("valid config");
        let mailbox = LinkMailbox::new();

        let polled: [bool; 6] = core::array::from_fn(|i| {
            device.motion_mut().0 = i32::try_from(i).expect("small index");
            device.tick(0, &mailbox).polled
        });
        assert_eq!(polled, [false, false, true, false, false, true]);
        assert_eq!(device.accumulator().steps(), 5);
    }

    #[test]
    fn disconnected_device_blinks_and_suspends_when_idle() {
        let mut device = device();
        let mailbox = LinkMailbox::new();

        let mut suspended_at = None;
        for poll in 1..=5 {
            if device.tick(poll, &mailbox).suspend {
                suspended_at = Some(poll);
            }
        }

        assert_eq!(suspended_at, Some(5));
        assert!(!device.led().on);
        assert_eq!(device.led().toggles, 2);
        assert!(device.channel().sent.is_empty());
    }

    #[test]
    fn motion_postpones_suspend() {
        let mut device = device();
        let mailbox = LinkMailbox::new();

        for now in 1..=4 {
            assert!(!device.tick(now, &mailbox).suspend);
        }
        device.motion_mut().0 += 1;
        assert!(!device.tick(5, &mailbox).suspend);
        assert_eq!(device.idle_polls(), 1);

        device.resume();
        assert_eq!(device.idle_polls(), 0);
    }

    #[test]
    fn connected_device_waits_out_settle_then_sends_live() {
        let mut device = device();
        let mailbox = LinkMailbox::new();
        mailbox.set_connected(true);

        let report = device.tick(10, &mailbox);
        assert_eq!(report.transition, LinkTransition::Connected);
        assert_eq!(report.delivery, DeliveryOutcome::Idle);
        assert!(device.led().on);

        device.tick(109, &mailbox);
        assert!(device.channel().sent.is_empty());

        device.tick(110, &mailbox);
        assert_eq!(device.channel().sent.as_slice(), &[OutgoingValue::Live(0)]);
    }

    #[test]
    fn disconnect_restarts_advertising() {
        let mut device = device();
        let mailbox = LinkMailbox::new();
        mailbox.set_connected(true);
        device.tick(0, &mailbox);

        mailbox.set_connected(false);
        let report = device.tick(1, &mailbox);
        assert_eq!(report.transition, LinkTransition::Disconnected);
        assert_eq!(device.channel().advertised, 1);
    }

    #[test]
    fn resync_is_applied_on_the_next_poll() {
        let mut device = device();
        let mailbox = LinkMailbox::new();
        mailbox.post_resync(250);

        let report = device.tick(100, &mailbox);
        assert_eq!(report.resynced, Some(250));
        assert_eq!(device.accumulator().deadline(), 850);
        assert_eq!(device.ledger().current_unit(), 0);
    }
}
