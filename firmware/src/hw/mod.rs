//! Board peripherals behind the `pedometer-core` hardware traits.
//!
//! Encoder channel A/B sit on PA6/PA7 (TIM3 CH1/CH2). With the default
//! build TIM3 decodes quadrature and channel A is also wired to PB4 as the
//! wake line. The `single-edge` build counts rising edges on PA6 through
//! EXTI and wakes on the same edges.

use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_stm32::Peri;
use embassy_time::Instant;
use pedometer_core::{ElapsedMillis, MonotonicClock, StatusLed};

/// Milliseconds since boot from the Embassy time driver.
pub struct EmbassyClock;

impl MonotonicClock for EmbassyClock {
    #[allow(clippy::cast_possible_truncation)]
    fn now_millis(&self) -> ElapsedMillis {
        // Keep the low 32 bits; deadline math is wrap-safe.
        Instant::now().as_millis() as u32
    }
}

/// Status LED on PA5, active high.
pub struct BoardLed<'d> {
    pin: Output<'d>,
}

impl<'d> BoardLed<'d> {
    pub fn new(pin: Peri<'d, embassy_stm32::peripherals::PA5>) -> Self {
        Self {
            pin: Output::new(pin, Level::Low, Speed::Low),
        }
    }
}

impl StatusLed for BoardLed<'_> {
    fn set(&mut self, on: bool) {
        self.pin.set_level(if on { Level::High } else { Level::Low });
    }

    fn toggle(&mut self) {
        self.pin.toggle();
    }
}

#[cfg(not(feature = "single-edge"))]
mod quadrature {
    use embassy_stm32::exti::ExtiInput;
    use embassy_stm32::timer::qei::{Qei, QeiPin};
    use embassy_stm32::Peri;
    use embassy_stm32::peripherals::{PA6, PA7, TIM3};
    use pedometer_core::MotionCounter;

    /// TIM3 in encoder mode.
    pub struct QuadratureEncoder<'d> {
        qei: Qei<'d, TIM3>,
    }

    impl<'d> QuadratureEncoder<'d> {
        pub fn new(
            tim: Peri<'d, TIM3>,
            ch1: Peri<'d, PA6>,
            ch2: Peri<'d, PA7>,
        ) -> Self {
            Self {
                qei: Qei::new(tim, QeiPin::new(ch1), QeiPin::new(ch2)),
            }
        }
    }

    impl MotionCounter for QuadratureEncoder<'_> {
        fn position(&mut self) -> i32 {
            i32::from(self.qei.count())
        }
    }

    /// Any edge on the wake line ends a suspend.
    pub struct WakeLine<'d> {
        input: ExtiInput<'d>,
    }

    impl<'d> WakeLine<'d> {
        pub fn new(input: ExtiInput<'d>) -> Self {
            Self { input }
        }

        pub async fn wait(&mut self) {
            self.input.wait_for_any_edge().await;
        }
    }
}

#[cfg(feature = "single-edge")]
mod single_edge {
    use embassy_stm32::exti::ExtiInput;
    use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
    use embassy_sync::signal::Signal;
    use pedometer_core::MotionCounter;
    use portable_atomic::{AtomicI32, Ordering};

    static EDGE_COUNT: AtomicI32 = AtomicI32::new(0);
    static EDGE_SEEN: Signal<ThreadModeRawMutex, ()> = Signal::new();

    /// Counts rising edges on encoder channel A.
    #[embassy_executor::task]
    pub async fn count_edges(mut input: ExtiInput<'static>) -> ! {
        loop {
            input.wait_for_rising_edge().await;
            EDGE_COUNT.fetch_add(1, Ordering::Relaxed);
            EDGE_SEEN.signal(());
        }
    }

    /// Reads the edge count kept by [`count_edges`].
    pub struct EdgeCounter;

    impl MotionCounter for EdgeCounter {
        fn position(&mut self) -> i32 {
            EDGE_COUNT.load(Ordering::Relaxed)
        }
    }

    /// Wakes on the next edge counted by [`count_edges`].
    pub struct WakeLine;

    impl WakeLine {
        pub async fn wait(&mut self) {
            EDGE_SEEN.reset();
            EDGE_SEEN.wait().await;
        }
    }
}

#[cfg(not(feature = "single-edge"))]
pub use quadrature::{QuadratureEncoder as Encoder, WakeLine};
#[cfg(feature = "single-edge")]
pub use single_edge::{EdgeCounter as Encoder, WakeLine, count_edges};

/// Wake line type for the selected encoder mode.
#[cfg(not(feature = "single-edge"))]
pub type BoardWakeLine = WakeLine<'static>;
#[cfg(feature = "single-edge")]
pub type BoardWakeLine = WakeLine;

/// Encoder type for the selected encoder mode.
#[cfg(not(feature = "single-edge"))]
pub type BoardEncoder = Encoder<'static>;
#[cfg(feature = "single-edge")]
pub type BoardEncoder = Encoder;

