use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::Pull;
use pedometer_core::{DeviceConfig, LinkMailbox, MonotonicClock, Pedometer};

use crate::hw::{self, BoardEncoder, BoardLed, BoardWakeLine, EmbassyClock};
use crate::link::{OutboundQueue, UartNotificationChannel};

mod link_task;
mod poll_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

pub(super) static LINK_MAILBOX: LinkMailbox = LinkMailbox::new();
pub(super) static OUTBOUND_QUEUE: OutboundQueue = OutboundQueue::new();

/// The step counter wired to this board.
pub(super) type BoardPedometer =
    Pedometer<BoardEncoder, UartNotificationChannel<'static>, BoardLed<'static>>;

#[cfg(not(feature = "rapid-units"))]
const DEVICE_CONFIG: DeviceConfig = DeviceConfig::standard();
#[cfg(feature = "rapid-units")]
const DEVICE_CONFIG: DeviceConfig = DeviceConfig::rapid();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA5,
        PA6,
        PA7,
        PB0,
        PB1,
        PB4,
        TIM3,
        EXTI4,
        EXTI6,
        USART5,
        ..
    } = hal::init(config);

    #[cfg(not(feature = "single-edge"))]
    let (encoder, wake): (BoardEncoder, BoardWakeLine) = {
        let _ = EXTI6;
        (
            hw::Encoder::new(TIM3, PA6, PA7),
            hw::WakeLine::new(ExtiInput::new(PB4, EXTI4, Pull::Up)),
        )
    };

    #[cfg(feature = "single-edge")]
    let (encoder, wake): (BoardEncoder, BoardWakeLine) = {
        let _ = (TIM3, PA7, PB4, EXTI4);
        spawner
            .spawn(hw::count_edges(ExtiInput::new(PA6, EXTI6, Pull::Up)))
            .expect("failed to spawn edge counter task");
        (hw::Encoder, hw::WakeLine)
    };

    let channel = UartNotificationChannel::new(OUTBOUND_QUEUE.sender());
    let led = BoardLed::new(PA5);
    let device: BoardPedometer =
        Pedometer::new(DEVICE_CONFIG, EmbassyClock.now_millis(), encoder, channel, led)
            .expect("invalid device configuration");

    defmt::info!(
        "boot: unit={}ms poll_divisor={} ledger={}",
        DEVICE_CONFIG.unit_duration_ms,
        DEVICE_CONFIG.poll_divisor,
        device.ledger().capacity()
    );

    spawner
        .spawn(link_task::run(
            &LINK_MAILBOX,
            OUTBOUND_QUEUE.receiver(),
            USART5,
            PB0,
            PB1,
        ))
        .expect("failed to spawn link task");

    spawner
        .spawn(poll_task::run(device, &LINK_MAILBOX, wake))
        .expect("failed to spawn poll task");

    core::future::pending::<()>().await;
}
