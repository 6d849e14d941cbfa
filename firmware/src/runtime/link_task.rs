use embassy_futures::join::join;
use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_stm32::usart::{BufferedUart, Config as UartConfig, DataBits, Parity, StopBits};
use embassy_time::{Duration, Timer, with_timeout};
use embedded_io_async::{Read, Write};
use heapless::Vec;
use pedometer_core::{LinkEvent, LinkMailbox};
use static_cell::StaticCell;

use crate::link::{self, DEVICE_NAME, OUTBOUND_FRAME_LEN, OUTBOUND_QUEUE_DEPTH, OutboundReceiver};

const UART_BUFFER_SIZE: usize = OUTBOUND_FRAME_LEN * OUTBOUND_QUEUE_DEPTH;
/// Factory default rate of HM-10 class modules.
const MODULE_UART_BAUD: u32 = 9_600;
/// Silence that ends an inbound frame (about 20 character times at 9600 baud).
const FRAME_GAP: Duration = Duration::from_millis(20);
/// Pause between boot commands so each reply arrives on its own.
const COMMAND_SPACING: Duration = Duration::from_millis(150);
const INBOUND_FRAME_LEN: usize = 32;

static UART_TX_BUFFER: StaticCell<[u8; UART_BUFFER_SIZE]> = StaticCell::new();
static UART_RX_BUFFER: StaticCell<[u8; UART_BUFFER_SIZE]> = StaticCell::new();

embassy_stm32::bind_interrupts!(struct UartIrqs {
    USART3_4_5_6_LPUART1 => embassy_stm32::usart::BufferedInterruptHandler<hal::peripherals::USART5>;
});

type InboundFrame = Vec<u8, INBOUND_FRAME_LEN>;

#[embassy_executor::task]
pub async fn run(
    mailbox: &'static LinkMailbox,
    outbound: OutboundReceiver<'static>,
    usart: Peri<'static, hal::peripherals::USART5>,
    tx_pin: Peri<'static, hal::peripherals::PB0>,
    rx_pin: Peri<'static, hal::peripherals::PB1>,
) -> ! {
    let mut config = UartConfig::default();
    config.baudrate = MODULE_UART_BAUD;
    config.data_bits = DataBits::DataBits8;
    config.stop_bits = StopBits::STOP1;
    config.parity = Parity::ParityNone;

    let uart = BufferedUart::new(
        usart,
        rx_pin,
        tx_pin,
        UART_TX_BUFFER.init([0; UART_BUFFER_SIZE]),
        UART_RX_BUFFER.init([0; UART_BUFFER_SIZE]),
        UartIrqs,
        config,
    )
    .expect("failed to initialize module UART");

    let (mut uart_tx, mut uart_rx) = uart.split();

    match link::boot_commands(DEVICE_NAME) {
        Ok(commands) => {
            for command in &commands {
                write_frame(&mut uart_tx, command).await;
                Timer::after(COMMAND_SPACING).await;
            }
            defmt::info!("link: module configured, advertising as {}", DEVICE_NAME);
        }
        Err(error) => link::log_command_error(error),
    }

    let to_module = async move {
        loop {
            let frame = outbound.receive().await;
            if !frame.is_empty() {
                write_frame(&mut uart_tx, &frame).await;
            }
        }
    };

    let from_module = async move {
        let mut frame = InboundFrame::new();
        loop {
            read_frame(&mut uart_rx, &mut frame).await;
            match LinkEvent::parse(&frame) {
                LinkEvent::Reply(reply) => {
                    defmt::debug!("link: module replied {=[u8]:a}", reply);
                }
                event => {
                    log_event(event);
                    event.dispatch(mailbox);
                }
            }
        }
    };

    join(to_module, from_module).await;
    loop {
        core::future::pending::<()>().await;
    }
}

async fn write_frame<W: Write>(uart_tx: &mut W, data: &[u8]) {
    let mut written = 0usize;
    while written < data.len() {
        match uart_tx.write(&data[written..]).await {
            Ok(count) => written += count,
            Err(_) => {
                defmt::warn!("link: UART write error");
                Timer::after(Duration::from_millis(5)).await;
                return;
            }
        }
    }

    if uart_tx.flush().await.is_err() {
        defmt::warn!("link: UART flush error");
    }
}

/// Collects bytes until the line has been quiet for [`FRAME_GAP`].
async fn read_frame<R: Read>(uart_rx: &mut R, frame: &mut InboundFrame) {
    frame.clear();
    let mut chunk = [0u8; INBOUND_FRAME_LEN];
    let mut overflowed = 0usize;

    loop {
        let read = if frame.is_empty() && overflowed == 0 {
            Ok(uart_rx.read(&mut chunk).await)
        } else {
            with_timeout(FRAME_GAP, uart_rx.read(&mut chunk)).await
        };

        match read {
            Ok(Ok(count)) => {
                // Keep the newest bytes; resync reads the tail of a long write.
                let excess = (frame.len() + count).saturating_sub(frame.capacity());
                if excess > 0 {
                    let kept = frame.len() - excess;
                    frame.copy_within(excess.., 0);
                    frame.truncate(kept);
                    overflowed += excess;
                }
                let _ = frame.extend_from_slice(&chunk[..count]);
            }
            Ok(Err(_)) => {
                defmt::warn!("link: UART read error");
                Timer::after(Duration::from_millis(5)).await;
            }
            Err(_) => break,
        }
    }

    if overflowed > 0 {
        defmt::warn!("link: long frame, oldest {} bytes dropped", overflowed);
    }
}

fn log_event(event: LinkEvent<'_>) {
    match event {
        LinkEvent::Connected => defmt::info!("link: central connected"),
        LinkEvent::Disconnected => defmt::info!("link: central disconnected"),
        LinkEvent::Write(payload) => {
            defmt::info!("link: resync write {=[u8]:x}", payload);
        }
        LinkEvent::Reply(_) => {}
    }
}
