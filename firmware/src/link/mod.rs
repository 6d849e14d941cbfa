//! Outbound side of the UART-attached BLE module.
//!
//! The module runs in transparent mode: bytes written to the UART are
//! notified to the connected central, and `AT` commands are only accepted
//! while nobody is connected. The poll loop never touches the UART itself; it
//! queues frames here and the link task writes them out.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use core::fmt;

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender, TrySendError};
use heapless::Vec;
use pedometer_core::{NotificationChannel, OutgoingValue};

/// Largest frame queued for the module (fits `AT+NAME` with a 12 byte name).
pub const OUTBOUND_FRAME_LEN: usize = 20;

/// Frames buffered between the poll loop and the link task.
pub const OUTBOUND_QUEUE_DEPTH: usize = 8;

/// Longest advertised name the module accepts.
pub const MAX_NAME_LEN: usize = 12;

/// Name advertised after boot.
pub const DEVICE_NAME: &str = "Pedometer";

#[cfg(target_os = "none")]
type LinkMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type LinkMutex = NoopRawMutex;

/// Raw bytes for one UART write.
pub type OutboundFrame = Vec<u8, OUTBOUND_FRAME_LEN>;

/// Queue feeding the link task.
pub type OutboundQueue = Channel<LinkMutex, OutboundFrame, OUTBOUND_QUEUE_DEPTH>;

pub type OutboundSender<'a> = Sender<'a, LinkMutex, OutboundFrame, OUTBOUND_QUEUE_DEPTH>;

pub type OutboundReceiver<'a> = Receiver<'a, LinkMutex, OutboundFrame, OUTBOUND_QUEUE_DEPTH>;

/// Errors raised while building a module command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CommandError {
    /// Command does not fit in an [`OutboundFrame`].
    TooLong { len: usize },
    /// Advertised name longer than [`MAX_NAME_LEN`].
    NameTooLong { len: usize },
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::TooLong { len } => {
                write!(f, "command of {len} bytes exceeds {OUTBOUND_FRAME_LEN}")
            }
            CommandError::NameTooLong { len } => {
                write!(f, "name of {len} bytes exceeds {MAX_NAME_LEN}")
            }
        }
    }
}

/// Builds `AT+<body>`.
///
/// # Errors
///
/// Returns [`CommandError::TooLong`] if the command exceeds [`OUTBOUND_FRAME_LEN`].
pub fn at_command(body: &[u8]) -> Result<OutboundFrame, CommandError> {
    let mut frame = OutboundFrame::new();
    let len = 3 + body.len();
    frame
        .extend_from_slice(b"AT+")
        .and_then(|()| frame.extend_from_slice(body))
        .map_err(|_| CommandError::TooLong { len })?;
    Ok(frame)
}

/// Commands sent once after power-up, in order: enable connect/lost
/// notifications, wait for `AT+START` before advertising, set the name, start.
///
/// # Errors
///
/// Returns [`CommandError::NameTooLong`] for names over [`MAX_NAME_LEN`].
pub fn boot_commands(name: &str) -> Result<[OutboundFrame; 4], CommandError> {
    if name.len() > MAX_NAME_LEN {
        return Err(CommandError::NameTooLong { len: name.len() });
    }

    let mut rename: Vec<u8, OUTBOUND_FRAME_LEN> = Vec::new();
    rename
        .extend_from_slice(b"NAME")
        .and_then(|()| rename.extend_from_slice(name.as_bytes()))
        .map_err(|_| CommandError::TooLong {
            len: 7 + name.len(),
        })?;

    Ok([
        at_command(b"NOTI1")?,
        at_command(b"IMME1")?,
        at_command(&rename)?,
        at_command(b"START")?,
    ])
}

/// [`NotificationChannel`] that queues frames for the link task.
///
/// A full queue drops the frame; the transport is fire-and-forget anyway.
pub struct UartNotificationChannel<'a> {
    sender: OutboundSender<'a>,
    dropped: u32,
}

impl<'a> UartNotificationChannel<'a> {
    #[must_use]
    pub const fn new(sender: OutboundSender<'a>) -> Self {
        Self { sender, dropped: 0 }
    }

    /// Frames dropped because the queue was full.
    #[must_use]
    pub const fn dropped(&self) -> u32 {
        self.dropped
    }

    fn enqueue(&mut self, frame: OutboundFrame, kind: &'static str) {
        if let Err(TrySendError::Full(_)) = self.sender.try_send(frame) {
            self.dropped = self.dropped.saturating_add(1);
            log_dropped(kind, self.dropped);
        }
    }
}

impl NotificationChannel for UartNotificationChannel<'_> {
    fn notify(&mut self, value: OutgoingValue) {
        let mut frame = OutboundFrame::new();
        // Four bytes always fit.
        let _ = frame.extend_from_slice(&value.to_wire_bytes());
        self.enqueue(frame, "notify");
    }

    fn start_advertising(&mut self) {
        match at_command(b"START") {
            Ok(frame) => self.enqueue(frame, "advertise"),
            Err(error) => log_command_error(error),
        }
    }
}

#[cfg(target_os = "none")]
fn log_dropped(kind: &'static str, total: u32) {
    defmt::warn!("link: outbound queue full, dropped {} (total={})", kind, total);
}

#[cfg(not(target_os = "none"))]
fn log_dropped(kind: &'static str, total: u32) {
    println!("link: outbound queue full, dropped {kind} (total={total})");
}

#[cfg(target_os = "none")]
pub fn log_command_error(error: CommandError) {
    defmt::error!("link: {}", defmt::Display2Format(&error));
}

#[cfg(not(target_os = "none"))]
pub fn log_command_error(error: CommandError) {
    println!("link: {error}");
}
