//! Link state sampling and radio-module frame classification.
//!
//! The transport reports connects and disconnects asynchronously; the poll
//! loop samples the latest state once per cycle and reacts to edges here. The
//! settle window that follows a connect is a deadline rather than a blocking
//! pause, so motion sampling keeps running while the peer finishes setup.

use core::mem;

use winnow::combinator::alt;
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::token::literal;

use crate::clock::{self, ElapsedMillis};

/// Connection state as seen by the poll loop.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

impl ConnectionState {
    #[must_use]
    pub const fn from_connected(connected: bool) -> Self {
        if connected {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Edge detected between two consecutive polls.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkTransition {
    Unchanged,
    /// Disconnected → Connected; the settle window has opened.
    Connected,
    /// Connected → Disconnected; advertising must be restarted.
    Disconnected,
}

/// Edge detector plus settle window for the wireless link.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LinkMonitor {
    previous: ConnectionState,
    settle_delay_ms: u32,
    settle_deadline: Option<ElapsedMillis>,
}

impl LinkMonitor {
    #[must_use]
    pub const fn new(settle_delay_ms: u32) -> Self {
        Self {
            previous: ConnectionState::Disconnected,
            settle_delay_ms,
            settle_deadline: None,
        }
    }

    /// State recorded at the last sample.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.previous
    }

    /// Compares `connected` against the previous poll and records it.
    pub fn sample(&mut self, connected: bool, now: ElapsedMillis) -> LinkTransition {
        let current = ConnectionState::from_connected(connected);
        let previous = mem::replace(&mut self.previous, current);

        match (previous, current) {
            (ConnectionState::Disconnected, ConnectionState::Connected) => {
                self.settle_deadline = Some(now.wrapping_add(self.settle_delay_ms));
                LinkTransition::Connected
            }
            (ConnectionState::Connected, ConnectionState::Disconnected) => {
                self.settle_deadline = None;
                LinkTransition::Disconnected
            }
            _ => LinkTransition::Unchanged,
        }
    }

    /// Returns `true` while a fresh connection is still inside its settle window.
    pub fn is_settling(&mut self, now: ElapsedMillis) -> bool {
        match self.settle_deadline {
            Some(deadline) if clock::deadline_reached(now, deadline) => {
                self.settle_deadline = None;
                false
            }
            Some(_) => true,
            None => false,
        }
    }
}

/// Classified frame received from the radio module.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LinkEvent<'a> {
    /// Module status line announcing a central connected.
    Connected,
    /// Module status line announcing the central went away.
    Disconnected,
    /// Acknowledgement for a command sent to the module (text after `OK+`).
    Reply(&'a [u8]),
    /// Characteristic write from the peer.
    Write(&'a [u8]),
}

/// Receiver for classified module frames.
///
/// The link task owns the transport and forwards each frame here; the
/// implementor decides how the poll loop learns about it.
pub trait LinkEventHandler {
    fn on_connect(&self);
    fn on_disconnect(&self);
    fn on_write(&self, payload: &[u8]);
}

impl<'a> LinkEvent<'a> {
    /// Forwards the event to the matching handler callback.
    pub fn dispatch<H: LinkEventHandler + ?Sized>(self, handler: &H) {
        match self {
            LinkEvent::Connected => handler.on_connect(),
            LinkEvent::Disconnected => handler.on_disconnect(),
            LinkEvent::Write(payload) => handler.on_write(payload),
            LinkEvent::Reply(_) => {}
        }
    }

    /// Classifies one frame from the module.
    ///
    /// Status lines may carry a trailing peer address, which is ignored.
    /// Other `OK+` lines are command replies. Anything else is treated as a
    /// write of any length, including an empty frame.
    ///
    /// In transparent mode the module shares one byte stream between its own
    /// status lines and peer writes, so a write whose payload starts with the
    /// bytes `OK+` (`0x4F 0x4B 0x2B`) is indistinguishable from a module line
    /// and is classified as one. Such an offset is lost; the peer's next
    /// resync corrects the boundary.
    #[must_use]
    pub fn parse(frame: &'a [u8]) -> Self {
        module_line()
            .parse(frame)
            .unwrap_or(LinkEvent::Write(frame))
    }
}

fn module_line<'a>() -> impl Parser<&'a [u8], LinkEvent<'a>, ContextError> {
    move |input: &mut &'a [u8]| {
        let status = alt((
            literal(b"OK+CONN").value(Some(ConnectionState::Connected)),
            literal(b"OK+LOST").value(Some(ConnectionState::Disconnected)),
            literal(b"OK+").value(None),
        ))
        .parse_next(input)?;

        let rest = mem::take(input);
        Ok(match status {
            Some(ConnectionState::Connected) => LinkEvent::Connected,
            Some(ConnectionState::Disconnected) => LinkEvent::Disconnected,
            None => LinkEvent::Reply(rest),
        })
    }
}
