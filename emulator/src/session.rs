use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use heapless::HistoryBuf;
use pedometer_core::clock;
use pedometer_core::{
    DeliveryOutcome, DeviceConfig, ElapsedMillis, LEDGER_CAPACITY, LinkEvent, LinkMailbox,
    LinkTransition, MonotonicClock, MotionCounter, NotificationChannel, OUTGOING_FRAME_LEN,
    OutgoingValue, Pedometer, StatusLed, TickReport,
};

/// Simulated time per motion sample.
const SAMPLE_MS: u32 = 1;

/// Notifications kept for `history`.
const HISTORY_LEN: usize = 16;

pub const HELP_TOPICS: &[(&str, &str)] = &[
    ("step", "step [n]             - count n steps, one per millisecond"),
    ("wait", "wait <ms>            - let time pass without motion"),
    ("tick", "tick [n]             - run n poll cycles without motion"),
    ("connect", "connect              - a central connects"),
    ("disconnect", "disconnect           - the central goes away"),
    ("resync", "resync <ms>          - peer reports ms elapsed into the current unit"),
    ("status", "status               - show counters and link state"),
    ("history", "history              - show recent notifications"),
    ("help", "help [topic]         - show help for a command"),
];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Profile {
    Standard,
    Rapid,
}

impl Profile {
    pub fn config(self) -> DeviceConfig {
        match self {
            Profile::Standard => DeviceConfig::standard(),
            Profile::Rapid => DeviceConfig::rapid(),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Profile::Standard => "standard",
            Profile::Rapid => "rapid",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("standard") {
            Ok(Self::Standard)
        } else if tag.eq_ignore_ascii_case("rapid") {
            Ok(Self::Rapid)
        } else {
            Err(format!("Unknown profile `{tag}`"))
        }
    }
}

#[derive(Default)]
struct SimClock {
    now: ElapsedMillis,
}

impl SimClock {
    fn advance(&mut self, millis: u32) {
        self.now = self.now.wrapping_add(millis);
    }
}

impl MonotonicClock for SimClock {
    fn now_millis(&self) -> ElapsedMillis {
        self.now
    }
}

#[derive(Default)]
struct SimEncoder {
    position: i32,
}

impl MotionCounter for SimEncoder {
    fn position(&mut self) -> i32 {
        self.position
    }
}

/// Keeps the raw frames a real module would have notified.
#[derive(Default)]
struct RecordingChannel {
    frames: HistoryBuf<[u8; OUTGOING_FRAME_LEN], HISTORY_LEN>,
    sent: u64,
    advertised: u32,
}

impl NotificationChannel for RecordingChannel {
    fn notify(&mut self, value: OutgoingValue) {
        self.frames.write(value.to_wire_bytes());
        self.sent += 1;
    }

    fn start_advertising(&mut self) {
        self.advertised += 1;
    }
}

#[derive(Default)]
struct SimLed {
    on: bool,
}

impl StatusLed for SimLed {
    fn set(&mut self, on: bool) {
        self.on = on;
    }

    fn toggle(&mut self) {
        self.on = !self.on;
    }
}

type SimPedometer = Pedometer<SimEncoder, RecordingChannel, SimLed, LEDGER_CAPACITY>;

pub struct Session {
    device: SimPedometer,
    mailbox: LinkMailbox,
    clock: SimClock,
    suspended: bool,
    transcript: Option<TranscriptLogger>,
}

impl Session {
    pub fn new(profile: Profile, transcript: Option<&Path>) -> io::Result<Self> {
        let clock = SimClock::default();
        let device = Pedometer::new(
            profile.config(),
            clock.now_millis(),
            SimEncoder::default(),
            RecordingChannel::default(),
            SimLed::default(),
        )
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;

        let transcript = match transcript {
            Some(path) => Some(TranscriptLogger::new(path, profile)?),
            None => None,
        };

        Ok(Self {
            device,
            mailbox: LinkMailbox::new(),
            clock,
            suspended: false,
            transcript,
        })
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        self.record(TranscriptRole::Host, &[trimmed.to_string()])?;

        let mut words = trimmed.split_whitespace();
        let command = words.next().unwrap_or_default().to_ascii_lowercase();
        let argument = words.next();

        let lines = match (command.as_str(), argument) {
            ("help", topic) => handle_help(topic),
            ("step", count) => match parse_count(count, 1) {
                Ok(count) => self.step(count),
                Err(message) => vec![message],
            },
            ("wait", Some(millis)) => match millis.parse::<u32>() {
                Ok(millis) => self.wait(millis),
                Err(_) => vec![format!("ERR wait expects milliseconds, got `{millis}`")],
            },
            ("tick", count) => match parse_count(count, 1) {
                Ok(count) => {
                    let poll_ms = self.device.config().poll_divisor * SAMPLE_MS;
                    self.wait(count.saturating_mul(poll_ms))
                }
                Err(message) => vec![message],
            },
            ("connect", None) => self.module_frame(b"OK+CONN001122334455"),
            ("disconnect", None) => self.module_frame(b"OK+LOST"),
            ("resync", Some(millis)) => match millis.parse::<u32>() {
                Ok(offset) => self.resync(offset),
                Err(_) => vec![format!("ERR resync expects milliseconds, got `{millis}`")],
            },
            ("status", None) => self.status(),
            ("history", None) => self.history(),
            _ => vec![format!("ERR unknown command `{trimmed}`; try `help`")],
        };

        self.record(TranscriptRole::Emulator, &lines)?;
        Ok(lines)
    }

    fn step(&mut self, count: u32) -> Vec<String> {
        let mut lines = Vec::new();
        for _ in 0..count {
            self.device.motion_mut().position += 1;
            if self.suspended {
                self.suspended = false;
                self.device.resume();
                lines.push(format!("t={}ms wake on motion", self.clock.now));
            }
            self.sample(&mut lines);
        }
        lines.push(format!(
            "OK {} steps in open unit",
            self.device.accumulator().steps()
        ));
        lines
    }

    fn wait(&mut self, millis: u32) -> Vec<String> {
        let mut lines = Vec::new();
        if self.suspended {
            self.clock.advance(millis);
            lines.push(format!("OK asleep until t={}ms", self.clock.now));
            return lines;
        }

        let mut remaining = millis;
        while remaining >= SAMPLE_MS && !self.suspended {
            self.sample(&mut lines);
            remaining -= SAMPLE_MS;
        }
        self.clock.advance(remaining);
        lines.push(format!("OK t={}ms", self.clock.now));
        lines
    }

    fn sample(&mut self, lines: &mut Vec<String>) {
        self.clock.advance(SAMPLE_MS);
        let report = self.device.tick(self.clock.now_millis(), &self.mailbox);
        if report.polled {
            self.describe(&report, lines);
        }
        if report.suspend {
            self.suspended = true;
        }
    }

    fn module_frame(&mut self, frame: &[u8]) -> Vec<String> {
        LinkEvent::parse(frame).dispatch(&self.mailbox);
        vec![format!("OK module reported {}", String::from_utf8_lossy(frame))]
    }

    fn resync(&mut self, offset: u32) -> Vec<String> {
        let bytes = offset.to_be_bytes();
        let first = bytes.iter().position(|&byte| byte != 0).unwrap_or(bytes.len());
        let payload = &bytes[first..];
        match LinkEvent::parse(payload) {
            event @ LinkEvent::Write(_) => {
                event.dispatch(&self.mailbox);
                vec![format!(
                    "OK resync write {payload:02x?} queued for next poll"
                )]
            }
            _ => vec![format!(
                "ERR resync write {payload:02x?} reads as a module line; ignored"
            )],
        }
    }

    fn status(&self) -> Vec<String> {
        let device = &self.device;
        let ledger = device.ledger();
        let delivery = device.delivery();
        let accumulator = device.accumulator();
        vec![
            format!(
                "t={}ms unit={} steps={} boundary in {}ms",
                self.clock.now,
                ledger.current_unit(),
                accumulator.steps(),
                clock::millis_until(self.clock.now, accumulator.deadline())
            ),
            format!(
                "sent_unit={} pending={} lost={} notified={} advertised={}",
                delivery.sent_unit(),
                delivery.pending(ledger),
                delivery.lost_units(),
                device.channel().sent,
                device.channel().advertised
            ),
            format!(
                "link={:?} led={} suspended={} idle_polls={}",
                device.link().state(),
                if device.led().on { "on" } else { "off" },
                self.suspended,
                device.idle_polls()
            ),
        ]
    }

    fn history(&self) -> Vec<String> {
        let frames = &self.device.channel().frames;
        if frames.is_empty() {
            return vec!["no notifications yet".to_string()];
        }
        frames
            .oldest_ordered()
            .map(|frame| {
                let wire = i32::from_le_bytes(*frame);
                match OutgoingValue::from_wire_bytes(frame) {
                    Some(value) => format!("  {wire:>7}  {}", describe_value(value)),
                    None => format!("  {wire:>7}  (undecodable)"),
                }
            })
            .collect()
    }

    fn describe(&self, report: &TickReport, lines: &mut Vec<String>) {
        let now = self.clock.now;
        if let Some(offset) = report.resynced {
            lines.push(format!(
                "t={now}ms resync offset={offset}ms next boundary={}ms",
                self.device.accumulator().deadline()
            ));
        }
        if let Some(closed) = report.closed {
            let mut line = format!(
                "t={now}ms unit {} closed steps={} late={}ms",
                closed.unit, closed.steps, closed.lateness_ms
            );
            if closed.units_advanced > 1 {
                line.push_str(&format!(" (+{} idle units)", closed.units_advanced - 1));
            }
            lines.push(line);
        }
        match report.transition {
            LinkTransition::Connected => lines.push(format!("t={now}ms link up, settling")),
            LinkTransition::Disconnected => {
                lines.push(format!("t={now}ms link down, advertising"));
            }
            LinkTransition::Unchanged => {}
        }
        match report.delivery {
            DeliveryOutcome::Completed { unit, value, lost } => {
                if lost > 0 {
                    lines.push(format!("t={now}ms WARN backlog overflow, {lost} units lost"));
                }
                lines.push(format!(
                    "t={now}ms notify unit {unit} {} wire={}",
                    describe_value(value),
                    value.to_wire()
                ));
            }
            DeliveryOutcome::Live(value) => lines.push(format!(
                "t={now}ms notify {} wire={}",
                describe_value(value),
                value.to_wire()
            )),
            DeliveryOutcome::Idle => {}
        }
        if report.suspend {
            lines.push(format!("t={now}ms suspend, no motion while disconnected"));
        }
    }

    fn record(&mut self, role: TranscriptRole, lines: &[String]) -> io::Result<()> {
        let now = self.clock.now;
        if let Some(transcript) = self.transcript.as_mut() {
            for line in lines {
                transcript.append_line(now, role, line)?;
            }
        }
        Ok(())
    }
}

fn handle_help(topic: Option<&str>) -> Vec<String> {
    let mut lines = Vec::new();
    match topic {
        Some(target) => {
            if let Some((_, detail)) = HELP_TOPICS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(target))
            {
                lines.push((*detail).to_string());
            } else {
                lines.push(format!("No help available for `{target}`."));
                lines.push(format!("Available topics: {}", help_topic_list()));
            }
        }
        None => {
            lines.push("Available commands:".to_string());
            for (_, detail) in HELP_TOPICS {
                lines.push(format!("  {detail}"));
            }
            lines.push("Type `help <topic>` for a specific command.".to_string());
        }
    }
    lines
}

fn help_topic_list() -> String {
    HELP_TOPICS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_count(argument: Option<&str>, default: u32) -> Result<u32, String> {
    match argument {
        None => Ok(default),
        Some(text) => text
            .parse()
            .map_err(|_| format!("ERR expected a count, got `{text}`")),
    }
}

fn describe_value(value: OutgoingValue) -> String {
    match value {
        OutgoingValue::Live(steps) => format!("live steps={steps}"),
        OutgoingValue::Completed(steps) => format!("completed steps={steps}"),
    }
}

#[derive(Clone, Copy)]
enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

struct TranscriptLogger {
    writer: BufWriter<File>,
}

impl TranscriptLogger {
    fn new(path: &Path, profile: Profile) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };
        writeln!(
            logger.writer,
            "# Pedometer emulator transcript ({} profile)",
            profile.label()
        )?;
        writeln!(logger.writer, "# Timestamps are simulated device milliseconds")?;
        writeln!(logger.writer)?;
        logger.writer.flush()?;
        Ok(logger)
    }

    fn append_line(&mut self, now: ElapsedMillis, role: TranscriptRole, line: &str) -> io::Result<()> {
        writeln!(self.writer, "[{now:>10} ms] {} {line}", role.prefix())?;
        self.writer.flush()
    }
}
