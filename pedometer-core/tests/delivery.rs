use pedometer_core::{
    COMPLETED_ZERO_SENTINEL, DeliveryOutcome, DeviceConfig, LinkEvent, LinkMailbox, MotionCounter,
    NotificationChannel, OutgoingValue, Pedometer, StatusLed,
};

const UNIT_MS: u32 = 1_000;
const SETTLE_MS: u32 = 200;
const CAPACITY: usize = 4;

#[derive(Default)]
struct Encoder {
    position: i32,
}

impl MotionCounter for Encoder {
    fn position(&mut self) -> i32 {
        self.position
    }
}

#[derive(Default)]
struct Radio {
    frames: Vec<[u8; 4]>,
}

impl Radio {
    fn values(&self) -> Vec<OutgoingValue> {
        self.frames
            .iter()
            .map(|frame| OutgoingValue::from_wire_bytes(frame).expect("valid frame"))
            .collect()
    }
}

impl NotificationChannel for Radio {
    fn notify(&mut self, value: OutgoingValue) {
        self.frames.push(value.to_wire_bytes());
    }

    fn start_advertising(&mut self) {}
}

struct NoLed;

impl StatusLed for NoLed {
    fn set(&mut self, _on: bool) {}
    fn toggle(&mut self) {}
}

type Device = Pedometer<Encoder, Radio, NoLed, CAPACITY>;

fn device() -> Device {
    let config = DeviceConfig {
        unit_duration_ms: UNIT_MS,
        poll_divisor: 1,
        led_divisor: 1,
        sleep_after_polls: u32::MAX,
        settle_delay_ms: SETTLE_MS,
    };
    Pedometer::new(config, 0, Encoder::default(), Radio::default(), NoLed).expect("valid config")
}

fn step(device: &mut Device, now: u32, mailbox: &LinkMailbox) {
    device.motion_mut().position += 1;
    device.tick(now, mailbox);
}

#[test]
fn one_notification_per_poll_while_draining() {
    let mut device = device();
    let mailbox = LinkMailbox::new();

    let mut now = 0;
    for steps in [3, 0, 5] {
        for _ in 0..steps {
            now += 1;
            step(&mut device, now, &mailbox);
        }
        now = (now / UNIT_MS + 1) * UNIT_MS;
        device.tick(now, &mailbox);
    }
    assert_eq!(device.ledger().current_unit(), 3);

    LinkEvent::parse(b"OK+CONN").dispatch(&mailbox);
    now += 1;
    device.tick(now, &mailbox);
    now += SETTLE_MS;

    for _ in 0..3 {
        now += 1;
        let before = device.channel().frames.len();
        device.tick(now, &mailbox);
        assert_eq!(device.channel().frames.len(), before + 1);
    }
    now += 1;
    device.tick(now, &mailbox);

    assert_eq!(
        device.channel().values(),
        [
            OutgoingValue::Completed(3),
            OutgoingValue::Completed(0),
            OutgoingValue::Completed(5),
            OutgoingValue::Live(0),
        ]
    );
    assert_eq!(
        i32::from_le_bytes(device.channel().frames[1]),
        COMPLETED_ZERO_SENTINEL
    );
    assert_eq!(device.delivery().sent_unit(), device.ledger().current_unit());
}

#[test]
fn nothing_is_sent_inside_the_settle_window() {
    let mut device = device();
    let mailbox = LinkMailbox::new();
    device.tick(UNIT_MS, &mailbox);

    mailbox.set_connected(true);
    let connected_at = UNIT_MS + 10;
    for now in connected_at..connected_at + SETTLE_MS {
        step(&mut device, now, &mailbox);
    }
    assert!(device.channel().frames.is_empty());
    assert_eq!(device.delivery().sent_unit(), 0);

    let report = device.tick(connected_at + SETTLE_MS, &mailbox);
    assert_eq!(
        report.delivery,
        DeliveryOutcome::Completed {
            unit: 0,
            value: OutgoingValue::Completed(0),
            lost: 0,
        }
    );
}

#[test]
fn long_disconnect_keeps_only_the_newest_buckets() {
    let mut device = device();
    let mailbox = LinkMailbox::new();

    for unit in 1..=10u32 {
        for _ in 0..unit {
            step(&mut device, unit * UNIT_MS - 500, &mailbox);
        }
        device.tick(unit * UNIT_MS, &mailbox);
        let pending = device.ledger().current_unit() - device.delivery().sent_unit();
        assert!(pending <= 10);
    }

    mailbox.set_connected(true);
    let mut now = 10 * UNIT_MS + 1;
    device.tick(now, &mailbox);
    now += SETTLE_MS;
    let first = device.tick(now, &mailbox);
    assert_eq!(
        first.delivery,
        DeliveryOutcome::Completed {
            unit: 6,
            value: OutgoingValue::Completed(7),
            lost: 6,
        }
    );

    for _ in 0..3 {
        now += 1;
        device.tick(now, &mailbox);
    }
    assert_eq!(
        device.channel().values(),
        [
            OutgoingValue::Completed(7),
            OutgoingValue::Completed(8),
            OutgoingValue::Completed(9),
            OutgoingValue::Completed(10),
        ]
    );
    assert_eq!(device.delivery().lost_units(), 6);
    let sent = device.delivery().sent_unit();
    let unit = device.ledger().current_unit();
    assert!(sent <= unit && unit <= sent + u32::try_from(CAPACITY).expect("small capacity"));
}

#[test]
fn reconnect_resends_live_count() {
    let mut device = device();
    let mailbox = LinkMailbox::new();
    step(&mut device, 1, &mailbox);

    mailbox.set_connected(true);
    device.tick(2, &mailbox);
    device.tick(2 + SETTLE_MS, &mailbox);
    assert_eq!(device.channel().values(), [OutgoingValue::Live(1)]);

    mailbox.set_connected(false);
    device.tick(300, &mailbox);
    mailbox.set_connected(true);
    device.tick(301, &mailbox);
    device.tick(301 + SETTLE_MS, &mailbox);

    assert_eq!(
        device.channel().values(),
        [OutgoingValue::Live(1), OutgoingValue::Live(1)]
    );
}
