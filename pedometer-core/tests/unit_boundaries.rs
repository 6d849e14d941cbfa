use pedometer_core::{BucketLedger, UnitAccumulator};

const UNIT_MS: u32 = 1_000;

#[test]
fn missed_boundaries_close_once_and_skip_ahead() {
    let mut acc = UnitAccumulator::new(UNIT_MS, 0);
    let mut ledger = BucketLedger::<16>::new();
    for _ in 0..7 {
        acc.on_motion_delta(1);
    }

    // Deadline was 1000; nothing polled until 3500 ms later.
    let now = 4_500;
    let closed = acc.on_poll(now, &mut ledger).expect("overdue unit closes");

    assert_eq!(closed.unit, 0);
    assert_eq!(closed.steps, 7);
    assert_eq!(closed.lateness_ms, 3_500);
    assert_eq!(closed.units_advanced, 4);
    assert_eq!(ledger.current_unit(), 4);
    assert_eq!(acc.deadline(), now + 500);

    assert_eq!(ledger.get(0), Some(7));
    for skipped in 1..4 {
        assert_eq!(ledger.get(skipped), Some(0));
    }
    assert_eq!(ledger.get(4), None);
}

#[test]
fn unit_index_only_grows() {
    let mut acc = UnitAccumulator::new(UNIT_MS, 0);
    let mut ledger = BucketLedger::<4>::new();
    let mut previous = ledger.current_unit();

    for now in (0..20_000u32).step_by(170) {
        acc.on_poll(now, &mut ledger);
        assert!(ledger.current_unit() >= previous);
        previous = ledger.current_unit();
    }
    assert_eq!(previous, 19);
}

#[test]
fn repeated_resync_with_same_offset_is_idempotent() {
    let mut acc = UnitAccumulator::new(UNIT_MS, 0);
    let mut ledger = BucketLedger::<4>::new();
    acc.on_motion_delta(1);

    acc.on_resync(300, 600);
    let once = acc.clone();
    acc.on_resync(300, 600);

    assert_eq!(acc, once);
    assert_eq!(acc.deadline(), 700);
    assert_eq!(acc.steps(), 1);
    assert_eq!(ledger.current_unit(), 0);
    assert!(acc.on_poll(699, &mut ledger).is_none());
}

#[test]
fn zero_resync_right_after_a_close_keeps_the_deadline() {
    let mut acc = UnitAccumulator::new(UNIT_MS, 0);
    let mut ledger = BucketLedger::<4>::new();

    let now = UNIT_MS;
    acc.on_poll(now, &mut ledger).expect("unit closes on time");
    let deadline = acc.deadline();

    acc.on_resync(now, 0);
    assert_eq!(acc.deadline(), deadline);
    assert_eq!(ledger.current_unit(), 1);
}

#[test]
fn boundaries_hold_across_clock_wrap() {
    let start = u32::MAX - 2_499;
    let mut acc = UnitAccumulator::new(UNIT_MS, start);
    let mut ledger = BucketLedger::<8>::new();

    let mut now = start;
    for _ in 0..5 {
        now = now.wrapping_add(UNIT_MS);
        assert!(acc.on_poll(now, &mut ledger).is_some());
    }

    assert_eq!(ledger.current_unit(), 5);
    assert_eq!(acc.deadline(), now.wrapping_add(UNIT_MS));
}
