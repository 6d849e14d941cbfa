use embassy_time::{Duration, Ticker};
use pedometer_core::{DeliveryOutcome, LinkMailbox, LinkTransition, MonotonicClock, TickReport};

use super::BoardPedometer;
use crate::hw::{BoardWakeLine, EmbassyClock};

/// Motion sampling period; the poll cycle runs every `poll_divisor` samples.
const SAMPLE_PERIOD: Duration = Duration::from_millis(1);

#[embassy_executor::task]
pub async fn run(
    mut device: BoardPedometer,
    mailbox: &'static LinkMailbox,
    mut wake: BoardWakeLine,
) -> ! {
    let clock = EmbassyClock;
    let mut ticker = Ticker::every(SAMPLE_PERIOD);

    loop {
        ticker.next().await;

        let report = device.tick(clock.now_millis(), mailbox);
        if report.polled {
            log_poll(&report);
        }

        if report.suspend {
            defmt::info!("poll: no motion while disconnected, suspending");
            wake.wait().await;
            device.resume();
            ticker.reset();
            defmt::info!("poll: motion wake at {}ms", clock.now_millis());
        }
    }
}

fn log_poll(report: &TickReport) {
    if let Some(offset) = report.resynced {
        defmt::info!("poll: resync offset={}ms", offset);
    }

    if let Some(closed) = report.closed {
        defmt::info!(
            "poll: unit {} closed steps={} late={}ms",
            closed.unit,
            closed.steps,
            closed.lateness_ms
        );
        if closed.units_advanced > 1 {
            defmt::info!("poll: skipped {} idle units", closed.units_advanced - 1);
        }
    }

    match report.transition {
        LinkTransition::Connected => defmt::info!("poll: link up, settling"),
        LinkTransition::Disconnected => defmt::info!("poll: link down, advertising"),
        LinkTransition::Unchanged => {}
    }

    match report.delivery {
        DeliveryOutcome::Completed { unit, lost, .. } => {
            if lost > 0 {
                defmt::warn!("poll: backlog overflow, {} units lost", lost);
            }
            defmt::debug!("poll: sent unit {}", unit);
        }
        DeliveryOutcome::Live(value) => defmt::trace!("poll: sent {}", value),
        DeliveryOutcome::Idle => {}
    }
}
