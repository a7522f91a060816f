//! # Control task
//! The only task that touches device state. It waits for the settings and for time sync, then runs
//! the control loop: each turn waits for whichever of the input tick and the buzzer tick comes
//! first and runs its handler to completion. Persisting, telemetry and drawing are handed to the
//! other tasks without waiting for them.
use crate::task::resources::{ButtonResources, BuzzerResources};
use crate::task::rtc::RtcClock;
use crate::task::task_messages::{
    SHUTDOWN, queue_telemetry, request_flash_write, signal_display, wait_for_settings_loaded,
};
use defmt::{error, info, warn};
use embassy_futures::select::{Either, select};
use embassy_rp::gpio::{self, Input, Output, Pull};
use embassy_time::{Ticker, Timer};
use smart_snooze_alarmclock::alarm::AlarmConfig;
use smart_snooze_alarmclock::buzzer::BUZZER_TICK;
use smart_snooze_alarmclock::clock::{
    ClockReadinessGate, SYNC_ATTEMPTS, SYNC_POLL_INTERVAL, SyncError, WallClock,
};
use smart_snooze_alarmclock::controller::Controller;
use smart_snooze_alarmclock::input::{BUTTON_COUNT, BUTTON_TICK, Level};
use smart_snooze_alarmclock::render;
use smart_snooze_alarmclock::state::Effects;

/// Read all buttons, in `Button::ALL` order
fn read_levels(buttons: &[Input<'static>; BUTTON_COUNT]) -> [Level; BUTTON_COUNT] {
    buttons
        .each_ref()
        .map(|button| if button.is_high() { Level::High } else { Level::Low })
}

/// The pin level for a logical level
const fn pin_level(level: Level) -> gpio::Level {
    match level {
        Level::Low => gpio::Level::Low,
        Level::High => gpio::Level::High,
    }
}

/// Hand the effects of a transition to the tasks that carry them out
fn apply(controller: &Controller, effects: Effects) {
    if effects.persist {
        request_flash_write(controller.machine().config());
    }
    if let Some(message) = effects.telemetry {
        if !queue_telemetry(message) {
            warn!("Telemetry queue full, dropping {}", message);
        }
    }
}

/// Run the control loop until a stop is requested
async fn run(
    config: AlarmConfig,
    readiness: ClockReadinessGate,
    buttons: &[Input<'static>; BUTTON_COUNT],
    buzzer: &mut Output<'static>,
) {
    let mut clock = RtcClock;
    let now = match clock.now() {
        Ok(now) => now,
        Err(e) => {
            error!("Cannot read the wall clock: {}", e);
            SHUTDOWN.cancel();
            return;
        }
    };
    let mut controller = Controller::new(config, readiness, read_levels(buttons), now);
    let mut shown = controller.screen(now);
    signal_display(shown.clone());

    let mut button_ticker = Ticker::every(BUTTON_TICK);
    let mut buzzer_ticker = Ticker::every(BUZZER_TICK);
    info!("Control loop running");
    while !SHUTDOWN.is_cancelled() {
        let tick = select(button_ticker.next(), buzzer_ticker.next()).await;
        let now = match clock.now() {
            Ok(now) => now,
            Err(e) => {
                error!("Cannot read the wall clock: {}", e);
                SHUTDOWN.cancel();
                break;
            }
        };

        match tick {
            Either::First(()) => {
                let effects = controller.on_button_tick(read_levels(buttons), now);
                if effects.buzzer_off {
                    buzzer.set_level(pin_level(controller.buzzer_level()));
                }
                apply(&controller, effects);
            }
            Either::Second(()) => buzzer.set_level(pin_level(controller.on_buzzer_tick(now))),
        }

        let screen = controller.screen(now);
        if screen != shown {
            signal_display(screen.clone());
            shown = screen;
        }
    }
}

#[embassy_executor::task]
pub async fn control(b: ButtonResources, z: BuzzerResources) {
    info!("Control task started");
    let buttons = [
        Input::new(b.a_pin, Pull::Up),
        Input::new(b.b_pin, Pull::Up),
        Input::new(b.c_pin, Pull::Up),
        Input::new(b.set_pin, Pull::Up),
    ];
    let mut buzzer = Output::new(z.buzzer_pin, gpio::Level::Low);

    signal_display(render::starting());
    let config = wait_for_settings_loaded().await;

    signal_display(render::setting_timezone());
    let mut readiness = ClockReadinessGate::new();
    match readiness
        .await_sync(&mut RtcClock, Timer::after, SYNC_ATTEMPTS, SYNC_POLL_INTERVAL)
        .await
    {
        Ok(()) => {}
        Err(SyncError::TimedOut) => warn!("Starting without synced time"),
        Err(SyncError::Clock(e)) => {
            error!("Cannot read the wall clock: {}", e);
            SHUTDOWN.cancel();
        }
    }

    if !SHUTDOWN.is_cancelled() {
        run(config, readiness, &buttons, &mut buzzer).await;
    }

    buzzer.set_low();
    signal_display(render::stopped());
    info!("Control loop stopped");
}
