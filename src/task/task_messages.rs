//! # Task messages of the firmware
//! The control task owns all device state. Everything else learns about it through the signals and
//! channels here: the display gets the latest screen, the flash task gets settings records to write
//! and the network task gets telemetry to send. Settings flow the other way exactly once, at
//! startup.
//!
//! Signals only keep the latest value, which is what the display and the flash writer want. The
//! telemetry channel is sent to with `try_send` from the control loop, which must never wait on a
//! peripheral task.
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use smart_snooze_alarmclock::alarm::AlarmConfig;
use smart_snooze_alarmclock::render::Screen;
use smart_snooze_alarmclock::settings::{SettingsRecord, SettingsWriteback};
use smart_snooze_alarmclock::shutdown::CancellationToken;
use smart_snooze_alarmclock::telemetry::Telemetry;

/// Stop request for the control loop, raised on fatal errors in any task
pub static SHUTDOWN: CancellationToken = CancellationToken::new();

/// Signal for the screen the display should show
static DISPLAY_SIGNAL: Signal<CriticalSectionRawMutex, Screen> = Signal::new();

/// Signal for the settings read from flash at startup
static SETTINGS_SIGNAL: Signal<CriticalSectionRawMutex, AlarmConfig> = Signal::new();

/// Settings records that must be written to flash, newest wins
static FLASH_WRITEBACK: SettingsWriteback = SettingsWriteback::new();

/// The capacity of the telemetry channel
const TELEMETRY_CHANNEL_CAPACITY: usize = 4;

/// Channel for telemetry messages waiting for the network task
static TELEMETRY_CHANNEL: Channel<CriticalSectionRawMutex, Telemetry, TELEMETRY_CHANNEL_CAPACITY> =
    Channel::new();

/// Replaces the screen the display should show
pub fn signal_display(screen: Screen) {
    DISPLAY_SIGNAL.signal(screen);
}

/// Waits for the next screen to show
pub async fn wait_for_display() -> Screen {
    DISPLAY_SIGNAL.wait().await
}

/// Hands the settings loaded at startup to the control task
pub fn signal_settings_loaded(config: AlarmConfig) {
    SETTINGS_SIGNAL.signal(config);
}

/// Waits for the settings loaded at startup
pub async fn wait_for_settings_loaded() -> AlarmConfig {
    SETTINGS_SIGNAL.wait().await
}

/// Queues the settings for writing, replacing a record the flash task has not picked up yet
pub fn request_flash_write(config: &AlarmConfig) {
    FLASH_WRITEBACK.save(config);
}

/// Waits for the next settings record to write
pub async fn wait_for_flash_write() -> SettingsRecord {
    FLASH_WRITEBACK.next().await
}

/// Queues a telemetry message. Returns false if the queue is full.
pub fn queue_telemetry(message: Telemetry) -> bool {
    TELEMETRY_CHANNEL.try_send(message).is_ok()
}

/// Waits for the next telemetry message
pub async fn wait_for_telemetry() -> Telemetry {
    TELEMETRY_CHANNEL.receive().await
}

/// Takes a queued telemetry message without waiting
pub fn try_take_telemetry() -> Option<Telemetry> {
    TELEMETRY_CHANNEL.try_receive().ok()
}
