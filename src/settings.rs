//! # Settings record
//! The alarm settings are persisted as one fixed layout record of nine bytes:
//!
//! | offset | size | field |
//! |---|---|---|
//! | 0 | 3 | timezone, ASCII sign and two digits |
//! | 3 | 1 | hour in bits 0-6, alarm active flag in bit 7 |
//! | 4 | 1 | minute |
//! | 5 | 4 | lead seconds, native byte order |
use crate::alarm::{AlarmConfig, MAX_LEAD_SECONDS, Timezone};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

/// Size of the settings record in bytes
pub const SETTINGS_RECORD_LEN: usize = 9;

/// The raw settings record
pub type SettingsRecord = [u8; SETTINGS_RECORD_LEN];

/// Bit of the hour byte carrying the active flag
const ACTIVE_FLAG: u8 = 0b1000_0000;

/// Encode the settings into the persisted record
pub fn encode(config: &AlarmConfig) -> SettingsRecord {
    let mut record = [0; SETTINGS_RECORD_LEN];
    record[0..3].copy_from_slice(&config.timezone.to_bytes());
    record[3] = (config.hour & !ACTIVE_FLAG) | if config.active { ACTIVE_FLAG } else { 0 };
    record[4] = config.minute;
    record[5..9].copy_from_slice(&config.lead_seconds.to_ne_bytes());
    record
}

/// Decode a persisted record.
///
/// Never fails: a malformed timezone becomes `+00`, an hour or minute out of range becomes 0 and
/// the lead is capped, each with a warning. Settings silently reverting to a default is the
/// accepted degradation for a damaged record.
pub fn decode(record: &SettingsRecord) -> AlarmConfig {
    let timezone = Timezone::parse_or_default(&record[0..3]);

    let active = record[3] & ACTIVE_FLAG != 0;
    let mut hour = record[3] & !ACTIVE_FLAG;
    if hour > 23 {
        warn!("Stored alarm hour {} out of range, using 0", hour);
        hour = 0;
    }

    let mut minute = record[4];
    if minute > 59 {
        warn!("Stored alarm minute {} out of range, using 0", minute);
        minute = 0;
    }

    let mut lead = [0; 4];
    lead.copy_from_slice(&record[5..9]);
    let mut lead_seconds = u32::from_ne_bytes(lead);
    if lead_seconds > MAX_LEAD_SECONDS {
        warn!("Stored lead {} s above the cap, using {} s", lead_seconds, MAX_LEAD_SECONDS);
        lead_seconds = MAX_LEAD_SECONDS;
    }

    AlarmConfig {
        hour,
        minute,
        timezone,
        lead_seconds,
        active,
    }
}

/// Settings records on their way from the control loop to flash. Only the newest record is kept: a
/// save made while an earlier one is still waiting replaces it, so the last confirmed settings are
/// always the ones written.
pub struct SettingsWriteback {
    pending: Signal<CriticalSectionRawMutex, SettingsRecord>,
}

impl SettingsWriteback {
    pub const fn new() -> Self {
        Self {
            pending: Signal::new(),
        }
    }

    /// Queue the settings for writing, replacing any record not yet picked up
    pub fn save(&self, config: &AlarmConfig) {
        self.pending.signal(encode(config));
    }

    /// Wait for the next record to write
    pub async fn next(&self) -> SettingsRecord {
        self.pending.wait().await
    }

    /// Whether a record is waiting to be written
    pub fn is_pending(&self) -> bool {
        self.pending.signaled()
    }
}

impl Default for SettingsWriteback {
    fn default() -> Self {
        Self::new()
    }
}
