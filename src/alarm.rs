//! # Alarm configuration and scheduling
//! The alarm is a wall clock hour and minute in a fixed offset timezone. It fires `lead_seconds`
//! early, where the lead is learned from how long the user takes to silence the alarm, so that they
//! are actually up by the set time.
use crate::clock::Timestamp;
use core::fmt::Write;
use heapless::String;

/// Seconds in a day
pub const SECONDS_IN_DAY: i64 = 86_400;

/// Upper bound of the learned lead time
pub const MAX_LEAD_SECONDS: u32 = 3_600;

/// Sign of a timezone offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Sign {
    /// East of UTC
    Plus,
    /// West of UTC
    Minus,
}

/// A whole hour offset from UTC, stored as three ASCII characters such as `+05` or `-08`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct Timezone {
    /// Direction of the offset
    sign: Sign,
    /// Offset hours, 0..=23
    hours: u8,
}

impl Default for Timezone {
    fn default() -> Self {
        Self::UTC
    }
}

impl Timezone {
    /// `+00`
    pub const UTC: Self = Self {
        sign: Sign::Plus,
        hours: 0,
    };

    /// Length of the encoded form
    pub const ENCODED_LEN: usize = 3;

    /// Create a timezone, `None` if `hours` is not a valid hour
    pub const fn new(sign: Sign, hours: u8) -> Option<Self> {
        if hours < 24 {
            Some(Self { sign, hours })
        } else {
            None
        }
    }

    /// Parse the encoded form. Anything but a sign followed by two digits forming an hour is
    /// rejected.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let &[sign, tens, ones] = bytes else {
            return None;
        };
        let sign = match sign {
            b'+' => Sign::Plus,
            b'-' => Sign::Minus,
            _ => return None,
        };
        if !tens.is_ascii_digit() || !ones.is_ascii_digit() {
            return None;
        }
        Self::new(sign, (tens - b'0') * 10 + (ones - b'0'))
    }

    /// Parse the encoded form, falling back to `+00` when it is missing or malformed
    pub fn parse_or_default(bytes: &[u8]) -> Self {
        Self::parse(bytes).unwrap_or_else(|| {
            warn!("Malformed timezone in settings, using +00");
            Self::UTC
        })
    }

    /// The encoded form
    pub const fn to_bytes(self) -> [u8; Self::ENCODED_LEN] {
        let sign = match self.sign {
            Sign::Plus => b'+',
            Sign::Minus => b'-',
        };
        [sign, b'0' + self.hours / 10, b'0' + self.hours % 10]
    }

    /// The encoded form as a string
    pub fn label(self) -> String<3> {
        let mut s = String::new();
        for b in self.to_bytes() {
            // ASCII only and exactly three characters
            let _ = s.push(char::from(b));
        }
        s
    }

    /// Direction of the offset
    pub const fn sign(self) -> Sign {
        self.sign
    }

    /// Offset hours
    pub const fn hours(self) -> u8 {
        self.hours
    }

    /// Offset from UTC in seconds, positive east of UTC
    pub const fn offset_seconds(self) -> i64 {
        let secs = self.hours as i64 * 3_600;
        match self.sign {
            Sign::Plus => secs,
            Sign::Minus => -secs,
        }
    }

    /// Flip between `+` and `-`
    pub const fn flip_sign(&mut self) {
        self.sign = match self.sign {
            Sign::Plus => Sign::Minus,
            Sign::Minus => Sign::Plus,
        };
    }

    /// Next offset hour, wrapping from 23 to 0
    pub const fn increment_hour(&mut self) {
        self.hours = (self.hours + 1) % 24;
    }

    /// Previous offset hour, wrapping from 0 to 23
    pub const fn decrement_hour(&mut self) {
        self.hours = (self.hours + 23) % 24;
    }
}

/// The persisted alarm settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct AlarmConfig {
    /// Alarm hour, 0..=23
    pub hour: u8,
    /// Alarm minute, 0..=59
    pub minute: u8,
    /// Timezone the alarm time and the clock display are in
    pub timezone: Timezone,
    /// Learned lead time, 0..=[`MAX_LEAD_SECONDS`]
    pub lead_seconds: u32,
    /// Whether the alarm is armed
    pub active: bool,
}

impl AlarmConfig {
    /// Next hour, wrapping from 23 to 0
    pub const fn increment_hour(&mut self) {
        self.hour = (self.hour + 1) % 24;
    }

    /// Previous hour, 23 below 0
    pub const fn decrement_hour(&mut self) {
        self.hour = (self.hour + 23) % 24;
    }

    /// Next minute, wrapping from 59 to 0
    pub const fn increment_minute(&mut self) {
        self.minute = (self.minute + 1) % 60;
    }

    /// Previous minute, 59 below 0
    pub const fn decrement_minute(&mut self) {
        self.minute = (self.minute + 59) % 60;
    }

    /// Arm or disarm the alarm
    pub const fn toggle_active(&mut self) {
        self.active = !self.active;
    }

    /// The alarm time as `HH:MM`
    pub fn time_label(&self) -> String<5> {
        let mut s = String::new();
        // two two-digit numbers and a colon always fit
        let _ = write!(s, "{:02}:{:02}", self.hour, self.minute);
        s
    }
}

/// Compute the next instant the alarm should fire.
///
/// Takes the local calendar date of `now` in `zone`, sets the time to the alarm's hour and minute,
/// subtracts the lead time and moves the result a day ahead if it is not after `now`.
pub fn compute_next_trigger(config: &AlarmConfig, zone: Timezone, now: Timestamp) -> Timestamp {
    let offset = zone.offset_seconds();
    let local = now.unix() + offset;
    let local_midnight = local - local.rem_euclid(SECONDS_IN_DAY);
    let alarm_local =
        local_midnight + i64::from(config.hour) * 3_600 + i64::from(config.minute) * 60;
    let lead = i64::from(config.lead_seconds.min(MAX_LEAD_SECONDS));

    let mut trigger = Timestamp::from_unix(alarm_local - offset - lead);
    // a lead reaching back over midnight can need a second day
    while trigger <= now {
        trigger = trigger + SECONDS_IN_DAY;
    }
    trigger
}

/// Learn a new lead time from how long the alarm rang before it was acknowledged.
///
/// Averages the latest ringing duration with the previous lead, so the lead drifts towards the
/// user's usual wake latency without jumping on a single slow morning. Capped at
/// [`MAX_LEAD_SECONDS`].
pub fn learn_lead(epoch: Timestamp, now: Timestamp, old_lead: u32) -> u32 {
    let elapsed = u64::try_from(now.secs_since(epoch)).unwrap_or(0);
    let lead = (elapsed + u64::from(old_lead)) / 2;
    u32::try_from(lead).unwrap_or(u32::MAX).min(MAX_LEAD_SECONDS)
}

/// Owns the alarm configuration and the next trigger instant derived from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmScheduler {
    /// The alarm settings, edited in place
    config: AlarmConfig,
    /// The timezone in effect for local time. Edits to `config.timezone` only take effect once
    /// applied.
    zone: Timezone,
    /// When the alarm fires next, `None` until the first schedule pass
    next_trigger: Option<Timestamp>,
}

impl AlarmScheduler {
    /// Create a scheduler for the loaded settings, with their timezone in effect and nothing
    /// scheduled yet
    pub fn new(mut config: AlarmConfig) -> Self {
        config.lead_seconds = config.lead_seconds.min(MAX_LEAD_SECONDS);
        Self {
            zone: config.timezone,
            config,
            next_trigger: None,
        }
    }

    /// The alarm settings
    pub const fn config(&self) -> &AlarmConfig {
        &self.config
    }

    /// The alarm settings, for editing
    pub const fn config_mut(&mut self) -> &mut AlarmConfig {
        &mut self.config
    }

    /// The timezone currently used for local time
    pub const fn zone(&self) -> Timezone {
        self.zone
    }

    /// When the alarm fires next
    pub const fn next_trigger(&self) -> Option<Timestamp> {
        self.next_trigger
    }

    /// Put the edited timezone into effect
    pub fn apply_timezone(&mut self) {
        info!("Setting time zone to {}", self.config.timezone);
        self.zone = self.config.timezone;
    }

    /// Recompute the next trigger from the current settings
    pub fn reschedule(&mut self, now: Timestamp) -> Timestamp {
        let trigger = compute_next_trigger(&self.config, self.zone, now);
        info!(
            "Alarm set to {:02}:{:02}, lead {} s, fires at {}",
            self.config.hour,
            self.config.minute,
            self.config.lead_seconds,
            trigger.unix()
        );
        self.next_trigger = Some(trigger);
        trigger
    }

    /// Whether the scheduled trigger has been reached
    pub fn is_due(&self, now: Timestamp) -> bool {
        self.next_trigger.is_some_and(|trigger| now >= trigger)
    }


    /// Learn from an acknowledged alarm and reschedule. Returns how long the alarm rang, in
    /// seconds.
    pub fn learn_from_acknowledgment(&mut self, epoch: Timestamp, now: Timestamp) -> i64 {
        let elapsed = now.secs_since(epoch).max(0);
        let lead = learn_lead(epoch, now, self.config.lead_seconds);
        info!("{} seconds to turn off alarm, new lead is {} s", elapsed, lead);
        self.config.lead_seconds = lead;
        self.reschedule(now);
        elapsed
    }
}
