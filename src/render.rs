//! # Screen contents
//! What the display shows for each mode, as lines of text. Drawing the glyphs is up to the display
//! task.
use crate::clock::{Timestamp, is_time_valid};
use crate::state::{DeviceMode, DeviceStateMachine};
use core::fmt::Write;
use heapless::{String, Vec};
use time::OffsetDateTime;

/// Longest line that fits the display
pub const LINE_LEN: usize = 12;

/// Most lines on one screen
pub const MAX_LINES: usize = 3;

/// Text sizes, in increasing order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum TextSize {
    /// Dates and hints
    Normal,
    /// Headings and edited values
    Big,
    /// The time of day
    Huge,
}

/// One line of text on the display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// The text
    pub text: String<LINE_LEN>,
    /// How big to draw it
    pub size: TextSize,
    /// Top edge in pixels
    pub y: u8,
}

/// The contents of the display
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Screen {
    /// The lines, top to bottom
    pub lines: Vec<Line, MAX_LINES>,
}

impl Screen {
    /// Append a line of text, cut to [`LINE_LEN`] characters
    #[must_use]
    pub fn line(mut self, text: &str, size: TextSize, y: u8) -> Self {
        let mut s = String::new();
        for c in text.chars() {
            if s.push(c).is_err() {
                break;
            }
        }
        if self.lines.push(Line { text: s, size, y }).is_err() {
            warn!("Screen is full, dropping a line");
        }
        self
    }

    /// Whether a line with exactly this text is shown
    #[cfg(test)]
    pub fn shows(&self, text: &str) -> bool {
        self.lines.iter().any(|line| line.text.as_str() == text)
    }
}

/// Shown while the device initialises
pub fn starting() -> Screen {
    Screen::default().line("Starting", TextSize::Normal, 0)
}

/// Shown while the startup phase waits for time sync
pub fn setting_timezone() -> Screen {
    Screen::default()
        .line("Setting", TextSize::Normal, 0)
        .line("TimeZone", TextSize::Normal, 20)
}

/// Shown after the control loop has stopped
pub fn stopped() -> Screen {
    Screen::default().line("Stopped", TextSize::Big, 0)
}

/// Format into a line buffer, cutting off anything that does not fit
fn text(args: core::fmt::Arguments<'_>) -> String<LINE_LEN> {
    let mut s = String::new();
    let _ = s.write_fmt(args);
    s
}

/// The time and date lines shown in clock mode and while the alarm is going
fn clock_face(screen: Screen, local: OffsetDateTime) -> Screen {
    let time = text(format_args!("{:02}:{:02}", local.hour(), local.minute()));
    let date = text(format_args!(
        "{}/{}/{}",
        u8::from(local.month()),
        local.day(),
        local.year()
    ));
    screen
        .line(&time, TextSize::Huge, 0)
        .line(&date, TextSize::Normal, 35)
}

/// What the display should show right now
pub fn screen(machine: &DeviceStateMachine, now: Timestamp) -> Screen {
    let config = machine.config();
    let local =
        OffsetDateTime::from_unix_timestamp(now.unix() + machine.zone().offset_seconds()).ok();
    let screen = Screen::default();

    match machine.mode() {
        DeviceMode::Clock => match local {
            Some(local) if is_time_valid(now) => clock_face(screen, local),
            _ => screen.line("Syncing", TextSize::Big, 0),
        },
        DeviceMode::Ringing | DeviceMode::Snoozed => match local {
            Some(local) => clock_face(screen, local).line("buzzz", TextSize::Normal, 50),
            None => screen.line("buzzz", TextSize::Normal, 50),
        },
        DeviceMode::ReviewAlarm => screen
            .line(if config.active { "Alarm On" } else { "Alarm Off" }, TextSize::Normal, 0)
            .line(&config.time_label(), TextSize::Huge, 25),
        DeviceMode::MenuRoot => screen
            .line("A:Alarm", TextSize::Big, 0)
            .line("C:TZ", TextSize::Big, 22),
        DeviceMode::EditHour => screen
            .line("Hour", TextSize::Big, 0)
            .line(&text(format_args!("{}", config.hour)), TextSize::Big, 22),
        DeviceMode::EditMinute => screen
            .line("Minute", TextSize::Big, 0)
            .line(&text(format_args!("{}", config.minute)), TextSize::Big, 22),
        DeviceMode::EditTimezone => screen
            .line("TZ", TextSize::Big, 0)
            .line(&config.timezone.label(), TextSize::Big, 22),
    }
}
