//! # Buzzer actuation
//! Runs on its own tick, independent of the input tick. While ringing the output is toggled every
//! tick, which makes the piezo buzz at half the tick rate. In every other mode the output is held
//! low. While snoozed it also watches the snooze deadline.
use crate::clock::Timestamp;
use crate::input::Level;
use crate::state::DeviceMode;
use embassy_time::Duration;

/// Period of the buzzer tick
pub const BUZZER_TICK: Duration = Duration::from_millis(100);

/// Outcome of one buzzer tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct BuzzerTick {
    /// Level to drive the buzzer pin to
    pub level: Level,
    /// The snooze deadline has passed and the alarm should ring again
    pub snooze_elapsed: bool,
}

/// Drives the buzzer pin according to the device mode. Never touches the alarm settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuzzerActuator {
    /// Level the pin is currently driven to
    level: Level,
}

impl Default for BuzzerActuator {
    fn default() -> Self {
        Self::new()
    }
}

impl BuzzerActuator {
    /// Create the actuator with the buzzer off
    pub const fn new() -> Self {
        Self { level: Level::Low }
    }

    /// Level the pin is currently driven to
    pub const fn level(&self) -> Level {
        self.level
    }

    /// Silence the buzzer right away
    pub const fn force_off(&mut self) -> Level {
        self.level = Level::Low;
        self.level
    }

    /// One buzzer tick for the given mode
    pub fn tick(
        &mut self,
        mode: DeviceMode,
        snooze_deadline: Option<Timestamp>,
        now: Timestamp,
    ) -> BuzzerTick {
        match mode {
            DeviceMode::Ringing => {
                self.level = self.level.toggled();
                BuzzerTick {
                    level: self.level,
                    snooze_elapsed: false,
                }
            }
            DeviceMode::Snoozed => BuzzerTick {
                level: self.force_off(),
                snooze_elapsed: snooze_deadline.is_some_and(|deadline| now > deadline),
            },
            _ => BuzzerTick {
                level: self.force_off(),
                snooze_elapsed: false,
            },
        }
    }
}
