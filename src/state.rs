//! # Device state machine
//! The central controller of the device. It owns the operating mode and the alarm scheduler and
//! reacts to button edges, the alarm coming due and the snooze running out. Every transition is
//! listed in [`DeviceStateMachine::handle`]; any other combination of mode and input changes
//! nothing.
//!
//! Side effects that reach beyond the state machine (saving settings, silencing the buzzer,
//! telemetry) are returned as [`Effects`] for the caller to carry out.
use crate::alarm::{AlarmConfig, AlarmScheduler, Timezone};
use crate::clock::Timestamp;
use crate::input::{Button, EdgeEvent};
use crate::telemetry::Telemetry;

/// How long a snooze lasts, in seconds
pub const SNOOZE_LENGTH_SECS: i64 = 20;

/// The operating mode of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum DeviceMode {
    /// Showing the time and date
    Clock,
    /// Showing the alarm time and whether it is armed, while button A is held
    ReviewAlarm,
    /// Choosing between the alarm time and the timezone editor
    MenuRoot,
    /// Editing the timezone offset
    EditTimezone,
    /// Editing the alarm hour
    EditHour,
    /// Editing the alarm minute
    EditMinute,
    /// The alarm is sounding
    Ringing,
    /// The alarm is paused until the snooze deadline
    Snoozed,
}

/// Inputs of the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Event {
    /// A button changed level
    Edge(EdgeEvent),
    /// Scheduling pass: fire the alarm if it is due
    Tick,
    /// The snooze deadline has passed
    SnoozeElapsed,
    /// The wall clock became valid for the first time, the schedule computed so far is meaningless
    ClockSynced,
}

/// Side effects of a transition for the caller to carry out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct Effects {
    /// Write the settings to persistent storage
    pub persist: bool,
    /// Drive the buzzer low right away
    pub buzzer_off: bool,
    /// Send this message to the cloud
    pub telemetry: Option<Telemetry>,
}

impl Effects {
    /// No effects
    pub const NONE: Self = Self {
        persist: false,
        buzzer_off: false,
        telemetry: None,
    };

    /// Whether there is nothing to do
    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }

    /// Fold the effects of a later transition into these
    pub fn merge(&mut self, other: Self) {
        self.persist |= other.persist;
        self.buzzer_off |= other.buzzer_off;
        if other.telemetry.is_some() {
            self.telemetry = other.telemetry;
        }
    }

    /// Save the settings, which is always reported to the cloud with the saved alarm time
    fn save(config: &AlarmConfig) -> Self {
        Self {
            persist: true,
            telemetry: Some(Telemetry::AlarmTimeSet {
                hour: config.hour,
                minute: config.minute,
            }),
            ..Self::NONE
        }
    }
}

/// The device state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceStateMachine {
    /// Current operating mode
    mode: DeviceMode,
    /// Alarm settings and next trigger
    scheduler: AlarmScheduler,
    /// When the current ringing episode began
    ring_epoch: Option<Timestamp>,
    /// When a snoozed alarm starts ringing again
    snooze_deadline: Option<Timestamp>,
}

impl DeviceStateMachine {
    /// Create the state machine in clock mode for the loaded settings. Nothing is scheduled until
    /// [`Self::schedule`] or [`Event::ClockSynced`].
    pub fn new(config: AlarmConfig) -> Self {
        Self {
            mode: DeviceMode::Clock,
            scheduler: AlarmScheduler::new(config),
            ring_epoch: None,
            snooze_deadline: None,
        }
    }

    /// Current operating mode
    pub const fn mode(&self) -> DeviceMode {
        self.mode
    }

    /// Current alarm settings
    pub const fn config(&self) -> &AlarmConfig {
        self.scheduler.config()
    }

    /// Timezone in effect for local time
    pub const fn zone(&self) -> Timezone {
        self.scheduler.zone()
    }

    /// When the alarm fires next
    pub const fn next_trigger(&self) -> Option<Timestamp> {
        self.scheduler.next_trigger()
    }

    /// When the snooze ends, while snoozed
    pub const fn snooze_deadline(&self) -> Option<Timestamp> {
        self.snooze_deadline
    }

    /// When the current ringing episode began
    pub const fn ring_epoch(&self) -> Option<Timestamp> {
        self.ring_epoch
    }

    /// Compute the next trigger from the current settings
    pub fn schedule(&mut self, now: Timestamp) -> Timestamp {
        self.scheduler.reschedule(now)
    }

    /// Run one transition
    pub fn handle(&mut self, event: Event, now: Timestamp) -> Effects {
        match event {
            Event::Edge(edge) => self.handle_edge(edge, now),
            Event::Tick => self.check_alarm(now),
            Event::SnoozeElapsed => {
                if self.mode == DeviceMode::Snoozed {
                    info!("Snooze over");
                    self.snooze_deadline = None;
                    self.set_mode(DeviceMode::Ringing);
                }
                Effects::NONE
            }
            Event::ClockSynced => {
                self.scheduler.reschedule(now);
                Effects::NONE
            }
        }
    }

    /// Button edges, see the module docs
    fn handle_edge(&mut self, edge: EdgeEvent, now: Timestamp) -> Effects {
        let press = edge.is_press();
        let release = edge.is_release();
        match (self.mode, edge.button) {
            (DeviceMode::Clock, Button::A) if press => self.set_mode(DeviceMode::ReviewAlarm),
            (DeviceMode::Clock, Button::Set) if press => self.set_mode(DeviceMode::MenuRoot),

            (DeviceMode::ReviewAlarm, Button::A) if release => {
                self.set_mode(DeviceMode::Clock);
                return Effects::save(self.config());
            }
            (DeviceMode::ReviewAlarm, Button::C) if press => {
                self.scheduler.config_mut().toggle_active();
            }

            (DeviceMode::MenuRoot, Button::A) if press => self.set_mode(DeviceMode::EditHour),
            (DeviceMode::MenuRoot, Button::C) if press => self.set_mode(DeviceMode::EditTimezone),

            (DeviceMode::EditHour, Button::A) if press => {
                self.scheduler.config_mut().decrement_hour();
            }
            (DeviceMode::EditHour, Button::B) if press => {
                self.scheduler.config_mut().increment_hour();
            }
            (DeviceMode::EditHour, Button::Set) if release => self.set_mode(DeviceMode::EditMinute),

            (DeviceMode::EditMinute, Button::A) if press => {
                self.scheduler.config_mut().decrement_minute();
            }
            (DeviceMode::EditMinute, Button::B) if press => {
                self.scheduler.config_mut().increment_minute();
            }
            (DeviceMode::EditMinute, Button::Set) if release => {
                self.scheduler.config_mut().lead_seconds = 0;
                self.scheduler.reschedule(now);
                self.set_mode(DeviceMode::Clock);
                return Effects::save(self.config());
            }

            (DeviceMode::EditTimezone, Button::A) if press => {
                self.scheduler.config_mut().timezone.flip_sign();
            }
            (DeviceMode::EditTimezone, Button::B) if press => {
                self.scheduler.config_mut().timezone.decrement_hour();
            }
            (DeviceMode::EditTimezone, Button::C) if press => {
                self.scheduler.config_mut().timezone.increment_hour();
            }
            (DeviceMode::EditTimezone, Button::Set) if release => {
                self.scheduler.apply_timezone();
                self.set_mode(DeviceMode::Clock);
                return Effects::save(self.config());
            }

            (DeviceMode::Ringing, Button::A) if press => return self.acknowledge(now),
            (DeviceMode::Ringing, Button::Set) if press => {
                let deadline = now + SNOOZE_LENGTH_SECS;
                info!("Snoozing until {}", deadline.unix());
                self.snooze_deadline = Some(deadline);
                self.set_mode(DeviceMode::Snoozed);
                return Effects {
                    buzzer_off: true,
                    ..Effects::NONE
                };
            }

            _ => {}
        }
        Effects::NONE
    }

    /// The user silenced the alarm: learn the lead time from how long it rang and schedule
    /// tomorrow's alarm
    fn acknowledge(&mut self, now: Timestamp) -> Effects {
        let epoch = self.ring_epoch.take().unwrap_or(now);
        let elapsed_secs = self.scheduler.learn_from_acknowledgment(epoch, now);
        self.snooze_deadline = None;
        self.set_mode(DeviceMode::Clock);
        Effects {
            buzzer_off: true,
            telemetry: Some(Telemetry::SnoozeTime { elapsed_secs }),
            ..Effects::NONE
        }
    }

    /// Scheduling pass in clock mode. A due alarm is rescheduled from the current settings whether
    /// or not it is armed, and starts ringing only when it is.
    fn check_alarm(&mut self, now: Timestamp) -> Effects {
        if self.mode != DeviceMode::Clock || !self.scheduler.is_due(now) {
            return Effects::NONE;
        }
        self.scheduler.reschedule(now);
        if self.config().active {
            info!("Alarm!");
            self.ring_epoch = Some(now);
            self.set_mode(DeviceMode::Ringing);
        } else {
            debug!("Alarm time passed while disarmed");
        }
        Effects::NONE
    }

    /// Switch modes
    fn set_mode(&mut self, mode: DeviceMode) {
        debug!("Mode {} -> {}", self.mode, mode);
        self.mode = mode;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::SECONDS_IN_DAY;
    use crate::input::Level;

    /// 2024-03-10T00:00:00Z
    const MIDNIGHT: i64 = 1_710_028_800;

    fn at(hour: i64, minute: i64, second: i64) -> Timestamp {
        Timestamp::from_unix(MIDNIGHT + hour * 3_600 + minute * 60 + second)
    }

    fn press(button: Button) -> Event {
        Event::Edge(EdgeEvent {
            button,
            level: Level::Low,
        })
    }

    fn release(button: Button) -> Event {
        Event::Edge(EdgeEvent {
            button,
            level: Level::High,
        })
    }

    fn machine(hour: u8, minute: u8, lead_seconds: u32, active: bool) -> DeviceStateMachine {
        let mut machine = DeviceStateMachine::new(AlarmConfig {
            hour,
            minute,
            lead_seconds,
            active,
            ..AlarmConfig::default()
        });
        machine.schedule(at(6, 0, 0));
        machine
    }

    /// Drive the machine into `mode` through button presses
    fn enter(machine: &mut DeviceStateMachine, mode: DeviceMode) {
        let now = at(6, 0, 0);
        let path = match mode {
            DeviceMode::Clock => vec![],
            DeviceMode::ReviewAlarm => vec![press(Button::A)],
            DeviceMode::MenuRoot => vec![press(Button::Set), release(Button::Set)],
            DeviceMode::EditHour => vec![
                press(Button::Set),
                release(Button::Set),
                press(Button::A),
                release(Button::A),
            ],
            DeviceMode::EditMinute => vec![
                press(Button::Set),
                release(Button::Set),
                press(Button::A),
                release(Button::A),
                press(Button::Set),
                release(Button::Set),
            ],
            DeviceMode::EditTimezone => vec![
                press(Button::Set),
                release(Button::Set),
                press(Button::C),
                release(Button::C),
            ],
            DeviceMode::Ringing | DeviceMode::Snoozed => {
                machine.scheduler.config_mut().active = true;
                machine.schedule(now);
                let due = machine.next_trigger().unwrap();
                machine.handle(Event::Tick, due);
                if mode == DeviceMode::Snoozed {
                    machine.handle(press(Button::Set), due);
                }
                vec![]
            }
        };
        for event in path {
            machine.handle(event, now);
        }
        assert_eq!(machine.mode(), mode);
    }

    #[test]
    fn review_alarm_toggles_and_persists_on_release() {
        let mut m = machine(7, 30, 0, false);
        assert_eq!(m.handle(press(Button::A), at(6, 0, 0)), Effects::NONE);
        assert_eq!(m.mode(), DeviceMode::ReviewAlarm);

        m.handle(press(Button::C), at(6, 0, 0));
        assert!(m.config().active);
        m.handle(release(Button::C), at(6, 0, 0));
        assert!(m.config().active);

        let effects = m.handle(release(Button::A), at(6, 0, 1));
        assert_eq!(m.mode(), DeviceMode::Clock);
        assert!(effects.persist);
        assert_eq!(effects.telemetry, Some(Telemetry::AlarmTimeSet { hour: 7, minute: 30 }));
    }

    #[test]
    fn editing_the_alarm_time_resets_lead_and_reschedules() {
        let mut m = machine(7, 30, 120, true);
        enter(&mut m, DeviceMode::EditHour);

        m.handle(press(Button::B), at(6, 0, 0));
        m.handle(release(Button::B), at(6, 0, 0));
        m.handle(press(Button::B), at(6, 0, 0));
        m.handle(press(Button::A), at(6, 0, 0));
        assert_eq!(m.config().hour, 8);

        // the Set press itself does nothing, its release moves on
        assert_eq!(m.handle(press(Button::Set), at(6, 0, 0)), Effects::NONE);
        assert_eq!(m.mode(), DeviceMode::EditHour);
        m.handle(release(Button::Set), at(6, 0, 0));
        assert_eq!(m.mode(), DeviceMode::EditMinute);

        m.handle(press(Button::A), at(6, 0, 0));
        m.handle(press(Button::A), at(6, 0, 0));
        m.handle(press(Button::B), at(6, 0, 0));
        assert_eq!(m.config().minute, 29);

        m.handle(press(Button::Set), at(6, 0, 0));
        let effects = m.handle(release(Button::Set), at(6, 0, 0));
        assert_eq!(m.mode(), DeviceMode::Clock);
        assert!(effects.persist);
        assert_eq!(m.config().lead_seconds, 0);
        assert_eq!(m.next_trigger(), Some(at(8, 29, 0)));
    }

    #[test]
    fn decrement_below_zero_goes_to_the_top_of_the_range() {
        let mut m = machine(0, 0, 0, true);
        enter(&mut m, DeviceMode::EditHour);
        m.handle(press(Button::A), at(6, 0, 0));
        assert_eq!(m.config().hour, 23);

        m.handle(release(Button::Set), at(6, 0, 0));
        m.handle(press(Button::A), at(6, 0, 0));
        assert_eq!(m.config().minute, 59);
        assert_eq!(m.config().hour, 23);
    }

    #[test]
    fn editing_the_timezone_applies_only_on_confirm() {
        let mut m = machine(7, 30, 0, true);
        enter(&mut m, DeviceMode::EditTimezone);

        m.handle(press(Button::C), at(6, 0, 0));
        m.handle(press(Button::C), at(6, 0, 0));
        m.handle(press(Button::B), at(6, 0, 0));
        m.handle(press(Button::A), at(6, 0, 0));
        assert_eq!(m.config().timezone.label().as_str(), "-01");
        assert_eq!(m.zone(), Timezone::UTC);

        let effects = m.handle(release(Button::Set), at(6, 0, 0));
        assert_eq!(m.mode(), DeviceMode::Clock);
        assert!(effects.persist);
        assert_eq!(m.zone().label().as_str(), "-01");
    }

    #[test]
    fn armed_alarm_rings_and_moves_a_day_ahead() {
        let mut m = machine(7, 30, 0, true);
        assert_eq!(m.handle(Event::Tick, at(7, 29, 59)), Effects::NONE);
        assert_eq!(m.mode(), DeviceMode::Clock);

        m.handle(Event::Tick, at(7, 30, 0));
        assert_eq!(m.mode(), DeviceMode::Ringing);
        assert_eq!(m.ring_epoch(), Some(at(7, 30, 0)));
        assert_eq!(m.next_trigger(), Some(at(7, 30, 0) + SECONDS_IN_DAY));
    }

    #[test]
    fn disarmed_alarm_moves_a_day_ahead_silently() {
        let mut m = machine(7, 30, 0, false);
        m.handle(Event::Tick, at(7, 30, 5));
        assert_eq!(m.mode(), DeviceMode::Clock);
        assert_eq!(m.ring_epoch(), None);
        assert_eq!(m.next_trigger(), Some(at(7, 30, 0) + SECONDS_IN_DAY));
    }

    #[test]
    fn confirmed_timezone_moves_the_next_alarm() {
        let mut m = machine(7, 0, 0, false);
        assert_eq!(m.next_trigger(), Some(at(7, 0, 0)));

        enter(&mut m, DeviceMode::EditTimezone);
        for _ in 0..5 {
            m.handle(press(Button::C), at(6, 0, 0));
        }
        m.handle(release(Button::Set), at(6, 0, 0));
        assert_eq!(m.zone().label().as_str(), "+05");

        // the pending trigger still fires once, every later one is 07:00 local in +05
        let mut now = at(7, 0, 0);
        for _ in 0..3 {
            m.handle(Event::Tick, now);
            assert_eq!(m.mode(), DeviceMode::Clock);
            now = m.next_trigger().unwrap();
            let local = now.unix() + m.zone().offset_seconds();
            assert_eq!(local.rem_euclid(SECONDS_IN_DAY), 7 * 3_600);
        }
        assert_eq!(now, at(2, 0, 0) + 3 * SECONDS_IN_DAY);
    }

    #[test]
    fn alarm_does_not_fire_outside_clock_mode() {
        let mut m = machine(7, 30, 0, true);
        enter(&mut m, DeviceMode::MenuRoot);
        m.handle(Event::Tick, at(7, 31, 0));
        assert_eq!(m.mode(), DeviceMode::MenuRoot);
        assert_eq!(m.next_trigger(), Some(at(7, 30, 0)));
    }

    #[test]
    fn acknowledging_learns_the_lead() {
        let mut m = machine(7, 30, 20, true);
        let epoch = m.next_trigger().unwrap();
        assert_eq!(epoch, at(7, 29, 40));
        m.handle(Event::Tick, epoch);
        assert_eq!(m.mode(), DeviceMode::Ringing);

        let effects = m.handle(press(Button::A), epoch + 40);
        assert_eq!(m.mode(), DeviceMode::Clock);
        assert!(effects.buzzer_off);
        assert!(!effects.persist);
        assert_eq!(effects.telemetry, Some(Telemetry::SnoozeTime { elapsed_secs: 40 }));
        assert_eq!(m.config().lead_seconds, 30);
        assert_eq!(m.ring_epoch(), None);
        assert_eq!(m.next_trigger(), Some(at(7, 29, 30) + SECONDS_IN_DAY));
    }

    #[test]
    fn snooze_and_ring_again() {
        let mut m = machine(7, 30, 0, true);
        m.handle(Event::Tick, at(7, 30, 0));

        let effects = m.handle(press(Button::Set), at(7, 30, 10));
        assert_eq!(m.mode(), DeviceMode::Snoozed);
        assert!(effects.buzzer_off);
        assert_eq!(m.snooze_deadline(), Some(at(7, 30, 30)));

        // acknowledging is only possible while ringing
        assert_eq!(m.handle(press(Button::A), at(7, 30, 15)), Effects::NONE);
        assert_eq!(m.mode(), DeviceMode::Snoozed);

        m.handle(Event::SnoozeElapsed, at(7, 30, 31));
        assert_eq!(m.mode(), DeviceMode::Ringing);
        assert_eq!(m.snooze_deadline(), None);

        // the episode started when the alarm first rang
        let effects = m.handle(press(Button::A), at(7, 31, 0));
        assert_eq!(effects.telemetry, Some(Telemetry::SnoozeTime { elapsed_secs: 60 }));
    }

    #[test]
    fn clock_synced_reschedules_from_the_real_time() {
        let mut m = DeviceStateMachine::new(AlarmConfig {
            hour: 7,
            minute: 30,
            active: true,
            ..AlarmConfig::default()
        });
        // scheduled against a power-on default clock
        m.schedule(Timestamp::from_unix(0));
        assert!(m.next_trigger().unwrap() < at(0, 0, 0));

        m.handle(Event::ClockSynced, at(9, 0, 0));
        assert_eq!(m.next_trigger(), Some(at(7, 30, 0) + SECONDS_IN_DAY));
        m.handle(Event::Tick, at(9, 0, 1));
        assert_eq!(m.mode(), DeviceMode::Clock);
    }

    /// The complete transition table as (mode, button, level) triples
    fn listed(mode: DeviceMode, button: Button, level: Level) -> bool {
        use Button::{A, B, C, Set};
        use DeviceMode::{Clock, EditHour, EditMinute, EditTimezone, MenuRoot, Ringing, ReviewAlarm};
        use Level::{High, Low};
        matches!(
            (mode, button, level),
            (Clock, A | Set, Low)
                | (ReviewAlarm, A, High)
                | (ReviewAlarm, C, Low)
                | (MenuRoot, A | C, Low)
                | (EditHour | EditMinute, A | B, Low)
                | (EditHour | EditMinute | EditTimezone, Set, High)
                | (EditTimezone, A | B | C, Low)
                | (Ringing, A | Set, Low)
        )
    }

    #[test]
    fn unlisted_edges_change_nothing() {
        let modes = [
            DeviceMode::Clock,
            DeviceMode::ReviewAlarm,
            DeviceMode::MenuRoot,
            DeviceMode::EditTimezone,
            DeviceMode::EditHour,
            DeviceMode::EditMinute,
            DeviceMode::Ringing,
            DeviceMode::Snoozed,
        ];
        for mode in modes {
            for button in Button::ALL {
                for level in [Level::Low, Level::High] {
                    if listed(mode, button, level) {
                        continue;
                    }
                    let mut m = machine(7, 30, 0, false);
                    enter(&mut m, mode);
                    let before = m.clone();
                    let effects = m.handle(Event::Edge(EdgeEvent { button, level }), at(7, 45, 0));
                    assert!(effects.is_empty(), "{mode:?} {button:?} {level:?}");
                    assert_eq!(m, before, "{mode:?} {button:?} {level:?}");
                }
            }
        }
    }
}
