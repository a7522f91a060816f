//! # Control context
//! The one piece of state the control loop owns: the state machine with its scheduler, the input
//! sampler, the buzzer and the readiness gate. The loop feeds it button levels on the input tick
//! and asks it for the buzzer level on the buzzer tick. No other task touches any of this.
use crate::alarm::AlarmConfig;
use crate::buzzer::BuzzerActuator;
use crate::clock::{ClockReadinessGate, Readiness, Timestamp};
use crate::input::{BUTTON_COUNT, InputSampler, Level};
use crate::render::{self, Screen};
use crate::state::{DeviceStateMachine, Effects, Event};

/// State owned by the control loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Controller {
    /// Mode and alarm schedule
    machine: DeviceStateMachine,
    /// Button edge detection
    sampler: InputSampler,
    /// Buzzer output
    buzzer: BuzzerActuator,
    /// Whether the wall clock can be trusted yet
    readiness: ClockReadinessGate,
}

impl Controller {
    /// Set up the control context from the loaded settings and the button levels read at startup.
    /// Schedules the alarm right away when the clock is already known to be synced.
    pub fn new(
        config: AlarmConfig,
        readiness: ClockReadinessGate,
        initial_levels: [Level; BUTTON_COUNT],
        now: Timestamp,
    ) -> Self {
        let mut machine = DeviceStateMachine::new(config);
        if readiness.is_ready() {
            machine.schedule(now);
        } else {
            warn!("Wall clock not synced yet, alarm not scheduled");
        }
        Self {
            machine,
            sampler: InputSampler::new(initial_levels),
            buzzer: BuzzerActuator::new(),
            readiness,
        }
    }

    /// The state machine
    pub const fn machine(&self) -> &DeviceStateMachine {
        &self.machine
    }

    /// Whether the wall clock has been synced
    pub const fn is_clock_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    /// Level the buzzer is driven to
    pub const fn buzzer_level(&self) -> Level {
        self.buzzer.level()
    }

    /// One input tick: check clock readiness, turn the sampled levels into edges and run them
    /// through the state machine, then run the scheduling pass once the clock can be trusted.
    pub fn on_button_tick(&mut self, levels: [Level; BUTTON_COUNT], now: Timestamp) -> Effects {
        let mut effects = Effects::NONE;

        if self.readiness.poll(now) == Readiness::BecameReady {
            effects.merge(self.machine.handle(Event::ClockSynced, now));
        }
        for edge in self.sampler.sample(levels) {
            effects.merge(self.machine.handle(Event::Edge(edge), now));
        }
        if self.readiness.is_ready() {
            effects.merge(self.machine.handle(Event::Tick, now));
        }

        if effects.buzzer_off {
            self.buzzer.force_off();
        }
        effects
    }

    /// One buzzer tick. Returns the level to drive the buzzer pin to.
    pub fn on_buzzer_tick(&mut self, now: Timestamp) -> Level {
        let tick = self
            .buzzer
            .tick(self.machine.mode(), self.machine.snooze_deadline(), now);
        if tick.snooze_elapsed {
            self.machine.handle(Event::SnoozeElapsed, now);
        }
        tick.level
    }

    /// What the display should show
    pub fn screen(&self, now: Timestamp) -> Screen {
        render::screen(&self.machine, now)
    }
}
