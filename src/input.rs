//! # Button input
//! The four buttons are sampled once per input tick. Whenever a button reads a different level than
//! on the previous tick, exactly one [`EdgeEvent`] is emitted for it. There is no debouncing here,
//! a single noisy read counts as a real transition.
use embassy_time::Duration;
use heapless::Vec;

/// Number of buttons on the device
pub const BUTTON_COUNT: usize = 4;

/// Period of the input tick
pub const BUTTON_TICK: Duration = Duration::from_millis(1);

/// Logical level of a pin. Buttons are pulled up, so a pressed button reads low.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Level {
    /// Pin reads low: button pressed, buzzer silent
    Low,
    /// Pin reads high: button released, buzzer driven
    High,
}

impl Level {
    /// The opposite level
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Low => Self::High,
            Self::High => Self::Low,
        }
    }
}

/// The buttons of the device, labelled as on the case
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Button {
    /// Review alarm, open the hour editor, decrement, acknowledge a ringing alarm
    A,
    /// Increment hour or minute, decrement the timezone hour
    B,
    /// Toggle the alarm, open the timezone editor, increment the timezone hour
    C,
    /// Open the menu, confirm an edit, snooze
    Set,
}

impl Button {
    /// All buttons, in sampling order
    pub const ALL: [Self; BUTTON_COUNT] = [Self::A, Self::B, Self::C, Self::Set];

    /// Position of the button in sampling order
    pub const fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
            Self::C => 2,
            Self::Set => 3,
        }
    }
}

/// A change of a button's level since the previous sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct EdgeEvent {
    /// The button that changed
    pub button: Button,
    /// The level it changed to
    pub level: Level,
}

impl EdgeEvent {
    /// Falling edge, the button went down
    pub fn is_press(&self) -> bool {
        self.level == Level::Low
    }

    /// Rising edge, the button came back up
    pub fn is_release(&self) -> bool {
        self.level == Level::High
    }
}

/// Remembers the last observed level of every button and turns level samples into edge events
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSampler {
    /// Last observed level per button, indexed by [`Button::index`]
    levels: [Level; BUTTON_COUNT],
}

impl InputSampler {
    /// Create a sampler using the levels read at startup as baseline, so buttons idling at their
    /// rest level do not produce events on the first tick
    pub const fn new(initial: [Level; BUTTON_COUNT]) -> Self {
        Self { levels: initial }
    }

    /// Last observed level of `button`
    #[cfg(test)]
    pub const fn level(&self, button: Button) -> Level {
        self.levels[button.index()]
    }

    /// Feed one sample of all buttons, in [`Button::ALL`] order, and collect the edges it contains
    pub fn sample(&mut self, current: [Level; BUTTON_COUNT]) -> Vec<EdgeEvent, BUTTON_COUNT> {
        let mut edges = Vec::new();
        for button in Button::ALL {
            let level = current[button.index()];
            if level != self.levels[button.index()] {
                self.levels[button.index()] = level;
                debug!("{} edge to {}", button, level);
                // at most one edge per button, so this never overflows
                let _ = edges.push(EdgeEvent { button, level });
            }
        }
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDLE: [Level; BUTTON_COUNT] = [Level::High; BUTTON_COUNT];

    #[test]
    fn held_level_emits_nothing() {
        let mut sampler = InputSampler::new(IDLE);
        assert!(sampler.sample(IDLE).is_empty());

        let pressed = [Level::Low, Level::High, Level::High, Level::High];
        assert_eq!(sampler.sample(pressed).len(), 1);
        for _ in 0..100 {
            assert!(sampler.sample(pressed).is_empty());
        }
    }

    #[test]
    fn single_change_emits_single_event_on_that_tick() {
        let mut sampler = InputSampler::new(IDLE);
        let edges = sampler.sample([Level::High, Level::High, Level::High, Level::Low]);
        assert_eq!(
            edges.as_slice(),
            &[EdgeEvent {
                button: Button::Set,
                level: Level::Low
            }]
        );
        assert!(edges[0].is_press());
        assert_eq!(sampler.level(Button::Set), Level::Low);

        let edges = sampler.sample(IDLE);
        assert_eq!(edges.len(), 1);
        assert!(edges[0].is_release());
        assert_eq!(edges[0].button, Button::Set);
    }

    #[test]
    fn simultaneous_changes_come_out_in_button_order() {
        let mut sampler = InputSampler::new(IDLE);
        let edges = sampler.sample([Level::High, Level::Low, Level::Low, Level::High]);
        let buttons: Vec<Button, BUTTON_COUNT> = edges.iter().map(|e| e.button).collect();
        assert_eq!(buttons.as_slice(), &[Button::B, Button::C]);
    }

    #[test]
    fn a_single_noisy_read_is_a_real_transition() {
        let mut sampler = InputSampler::new(IDLE);
        let glitch = [Level::Low, Level::High, Level::High, Level::High];
        assert_eq!(sampler.sample(glitch).len(), 1);
        assert_eq!(sampler.sample(IDLE).len(), 1);
    }
}
