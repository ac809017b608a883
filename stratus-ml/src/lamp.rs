//! Green/red comfort lamp
//!
//! Two plain outputs, no timers: green means comfortable, red means
//! uncomfortable, both dark when there is no assessment.

use stratus_core::IndicatorOutput;

use crate::comfort::{ComfortAssessment, ComfortLabel};

/// What the lamp pair is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LampState {
    /// Both outputs off
    #[default]
    Off,
    /// Green on, red off
    Comfortable,
    /// Red on, green off
    Uncomfortable,
}

/// Secondary indicator driven by the comfort classifier
pub struct ComfortLamp<G, R> {
    green: G,
    red: R,
    state: LampState,
}

impl<G: IndicatorOutput, R: IndicatorOutput> ComfortLamp<G, R> {
    /// Take both outputs and switch them off
    pub fn new(green: G, red: R) -> Self {
        let mut lamp = Self {
            green,
            red,
            state: LampState::Off,
        };
        lamp.set_state(LampState::Off);
        lamp
    }

    /// Show an assessment, or go dark when there is none
    pub fn show(&mut self, assessment: Option<&ComfortAssessment>) {
        let state = match assessment.map(|a| a.label) {
            Some(ComfortLabel::Comfortable) => LampState::Comfortable,
            Some(ComfortLabel::Uncomfortable) => LampState::Uncomfortable,
            None => LampState::Off,
        };
        self.set_state(state);
    }

    /// Set the lamp from a status word; anything unrecognized turns it off
    pub fn show_status(&mut self, status: &str) {
        let state = match status {
            "COMFORTABLE" => LampState::Comfortable,
            "UNCOMFORTABLE" => LampState::Uncomfortable,
            _ => LampState::Off,
        };
        self.set_state(state);
    }

    /// Drive both outputs for `state`
    pub fn set_state(&mut self, state: LampState) {
        let (green, red) = match state {
            LampState::Off => (false, false),
            LampState::Comfortable => (true, false),
            LampState::Uncomfortable => (false, true),
        };
        self.green.set(green);
        self.red.set(red);
        self.state = state;
    }

    /// Switch both outputs off
    pub fn all_off(&mut self) {
        self.set_state(LampState::Off);
    }

    /// Current state
    pub fn state(&self) -> LampState {
        self.state
    }
}
