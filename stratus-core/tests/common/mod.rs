//! Shared fixtures for the core integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use stratus_core::IndicatorOutput;

/// Temperature series matching the reference walk-through: 19.0, 19.1, ... in 0.1 steps
pub fn rising_series(start: f32, count: usize) -> Vec<f32> {
    (0..count).map(|i| start + 0.1 * i as f32).collect()
}

/// Slow sinusoidal drift with a small deterministic jitter
pub fn diurnal_series(base: f32, amplitude: f32, count: usize) -> Vec<f32> {
    let mut seed: u32 = 42;
    (0..count)
        .map(|i| {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let jitter = ((seed >> 16) % 100) as f32 / 1000.0 - 0.05;
            let phase = i as f32 / count.max(1) as f32 * core::f32::consts::TAU;
            base + amplitude * phase.sin() + jitter
        })
        .collect()
}

/// Indicator output that records every level it is driven to
#[derive(Clone, Default)]
pub struct RecordingOutput {
    events: Arc<Mutex<Vec<bool>>>,
}

impl RecordingOutput {
    pub fn events(&self) -> Vec<bool> {
        self.events.lock().unwrap().clone()
    }

    pub fn rising_edges(&self) -> usize {
        let events = self.events();
        events
            .windows(2)
            .filter(|pair| !pair[0] && pair[1])
            .count()
    }

    pub fn last(&self) -> Option<bool> {
        self.events().last().copied()
    }
}

impl IndicatorOutput for RecordingOutput {
    fn set(&mut self, on: bool) {
        self.events.lock().unwrap().push(on);
    }
}
