//! Status Indicator Arbitration
//!
//! ## Overview
//!
//! The node has a single status LED and many things that want to say
//! something with it: connection progress, comfort alerts, per-reading
//! activity flashes, remote `BLINK` commands. `StatusIndicator` owns the
//! output exclusively and decides which request wins.
//!
//! ## States
//!
//! ```text
//!              set_mode(name, None)            duration elapsed
//!   Idle ─────────────────────────────▶ Blinking ─────────────────▶ Idle
//!    ▲                                    │  ▲
//!    │ stop_blink()                       │  │ set_mode(other)
//!    └────────────────────────────────────┘  └── (old pattern torn down first)
//!
//!   solid_on() / solid_off()  ─▶  SolidOn / SolidOff   (any blink stopped first)
//! ```
//!
//! ## Priority
//!
//! | Active \ Requested | Standard | Alert   | Data     |
//! |--------------------|----------|---------|----------|
//! | nothing / standard | replace  | replace | replace  |
//! | alert              | replace  | replace | rejected |
//! | data               | replace  | replace | replace  |
//!
//! Alert patterns run with their table timing multiplied by 5.
//!
//! ## Concurrency
//!
//! All mutable state sits behind one mutex. The timer worker thread only ever
//! touches it through the same lock, and every schedule it runs carries the
//! generation number it was armed with. `stop_blink` bumps the generation and
//! forces the output off while holding the lock, so once it returns no pending
//! timer can turn the LED back on.
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use stratus_core::indicator::{PatternTable, StatusIndicator};
//! use stratus_core::IndicatorOutput;
//!
//! #[derive(Clone, Default)]
//! struct Led(Arc<Mutex<bool>>);
//!
//! impl IndicatorOutput for Led {
//!     fn set(&mut self, on: bool) {
//!         *self.0.lock().unwrap() = on;
//!     }
//! }
//!
//! let led = Led::default();
//! let indicator = StatusIndicator::new(led.clone(), PatternTable::with_defaults()).unwrap();
//!
//! assert!(!indicator.set_mode("DISCO", None));
//! assert!(indicator.set_mode("ALERT", None));
//! assert!(!indicator.set_mode("DATA_SENT", None));
//!
//! indicator.stop_blink();
//! assert!(!*led.0.lock().unwrap());
//! indicator.shutdown();
//! ```

mod pattern;
mod worker;

pub use pattern::{ErrorCodeTiming, IndicatorConfig, IndicatorPattern, PatternClass, PatternTable};

use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::constants::indicator::{SOLID_OFF_MODE, SOLID_ON_MODE};
use crate::errors::{CoreError, CoreResult};
use crate::traits::IndicatorOutput;
use worker::TimerCommand;

/// Snapshot returned by `StatusIndicator::status`
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct IndicatorStatus {
    /// Active mode name, `None` when idle
    pub mode: Option<String>,
    /// Current physical output level
    pub led_on: bool,
    /// Whether a pattern is scheduled
    pub blinking: bool,
}

struct IndicatorState {
    output: Box<dyn IndicatorOutput + Send>,
    led_on: bool,
    mode: Option<String>,
    class: PatternClass,
    blink_active: bool,
    generation: u64,
    timer: Sender<TimerCommand>,
    worker: Option<JoinHandle<()>>,
}

impl IndicatorState {
    fn drive(&mut self, on: bool) {
        self.output.set(on);
        self.led_on = on;
    }

    /// Invalidate any armed schedule and leave the output off
    fn stop(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if self.blink_active {
            // Worker gone means nothing left to disarm
            let _ = self.timer.send(TimerCommand::Disarm);
        }
        self.blink_active = false;
        self.class = PatternClass::Standard;
        self.drive(false);
    }

    fn blink_sequence(&mut self, count: u32, on: Duration, off: Duration) {
        for _ in 0..count {
            self.drive(true);
            thread::sleep(on);
            self.drive(false);
            thread::sleep(off);
        }
    }
}

pub(crate) struct Shared {
    state: Mutex<IndicatorState>,
    patterns: PatternTable,
    error_timing: ErrorCodeTiming,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, IndicatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Periodic toggle. `None` when the schedule is stale.
    fn on_toggle(&self, generation: u64) -> Option<bool> {
        let mut state = self.lock();
        if !state.blink_active || state.generation != generation {
            return None;
        }
        let next = !state.led_on;
        state.drive(next);
        Some(next)
    }

    /// One-shot off at the end of the on-phase
    fn on_off_timer(&self, generation: u64) -> bool {
        let mut state = self.lock();
        if !state.blink_active || state.generation != generation {
            return false;
        }
        state.drive(false);
        true
    }

    /// Requested duration elapsed: revert to idle
    fn on_expiry(&self, generation: u64) {
        let mut state = self.lock();
        if state.blink_active && state.generation == generation {
            log_debug!("Indicator pattern {:?} expired", state.mode);
            state.generation = state.generation.wrapping_add(1);
            state.blink_active = false;
            state.class = PatternClass::Standard;
            state.mode = None;
            state.drive(false);
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        state.drive(false);
    }
}

/// Handle to the status indicator. Clones share the same output and state.
#[derive(Clone)]
pub struct StatusIndicator {
    shared: Arc<Shared>,
}

impl StatusIndicator {
    /// Create an indicator with default error-code timing
    pub fn new<O>(output: O, patterns: PatternTable) -> CoreResult<Self>
    where
        O: IndicatorOutput + Send + 'static,
    {
        Self::with_config(
            output,
            IndicatorConfig {
                patterns,
                error_timing: ErrorCodeTiming::default(),
            },
        )
    }

    /// Create an indicator and start its timer worker
    pub fn with_config<O>(mut output: O, config: IndicatorConfig) -> CoreResult<Self>
    where
        O: IndicatorOutput + Send + 'static,
    {
        config.patterns.validate()?;
        output.set(false);

        let (timer, commands) = mpsc::channel();
        let shared = Arc::new(Shared {
            state: Mutex::new(IndicatorState {
                output: Box::new(output),
                led_on: false,
                mode: None,
                class: PatternClass::Standard,
                blink_active: false,
                generation: 0,
                timer,
                worker: None,
            }),
            patterns: config.patterns,
            error_timing: config.error_timing,
        });

        let handle = worker::spawn(Arc::downgrade(&shared), commands)
            .map_err(|_| CoreError::WorkerUnavailable)?;
        shared.lock().worker = Some(handle);

        log_debug!("Status indicator ready with {} patterns", shared.patterns.len());
        Ok(Self { shared })
    }

    /// Start a named pattern; `false` when it was rejected
    ///
    /// See `try_set_mode` for the rejection reasons.
    pub fn set_mode(&self, name: &str, duration: Option<Duration>) -> bool {
        match self.try_set_mode(name, duration) {
            Ok(()) => true,
            Err(CoreError::PatternSuppressed) => {
                log_debug!("Indicator mode {} suppressed by active alert", name);
                false
            }
            Err(e) => {
                log_warn!("Indicator mode {} rejected: {}", name, e);
                false
            }
        }
    }

    /// Start a named pattern, optionally reverting to idle after `duration`
    ///
    /// # Errors
    ///
    /// - `UnknownPattern` when `name` is not in the table
    /// - `PatternSuppressed` when `name` is data-class and an alert is active
    ///
    /// Neither error changes the indicator state.
    pub fn try_set_mode(&self, name: &str, duration: Option<Duration>) -> CoreResult<()> {
        let pattern = *self.shared.patterns.get(name).ok_or(CoreError::UnknownPattern)?;

        let mut state = self.shared.lock();
        if state.blink_active
            && state.class == PatternClass::Alert
            && pattern.class == PatternClass::Data
        {
            return Err(CoreError::PatternSuppressed);
        }

        state.stop();

        let (on, _) = pattern.timing();
        let generation = state.generation;
        state.blink_active = true;
        state.class = pattern.class;
        state.mode = Some(name.to_string());

        let armed = state.timer.send(TimerCommand::Arm {
            generation,
            on,
            period: pattern.period(),
            expires_at: duration.map(|d| Instant::now() + d),
        });
        if armed.is_err() {
            state.blink_active = false;
            state.mode = None;
            return Err(CoreError::WorkerUnavailable);
        }

        log_debug!("Indicator mode -> {}", name);
        Ok(())
    }

    /// Cancel any pattern and force the output off. Safe when idle.
    pub fn stop_blink(&self) {
        self.shared.lock().stop();
    }

    /// Stop blinking and hold the output on
    pub fn solid_on(&self) {
        let mut state = self.shared.lock();
        state.stop();
        state.drive(true);
        state.mode = Some(SOLID_ON_MODE.to_string());
    }

    /// Stop blinking and hold the output off
    pub fn solid_off(&self) {
        let mut state = self.shared.lock();
        state.stop();
        state.mode = Some(SOLID_OFF_MODE.to_string());
    }

    /// Blocking acknowledgement flash: `count` on/off cycles of `duration` each
    pub fn pulse(&self, count: u32, duration: Duration) {
        let mut state = self.shared.lock();
        state.stop();
        state.mode = Some(format!("PULSE_{}", count));
        state.blink_sequence(count, duration, duration);
    }

    /// Blink `code` digit by digit; a digit `d` is shown as `d` blinks
    ///
    /// Blocks for the whole sequence. Leaves the indicator idle and off.
    pub fn indicate_error(&self, code: u32) {
        let timing = self.shared.error_timing;
        let blink = Duration::from_millis(timing.blink_ms);
        let gap = Duration::from_millis(timing.digit_gap_ms);

        let mut state = self.shared.lock();
        state.stop();
        state.mode = None;

        log_warn!("Indicating error code {}", code);
        for digit in decimal_digits(code) {
            state.blink_sequence(u32::from(digit), blink, blink);
            thread::sleep(gap);
        }
    }

    /// Current mode, output level and blink flag
    pub fn status(&self) -> IndicatorStatus {
        let state = self.shared.lock();
        IndicatorStatus {
            mode: state.mode.clone(),
            led_on: state.led_on,
            blinking: state.blink_active,
        }
    }

    /// Active mode name
    pub fn mode(&self) -> Option<String> {
        self.shared.lock().mode.clone()
    }

    /// Check if a pattern is scheduled
    pub fn is_blinking(&self) -> bool {
        self.shared.lock().blink_active
    }

    /// Loaded pattern table
    pub fn patterns(&self) -> &PatternTable {
        &self.shared.patterns
    }

    /// Stop the pattern and terminate the timer worker. Idempotent.
    pub fn shutdown(&self) {
        let handle = {
            let mut state = self.shared.lock();
            state.stop();
            state.mode = None;
            let _ = state.timer.send(TimerCommand::Shutdown);
            state.worker.take()
        };

        if let Some(handle) = handle {
            if handle.join().is_err() {
                log_warn!("Indicator timer worker panicked");
            }
        }
    }
}

/// Most significant digit first; 0 yields a single zero digit
fn decimal_digits(mut code: u32) -> heapless::Vec<u8, 10> {
    let mut digits: heapless::Vec<u8, 10> = heapless::Vec::new();
    loop {
        // u32 has at most 10 decimal digits
        let _ = digits.push((code % 10) as u8);
        code /= 10;
        if code == 0 {
            break;
        }
    }
    digits.reverse();
    digits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<bool>>>);

    impl Recorder {
        fn events(&self) -> Vec<bool> {
            self.0.lock().unwrap().clone()
        }

        fn count_on(&self) -> usize {
            self.events().iter().filter(|on| **on).count()
        }
    }

    impl IndicatorOutput for Recorder {
        fn set(&mut self, on: bool) {
            self.0.lock().unwrap().push(on);
        }
    }

    fn fast_table() -> PatternTable {
        PatternTable::empty()
            .with("FAST", IndicatorPattern::new(0.005, 0.005))
            .and_then(|t| t.with("SLOW", IndicatorPattern::new(1.0, 1.0)))
            .and_then(|t| t.with("ALARM", IndicatorPattern::alert(0.002, 0.002)))
            .and_then(|t| t.with("FLASH", IndicatorPattern::data(0.005, 0.005)))
            .unwrap()
    }

    fn indicator() -> (StatusIndicator, Recorder) {
        let recorder = Recorder::default();
        let config = IndicatorConfig {
            patterns: fast_table(),
            error_timing: ErrorCodeTiming { blink_ms: 1, digit_gap_ms: 1 },
        };
        let indicator = StatusIndicator::with_config(recorder.clone(), config).unwrap();
        (indicator, recorder)
    }

    #[test]
    fn unknown_mode_is_rejected_without_state_change() {
        let (indicator, _) = indicator();
        assert!(indicator.set_mode("SLOW", None));

        assert_eq!(indicator.try_set_mode("DISCO", None), Err(CoreError::UnknownPattern));
        assert!(!indicator.set_mode("DISCO", None));
        assert_eq!(indicator.mode().as_deref(), Some("SLOW"));
        assert!(indicator.is_blinking());
        indicator.shutdown();
    }

    #[test]
    fn blinking_toggles_output() {
        let (indicator, recorder) = indicator();
        assert!(indicator.set_mode("FAST", None));
        thread::sleep(Duration::from_millis(100));

        let events = recorder.events();
        assert!(events.iter().filter(|on| **on).count() >= 2);
        assert!(events.iter().skip(1).any(|on| !*on));
        indicator.shutdown();
    }

    #[test]
    fn first_toggle_is_immediate() {
        let (indicator, _) = indicator();
        assert!(indicator.set_mode("SLOW", None));
        thread::sleep(Duration::from_millis(50));
        assert!(indicator.status().led_on);
        indicator.shutdown();
    }

    #[test]
    fn stop_blink_is_final_and_idempotent() {
        let (indicator, recorder) = indicator();
        assert!(indicator.set_mode("FAST", None));
        thread::sleep(Duration::from_millis(30));

        indicator.stop_blink();
        let after_stop = recorder.events().len();
        assert_eq!(recorder.events().last(), Some(&false));

        thread::sleep(Duration::from_millis(50));
        assert_eq!(recorder.events().len(), after_stop);

        indicator.stop_blink();
        let status = indicator.status();
        assert!(!status.blinking);
        assert!(!status.led_on);
        indicator.shutdown();
    }

    #[test]
    fn data_pattern_suppressed_by_alert() {
        let (indicator, _) = indicator();
        assert!(indicator.set_mode("ALARM", None));

        assert_eq!(indicator.try_set_mode("FLASH", None), Err(CoreError::PatternSuppressed));
        assert!(!indicator.set_mode("FLASH", Some(Duration::from_millis(10))));
        assert_eq!(indicator.mode().as_deref(), Some("ALARM"));
        assert!(indicator.is_blinking());
        indicator.shutdown();
    }

    #[test]
    fn alert_preempts_data_pattern() {
        let (indicator, _) = indicator();
        assert!(indicator.set_mode("FLASH", None));
        assert!(indicator.set_mode("ALARM", None));
        assert_eq!(indicator.mode().as_deref(), Some("ALARM"));

        // Standard requests still replace an alert
        assert!(indicator.set_mode("SLOW", None));
        assert_eq!(indicator.mode().as_deref(), Some("SLOW"));
        indicator.shutdown();
    }

    #[test]
    fn duration_reverts_to_idle() {
        let (indicator, _) = indicator();
        assert!(indicator.set_mode("FAST", Some(Duration::from_millis(30))));
        thread::sleep(Duration::from_millis(150));

        let status = indicator.status();
        assert_eq!(status.mode, None);
        assert!(!status.blinking);
        assert!(!status.led_on);
        indicator.shutdown();
    }

    #[test]
    fn replaced_pattern_does_not_expire_new_one() {
        let (indicator, _) = indicator();
        assert!(indicator.set_mode("FAST", Some(Duration::from_millis(20))));
        assert!(indicator.set_mode("SLOW", None));
        thread::sleep(Duration::from_millis(80));
        assert_eq!(indicator.mode().as_deref(), Some("SLOW"));
        indicator.shutdown();
    }

    #[test]
    fn solid_modes() {
        let (indicator, recorder) = indicator();
        assert!(indicator.set_mode("FAST", None));

        indicator.solid_on();
        let status = indicator.status();
        assert_eq!(status.mode.as_deref(), Some(SOLID_ON_MODE));
        assert!(status.led_on);
        assert!(!status.blinking);

        thread::sleep(Duration::from_millis(30));
        assert_eq!(recorder.events().last(), Some(&true));

        indicator.solid_off();
        let status = indicator.status();
        assert_eq!(status.mode.as_deref(), Some(SOLID_OFF_MODE));
        assert!(!status.led_on);
        indicator.shutdown();
    }

    #[test]
    fn pulse_blocks_for_count_cycles() {
        let (indicator, recorder) = indicator();
        indicator.pulse(3, Duration::from_millis(1));

        // Initial off at construction, stop's off, then three on/off pairs
        assert_eq!(recorder.count_on(), 3);
        assert_eq!(indicator.mode().as_deref(), Some("PULSE_3"));
        assert!(!indicator.status().led_on);
        indicator.shutdown();
    }

    #[test]
    fn error_code_blinks_digit_counts() {
        let (indicator, recorder) = indicator();
        assert!(indicator.set_mode("SLOW", None));
        thread::sleep(Duration::from_millis(20));
        let before = recorder.count_on();

        indicator.indicate_error(203);
        assert_eq!(recorder.count_on() - before, 5);
        assert_eq!(indicator.status(), IndicatorStatus { mode: None, led_on: false, blinking: false });
        indicator.shutdown();
    }

    #[test]
    fn digits_most_significant_first() {
        assert_eq!(decimal_digits(0).as_slice(), &[0]);
        assert_eq!(decimal_digits(407).as_slice(), &[4, 0, 7]);
        assert_eq!(decimal_digits(u32::MAX).len(), 10);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let (indicator, _) = indicator();
        assert!(indicator.set_mode("FAST", None));
        indicator.shutdown();
        indicator.shutdown();

        assert!(!indicator.status().led_on);
        assert_eq!(indicator.try_set_mode("FAST", None), Err(CoreError::WorkerUnavailable));
    }
}
