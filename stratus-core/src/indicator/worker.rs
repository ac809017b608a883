//! Timer worker
//!
//! One thread per indicator replaces the periodic and one-shot hardware
//! timers. It owns no indicator state: every deadline becomes a call into
//! `Shared` under the indicator lock, tagged with the generation the schedule
//! was armed with. A stale generation means the pattern was replaced or
//! stopped while the deadline was pending, and the event is dropped.

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Weak;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::Shared;

/// Messages from the indicator to its worker
#[derive(Debug)]
pub(super) enum TimerCommand {
    /// Start toggling; replaces any armed schedule
    Arm {
        generation: u64,
        on: Duration,
        period: Duration,
        expires_at: Option<Instant>,
    },
    /// Drop the armed schedule
    Disarm,
    /// Exit the worker
    Shutdown,
}

/// Deadlines of the active pattern
struct Schedule {
    generation: u64,
    on: Duration,
    period: Duration,
    next_toggle: Instant,
    off_at: Option<Instant>,
    expires_at: Option<Instant>,
}

impl Schedule {
    fn next_deadline(&self) -> Instant {
        [Some(self.next_toggle), self.off_at, self.expires_at]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(self.next_toggle)
    }

    /// Run every due deadline. Returns false once the schedule is finished
    /// or no longer current.
    fn fire(&mut self, shared: &Shared, now: Instant) -> bool {
        if self.expires_at.is_some_and(|at| at <= now) {
            shared.on_expiry(self.generation);
            return false;
        }

        if self.off_at.is_some_and(|at| at <= now) {
            self.off_at = None;
            if !shared.on_off_timer(self.generation) {
                return false;
            }
        }

        if self.next_toggle <= now {
            match shared.on_toggle(self.generation) {
                Some(true) => self.off_at = Some(now + self.on),
                Some(false) => {}
                None => return false,
            }

            self.next_toggle += self.period;
            if self.next_toggle <= now {
                // Fell behind (lock held by a pulse); resync instead of bursting
                self.next_toggle = now + self.period;
            }
        }

        true
    }
}

pub(super) fn spawn(
    shared: Weak<Shared>,
    commands: Receiver<TimerCommand>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("indicator-timer".into())
        .spawn(move || run(shared, commands))
}

fn run(shared: Weak<Shared>, commands: Receiver<TimerCommand>) {
    let mut schedule: Option<Schedule> = None;

    loop {
        let command = match schedule.as_ref().map(Schedule::next_deadline) {
            None => match commands.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            },
            Some(deadline) => {
                let wait = deadline.saturating_duration_since(Instant::now());
                match commands.recv_timeout(wait) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        };

        match command {
            Some(TimerCommand::Arm { generation, on, period, expires_at }) => {
                // First toggle is due immediately
                schedule = Some(Schedule {
                    generation,
                    on,
                    period,
                    next_toggle: Instant::now(),
                    off_at: None,
                    expires_at,
                });
            }
            Some(TimerCommand::Disarm) => schedule = None,
            Some(TimerCommand::Shutdown) => break,
            None => {
                let Some(shared) = shared.upgrade() else {
                    break;
                };
                let keep = schedule
                    .as_mut()
                    .is_some_and(|s| s.fire(&shared, Instant::now()));
                if !keep {
                    schedule = None;
                }
            }
        }
    }

    log_debug!("Indicator timer worker exiting");
}
