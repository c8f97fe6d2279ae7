//! Countdown clock for timed sessions.
//!
//! The timer only counts; it has no notion of wall-clock time. Whoever owns it
//! calls `tick` once per second and decides whether a tick should count.

/// Lifecycle of a countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Stopped,
    Running,
    Paused,
    /// Terminal. No transition leaves this state.
    Expired,
}

/// Result of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTick {
    /// Not running; nothing changed.
    Inactive,
    Remaining(u32),
    /// This tick brought the countdown to zero.
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownTimer {
    state: TimerState,
    remaining_secs: Option<u32>,
}

impl CountdownTimer {
    /// `limit_secs = None` builds an unlimited timer that never starts.
    #[must_use]
    pub fn new(limit_secs: Option<u32>) -> Self {
        Self {
            state: TimerState::Stopped,
            remaining_secs: limit_secs,
        }
    }

    #[must_use]
    pub fn state(&self) -> TimerState {
        self.state
    }

    #[must_use]
    pub fn remaining_secs(&self) -> Option<u32> {
        self.remaining_secs
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.state == TimerState::Expired
    }

    /// `stopped -> running`, only when a limit is set. Returns whether it started.
    pub fn start(&mut self) -> bool {
        if self.state != TimerState::Stopped {
            return false;
        }
        match self.remaining_secs {
            Some(0) => {
                self.state = TimerState::Expired;
                false
            }
            Some(_) => {
                self.state = TimerState::Running;
                true
            }
            None => false,
        }
    }

    /// `running -> paused`. Remaining time is kept. No-op in any other state.
    pub fn pause(&mut self) -> bool {
        if self.state == TimerState::Running {
            self.state = TimerState::Paused;
            return true;
        }
        false
    }

    /// `paused -> running`. No-op in any other state.
    pub fn resume(&mut self) -> bool {
        if self.state == TimerState::Paused {
            self.state = TimerState::Running;
            return true;
        }
        false
    }

    pub fn tick(&mut self) -> TimerTick {
        if self.state != TimerState::Running {
            return TimerTick::Inactive;
        }
        let Some(remaining) = self.remaining_secs.as_mut() else {
            return TimerTick::Inactive;
        };

        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            self.state = TimerState::Expired;
            TimerTick::Expired
        } else {
            TimerTick::Remaining(*remaining)
        }
    }
}
