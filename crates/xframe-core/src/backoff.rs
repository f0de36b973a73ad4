//! Ready retry schedule
//!
//! The frame announces readiness once on mount and keeps repeating it until
//! the parent answers. Delays double from `initial_ms` and are capped at
//! `max_ms`: with the defaults the retries fire 1s, 3s, 7s, 15s, 25s, 35s...
//! after mount.

#[derive(Clone, Debug)]
pub struct ReadyBackoff {
    initial_ms: u64,
    max_ms: u64,
    delay_ms: u64,
    deadline: Option<u64>,
    attempts: u32,
}

impl ReadyBackoff {
    pub fn new(initial_ms: u64, max_ms: u64) -> Self {
        Self {
            initial_ms,
            max_ms,
            delay_ms: initial_ms,
            deadline: None,
            attempts: 0,
        }
    }

    /// Arm the schedule; the first retry is due `initial_ms` after `now`.
    pub fn start(&mut self, now: u64) {
        self.delay_ms = self.initial_ms.min(self.max_ms);
        self.deadline = Some(now.saturating_add(self.delay_ms));
        self.attempts = 0;
    }

    pub fn stop(&mut self) {
        self.deadline = None;
    }

    pub fn is_active(&self) -> bool {
        self.deadline.is_some()
    }

    /// True when a retry is due. Schedules the next one.
    pub fn poll(&mut self, now: u64) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.attempts += 1;
                self.delay_ms = self.delay_ms.saturating_mul(2).min(self.max_ms);
                self.deadline = Some(now.saturating_add(self.delay_ms));
                true
            }
            _ => false,
        }
    }

    /// Absolute time of the next retry
    pub fn next_deadline(&self) -> Option<u64> {
        self.deadline
    }

    /// Retries fired since `start`
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
