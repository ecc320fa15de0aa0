use std::time::{Duration, Instant};

/// Interval the player window refreshes its progress readout at.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// A repeating schedule that the event loop polls. Nothing fires unless the
/// timer is armed, and `cancel` always returns it to the disarmed state.
#[derive(Debug, Clone)]
pub struct ProgressTimer {
    interval: Duration,
    next_due: Option<Instant>,
}

impl ProgressTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            next_due: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_armed(&self) -> bool {
        self.next_due.is_some()
    }

    /// Starts (or restarts) the schedule; the first tick is one interval out.
    pub fn arm(&mut self, now: Instant) {
        self.next_due = Some(now + self.interval);
    }

    pub fn cancel(&mut self) {
        self.next_due = None;
    }

    /// Returns true when a tick is due at `now`. Missed ticks collapse into
    /// one; the next deadline is scheduled from `now`.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(due) if now >= due => {
                self.next_due = Some(now + self.interval);
                true
            }
            _ => false,
        }
    }
}

impl Default for ProgressTimer {
    fn default() -> Self {
        Self::new(PROGRESS_INTERVAL)
    }
}
