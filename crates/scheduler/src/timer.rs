//! Poll-driven timers.
//!
//! The viewer core owns no threads, so its debounce and periodic work is
//! driven by the host calling `tick` with the current instant. These timers
//! do the deadline arithmetic; tests drive them with synthetic instants
//! instead of sleeping.

use std::time::{Duration, Instant};

/// Deadline-based debouncer.
///
/// Each `trigger` pushes the deadline out by the full delay; the pending
/// action fires only after the triggers go quiet.
///
/// # Example
///
/// ```
/// use folio_scheduler::Debouncer;
/// use std::time::{Duration, Instant};
///
/// let mut debounce = Debouncer::new(Duration::from_millis(50));
/// let now = Instant::now();
///
/// debounce.trigger(now);
/// assert!(!debounce.fire_if_due(now + Duration::from_millis(20)));
/// assert!(debounce.fire_if_due(now + Duration::from_millis(50)));
/// ```
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, deadline: None }
    }

    /// Arm (or re-arm) the debounce. The deadline becomes `now + delay`.
    pub fn trigger(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// Fire once if the deadline has passed. Firing disarms the debounce.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Disarm without firing.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }
}

/// Fixed-period repeating timer for timer-driven work such as the render
/// timeout sweep.
#[derive(Debug, Clone)]
pub struct Interval {
    period: Duration,
    next: Option<Instant>,
}

impl Interval {
    pub fn new(period: Duration) -> Self {
        Self { period, next: None }
    }

    /// Returns `true` at most once per period. The first call establishes
    /// the schedule without firing.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.next {
            None => {
                self.next = Some(now + self.period);
                false
            }
            Some(next) if now >= next => {
                self.next = Some(now + self.period);
                true
            }
            Some(_) => false,
        }
    }

    pub fn reset(&mut self) {
        self.next = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debouncer_fires_after_quiet_period() {
        let mut debounce = Debouncer::new(Duration::from_millis(50));
        let start = Instant::now();

        debounce.trigger(start);
        assert!(debounce.is_pending());
        assert!(!debounce.fire_if_due(start + Duration::from_millis(49)));
        assert!(debounce.fire_if_due(start + Duration::from_millis(50)));
        assert!(!debounce.is_pending());
    }

    #[test]
    fn test_debouncer_retrigger_extends_deadline() {
        let mut debounce = Debouncer::new(Duration::from_millis(50));
        let start = Instant::now();

        debounce.trigger(start);
        debounce.trigger(start + Duration::from_millis(40));

        assert!(!debounce.fire_if_due(start + Duration::from_millis(60)));
        assert!(debounce.fire_if_due(start + Duration::from_millis(90)));
    }

    #[test]
    fn test_debouncer_fires_once_per_trigger() {
        let mut debounce = Debouncer::new(Duration::from_millis(10));
        let start = Instant::now();

        debounce.trigger(start);
        let due = start + Duration::from_millis(10);
        assert!(debounce.fire_if_due(due));
        assert!(!debounce.fire_if_due(due));
    }

    #[test]
    fn test_debouncer_cancel() {
        let mut debounce = Debouncer::new(Duration::from_millis(10));
        let start = Instant::now();

        debounce.trigger(start);
        debounce.cancel();
        assert!(!debounce.is_pending());
        assert!(!debounce.fire_if_due(start + Duration::from_secs(1)));
    }

    #[test]
    fn test_interval_fires_once_per_period() {
        let mut interval = Interval::new(Duration::from_secs(5));
        let start = Instant::now();

        assert!(!interval.tick(start)); // establishes the schedule
        assert!(!interval.tick(start + Duration::from_secs(4)));
        assert!(interval.tick(start + Duration::from_secs(5)));
        assert!(!interval.tick(start + Duration::from_secs(6)));
        assert!(interval.tick(start + Duration::from_secs(10)));
    }

    #[test]
    fn test_interval_reset() {
        let mut interval = Interval::new(Duration::from_secs(5));
        let start = Instant::now();

        interval.tick(start);
        interval.reset();
        assert!(!interval.tick(start + Duration::from_secs(10)));
    }
}
