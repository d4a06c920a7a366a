//! Minimum-spacing throttle for preview redraws.
//!
//! A burst of events redraws at most once per interval, and the last event of
//! the burst is never lost: it stays pending until [`Throttle::poll`] releases
//! it on a later tick.

use std::time::{Duration, Instant};

/// ~60 Hz.
pub const DEFAULT_PREVIEW_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last_run: Option<Instant>,
    pending: bool,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_run: None,
            pending: false,
        }
    }

    /// Registers an event. Returns `true` when the caller should redraw now;
    /// otherwise the redraw is deferred to [`Throttle::poll`].
    pub fn hit(&mut self, now: Instant) -> bool {
        if self.ready(now) {
            self.last_run = Some(now);
            self.pending = false;
            true
        } else {
            self.pending = true;
            false
        }
    }

    /// Releases a deferred redraw once the interval has elapsed.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.pending && self.ready(now) {
            self.last_run = Some(now);
            self.pending = false;
            true
        } else {
            false
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn reset(&mut self) {
        self.last_run = None;
        self.pending = false;
    }

    fn ready(&self, now: Instant) -> bool {
        self.last_run
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval)
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(DEFAULT_PREVIEW_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_event_runs_immediately() {
        let mut t = Throttle::default();
        assert!(t.hit(Instant::now()));
    }

    #[test]
    fn burst_keeps_trailing_event() {
        let start = Instant::now();
        let mut t = Throttle::new(Duration::from_millis(16));
        assert!(t.hit(start));
        assert!(!t.hit(start + Duration::from_millis(4)));
        assert!(!t.hit(start + Duration::from_millis(8)));
        assert!(t.is_pending());
        assert!(!t.poll(start + Duration::from_millis(10)), "interval not elapsed");
        assert!(t.poll(start + Duration::from_millis(16)), "trailing redraw released");
        assert!(!t.poll(start + Duration::from_millis(40)), "released only once");
    }

    #[test]
    fn reset_forgets_pending_work() {
        let start = Instant::now();
        let mut t = Throttle::default();
        t.hit(start);
        t.hit(start);
        t.reset();
        assert!(!t.poll(start + Duration::from_secs(1)));
        assert!(t.hit(start));
    }
}
