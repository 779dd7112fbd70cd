use std::collections::VecDeque;

/// Sliding window over accepted event timestamps.
#[derive(Debug)]
pub(crate) struct RateLimiter {
    window_ms: f64,
    max_per_window: usize,
    accepted: VecDeque<f64>,
    throttled: bool,
}

impl RateLimiter {
    pub(crate) fn new(window_ms: f64, max_per_window: usize) -> Self {
        Self {
            window_ms,
            max_per_window,
            accepted: VecDeque::new(),
            throttled: false,
        }
    }

    /// Prunes entries older than `now_ms - window`, then accepts the event if
    /// the window still has room.
    pub(crate) fn try_accept(&mut self, now_ms: f64) -> bool {
        self.prune(now_ms);
        if self.accepted.len() < self.max_per_window {
            self.accepted.push_back(now_ms);
            self.throttled = false;
            true
        } else {
            self.throttled = true;
            false
        }
    }

    /// Returns how many entries were dropped.
    pub(crate) fn prune(&mut self, now_ms: f64) -> usize {
        let cutoff = now_ms - self.window_ms;
        let before = self.accepted.len();
        while self
            .accepted
            .front()
            .is_some_and(|accepted_at| *accepted_at < cutoff)
        {
            self.accepted.pop_front();
        }
        if self.accepted.len() < self.max_per_window {
            self.throttled = false;
        }
        before - self.accepted.len()
    }

    /// True while the last decision was a rejection and nothing has freed
    /// room since.
    pub(crate) fn is_throttled(&self) -> bool {
        self.throttled
    }

    pub(crate) fn len(&self) -> usize {
        self.accepted.len()
    }

    pub(crate) fn clear(&mut self) {
        self.accepted.clear();
        self.throttled = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_once_window_is_full() {
        let mut limiter = RateLimiter::new(1000.0, 3);
        for t in 0..3 {
            assert!(limiter.try_accept(t as f64));
        }

        assert!(!limiter.try_accept(3.0));
        assert!(limiter.is_throttled());
        assert_eq!(limiter.len(), 3);
    }

    #[test]
    fn window_slides_as_time_passes() {
        let mut limiter = RateLimiter::new(1000.0, 2);
        assert!(limiter.try_accept(0.0));
        assert!(limiter.try_accept(500.0));
        assert!(!limiter.try_accept(900.0));

        assert!(limiter.try_accept(1001.0));
        assert!(!limiter.is_throttled());
        assert_eq!(limiter.len(), 2);
    }

    #[test]
    fn prune_without_events_drops_expired_entries() {
        let mut limiter = RateLimiter::new(100.0, 10);
        limiter.try_accept(0.0);
        limiter.try_accept(50.0);

        assert_eq!(limiter.prune(120.0), 1);
        assert_eq!(limiter.len(), 1);
    }
}
