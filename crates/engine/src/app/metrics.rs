use std::collections::VecDeque;

use serde::Serialize;

pub const DEFAULT_SAMPLE_WINDOW: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PerformanceSnapshot {
    pub average_fps: f64,
    pub min_fps: f64,
    pub max_fps: f64,
    pub sample_count: usize,
    pub last_frame_ms: f64,
}

/// Rolling frame-rate sampler. The average covers the retained window only;
/// min and max are lifetime extrema until [`PerformanceMonitor::reset`].
#[derive(Debug)]
pub struct PerformanceMonitor {
    window_len: usize,
    samples_fps: VecDeque<f64>,
    min_fps: f64,
    max_fps: f64,
    last_frame_ms: f64,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_WINDOW)
    }
}

impl PerformanceMonitor {
    pub fn new(window_len: usize) -> Self {
        let window_len = window_len.max(1);
        Self {
            window_len,
            samples_fps: VecDeque::with_capacity(window_len),
            min_fps: f64::INFINITY,
            max_fps: 0.0,
            last_frame_ms: 0.0,
        }
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    /// Non-positive and non-finite deltas are ignored.
    pub fn record_frame(&mut self, delta_ms: f64) {
        if !delta_ms.is_finite() || delta_ms <= 0.0 {
            return;
        }

        let fps = 1000.0 / delta_ms;
        self.last_frame_ms = delta_ms;
        self.samples_fps.push_back(fps);
        if self.samples_fps.len() > self.window_len {
            self.samples_fps.pop_front();
        }

        self.min_fps = self.min_fps.min(fps);
        self.max_fps = self.max_fps.max(fps);
    }

    pub fn metrics(&self) -> PerformanceSnapshot {
        let sample_count = self.samples_fps.len();
        let average_fps = if sample_count == 0 {
            0.0
        } else {
            self.samples_fps.iter().sum::<f64>() / sample_count as f64
        };

        PerformanceSnapshot {
            average_fps,
            min_fps: self.min_fps,
            max_fps: self.max_fps,
            sample_count,
            last_frame_ms: self.last_frame_ms,
        }
    }

    pub fn reset(&mut self) {
        self.samples_fps.clear();
        self.min_fps = f64::INFINITY;
        self.max_fps = 0.0;
        self.last_frame_ms = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_monitor_reports_initial_extrema() {
        let monitor = PerformanceMonitor::default();
        let snapshot = monitor.metrics();

        assert_eq!(snapshot.sample_count, 0);
        assert_eq!(snapshot.average_fps, 0.0);
        assert_eq!(snapshot.min_fps, f64::INFINITY);
        assert_eq!(snapshot.max_fps, 0.0);
    }

    #[test]
    fn invalid_deltas_are_ignored() {
        let mut monitor = PerformanceMonitor::default();
        monitor.record_frame(0.0);
        monitor.record_frame(-4.0);
        monitor.record_frame(f64::NAN);
        monitor.record_frame(f64::INFINITY);

        assert_eq!(monitor.metrics().sample_count, 0);
    }

    #[test]
    fn partial_window_average_uses_current_sample_count() {
        let mut monitor = PerformanceMonitor::default();
        monitor.record_frame(10.0);
        monitor.record_frame(20.0);
        let snapshot = monitor.metrics();

        assert_eq!(snapshot.sample_count, 2);
        assert!((snapshot.average_fps - 75.0).abs() < 1e-9);
        assert!((snapshot.min_fps - 50.0).abs() < 1e-9);
        assert!((snapshot.max_fps - 100.0).abs() < 1e-9);
        assert_eq!(snapshot.last_frame_ms, 20.0);
    }

    #[test]
    fn window_evicts_oldest_but_extrema_persist() {
        let mut monitor = PerformanceMonitor::new(3);
        monitor.record_frame(5.0);
        for _ in 0..3 {
            monitor.record_frame(20.0);
        }
        let snapshot = monitor.metrics();

        assert_eq!(snapshot.sample_count, 3);
        assert!((snapshot.average_fps - 50.0).abs() < 1e-9);
        assert!((snapshot.max_fps - 200.0).abs() < 1e-9);
        assert!((snapshot.min_fps - 50.0).abs() < 1e-9);
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut monitor = PerformanceMonitor::new(4);
        monitor.record_frame(16.0);
        monitor.reset();
        let snapshot = monitor.metrics();

        assert_eq!(snapshot.sample_count, 0);
        assert_eq!(snapshot.min_fps, f64::INFINITY);
        assert_eq!(snapshot.max_fps, 0.0);
        assert_eq!(monitor.window_len(), 4);
    }

    #[test]
    fn average_is_exact_after_long_sessions() {
        let mut monitor = PerformanceMonitor::default();
        for frame in 0..100_000u32 {
            monitor.record_frame(if frame % 2 == 0 { 1.0 } else { 3.0 });
        }
        for _ in 0..DEFAULT_SAMPLE_WINDOW {
            monitor.record_frame(20.0);
        }

        let snapshot = monitor.metrics();

        assert_eq!(snapshot.sample_count, DEFAULT_SAMPLE_WINDOW);
        assert_eq!(snapshot.average_fps, 50.0);
        assert_eq!(snapshot.max_fps, 1000.0);
    }
}
