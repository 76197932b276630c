use std::time::{Duration, Instant};

/// Root-mean-square level of one amplitude window. Samples are expected in
/// `-1.0..=1.0`; an empty window reads as silence.
pub fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_of_squares: f32 = samples.iter().map(|sample| sample * sample).sum();
    (sum_of_squares / samples.len() as f32).sqrt()
}

/// Pending auto-stop timer driven by sampled energy.
///
/// The first quiet window arms a deadline `duration` ahead; any window at or
/// above the threshold disarms it. The deadline can also be checked between
/// samples with [`SilenceDetector::poll`].
#[derive(Debug, Clone)]
pub struct SilenceDetector {
    threshold: f32,
    duration: Duration,
    deadline: Option<Instant>,
}

impl SilenceDetector {
    pub fn new(threshold: f32, duration: Duration) -> Self {
        Self {
            threshold,
            duration,
            deadline: None,
        }
    }

    /// Feeds one energy reading; returns true once silence has lasted the
    /// full duration.
    pub fn observe(&mut self, energy: f32, now: Instant) -> bool {
        if energy >= self.threshold {
            self.deadline = None;
            return false;
        }
        let deadline = *self.deadline.get_or_insert(now + self.duration);
        now >= deadline
    }

    pub fn poll(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_constant_signal_is_its_magnitude() {
        assert_eq!(rms_energy(&[]), 0.0);
        assert!((rms_energy(&[0.5, -0.5, 0.5, -0.5]) - 0.5).abs() < f32::EPSILON);
        assert!(rms_energy(&[0.01, -0.02, 0.015]) < 0.07);
    }

    #[test]
    fn sustained_silence_reaches_the_deadline() {
        let start = Instant::now();
        let mut detector = SilenceDetector::new(0.07, Duration::from_millis(2000));

        assert!(!detector.observe(0.01, start));
        assert!(detector.is_armed());
        assert!(!detector.observe(0.02, start + Duration::from_millis(1999)));
        assert!(detector.observe(0.02, start + Duration::from_millis(2000)));
    }

    #[test]
    fn loud_window_disarms_the_timer() {
        let start = Instant::now();
        let mut detector = SilenceDetector::new(0.07, Duration::from_millis(2000));

        detector.observe(0.01, start);
        assert!(!detector.observe(0.3, start + Duration::from_millis(1500)));
        assert!(!detector.is_armed());
        assert!(!detector.poll(start + Duration::from_millis(2500)));

        // Silence restarts the full window from the next quiet sample.
        assert!(!detector.observe(0.01, start + Duration::from_millis(1600)));
        assert!(!detector.poll(start + Duration::from_millis(3599)));
        assert!(detector.poll(start + Duration::from_millis(3600)));
    }
}
