//! Echo: stereo feedback delay used as a per-voice send.

/// Longest echo, reached at echo amount 100.
pub const MAX_DELAY_SECONDS: f64 = 0.5;
/// Feedback never exceeds this, so the loop always decays.
pub const MAX_FEEDBACK: f64 = 0.7;
/// Level of the delayed signal added next to the untouched dry signal.
pub const WET_SEND: f64 = 0.6;

/// A stereo feedback delay line.
///
/// `process` returns only the wet contribution; the caller keeps the dry
/// signal and adds the two.
#[derive(Debug, Clone)]
pub struct Echo {
    buffer_l: Vec<f64>,
    buffer_r: Vec<f64>,
    write_pos: usize,
    delay_samples: usize,
    /// Delay time in seconds.
    pub delay_time: f64,
    /// Feedback gain in [0, MAX_FEEDBACK].
    pub feedback: f64,
}

impl Echo {
    /// Build the echo for a UI echo amount in [0, 100]. Amount 0 means no echo
    /// stage at all.
    pub fn from_amount(amount: u8, sample_rate: f64) -> Option<Self> {
        if amount == 0 {
            return None;
        }
        let amount = f64::from(amount.min(100)) / 100.0;
        Some(Self::with_params(
            sample_rate,
            amount * MAX_DELAY_SECONDS,
            amount.min(MAX_FEEDBACK),
        ))
    }

    pub fn with_params(sample_rate: f64, delay_time: f64, feedback: f64) -> Self {
        let delay_time = delay_time.clamp(0.0, MAX_DELAY_SECONDS);
        let delay_samples = ((delay_time * sample_rate).round() as usize).max(1);
        Echo {
            buffer_l: vec![0.0; delay_samples],
            buffer_r: vec![0.0; delay_samples],
            write_pos: 0,
            delay_samples,
            delay_time,
            feedback: feedback.clamp(0.0, MAX_FEEDBACK),
        }
    }

    /// Feed one stereo frame, returning the wet frame.
    #[inline]
    pub fn process(&mut self, left: f64, right: f64) -> (f64, f64) {
        // The buffer is exactly one delay long, so the slot about to be
        // overwritten holds the frame from `delay_samples` ago.
        let delayed_l = self.buffer_l[self.write_pos];
        let delayed_r = self.buffer_r[self.write_pos];

        self.buffer_l[self.write_pos] = left + delayed_l * self.feedback;
        self.buffer_r[self.write_pos] = right + delayed_r * self.feedback;
        self.write_pos = (self.write_pos + 1) % self.delay_samples;

        (delayed_l * WET_SEND, delayed_r * WET_SEND)
    }

    /// Peak absolute value still circulating in the line.
    pub fn residual(&self) -> f64 {
        self.buffer_l
            .iter()
            .chain(self.buffer_r.iter())
            .fold(0.0_f64, |m, &s| m.max(s.abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_amount_has_no_stage() {
        assert!(Echo::from_amount(0, 44100.0).is_none());
    }

    #[test]
    fn amount_maps_to_time_and_feedback() {
        let half = Echo::from_amount(50, 44100.0).unwrap();
        assert!((half.delay_time - 0.25).abs() < 1e-12);
        assert!((half.feedback - 0.5).abs() < 1e-12);

        let full = Echo::from_amount(100, 44100.0).unwrap();
        assert!((full.delay_time - 0.5).abs() < 1e-12);
        assert!((full.feedback - MAX_FEEDBACK).abs() < 1e-12);
    }

    #[test]
    fn impulse_returns_after_delay() {
        let sample_rate = 1000.0;
        let mut echo = Echo::with_params(sample_rate, 0.01, 0.5);

        let (first, _) = echo.process(1.0, 1.0);
        assert_eq!(first, 0.0);
        for _ in 1..10 {
            let (l, _) = echo.process(0.0, 0.0);
            assert!(l.abs() < 1e-12);
        }
        let (l, r) = echo.process(0.0, 0.0);
        assert!((l - WET_SEND).abs() < 1e-12);
        assert!((r - WET_SEND).abs() < 1e-12);

        for _ in 1..10 {
            echo.process(0.0, 0.0);
        }
        let (second, _) = echo.process(0.0, 0.0);
        assert!((second - 0.5 * WET_SEND).abs() < 1e-12);
    }

    #[test]
    fn full_echo_decays() {
        let mut echo = Echo::from_amount(100, 8000.0).unwrap();
        echo.process(1.0, 1.0);
        let mut peak = 0.0_f64;
        for _ in 0..8000 * 20 {
            let (l, _) = echo.process(0.0, 0.0);
            peak = peak.max(l.abs());
        }
        assert!(peak <= WET_SEND + 1e-12, "echo should never grow, peak {peak}");
        assert!(echo.residual() < 1e-3, "echo should die away, residual {}", echo.residual());
    }
}
