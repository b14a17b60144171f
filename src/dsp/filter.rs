//! Biquad low-pass filter: WebAudio BiquadFilterNode coefficients.

use std::f64::consts::PI;

/// Butterworth Q.
pub const DEFAULT_Q: f64 = 0.707;

/// A 2nd-order low-pass IIR filter.
///
/// Direct Form II Transposed; coefficient formulas from the Audio EQ Cookbook
/// (Robert Bristow-Johnson). The cutoff can be changed while running; new
/// coefficients take effect on the next sample.
#[derive(Debug, Clone)]
pub struct LowpassFilter {
    cutoff: f64,
    q: f64,

    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,

    z1: f64,
    z2: f64,

    sample_rate: f64,
}

impl LowpassFilter {
    pub fn new(cutoff: f64, sample_rate: f64) -> Self {
        let mut f = LowpassFilter {
            cutoff,
            q: DEFAULT_Q,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
            sample_rate,
        };
        f.set_cutoff(cutoff);
        f
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    /// Set the cutoff, clamped just below Nyquist.
    pub fn set_cutoff(&mut self, cutoff: f64) {
        let nyquist = self.sample_rate / 2.0;
        self.cutoff = cutoff.clamp(10.0, nyquist * 0.99);

        let w0 = 2.0 * PI * self.cutoff / self.sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * self.q);

        let b1 = 1.0 - cos_w0;
        let b0 = b1 / 2.0;
        let a0 = 1.0 + alpha;

        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b0 / a0;
        self.a1 = -2.0 * cos_w0 / a0;
        self.a2 = (1.0 - alpha) / a0;
    }

    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let output = self.b0 * input + self.z1;
        self.z1 = self.b1 * input - self.a1 * output + self.z2;
        self.z2 = self.b2 * input - self.a2 * output;
        output
    }

    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_dc() {
        let mut f = LowpassFilter::new(5000.0, 44100.0);
        let mut output = 0.0;
        for _ in 0..1000 {
            output = f.process(1.0);
        }
        assert!((output - 1.0).abs() < 0.001, "Lowpass should pass DC, got {output}");
    }

    #[test]
    fn attenuates_above_cutoff() {
        let mut f = LowpassFilter::new(200.0, 44100.0);
        let freq = 10000.0;
        let mut max_out = 0.0_f64;
        for i in 0..4410 {
            let t = i as f64 / 44100.0;
            let out = f.process((2.0 * PI * freq * t).sin());
            if i > 1000 {
                max_out = max_out.max(out.abs());
            }
        }
        assert!(max_out < 0.01, "Lowpass@200Hz should strongly attenuate 10kHz, got {max_out}");
    }

    #[test]
    fn cutoff_clamped_below_nyquist() {
        let mut f = LowpassFilter::new(20000.0, 22050.0);
        assert!(f.cutoff() < 11025.0);
        for i in 0..10000 {
            let input = if i % 100 == 0 { 1.0 } else { 0.0 };
            assert!(f.process(input).is_finite(), "not finite at sample {i}");
        }
    }
}
