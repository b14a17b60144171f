//! Anti-aliased oscillators using PolyBLEP.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Oscillator shapes a cry can be voiced with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Square,
    Triangle,
    Sawtooth,
}

impl Waveform {
    /// Parse a UI waveform name. Unknown names yield `None`.
    pub fn from_name(s: &str) -> Option<Waveform> {
        match s {
            "sine" => Some(Waveform::Sine),
            "square" => Some(Waveform::Square),
            "triangle" => Some(Waveform::Triangle),
            "sawtooth" | "saw" => Some(Waveform::Sawtooth),
            _ => None,
        }
    }
}

/// A band-limited oscillator. Frequency and detune may be changed between
/// samples; the phase stays continuous.
#[derive(Debug, Clone)]
pub struct Oscillator {
    pub waveform: Waveform,
    pub frequency: f64,
    /// Detune in cents.
    pub detune: f64,
    phase: f64,
    sample_rate: f64,
}

impl Oscillator {
    pub fn new(waveform: Waveform, frequency: f64, sample_rate: f64) -> Self {
        Oscillator {
            waveform,
            frequency,
            detune: 0.0,
            phase: 0.0,
            sample_rate,
        }
    }

    fn phase_inc(&self) -> f64 {
        self.frequency * (2.0_f64).powf(self.detune / 1200.0) / self.sample_rate
    }

    /// Generate the next sample in [-1, 1] (PolyBLEP edges may overshoot slightly).
    pub fn next_sample(&mut self) -> f64 {
        let inc = self.phase_inc();
        let sample = match self.waveform {
            Waveform::Sine => (2.0 * PI * self.phase).sin(),
            Waveform::Sawtooth => 2.0 * self.phase - 1.0 - poly_blep(self.phase, inc),
            Waveform::Square => {
                let naive = if self.phase < 0.5 { 1.0 } else { -1.0 };
                naive + poly_blep(self.phase, inc) - poly_blep((self.phase + 0.5) % 1.0, inc)
            }
            Waveform::Triangle => {
                if self.phase < 0.5 {
                    4.0 * self.phase - 1.0
                } else {
                    3.0 - 4.0 * self.phase
                }
            }
        };

        self.phase += inc;
        if self.phase >= 1.0 {
            self.phase -= self.phase.floor();
        }

        sample
    }
}

/// PolyBLEP correction around a discontinuity at phase 0.
///
/// `t` is the phase [0, 1), `dt` the phase increment per sample.
fn poly_blep(t: f64, dt: f64) -> f64 {
    if t < dt {
        let t = t / dt;
        2.0 * t - t * t - 1.0
    } else if t > 1.0 - dt {
        let t = (t - 1.0) / dt;
        t * t + 2.0 * t + 1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_starts_at_zero() {
        let mut osc = Oscillator::new(Waveform::Sine, 440.0, 44100.0);
        let s = osc.next_sample();
        assert!(s.abs() < 1e-10, "Sine should start near 0, got {s}");
    }

    #[test]
    fn all_shapes_stay_bounded() {
        for wf in [Waveform::Sine, Waveform::Square, Waveform::Triangle, Waveform::Sawtooth] {
            let mut osc = Oscillator::new(wf, 659.25, 44100.0);
            for _ in 0..44100 {
                let s = osc.next_sample();
                assert!(s.abs() <= 1.5, "{wf:?} out of range: {s}");
            }
        }
    }

    #[test]
    fn detune_octave_doubles_increment() {
        let plain = Oscillator::new(Waveform::Sine, 440.0, 44100.0);
        let mut up = Oscillator::new(Waveform::Sine, 440.0, 44100.0);
        up.detune = 1200.0;
        assert!((up.phase_inc() - 2.0 * plain.phase_inc()).abs() < 1e-12);
    }

    #[test]
    fn waveform_names() {
        assert_eq!(Waveform::from_name("saw"), Some(Waveform::Sawtooth));
        assert_eq!(Waveform::from_name("triangle"), Some(Waveform::Triangle));
        assert_eq!(Waveform::from_name("noise"), None);
        let wf: Waveform = serde_json::from_str("\"square\"").unwrap();
        assert_eq!(wf, Waveform::Square);
    }
}
