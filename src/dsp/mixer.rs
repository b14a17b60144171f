//! Master bus: sums every voice and the noise texture, applies the global
//! volume and soft clipping.

use std::f64::consts::FRAC_PI_2;

/// A linear ramp toward a target value, one step per sample.
#[derive(Debug, Clone)]
pub struct GainRamp {
    current: f64,
    target: f64,
    step: f64,
    remaining: usize,
}

impl GainRamp {
    pub fn new(value: f64) -> Self {
        GainRamp {
            current: value,
            target: value,
            step: 0.0,
            remaining: 0,
        }
    }

    /// Ramp from the current value to `target` over `samples` samples.
    pub fn ramp_to(&mut self, target: f64, samples: usize) {
        self.target = target;
        if samples == 0 {
            self.current = target;
            self.remaining = 0;
            self.step = 0.0;
        } else {
            self.step = (target - self.current) / samples as f64;
            self.remaining = samples;
        }
    }

    #[inline]
    pub fn next_value(&mut self) -> f64 {
        if self.remaining > 0 {
            self.current += self.step;
            self.remaining -= 1;
            if self.remaining == 0 {
                self.current = self.target;
            }
        }
        self.current
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn target(&self) -> f64 {
        self.target
    }
}

/// The single shared mixing destination.
#[derive(Debug, Clone)]
pub struct MasterBus {
    gain: GainRamp,
    ramp_samples: usize,
}

impl MasterBus {
    pub fn new(volume: f64, ramp_seconds: f64, sample_rate: f64) -> Self {
        MasterBus {
            gain: GainRamp::new(volume.clamp(0.0, 1.0)),
            ramp_samples: (ramp_seconds.max(0.0) * sample_rate) as usize,
        }
    }

    /// Ramp the bus gain to `volume` (clamped to [0, 1]).
    pub fn set_volume(&mut self, volume: f64) {
        self.gain.ramp_to(volume.clamp(0.0, 1.0), self.ramp_samples);
    }

    /// The volume the bus is at or heading to.
    pub fn volume(&self) -> f64 {
        self.gain.target()
    }

    pub fn current_gain(&self) -> f64 {
        self.gain.current()
    }

    /// Apply bus gain and soft clipping to one summed stereo frame.
    #[inline]
    pub fn process(&mut self, left: f64, right: f64) -> (f64, f64) {
        let g = self.gain.next_value();
        (soft_clip(left * g), soft_clip(right * g))
    }
}

/// Equal-power gains for a mono source at `pan` in [-1, 1]
/// (StereoPannerNode law).
pub fn equal_power_pan(pan: f64) -> (f64, f64) {
    let x = (pan.clamp(-1.0, 1.0) + 1.0) / 2.0;
    ((x * FRAC_PI_2).cos(), (x * FRAC_PI_2).sin())
}

/// Soft clipper using tanh to prevent harsh digital clipping.
fn soft_clip(x: f64) -> f64 {
    x.tanh()
}
