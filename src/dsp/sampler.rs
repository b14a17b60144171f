//! Recorded-sample playback.
//!
//! Plays a decoded recording at a fixed rate via linear interpolation
//! resampling, optionally looping the whole buffer.

use std::sync::Arc;

/// A mono sample buffer loaded into memory.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    pub data: Vec<f64>,
    /// Native sample rate of the audio.
    pub sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(data: Vec<f64>, sample_rate: u32) -> Self {
        SampleBuffer { data, sample_rate }
    }

    /// Create from 16-bit signed PCM data.
    pub fn from_i16(pcm: &[i16], sample_rate: u32) -> Self {
        let data = pcm.iter().map(|&s| f64::from(s) / 32768.0).collect();
        SampleBuffer { data, sample_rate }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Length in seconds at the native rate.
    pub fn duration(&self) -> f64 {
        self.data.len() as f64 / f64::from(self.sample_rate.max(1))
    }

    /// Read a sample with linear interpolation at a fractional position.
    /// `wrap` interpolates the last sample toward the first.
    pub fn read_interpolated(&self, position: f64, wrap: bool) -> f64 {
        if self.data.is_empty() || position < 0.0 {
            return 0.0;
        }
        let idx = position as usize;
        if idx >= self.data.len() {
            return 0.0;
        }
        let next = if idx + 1 < self.data.len() {
            self.data[idx + 1]
        } else if wrap {
            self.data[0]
        } else {
            return self.data[idx];
        };
        let frac = position - idx as f64;
        self.data[idx] * (1.0 - frac) + next * frac
    }
}

/// A playback source reading one buffer at a fixed rate.
#[derive(Debug, Clone)]
pub struct SamplePlayer {
    buffer: Arc<SampleBuffer>,
    position: f64,
    /// Buffer samples advanced per output sample.
    step: f64,
    looping: bool,
    finished: bool,
}

impl SamplePlayer {
    /// `playback_rate` 1.0 plays at original pitch and speed.
    pub fn new(buffer: Arc<SampleBuffer>, playback_rate: f64, looping: bool, output_sample_rate: f64) -> Self {
        let sr_ratio = f64::from(buffer.sample_rate) / output_sample_rate;
        let step = playback_rate * sr_ratio;
        // A player that cannot advance would hold its first sample forever.
        let finished = buffer.is_empty() || !(step.is_finite() && step > 0.0);
        SamplePlayer {
            buffer,
            position: 0.0,
            step,
            looping,
            finished,
        }
    }

    pub fn buffer(&self) -> &Arc<SampleBuffer> {
        &self.buffer
    }

    /// Wall duration of one pass through the buffer at this rate, in seconds.
    pub fn pass_duration(&self, output_sample_rate: f64) -> f64 {
        if self.finished || self.step <= 0.0 {
            return 0.0;
        }
        self.buffer.len() as f64 / self.step / output_sample_rate
    }

    #[inline]
    pub fn next_sample(&mut self) -> f64 {
        if self.finished {
            return 0.0;
        }
        let sample = self.buffer.read_interpolated(self.position, self.looping);
        self.position += self.step;

        let len = self.buffer.len() as f64;
        if self.position >= len {
            if self.looping {
                self.position %= len;
            } else {
                self.finished = true;
            }
        }
        sample
    }

    /// Halt playback. Stopping twice is harmless.
    pub fn stop(&mut self) {
        self.finished = true;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}
