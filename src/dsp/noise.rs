//! Shared background crackle.
//!
//! One pre-computed two second buffer of sparse impulses over a faint hiss,
//! looped while at least one voice holds a lease on it.

use rand::Rng;
use rand_pcg::Pcg32;

/// Length of the looped buffer in seconds.
pub const BUFFER_SECONDS: f64 = 2.0;
/// Probability that a sample is an impulse rather than hiss.
pub const IMPULSE_PROBABILITY: f64 = 0.01;
pub const IMPULSE_AMPLITUDE: f64 = 0.5;
pub const HISS_AMPLITUDE: f64 = 0.005;
/// Fixed gain into the master bus, independent of any voice.
pub const TEXTURE_GAIN: f64 = 0.05;

#[derive(Debug, Clone)]
pub struct NoiseTexture {
    buffer: Vec<f64>,
    position: usize,
    leases: usize,
}

impl NoiseTexture {
    pub fn new(sample_rate: f64, rng: &mut Pcg32) -> Self {
        let len = ((BUFFER_SECONDS * sample_rate) as usize).max(1);
        let buffer = (0..len)
            .map(|_| {
                if rng.random::<f64>() < IMPULSE_PROBABILITY {
                    (rng.random::<f64>() * 2.0 - 1.0) * IMPULSE_AMPLITUDE
                } else {
                    (rng.random::<f64>() * 2.0 - 1.0) * HISS_AMPLITUDE
                }
            })
            .collect();
        NoiseTexture {
            buffer,
            position: 0,
            leases: 0,
        }
    }

    /// Take a lease; the texture starts on the first one.
    pub fn acquire(&mut self) {
        if self.leases == 0 {
            self.position = 0;
        }
        self.leases += 1;
    }

    /// Return a lease; the texture stops when the last one is returned.
    /// Releasing with no leases outstanding is a no-op.
    pub fn release(&mut self) {
        self.leases = self.leases.saturating_sub(1);
    }

    /// Drop every lease at once.
    pub fn stop(&mut self) {
        self.leases = 0;
    }

    pub fn is_running(&self) -> bool {
        self.leases > 0
    }

    pub fn leases(&self) -> usize {
        self.leases
    }

    /// Next sample as it reaches the bus (texture gain applied). Silent and
    /// frozen while stopped.
    #[inline]
    pub fn next_sample(&mut self) -> f64 {
        if self.leases == 0 {
            return 0.0;
        }
        let s = self.buffer[self.position];
        self.position = (self.position + 1) % self.buffer.len();
        s * TEXTURE_GAIN
    }

    pub fn buffer(&self) -> &[f64] {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn texture() -> NoiseTexture {
        NoiseTexture::new(8000.0, &mut Pcg32::seed_from_u64(7))
    }

    #[test]
    fn buffer_is_two_seconds_of_bounded_crackle() {
        let tex = texture();
        assert_eq!(tex.buffer().len(), 16000);
        assert!(tex.buffer().iter().all(|s| s.abs() <= IMPULSE_AMPLITUDE));

        let impulses = tex.buffer().iter().filter(|s| s.abs() > HISS_AMPLITUDE).count();
        // ~1% of 16000, with generous slack
        assert!(impulses > 60 && impulses < 300, "impulse count {impulses}");
    }

    #[test]
    fn silent_until_acquired() {
        let mut tex = texture();
        assert!((0..100).all(|_| tex.next_sample() == 0.0));
        tex.acquire();
        assert!((0..16000).any(|_| tex.next_sample() != 0.0));
    }

    #[test]
    fn reference_counted_start_stop() {
        let mut tex = texture();
        tex.acquire();
        tex.acquire();
        tex.release();
        assert!(tex.is_running(), "one holder left, texture must keep running");
        tex.release();
        assert!(!tex.is_running());
        tex.release();
        assert_eq!(tex.leases(), 0);
    }
}
