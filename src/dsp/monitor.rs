//! Monitoring tap: a rolling window of recent output for oscilloscopes.

/// Ring buffer of the most recent mono samples.
#[derive(Debug, Clone)]
pub struct MonitorTap {
    ring: Vec<f32>,
    pos: usize,
}

impl MonitorTap {
    pub fn new(window: usize) -> Self {
        MonitorTap {
            ring: vec![0.0; window.max(1)],
            pos: 0,
        }
    }

    #[inline]
    pub fn push(&mut self, sample: f64) {
        self.ring[self.pos] = sample as f32;
        self.pos = (self.pos + 1) % self.ring.len();
    }

    /// The window, oldest sample first.
    pub fn snapshot(&self) -> MonitorSignal {
        let mut samples = Vec::with_capacity(self.ring.len());
        samples.extend_from_slice(&self.ring[self.pos..]);
        samples.extend_from_slice(&self.ring[..self.pos]);
        MonitorSignal { samples }
    }

    pub fn window(&self) -> usize {
        self.ring.len()
    }
}

/// A time-domain snapshot of a voice or of the whole bus.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSignal {
    pub samples: Vec<f32>,
}

impl MonitorSignal {
    /// A flatline of `len` samples.
    pub fn silence(len: usize) -> Self {
        MonitorSignal {
            samples: vec![0.0; len],
        }
    }

    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0_f32, |m, &s| m.max(s.abs()))
    }

    pub fn is_silent(&self) -> bool {
        self.samples.iter().all(|&s| s == 0.0)
    }

    /// Bytes centred on 128, full scale at ±1.0 (AnalyserNode
    /// `getByteTimeDomainData` layout).
    pub fn to_byte_time_domain(&self) -> Vec<u8> {
        self.samples
            .iter()
            .map(|&s| (128.0 * (1.0 + s)).clamp(0.0, 255.0) as u8)
            .collect()
    }
}
