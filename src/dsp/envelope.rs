//! Per-note amplitude envelope.
//!
//! Four stages measured against the note duration: a linear attack to the
//! peak, an exponential glide to the sustain level, a hold, and an
//! exponential release to near-silence that ends exactly at the note end.
//! When the note is too short for all stages, stage boundaries are clamped so
//! they never run backwards.

/// Attack time in seconds.
pub const ATTACK: f64 = 0.02;
/// Decay (glide to sustain) time in seconds.
pub const DECAY: f64 = 0.1;
/// Release time in seconds.
pub const RELEASE: f64 = 0.3;
/// Peak level as a fraction of the harmonic amplitude.
pub const PEAK_SCALE: f64 = 0.3;
/// Sustain level as a fraction of the harmonic amplitude.
pub const SUSTAIN_SCALE: f64 = 0.4;
/// Level the release ramps toward. Exponential ramps cannot reach zero.
pub const RELEASE_FLOOR: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Stage {
    Attack,
    Decay,
    Sustain,
    Release,
    Done,
}

/// Envelope for one harmonic of one note.
#[derive(Debug, Clone)]
pub struct NoteEnvelope {
    peak: f64,
    sustain: f64,
    /// Stage boundaries in samples from note start:
    /// attack end, decay end, release start, note end.
    bounds: [usize; 4],
    stage: Stage,
    counter: usize,
}

impl NoteEnvelope {
    /// Build the envelope for a harmonic of amplitude `harmonic` over a note of
    /// `note_duration` seconds.
    pub fn new(harmonic: f64, note_duration: f64, sample_rate: f64) -> Self {
        let times = stage_times(note_duration);
        let to_samples = |t: f64| (t * sample_rate).round() as usize;
        NoteEnvelope {
            peak: harmonic * PEAK_SCALE,
            sustain: harmonic * SUSTAIN_SCALE,
            bounds: [
                to_samples(times[0]),
                to_samples(times[1]),
                to_samples(times[2]),
                to_samples(times[3]),
            ],
            stage: Stage::Attack,
            counter: 0,
        }
    }

    /// Level at `n` samples after note start.
    pub fn level_at(&self, n: usize) -> f64 {
        let [attack_end, decay_end, release_start, end] = self.bounds;
        if n >= end {
            0.0
        } else if n < attack_end {
            self.peak * n as f64 / attack_end as f64
        } else if n < decay_end {
            let t = (n - attack_end) as f64 / (decay_end - attack_end) as f64;
            exp_ramp(self.peak, self.sustain, t)
        } else if n < release_start {
            self.sustain
        } else {
            let t = (n - release_start) as f64 / (end - release_start) as f64;
            exp_ramp(self.sustain, RELEASE_FLOOR, t)
        }
    }

    /// Generate the next envelope sample.
    pub fn next_sample(&mut self) -> f64 {
        let level = self.level_at(self.counter);
        self.counter += 1;
        let [attack_end, decay_end, release_start, end] = self.bounds;
        self.stage = if self.counter >= end {
            Stage::Done
        } else if self.counter < attack_end {
            Stage::Attack
        } else if self.counter < decay_end {
            Stage::Decay
        } else if self.counter < release_start {
            Stage::Sustain
        } else {
            Stage::Release
        };
        level
    }

    pub fn is_finished(&self) -> bool {
        self.stage == Stage::Done
    }

    /// Total length in samples.
    pub fn len(&self) -> usize {
        self.bounds[3]
    }

    pub fn is_empty(&self) -> bool {
        self.bounds[3] == 0
    }
}

/// Stage boundary times in seconds for a note of the given duration, clamped to
/// be monotonically non-decreasing and within the note.
pub fn stage_times(note_duration: f64) -> [f64; 4] {
    let end = note_duration.max(0.0);
    let attack_end = ATTACK.min(end);
    let decay_end = (ATTACK + DECAY).min(end).max(attack_end);
    let release_start = (end - RELEASE).max(decay_end);
    [attack_end, decay_end, release_start, end]
}

/// Exponential interpolation from `from` to `to` at fraction `t`. Defined
/// for positive levels only; anything else is silent.
fn exp_ramp(from: f64, to: f64, t: f64) -> f64 {
    if from <= 0.0 || to <= 0.0 {
        return 0.0;
    }
    from * (to / from).powf(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_notes_clamp_monotonically() {
        // 120 BPM at 2x speed: notes are 125ms, shorter than attack+decay+release.
        let times = stage_times(0.125);
        assert!(times.windows(2).all(|w| w[0] <= w[1]), "{times:?}");
        assert!((times[0] - 0.02).abs() < 1e-12);
        assert!((times[1] - 0.12).abs() < 1e-12);
        assert!((times[2] - 0.12).abs() < 1e-12);
        assert!((times[3] - 0.125).abs() < 1e-12);

        let tiny = stage_times(0.01);
        assert!(tiny.iter().all(|&t| t >= 0.0 && t <= 0.01), "{tiny:?}");
    }

    #[test]
    fn zero_level_harmonic_is_silent_throughout() {
        let env = NoteEnvelope::new(0.0, 0.5, 1000.0);
        for n in 0..=500 {
            assert_eq!(env.level_at(n), 0.0, "sample {n}");
        }
    }

    #[test]
    fn long_note_has_sustain_hold() {
        let times = stage_times(1.0);
        assert!((times[2] - 0.7).abs() < 1e-12);
    }

    #[test]
    fn attack_peaks_at_scaled_harmonic() {
        let env = NoteEnvelope::new(0.5, 0.5, 1000.0);
        // attack ends at sample 20
        assert!((env.level_at(0)).abs() < 1e-12);
        assert!((env.level_at(10) - 0.075).abs() < 1e-9);
        assert!((env.level_at(20) - 0.15).abs() < 1e-9);
    }

    #[test]
    fn sustain_and_release_levels() {
        let env = NoteEnvelope::new(1.0, 0.5, 1000.0);
        // decay ends at 120, release starts at 200, note ends at 500
        assert!((env.level_at(150) - 0.4).abs() < 1e-9);
        let near_end = env.level_at(499);
        assert!(near_end < 0.0015, "release should approach the floor, got {near_end}");
        assert_eq!(env.level_at(500), 0.0);
    }

    #[test]
    fn runs_to_completion() {
        let mut env = NoteEnvelope::new(0.25, 0.25, 44100.0);
        let mut max_level = 0.0_f64;
        for _ in 0..env.len() {
            let s = env.next_sample();
            assert!(s >= 0.0, "Envelope went negative: {s}");
            max_level = max_level.max(s);
        }
        assert!(env.is_finished());
        assert!(max_level <= 0.25 * SUSTAIN_SCALE + 1e-9);
    }
}
