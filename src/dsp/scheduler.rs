//! Voice scheduler: turns a pattern and its parameters into timed notes.
//!
//! Timing runs at a nominal tempo scaled by the speed multiplier; every note
//! lasts half a beat. A cycle is one pass over the pattern's offsets.

use crate::params::SoundParams;
use crate::pattern::{frequency_for, PatternSpec};

/// Nominal tempo of every cry.
pub const NOMINAL_BPM: f64 = 120.0;

/// Seconds per beat: `(60 / bpm) / speed`.
pub fn beat_duration(bpm: f64, speed: f64) -> f64 {
    (60.0 / bpm) / speed
}

/// Seconds per note: half a beat.
pub fn note_duration(bpm: f64, speed: f64) -> f64 {
    beat_duration(bpm, speed) / 2.0
}

/// Seconds for one pass over a pattern of `len` notes.
pub fn cycle_duration(len: usize, bpm: f64, speed: f64) -> f64 {
    len as f64 * note_duration(bpm, speed)
}

/// One note start, in audio-clock seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteEvent {
    pub start_time: f64,
    pub duration: f64,
    /// Fundamental frequency; harmonic `i` sounds at `frequency * (i + 1)`.
    pub frequency: f64,
}

/// Realise one cycle of `spec` starting at `start_time`. Start times strictly
/// increase in pattern order.
pub fn realize_cycle(
    spec: &PatternSpec,
    params: &SoundParams,
    bpm: f64,
    start_time: f64,
) -> Vec<NoteEvent> {
    let duration = note_duration(bpm, params.speed_multiplier);
    spec.note_offsets_semitones
        .iter()
        .enumerate()
        .map(|(i, &offset)| NoteEvent {
            start_time: start_time + i as f64 * duration,
            duration,
            frequency: frequency_for(spec.base_frequency_hz, offset, params.pitch_shift_semitones),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::oscillator::Waveform;
    use crate::pattern::Archetype;

    #[test]
    fn tempo_math() {
        assert!((beat_duration(NOMINAL_BPM, 1.0) - 0.5).abs() < 1e-12);
        assert!((note_duration(NOMINAL_BPM, 1.0) - 0.25).abs() < 1e-12);
        assert!((note_duration(NOMINAL_BPM, 2.0) - 0.125).abs() < 1e-12);
        assert!((note_duration(NOMINAL_BPM, 0.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn four_note_bass_cycle_is_one_second() {
        let spec = PatternSpec {
            note_offsets_semitones: vec![0, 12, 7, 12],
            ..Archetype::Bass.pattern().clone()
        };
        assert!((cycle_duration(spec.len(), NOMINAL_BPM, 1.0) - 1.0).abs() < 1e-12);

        let notes = realize_cycle(&spec, &SoundParams::default(), NOMINAL_BPM, 3.0);
        let starts: Vec<f64> = notes.iter().map(|n| n.start_time).collect();
        assert_eq!(starts, vec![3.0, 3.25, 3.5, 3.75]);
        assert!((notes[1].frequency - 220.0).abs() < 1e-9);
    }

    #[test]
    fn program_order_is_preserved() {
        let params = SoundParams {
            speed_multiplier: 1.7,
            pitch_shift_semitones: -5,
            ..SoundParams::default()
        };
        let notes = realize_cycle(Archetype::Fx.pattern(), &params, NOMINAL_BPM, 0.125);
        assert!(notes.windows(2).all(|w| w[0].start_time < w[1].start_time));
    }

    #[test]
    fn empty_pattern_yields_no_notes() {
        let spec = PatternSpec {
            base_frequency_hz: 100.0,
            note_offsets_semitones: vec![],
            harmonic_amplitudes: vec![1.0],
            waveform: Waveform::Sine,
        };
        assert!(realize_cycle(&spec, &SoundParams::default(), NOMINAL_BPM, 0.0).is_empty());
    }
}
