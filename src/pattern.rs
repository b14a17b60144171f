//! Pattern library and frequency model.
//!
//! Each archetype of monster has one fixed pattern: a base pitch, a sequence
//! of semitone offsets, a harmonic stack and a default waveform.

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dsp::oscillator::Waveform;

/// Sound-pattern family of a monster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Archetype {
    Bass,
    Rhythm,
    Melody,
    Vocals,
    Fx,
    Default,
}

impl Archetype {
    /// Map a monster type name to its archetype. Unknown names fall back to
    /// `Melody`; this never fails.
    pub fn from_type_name(name: &str) -> Archetype {
        match name.trim().to_ascii_lowercase().as_str() {
            "bass" => Archetype::Bass,
            "rhythm" => Archetype::Rhythm,
            "melody" => Archetype::Melody,
            "vocals" => Archetype::Vocals,
            "fx" => Archetype::Fx,
            _ => Archetype::Melody,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Archetype::Bass => "bass",
            Archetype::Rhythm => "rhythm",
            Archetype::Melody => "melody",
            Archetype::Vocals => "vocals",
            Archetype::Fx => "fx",
            Archetype::Default => "default",
        }
    }

    /// The pattern this archetype plays.
    pub fn pattern(self) -> &'static PatternSpec {
        match self {
            Archetype::Bass => &BASS,
            Archetype::Rhythm => &RHYTHM,
            Archetype::Melody | Archetype::Default => &MELODY,
            Archetype::Vocals => &VOCALS,
            Archetype::Fx => &FX,
        }
    }

    pub const ALL: [Archetype; 6] = [
        Archetype::Bass,
        Archetype::Rhythm,
        Archetype::Melody,
        Archetype::Vocals,
        Archetype::Fx,
        Archetype::Default,
    ];
}

/// A cry pattern. Library patterns are static; callers may also build their
/// own and play them directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternSpec {
    pub base_frequency_hz: f64,
    pub note_offsets_semitones: Vec<i32>,
    /// Relative level of each harmonic, fundamental first, each in (0, 1].
    pub harmonic_amplitudes: Vec<f64>,
    pub waveform: Waveform,
}

impl PatternSpec {
    pub fn len(&self) -> usize {
        self.note_offsets_semitones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.note_offsets_semitones.is_empty()
    }

    /// Force a caller-built pattern into playable ranges. Harmonic levels
    /// above 1 are clamped; levels that are not positive and finite are
    /// silenced in place so the other harmonics keep their ratios. A base
    /// pitch that is not positive and finite leaves nothing to play.
    pub fn sanitized(mut self) -> Self {
        let before = self.clone();
        for level in &mut self.harmonic_amplitudes {
            *level = if level.is_finite() && *level > 0.0 {
                level.min(1.0)
            } else {
                0.0
            };
        }
        if !(self.base_frequency_hz.is_finite() && self.base_frequency_hz > 0.0) {
            self.note_offsets_semitones.clear();
        }
        if self != before {
            warn!(requested = ?before, "pattern out of range, sanitized");
        }
        self
    }
}

static BASS: LazyLock<PatternSpec> = LazyLock::new(|| PatternSpec {
    base_frequency_hz: 110.0,
    note_offsets_semitones: vec![0, 12, 7, 12, 0, 12, 7, 12],
    harmonic_amplitudes: vec![1.0, 0.5, 0.25],
    waveform: Waveform::Triangle,
});

static RHYTHM: LazyLock<PatternSpec> = LazyLock::new(|| PatternSpec {
    base_frequency_hz: 220.0,
    note_offsets_semitones: vec![0, 4, 7, 4, 0, 4, 7, 4],
    harmonic_amplitudes: vec![1.0, 0.3, 0.2, 0.1],
    waveform: Waveform::Square,
});

static MELODY: LazyLock<PatternSpec> = LazyLock::new(|| PatternSpec {
    base_frequency_hz: 440.0,
    note_offsets_semitones: vec![0, 2, 4, 5, 7, 9, 11, 12],
    harmonic_amplitudes: vec![1.0, 0.4, 0.3, 0.2, 0.1],
    waveform: Waveform::Sine,
});

static VOCALS: LazyLock<PatternSpec> = LazyLock::new(|| PatternSpec {
    base_frequency_hz: 523.25,
    note_offsets_semitones: vec![0, 3, 7, 10, 12, 10, 7, 3],
    harmonic_amplitudes: vec![1.0, 0.6, 0.4, 0.3, 0.2],
    waveform: Waveform::Sine,
});

static FX: LazyLock<PatternSpec> = LazyLock::new(|| PatternSpec {
    base_frequency_hz: 659.25,
    note_offsets_semitones: vec![0, 5, 7, 12, 7, 5, 0, -5],
    harmonic_amplitudes: vec![1.0, 0.5, 0.3, 0.2, 0.15, 0.1],
    waveform: Waveform::Triangle,
});

/// Absolute frequency of a pattern note:
/// `base * 2^(note_offset/12) * 2^(pitch_shift/12)`.
pub fn frequency_for(base_hz: f64, note_offset: i32, pitch_shift_semitones: i32) -> f64 {
    base_hz
        * (2.0_f64).powf(f64::from(note_offset) / 12.0)
        * (2.0_f64).powf(f64::from(pitch_shift_semitones) / 12.0)
}

/// Playback-rate multiplier for a semitone shift.
pub fn semitone_ratio(semitones: i32) -> f64 {
    (2.0_f64).powf(f64::from(semitones) / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_offset_and_shift_is_identity() {
        for archetype in Archetype::ALL {
            let base = archetype.pattern().base_frequency_hz;
            assert_eq!(frequency_for(base, 0, 0), base, "{archetype:?}");
        }
    }

    #[test]
    fn octave_shift_doubles() {
        for archetype in Archetype::ALL {
            let spec = archetype.pattern();
            for &n in &spec.note_offsets_semitones {
                let plain = frequency_for(spec.base_frequency_hz, n, 0);
                let up = frequency_for(spec.base_frequency_hz, n, 12);
                assert!((up - 2.0 * plain).abs() < 1e-9, "{archetype:?} offset {n}");
            }
        }
    }

    #[test]
    fn a4_fifth_above() {
        let f = frequency_for(440.0, 7, 0);
        assert!((f - 659.255).abs() < 0.01, "got {f}");
    }

    #[test]
    fn unknown_types_fall_back_to_melody() {
        assert_eq!(Archetype::from_type_name("bass"), Archetype::Bass);
        assert_eq!(Archetype::from_type_name(" FX "), Archetype::Fx);
        assert_eq!(Archetype::from_type_name("kazoo"), Archetype::Melody);
        assert_eq!(Archetype::from_type_name(""), Archetype::Melody);
        assert_eq!(Archetype::Default.pattern(), Archetype::Melody.pattern());
    }

    #[test]
    fn library_patterns_are_well_formed() {
        for archetype in Archetype::ALL {
            let spec = archetype.pattern();
            assert_eq!(spec.len(), 8);
            assert!(spec.harmonic_amplitudes.iter().all(|&h| h > 0.0 && h <= 1.0));
        }
    }

    #[test]
    fn sanitized_silences_bad_levels() {
        let spec = PatternSpec {
            harmonic_amplitudes: vec![1.5, 0.0, -0.3, f64::NAN, 0.5],
            ..Archetype::Vocals.pattern().clone()
        }
        .sanitized();
        assert_eq!(spec.harmonic_amplitudes, vec![1.0, 0.0, 0.0, 0.0, 0.5]);
        assert_eq!(spec.len(), 8);

        let unpitched = PatternSpec {
            base_frequency_hz: 0.0,
            ..Archetype::Bass.pattern().clone()
        }
        .sanitized();
        assert!(unpitched.is_empty());

        assert_eq!(Archetype::Fx.pattern().clone().sanitized(), *Archetype::Fx.pattern());
    }

    #[test]
    fn spec_json_shape() {
        let json = serde_json::to_value(Archetype::Bass.pattern()).unwrap();
        assert_eq!(json["baseFrequencyHz"], 110.0);
        assert_eq!(json["waveform"], "triangle");
    }
}
