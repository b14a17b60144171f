//! Per-call sound parameters.
//!
//! Field names on the wire follow the UI controls (`pitchShift`, `speed`,
//! `filterFreq`, `hasCrackle`, `loop`, `delay`); the descriptive names are
//! accepted as aliases. Omitted fields take their defaults.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dsp::oscillator::Waveform;

pub const PITCH_SHIFT_RANGE: (i32, i32) = (-12, 12);
pub const SPEED_RANGE: (f64, f64) = (0.5, 2.0);
pub const FILTER_CUTOFF_RANGE: (u32, u32) = (200, 20000);
pub const ECHO_RANGE: (u32, u32) = (0, 100);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundParams {
    /// Waveform of the fundamental. `None` keeps the archetype's own shape.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waveform: Option<Waveform>,
    #[serde(rename = "pitchShift", alias = "pitchShiftSemitones")]
    pub pitch_shift_semitones: i32,
    #[serde(rename = "speed", alias = "speedMultiplier")]
    pub speed_multiplier: f64,
    #[serde(rename = "filterFreq", alias = "filterCutoffHz")]
    pub filter_cutoff_hz: u32,
    /// Background crackle plus per-note pitch wobble.
    #[serde(rename = "hasCrackle", alias = "hasNoiseTexture")]
    pub has_noise_texture: bool,
    #[serde(rename = "loop")]
    pub looping: bool,
    #[serde(rename = "delay", alias = "echoAmount")]
    pub echo_amount: u32,
}

impl Default for SoundParams {
    fn default() -> Self {
        SoundParams {
            waveform: None,
            pitch_shift_semitones: 0,
            speed_multiplier: 1.0,
            filter_cutoff_hz: 20000,
            has_noise_texture: false,
            looping: false,
            echo_amount: 0,
        }
    }
}

impl SoundParams {
    pub fn looping() -> Self {
        SoundParams {
            looping: true,
            ..SoundParams::default()
        }
    }

    /// Parse from JSON; missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Copy with every field forced into its documented range.
    pub fn clamped(&self) -> SoundParams {
        let speed = if self.speed_multiplier.is_finite() {
            self.speed_multiplier.clamp(SPEED_RANGE.0, SPEED_RANGE.1)
        } else {
            1.0
        };
        let out = SoundParams {
            waveform: self.waveform,
            pitch_shift_semitones: self
                .pitch_shift_semitones
                .clamp(PITCH_SHIFT_RANGE.0, PITCH_SHIFT_RANGE.1),
            speed_multiplier: speed,
            filter_cutoff_hz: self
                .filter_cutoff_hz
                .clamp(FILTER_CUTOFF_RANGE.0, FILTER_CUTOFF_RANGE.1),
            has_noise_texture: self.has_noise_texture,
            looping: self.looping,
            echo_amount: self.echo_amount.clamp(ECHO_RANGE.0, ECHO_RANGE.1),
        };
        if out != *self {
            warn!(requested = ?self, "sound parameters out of range, clamped");
        }
        out
    }

    /// Echo amount as the delay line expects it.
    pub fn echo(&self) -> u8 {
        self.echo_amount.min(ECHO_RANGE.1) as u8
    }

    /// True when `other` differs from `self` in filter cutoff only.
    pub fn differs_only_in_cutoff(&self, other: &SoundParams) -> bool {
        SoundParams {
            filter_cutoff_hz: other.filter_cutoff_hz,
            ..self.clone()
        } == *other
            && self.filter_cutoff_hz != other.filter_cutoff_hz
    }
}
