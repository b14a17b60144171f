//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::dsp::scheduler::NOMINAL_BPM;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub sample_rate: f64,
    /// Bus gain at start-up, 0..1.
    pub master_volume: f64,
    /// Length of the ramp applied by `set_master_volume`.
    pub volume_ramp_seconds: f64,
    /// Samples kept by every monitoring tap.
    pub monitor_window: usize,
    /// Pause between tearing a voice down and rebuilding it on a parameter change.
    pub restart_grace_ms: u64,
    pub tempo_bpm: f64,
    /// Seed for the noise buffer and pitch wobble.
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            sample_rate: 44100.0,
            master_volume: 0.6,
            volume_ramp_seconds: 0.02,
            monitor_window: 2048,
            restart_grace_ms: 50,
            tempo_bpm: NOMINAL_BPM,
            seed: 0x6d6f_6e73,
        }
    }
}

impl EngineConfig {
    pub fn with_sample_rate(sample_rate: f64) -> Self {
        EngineConfig {
            sample_rate,
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(ConfigError::SampleRate(self.sample_rate));
        }
        if !(self.tempo_bpm.is_finite() && self.tempo_bpm > 0.0) {
            return Err(ConfigError::Tempo(self.tempo_bpm));
        }
        Ok(())
    }
}
