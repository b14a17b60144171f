pub mod capture;
pub mod clock;
pub mod config;
pub mod dsp;
pub mod error;
pub mod params;
pub mod pattern;
#[cfg(feature = "realtime")]
pub mod realtime;
pub mod roster;

use std::time::Duration;

use crate::clock::{ManualClock, WallClock};
use crate::config::EngineConfig;
use crate::dsp::engine::CryEngine;
use crate::params::SoundParams;
use crate::pattern::Archetype;
use crate::roster::MonsterRoster;
use tracing::warn;
use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the monster-cry-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// Read sound parameters handed over from JS. Missing or malformed values
/// fall back to defaults rather than throwing into the UI.
fn params_from_js(value: JsValue) -> SoundParams {
    if value.is_undefined() || value.is_null() {
        return SoundParams::default();
    }
    serde_wasm_bindgen::from_value(value).unwrap_or_else(|e| {
        warn!(error = %e, "unreadable sound parameters, using defaults");
        SoundParams::default()
    })
}

/// WASM-exposed: render one cry of a monster type to a WAV byte array.
#[wasm_bindgen]
pub fn render_cry_wav(monster_type: &str, params: JsValue, sample_rate: u32) -> Result<Vec<u8>, JsValue> {
    let archetype = Archetype::from_type_name(monster_type);
    dsp::renderer::render_cry_wav(archetype, &params_from_js(params), sample_rate)
        .map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: render one cry to interleaved stereo f32 samples.
/// Returns the raw audio buffer for AudioWorklet playback.
#[wasm_bindgen]
pub fn render_cry_samples(monster_type: &str, params: JsValue, sample_rate: u32) -> Vec<f32> {
    let archetype = Archetype::from_type_name(monster_type);
    dsp::renderer::render_cry(archetype, &params_from_js(params), sample_rate)
}

/// WASM-exposed engine for an AudioWorklet host. The host pulls audio with
/// `render` and drives timers with `tick(performance.now())`.
#[wasm_bindgen]
pub struct CryEngineHandle {
    engine: CryEngine,
    clock: ManualClock,
    /// `performance.now()` at the first tick.
    origin_ms: Option<f64>,
}

#[wasm_bindgen]
impl CryEngineHandle {
    #[wasm_bindgen(constructor)]
    pub fn new(sample_rate: f64, config_json: Option<String>) -> Result<CryEngineHandle, JsValue> {
        let config = match config_json {
            Some(json) => EngineConfig::from_json(&json).map_err(|e| JsValue::from_str(&format!("{e}")))?,
            None => EngineConfig::default(),
        };
        let config = EngineConfig { sample_rate, ..config };
        config.validate().map_err(|e| JsValue::from_str(&format!("{e}")))?;
        let clock = ManualClock::new();
        let engine = CryEngine::with_parts(config, Box::new(clock.clone()), Box::new(MonsterRoster::default()));
        Ok(CryEngineHandle {
            engine,
            clock,
            origin_ms: None,
        })
    }

    /// Replace the roster with a JSON array of monsters.
    #[wasm_bindgen(js_name = setRoster)]
    pub fn set_roster(&mut self, json: &str) -> Result<(), JsValue> {
        let roster = MonsterRoster::from_json(json).map_err(|e| JsValue::from_str(&format!("{e}")))?;
        self.engine.set_directory(Box::new(roster));
        Ok(())
    }

    #[wasm_bindgen(js_name = playVoice)]
    pub fn play_voice(&mut self, id: &str, params: JsValue) {
        self.engine.play_voice(id, params_from_js(params));
    }

    #[wasm_bindgen(js_name = playRecording)]
    pub fn play_recording(&mut self, id: &str, monster_type: &str, bytes: &[u8], params: JsValue) {
        let archetype = Archetype::from_type_name(monster_type);
        self.engine.play_recording(id, archetype, bytes, params_from_js(params));
    }

    #[wasm_bindgen(js_name = updateParams)]
    pub fn update_params(&mut self, id: &str, params: JsValue) {
        self.engine.update_params(id, params_from_js(params));
    }

    #[wasm_bindgen(js_name = stopVoice)]
    pub fn stop_voice(&mut self, id: &str) {
        self.engine.stop_voice(id);
    }

    #[wasm_bindgen(js_name = stopAll)]
    pub fn stop_all(&mut self) {
        self.engine.stop_all();
    }

    #[wasm_bindgen(js_name = isAnyPlaying)]
    pub fn is_any_playing(&self) -> bool {
        self.engine.is_any_playing()
    }

    #[wasm_bindgen(js_name = setMasterVolume)]
    pub fn set_master_volume(&mut self, volume: f64) {
        self.engine.set_master_volume(volume);
    }

    /// Advance the timer clock to `now_ms` and run due timers.
    pub fn tick(&mut self, now_ms: f64) {
        if !now_ms.is_finite() {
            return;
        }
        let origin = *self.origin_ms.get_or_insert(now_ms);
        let elapsed = Duration::from_secs_f64((now_ms - origin).max(0.0) / 1000.0);
        if elapsed > self.clock.now() {
            self.clock.set(elapsed);
        }
        self.engine.tick();
    }

    /// Render `frames` interleaved stereo frames.
    pub fn render(&mut self, frames: usize) -> Vec<f32> {
        self.engine.render_frames(frames)
    }

    /// Oscilloscope bytes (centred on 128) for one voice, or the whole mix.
    pub fn monitor(&self, id: Option<String>) -> Vec<u8> {
        self.engine
            .current_monitor_signal(id.as_deref())
            .to_byte_time_domain()
    }
}
