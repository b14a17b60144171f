//! Native playback: a cry engine on the default output device.
//!
//! The cpal callback renders straight from the engine; a tokio task polls
//! the timer queue. Both sides take the same registry lock.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::EngineConfig;
use crate::dsp::engine::CryEngine;
use crate::error::CryError;

/// How often the timer queue is polled.
pub const TICK_INTERVAL: Duration = Duration::from_millis(5);

pub type SharedEngine = Arc<Mutex<CryEngine>>;

pub struct RealtimeOutput {
    engine: SharedEngine,
    /// The cpal stream (kept alive for the duration)
    _stream: cpal::Stream,
    ticker: JoinHandle<()>,
    sample_rate: u32,
}

impl RealtimeOutput {
    /// Open the default device and start playing. Must be called inside a
    /// tokio runtime, which drives the timer queue.
    pub fn start(config: EngineConfig) -> Result<Self, CryError> {
        let runtime = Handle::try_current()
            .map_err(|e| CryError::Device(format!("no tokio runtime to drive timers: {e}")))?;
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| CryError::Device("no audio output device available".to_string()))?;
        let supported = device
            .default_output_config()
            .map_err(|e| CryError::Device(format!("failed to get default output config: {e}")))?;

        let sample_rate = supported.sample_rate().0;
        let channels = usize::from(supported.channels().max(1));
        let engine: SharedEngine = Arc::new(Mutex::new(CryEngine::new(EngineConfig {
            sample_rate: f64::from(sample_rate),
            ..config
        })));

        let sample_format = supported.sample_format();
        let stream_config: cpal::StreamConfig = supported.into();
        let stream = match sample_format {
            cpal::SampleFormat::F32 => {
                let stream_engine = engine.clone();
                let mut scratch: Vec<f32> = Vec::new();
                device
                    .build_output_stream(
                        &stream_config,
                        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                            fill(&stream_engine, &mut scratch, data, channels, |s| s);
                        },
                        |err| error!("audio stream error: {}", err),
                        None,
                    )
                    .map_err(|e| CryError::Device(format!("failed to build audio stream: {e}")))?
            }
            cpal::SampleFormat::I16 => {
                let stream_engine = engine.clone();
                let mut scratch: Vec<f32> = Vec::new();
                device
                    .build_output_stream(
                        &stream_config,
                        move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                            fill(&stream_engine, &mut scratch, data, channels, |s| {
                                (s * 32767.0).clamp(-32768.0, 32767.0) as i16
                            });
                        },
                        |err| error!("audio stream error: {}", err),
                        None,
                    )
                    .map_err(|e| CryError::Device(format!("failed to build audio stream: {e}")))?
            }
            other => {
                return Err(CryError::Device(format!("unsupported sample format: {other:?}")));
            }
        };
        stream
            .play()
            .map_err(|e| CryError::Device(format!("failed to play audio stream: {e}")))?;

        let tick_engine = engine.clone();
        let ticker = runtime.spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                lock(&tick_engine).tick();
            }
        });

        info!(sample_rate, channels, "audio output started");
        Ok(RealtimeOutput {
            engine,
            _stream: stream,
            ticker,
            sample_rate,
        })
    }

    /// Lock the engine for control calls.
    pub fn engine(&self) -> MutexGuard<'_, CryEngine> {
        lock(&self.engine)
    }

    pub fn shared(&self) -> SharedEngine {
        self.engine.clone()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for RealtimeOutput {
    fn drop(&mut self) {
        self.ticker.abort();
    }
}

/// A panic while holding the lock leaves the engine usable; take it anyway.
fn lock(engine: &Mutex<CryEngine>) -> MutexGuard<'_, CryEngine> {
    engine.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Render stereo from the engine and spread it over the device's channels.
fn fill<T: Copy>(
    engine: &Mutex<CryEngine>,
    scratch: &mut Vec<f32>,
    data: &mut [T],
    channels: usize,
    convert: impl Fn(f32) -> T,
) {
    let frames = data.len() / channels;
    scratch.resize(frames * 2, 0.0);
    lock(engine).render(scratch);
    for (out, stereo) in data.chunks_exact_mut(channels).zip(scratch.chunks_exact(2)) {
        match out.len() {
            1 => out[0] = convert((stereo[0] + stereo[1]) * 0.5),
            _ => {
                out[0] = convert(stereo[0]);
                out[1] = convert(stereo[1]);
                for extra in &mut out[2..] {
                    *extra = convert(0.0);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_outside_a_runtime_is_an_error() {
        let result = RealtimeOutput::start(EngineConfig::default());
        assert!(matches!(result, Err(CryError::Device(ref msg)) if msg.contains("tokio runtime")));
    }

    #[test]
    fn fill_spreads_stereo_over_device_channels() {
        let engine = Mutex::new(CryEngine::new(EngineConfig::with_sample_rate(8000.0)));
        let mut scratch = Vec::new();
        let mut quad = vec![1.0_f32; 16];
        fill(&engine, &mut scratch, &mut quad, 4, |s| s);
        assert_eq!(scratch.len(), 8);
        assert!(quad.iter().all(|&s| s == 0.0));
    }
}
