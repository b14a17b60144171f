//! DSP Engine: pure Rust cry synthesis, scheduling and mixing.
//!
//! The same code powers the WebAudio host (via AudioWorklet + WASM) and the
//! offline WAV renderer; the `realtime` feature adds a native device driver.

pub mod decode;
pub mod delay;
pub mod engine;
pub mod envelope;
pub mod filter;
pub mod mixer;
pub mod monitor;
pub mod noise;
pub mod oscillator;
pub mod renderer;
pub mod sampler;
pub mod scheduler;
pub mod timer;
pub mod voice;
