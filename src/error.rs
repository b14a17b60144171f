use thiserror::Error;

/// Umbrella error for the fallible helpers around the engine.
///
/// The engine's own control surface never returns these; decode failures
/// there are logged and recovered by falling back to synthesis.
#[derive(Debug, Error)]
pub enum CryError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Audio device error: {0}")]
    Device(String),
}

/// Why an encoded recording could not be turned into samples.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("recording is empty")]
    Empty,
    #[error("unrecognized audio container (first bytes {0:02x?})")]
    UnrecognizedFormat(Vec<u8>),
    #[error("invalid WAV data: {0}")]
    Wav(#[from] hound::Error),
    #[error("invalid MP3 data: {0}")]
    Mp3(String),
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("recording decoded to zero samples")]
    NoSamples,
    #[error("recording declares a sample rate of zero")]
    ZeroSampleRate,
}

/// Failure of the capture → encode → handoff pipeline.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no capture device available")]
    DeviceUnavailable,
    #[error("capture produced no audio")]
    NoAudio,
    #[error("unknown monster '{0}'")]
    UnknownMonster(String),
    #[error("could not encode capture: {0}")]
    Encode(#[from] hound::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("sample rate must be positive, got {0}")]
    SampleRate(f64),
    #[error("tempo must be a positive BPM, got {0}")]
    Tempo(f64),
}
