//! Capture pipeline: raw microphone frames → encoded recording → roster.
//!
//! The host owns the device. It pushes PCM into a [`CaptureSession`] (or
//! reports that no device could be opened), calls `finish` once, and gets a
//! single result. Only a successful capture ever reaches the engine.

use tracing::{debug, warn};

use crate::dsp::renderer::encode_wav;
use crate::error::CaptureError;
use crate::roster::MonsterRoster;

/// Longest capture kept; later frames are dropped.
pub const MAX_CAPTURE_SECONDS: f64 = 10.0;
/// Mime type recordings are stored under.
pub const CAPTURE_MIME: &str = "audio/wav";

#[derive(Debug, Clone)]
pub struct CaptureSession {
    sample_rate: u32,
    channels: u16,
    samples: Vec<f32>,
    device_unavailable: bool,
}

impl CaptureSession {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        CaptureSession {
            sample_rate: sample_rate.max(1),
            channels: channels.max(1),
            samples: Vec::new(),
            device_unavailable: false,
        }
    }

    /// Append interleaved frames from the device.
    pub fn push(&mut self, frames: &[f32]) {
        let limit = (MAX_CAPTURE_SECONDS * f64::from(self.sample_rate)) as usize * usize::from(self.channels);
        let room = limit.saturating_sub(self.samples.len());
        if frames.len() > room {
            warn!(dropped = frames.len() - room, "capture limit reached");
        }
        self.samples.extend_from_slice(&frames[..frames.len().min(room)]);
    }

    /// The host could not open (or was refused) a capture device.
    pub fn device_unavailable(&mut self) {
        self.device_unavailable = true;
    }

    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / f64::from(self.channels) / f64::from(self.sample_rate)
    }

    /// End the capture.
    pub fn finish(self) -> Result<CapturedCry, CaptureError> {
        if self.device_unavailable {
            return Err(CaptureError::DeviceUnavailable);
        }
        if self.samples.iter().all(|&s| s == 0.0) {
            return Err(CaptureError::NoAudio);
        }
        debug!(seconds = self.duration(), "capture finished");
        Ok(CapturedCry {
            sample_rate: self.sample_rate,
            channels: self.channels,
            samples: self.samples,
        })
    }
}

/// A finished capture, still raw.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedCry {
    pub sample_rate: u32,
    pub channels: u16,
    /// Interleaved samples in [-1, 1].
    pub samples: Vec<f32>,
}

impl CapturedCry {
    /// 16-bit PCM WAV bytes.
    pub fn encode_wav(&self) -> Result<Vec<u8>, CaptureError> {
        let pcm: Vec<i16> = self
            .samples
            .iter()
            .map(|&s| (f64::from(s).clamp(-1.0, 1.0) * 32767.0) as i16)
            .collect();
        Ok(encode_wav(&pcm, self.sample_rate, self.channels)?)
    }

    /// Unlock `id` in `roster` with this recording as its voice.
    pub fn handoff(&self, roster: &mut MonsterRoster, id: &str) -> Result<(), CaptureError> {
        roster.unlock_with_recording(id, CAPTURE_MIME, &self.encode_wav()?)?;
        debug!(monster = id, "capture handed off");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::decode::decode_audio;
    use crate::roster::MonsterDirectory;

    fn tone(len: usize) -> Vec<f32> {
        (0..len).map(|i| (i as f32 * 0.05).sin() * 0.5).collect()
    }

    #[test]
    fn empty_capture_is_no_audio() {
        let session = CaptureSession::new(8000, 1);
        assert!(matches!(session.finish(), Err(CaptureError::NoAudio)));

        let mut silent = CaptureSession::new(8000, 1);
        silent.push(&[0.0; 400]);
        assert!(matches!(silent.finish(), Err(CaptureError::NoAudio)));
    }

    #[test]
    fn denied_device_is_reported() {
        let mut session = CaptureSession::new(8000, 1);
        session.push(&tone(100));
        session.device_unavailable();
        assert!(matches!(session.finish(), Err(CaptureError::DeviceUnavailable)));
    }

    #[test]
    fn capture_is_capped() {
        let mut session = CaptureSession::new(100, 2);
        session.push(&tone(1500));
        session.push(&tone(1500));
        assert!((session.duration() - MAX_CAPTURE_SECONDS).abs() < 1e-9);
    }

    #[test]
    fn handoff_unlocks_with_a_decodable_recording() {
        let mut session = CaptureSession::new(8000, 1);
        session.push(&tone(800));
        let cry = session.finish().unwrap();

        let mut roster = MonsterRoster::default();
        cry.handoff(&mut roster, "vocal-viper").unwrap();
        assert!(roster.get("vocal-viper").unwrap().is_unlocked);

        let bytes = roster.recorded_audio("vocal-viper").unwrap();
        let buffer = decode_audio(&bytes).unwrap();
        assert_eq!(buffer.len(), 800);
        assert_eq!(buffer.sample_rate, 8000);

        assert!(matches!(
            cry.handoff(&mut roster, "nobody"),
            Err(CaptureError::UnknownMonster(_))
        ));
    }
}
