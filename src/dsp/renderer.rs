//! WAV renderer: renders a single cry offline to samples or a WAV buffer.

use std::io::Cursor;
use std::time::Duration;

use hound::{SampleFormat, WavSpec, WavWriter};

use super::delay::{Echo, MAX_FEEDBACK};
use super::engine::{CryEngine, BLOCK_SIZE};
use super::envelope::RELEASE;
use crate::clock::ManualClock;
use crate::config::EngineConfig;
use crate::params::SoundParams;
use crate::pattern::Archetype;
use crate::roster::MonsterRoster;

/// Echo repeats are rendered until they fall below this level.
const TAIL_FLOOR: f64 = 0.001;

/// Render one non-looping cry of `archetype` to interleaved stereo f32,
/// including the envelope release and any echo tail.
pub fn render_cry(archetype: Archetype, params: &SoundParams, sample_rate: u32) -> Vec<f32> {
    let params = SoundParams {
        looping: false,
        ..params.clamped()
    };
    let sr = f64::from(sample_rate.max(1));
    let clock = ManualClock::new();
    let config = EngineConfig::with_sample_rate(sr);
    let mut engine = CryEngine::with_parts(config, Box::new(clock.clone()), Box::new(MonsterRoster::default()));

    let cycle = super::scheduler::cycle_duration(
        archetype.pattern().len(),
        engine.config().tempo_bpm,
        params.speed_multiplier,
    );
    let total_seconds = cycle + RELEASE + echo_tail(&params, sr);
    let total_frames = (total_seconds * sr).ceil() as usize;

    engine.play_pattern("cry", archetype, params);

    let mut out = vec![0.0_f32; total_frames * 2];
    let block = Duration::from_secs_f64(BLOCK_SIZE as f64 / sr);
    for chunk in out.chunks_mut(BLOCK_SIZE * 2) {
        engine.render(chunk);
        clock.advance(block);
        engine.tick();
    }
    out
}

/// Render one cry to a 16-bit stereo WAV file as bytes.
pub fn render_cry_wav(archetype: Archetype, params: &SoundParams, sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let pcm: Vec<i16> = render_cry(archetype, params, sample_rate)
        .iter()
        .map(|&s| (f64::from(s).clamp(-1.0, 1.0) * 32767.0) as i16)
        .collect();
    encode_wav(&pcm, sample_rate, 2)
}

/// Seconds until the echo's repeats fall under [`TAIL_FLOOR`].
fn echo_tail(params: &SoundParams, sample_rate: f64) -> f64 {
    let Some(echo) = Echo::from_amount(params.echo(), sample_rate) else {
        return 0.0;
    };
    let feedback = echo.feedback.clamp(0.01, MAX_FEEDBACK);
    let repeats = (TAIL_FLOOR.ln() / feedback.ln()).ceil().max(1.0);
    echo.delay_time * repeats
}

/// Encode interleaved i16 PCM samples as a 16-bit WAV file in memory.
pub fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Result<Vec<u8>, hound::Error> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    let mut writer = WavWriter::new(&mut cursor, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_header_valid() {
        let wav = render_cry_wav(Archetype::Rhythm, &SoundParams::default(), 22050).unwrap();

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(&wav[36..40], b"data");

        let sr = u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]);
        assert_eq!(sr, 22050);
        let ch = u16::from_le_bytes([wav[22], wav[23]]);
        assert_eq!(ch, 2);
    }

    #[test]
    fn length_covers_cycle_and_release() {
        // Eight notes at 120 BPM: 2s of notes plus 0.3s release.
        let samples = render_cry(Archetype::Bass, &SoundParams::default(), 8000);
        assert_eq!(samples.len(), (2.3_f64 * 8000.0).ceil() as usize * 2);

        let fast = SoundParams {
            speed_multiplier: 2.0,
            ..SoundParams::default()
        };
        let samples = render_cry(Archetype::Bass, &fast, 8000);
        assert_eq!(samples.len(), (1.3_f64 * 8000.0).ceil() as usize * 2);
    }

    #[test]
    fn echo_extends_the_render() {
        let dry = render_cry(Archetype::Fx, &SoundParams::default(), 8000);
        let wet = render_cry(
            Archetype::Fx,
            &SoundParams {
                echo_amount: 50,
                ..SoundParams::default()
            },
            8000,
        );
        assert!(wet.len() > dry.len());
    }

    #[test]
    fn looping_request_still_renders_once() {
        let once = render_cry(Archetype::Vocals, &SoundParams::default(), 8000);
        let looped = render_cry(Archetype::Vocals, &SoundParams::looping(), 8000);
        assert_eq!(once, looped);
    }

    #[test]
    fn rendered_cry_is_not_silent() {
        let wav = render_cry_wav(Archetype::Melody, &SoundParams::default(), 8000).unwrap();
        let has_nonzero = wav[44..]
            .chunks_exact(2)
            .any(|b| i16::from_le_bytes([b[0], b[1]]) != 0);
        assert!(has_nonzero, "rendered WAV should contain non-silent audio");
    }

    #[test]
    fn encode_wav_sizes() {
        let wav = encode_wav(&[0; 100], 8000, 1).unwrap();
        let data_size = u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]);
        assert_eq!(data_size, 200);
        assert_eq!(wav.len(), 44 + 200);
        let riff_size = u32::from_le_bytes([wav[4], wav[5], wav[6], wav[7]]);
        assert_eq!(riff_size, 36 + 200);
    }

    #[test]
    fn encoded_wav_reads_back_through_hound() {
        let pcm = [0_i16, 1000, -1000, i16::MAX, i16::MIN, 7];
        let wav = encode_wav(&pcm, 16000, 2).unwrap();
        let mut reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        let spec = reader.spec();
        assert_eq!((spec.channels, spec.sample_rate, spec.bits_per_sample), (2, 16000, 16));
        let read: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(read, pcm);
    }
}
