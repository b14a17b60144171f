//! Decode captured recordings into sample buffers.
//!
//! WAV (any PCM or float layout hound reads) and MP3 are recognised by their
//! leading bytes; channels are averaged down to mono.

use std::io::Cursor;

use hound::{SampleFormat, WavReader};

use super::sampler::SampleBuffer;
use crate::error::DecodeError;

pub fn decode_audio(bytes: &[u8]) -> Result<SampleBuffer, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    let buffer = if bytes.starts_with(b"RIFF") {
        decode_wav(bytes)?
    } else if looks_like_mp3(bytes) {
        decode_mp3(bytes)?
    } else {
        return Err(DecodeError::UnrecognizedFormat(
            bytes.iter().take(4).copied().collect(),
        ));
    };
    if buffer.is_empty() {
        return Err(DecodeError::NoSamples);
    }
    Ok(buffer)
}

fn looks_like_mp3(bytes: &[u8]) -> bool {
    bytes.starts_with(b"ID3") || (bytes.len() > 1 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0)
}

fn decode_wav(bytes: &[u8]) -> Result<SampleBuffer, DecodeError> {
    let mut reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(DecodeError::ZeroSampleRate);
    }
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f64> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(f64::from))
            .collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f64;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| f64::from(v) / scale))
                .collect::<Result<_, _>>()?
        }
    };

    Ok(SampleBuffer::new(downmix(&interleaved, channels), spec.sample_rate))
}

fn decode_mp3(bytes: &[u8]) -> Result<SampleBuffer, DecodeError> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(bytes));
    let mut data = Vec::new();
    let mut sample_rate = 0_u32;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if sample_rate == 0 {
                    sample_rate = u32::try_from(frame.sample_rate).unwrap_or(0);
                }
                let pcm: Vec<f64> = frame.data.iter().map(|&s| f64::from(s) / 32768.0).collect();
                data.extend(downmix(&pcm, frame.channels.max(1)));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) if data.is_empty() => return Err(DecodeError::Mp3(format!("{e:?}"))),
            // Trailing garbage after good frames: keep what decoded.
            Err(_) => break,
        }
    }

    if sample_rate == 0 {
        return Err(DecodeError::NoSamples);
    }
    Ok(SampleBuffer::new(data, sample_rate))
}

fn downmix(interleaved: &[f64], channels: usize) -> Vec<f64> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f64>() / channels as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::renderer::encode_wav;

    #[test]
    fn decodes_stereo_pcm_wav_to_mono() {
        let pcm: Vec<i16> = vec![16384, 0, -16384, -16384, 8192, 8192];
        let wav = encode_wav(&pcm, 8000, 2).unwrap();
        let buf = decode_audio(&wav).unwrap();
        assert_eq!(buf.sample_rate, 8000);
        assert_eq!(buf.len(), 3);
        assert!((buf.data[0] - 0.25).abs() < 1e-6);
        assert!((buf.data[1] + 0.5).abs() < 1e-6);
        assert!((buf.data[2] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn decodes_float_wav() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 22050,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut w = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for s in [0.0_f32, 0.5, -0.25] {
                w.write_sample(s).unwrap();
            }
            w.finalize().unwrap();
        }
        let buf = decode_audio(cursor.get_ref()).unwrap();
        assert_eq!(buf.data, vec![0.0, 0.5, -0.25]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(decode_audio(&[]), Err(DecodeError::Empty)));
        assert!(matches!(
            decode_audio(b"OggS\0\0\0\0"),
            Err(DecodeError::UnrecognizedFormat(_))
        ));
        assert!(matches!(decode_audio(b"RIFF\x10\0\0\0WAVEjunk"), Err(DecodeError::Wav(_))));
    }

    #[test]
    fn zero_rate_header_is_rejected() {
        let mut wav = encode_wav(&[1000, -1000, 500], 8000, 1).unwrap();
        wav[24..28].copy_from_slice(&0_u32.to_le_bytes());
        assert!(matches!(decode_audio(&wav), Err(DecodeError::ZeroSampleRate)));
    }

    #[test]
    fn empty_wav_has_no_samples() {
        let wav = encode_wav(&[], 8000, 1).unwrap();
        assert!(matches!(decode_audio(&wav), Err(DecodeError::NoSamples)));
    }

    #[test]
    fn corrupt_mp3_is_an_error() {
        let mut bytes = b"ID3".to_vec();
        bytes.extend_from_slice(&[0x04, 0, 0, 0, 0, 0, 0]);
        bytes.extend(std::iter::repeat_n(0x55, 64));
        assert!(decode_audio(&bytes).is_err());
    }
}
