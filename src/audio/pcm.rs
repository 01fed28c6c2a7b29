//! PCM16 conversion
//!
//! The wire format for audio is mono 16-bit little-endian PCM, base64
//! encoded. Samples inside the pipeline are `f32` in `[-1.0, 1.0]`.

use crate::audio::error::{AudioError, AudioResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Convert float samples to PCM16 little-endian bytes, clamping out-of-range input
pub fn f32_to_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut data = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        let value = if clamped < 0.0 {
            (clamped * 32768.0) as i16
        } else {
            (clamped * 32767.0) as i16
        };
        data.extend_from_slice(&value.to_le_bytes());
    }
    data
}

/// Convert PCM16 little-endian bytes to float samples
pub fn pcm16_to_f32(data: &[u8]) -> AudioResult<Vec<f32>> {
    if data.len() % 2 != 0 {
        return Err(AudioError::InvalidFrame(format!(
            "PCM16 data length {} is not even",
            data.len()
        )));
    }
    Ok(data
        .chunks_exact(2)
        .map(|pair| {
            let value = i16::from_le_bytes([pair[0], pair[1]]);
            if value < 0 {
                value as f32 / 32768.0
            } else {
                value as f32 / 32767.0
            }
        })
        .collect())
}

pub fn encode_base64(samples: &[f32]) -> String {
    STANDARD.encode(f32_to_pcm16(samples))
}

pub fn decode_base64(encoded: &str) -> AudioResult<Vec<f32>> {
    pcm16_to_f32(&STANDARD.decode(encoded)?)
}

/// Duration of `samples` mono samples at `sample_rate`
pub fn samples_to_ms(samples: usize, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    samples as f64 * 1000.0 / sample_rate as f64
}

pub fn ms_to_samples(ms: f64, sample_rate: u32) -> usize {
    (ms.max(0.0) * sample_rate as f64 / 1000.0).round() as usize
}
