//! Deterministic synthetic audio.
//!
//! All generators are pure: identical arguments produce identical bytes.

use bytes::{BufMut, Bytes, BytesMut};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// `samples` little-endian 16-bit zero samples.
pub fn silent_pcm16(samples: usize) -> Bytes {
    Bytes::from(vec![0u8; samples * 2])
}

/// A full-scale-ish sine tone as little-endian 16-bit PCM.
pub fn sine_pcm16(freq_hz: f32, sample_rate: u32, samples: usize) -> Bytes {
    let mut buf = BytesMut::with_capacity(samples * 2);
    let step = 2.0 * std::f32::consts::PI * freq_hz / sample_rate.max(1) as f32;
    for n in 0..samples {
        let v = (step * n as f32).sin() * (i16::MAX as f32 * 0.5);
        buf.put_i16_le(v as i16);
    }
    buf.freeze()
}

/// Seeded white noise as little-endian 16-bit PCM. Useful as "not speech".
pub fn noise_pcm16(seed: u64, samples: usize) -> Bytes {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut buf = BytesMut::with_capacity(samples * 2);
    for _ in 0..samples {
        buf.put_i16_le(rng.random_range(-4096i16..=4096));
    }
    buf.freeze()
}

/// Wrap interleaved PCM16 samples in a canonical 44-byte RIFF/WAVE header.
pub fn wav_pcm16(pcm: &[u8], sample_rate: u32, channels: u16) -> Bytes {
    let channels = channels.max(1);
    let block_align = channels * 2;
    let byte_rate = sample_rate * u32::from(block_align);
    let data_len = pcm.len() as u32;

    let mut buf = BytesMut::with_capacity(44 + pcm.len());
    buf.put_slice(b"RIFF");
    buf.put_u32_le(36 + data_len);
    buf.put_slice(b"WAVE");
    buf.put_slice(b"fmt ");
    buf.put_u32_le(16);
    buf.put_u16_le(1); // PCM
    buf.put_u16_le(channels);
    buf.put_u32_le(sample_rate);
    buf.put_u32_le(byte_rate);
    buf.put_u16_le(block_align);
    buf.put_u16_le(16);
    buf.put_slice(b"data");
    buf.put_u32_le(data_len);
    buf.put_slice(pcm);
    buf.freeze()
}

/// Split audio into fixed-size chunks for streaming, last chunk may be short.
pub fn chunks(audio: &Bytes, chunk_bytes: usize) -> Vec<Bytes> {
    let chunk_bytes = chunk_bytes.max(1);
    (0..audio.len()).step_by(chunk_bytes).map(|start| {
        let end = (start + chunk_bytes).min(audio.len());
        audio.slice(start..end)
    }).collect()
}
