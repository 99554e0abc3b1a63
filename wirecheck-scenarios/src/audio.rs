use std::time::Duration;

use bytes::Bytes;
use wirecheck::fixtures::synth;
use wirecheck::{HarnessError, Session};

pub(crate) const SAMPLE_RATE: u32 = 16_000;

/// 1024 samples of linear16, the chunk size starters see from browsers.
pub(crate) const CHUNK_BYTES: usize = 2048;

const WAV_HEADER_LEN: usize = 44;

/// Raw PCM of a canonical 16-bit WAV; anything else passes through unchanged.
pub(crate) fn pcm_of(audio: &Bytes) -> Bytes {
    if audio.len() > WAV_HEADER_LEN && audio.starts_with(b"RIFF") && &audio[8..12] == b"WAVE" {
        audio.slice(WAV_HEADER_LEN..)
    } else {
        audio.clone()
    }
}

/// `duration` of silence at [`SAMPLE_RATE`].
pub(crate) fn silence(duration: Duration) -> Bytes {
    let samples = (duration.as_millis() as usize) * SAMPLE_RATE as usize / 1000;
    synth::silent_pcm16(samples)
}

/// Send `pcm` as binary frames of [`CHUNK_BYTES`].
pub(crate) async fn stream_pcm(session: &Session, pcm: &Bytes) -> Result<usize, HarnessError> {
    let chunks = synth::chunks(pcm, CHUNK_BYTES);
    let sent = chunks.len();
    for chunk in chunks {
        session.send_binary(chunk).await?;
    }
    Ok(sent)
}
