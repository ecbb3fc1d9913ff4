use base64::Engine;
use bytes::Bytes;
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

/// Samples handed to the resampler per processing call (20 ms at 24 kHz).
const RESAMPLER_CHUNK_SIZE: usize = 480;

/// Creates a resampler to convert between audio sample rates.
pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,                     // No cutoff frequency, pass all frequencies
        PolynomialDegree::Cubic, // Cubic interpolation for quality
        chunk_size,
        1, // 1 channel (mono)
    )?;
    Ok(resampler)
}

/// Encodes raw bytes as standard base64.
pub fn encode_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Interprets little-endian PCM16 bytes as normalized f32 samples.
pub fn pcm16_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]) as f32 / 32768.0)
        .collect()
}

/// Converts f32 samples back to little-endian PCM16 bytes.
pub fn f32_to_pcm16(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|&sample| {
            let v = (sample * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
            v.to_le_bytes()
        })
        .collect()
}

/// Re-frames a PCM16 byte stream so every emitted chunk holds whole samples.
///
/// Providers stream arbitrary byte ranges; an odd trailing byte is carried
/// into the next chunk.
#[derive(Debug, Default)]
pub struct PcmFramer {
    carry: Option<u8>,
}

impl PcmFramer {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(chunk.len() + 1);
        out.extend(self.carry.take());
        out.extend_from_slice(chunk);
        if out.len() % 2 == 1 {
            self.carry = out.pop();
        }
        out
    }

    /// True when a dangling half sample is waiting for its second byte.
    pub fn has_carry(&self) -> bool {
        self.carry.is_some()
    }
}

/// Streaming resampler that buffers input until a full processing chunk is
/// available.
struct StreamResampler {
    inner: FastFixedIn<f32>,
    pending: Vec<f32>,
}

impl StreamResampler {
    fn process(&mut self, samples: &[f32]) -> anyhow::Result<Vec<f32>> {
        self.pending.extend_from_slice(samples);
        let mut out = Vec::new();
        loop {
            let needed = self.inner.input_frames_next();
            if self.pending.len() < needed {
                break;
            }
            let wave = [self.pending.drain(..needed).collect::<Vec<f32>>()];
            let processed = self.inner.process(&wave[..], None)?;
            out.extend_from_slice(&processed[0]);
        }
        Ok(out)
    }

    fn finish(&mut self) -> anyhow::Result<Vec<f32>> {
        if self.pending.is_empty() {
            return Ok(Vec::new());
        }
        let wave = [std::mem::take(&mut self.pending)];
        let processed = self.inner.process_partial(Some(&wave[..]), None)?;
        self.inner.reset();
        Ok(processed.into_iter().next().unwrap_or_default())
    }
}

/// Turns one sentence's provider audio into client-ready PCM16 frames.
pub struct PcmConverter {
    framer: PcmFramer,
    resampler: Option<StreamResampler>,
}

impl PcmConverter {
    /// Builds a converter from `source_rate` to `target_rate`; no resampling
    /// happens when the two match.
    pub fn new(source_rate: u32, target_rate: u32) -> anyhow::Result<Self> {
        let resampler = if source_rate == target_rate {
            None
        } else {
            Some(StreamResampler {
                inner: create_resampler(
                    source_rate as f64,
                    target_rate as f64,
                    RESAMPLER_CHUNK_SIZE,
                )?,
                pending: Vec::new(),
            })
        };
        Ok(Self {
            framer: PcmFramer::default(),
            resampler,
        })
    }

    /// Converts a provider chunk. May return an empty buffer while input is
    /// being accumulated.
    pub fn push(&mut self, chunk: &[u8]) -> anyhow::Result<Bytes> {
        let whole = self.framer.push(chunk);
        match self.resampler.as_mut() {
            None => Ok(Bytes::from(whole)),
            Some(resampler) => {
                let samples = resampler.process(&pcm16_to_f32(&whole))?;
                Ok(Bytes::from(f32_to_pcm16(&samples)))
            }
        }
    }

    /// Flushes whatever the resampler still holds at the end of a sentence.
    pub fn finish(&mut self) -> anyhow::Result<Bytes> {
        match self.resampler.as_mut() {
            None => Ok(Bytes::new()),
            Some(resampler) => Ok(Bytes::from(f32_to_pcm16(&resampler.finish()?))),
        }
    }
}
