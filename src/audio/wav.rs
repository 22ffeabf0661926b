//! WAV file audio source.
//!
//! Streams a recorded file through the pipeline in fixed-size chunks, at
//! read-loop cadence rather than device cadence. End of file is reported as
//! exhaustion, never as an error.

use crate::audio::source::{AudioChunk, AudioSource};
use crate::defaults;
use crate::error::{Result, VoxdriveError};
use async_trait::async_trait;
use std::io::Read;
use std::path::Path;

/// Audio source backed by a WAV file.
pub struct WavFileSource {
    pcm: Vec<u8>,
    position: usize,
    chunk_bytes: usize,
    sample_rate: u32,
}

impl WavFileSource {
    /// Open a WAV file from disk.
    pub fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(Box::new(std::io::BufReader::new(file)))
    }

    /// Build a source from any reader containing WAV data.
    pub fn from_reader(reader: Box<dyn Read + Send>) -> Result<Self> {
        let mut wav = hound::WavReader::new(reader).map_err(|e| VoxdriveError::AudioFormat {
            message: format!("Failed to parse WAV data: {}", e),
        })?;
        let spec = wav.spec();

        let samples: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Int, 16) => wav
                .samples::<i16>()
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| VoxdriveError::AudioFormat {
                    message: format!("Failed to read WAV samples: {}", e),
                })?,
            (hound::SampleFormat::Float, 32) => wav
                .samples::<f32>()
                .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| VoxdriveError::AudioFormat {
                    message: format!("Failed to read WAV samples: {}", e),
                })?,
            (format, bits) => {
                return Err(VoxdriveError::AudioFormat {
                    message: format!(
                        "Unsupported WAV format: {:?}/{} bits (expected 16-bit PCM or 32-bit float)",
                        format, bits
                    ),
                });
            }
        };

        // Mix multi-channel audio down to mono by averaging frames.
        let channels = spec.channels as usize;
        let mono: Vec<i16> = if channels <= 1 {
            samples
        } else {
            samples
                .chunks_exact(channels)
                .map(|frame| {
                    let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                    (sum / channels as i32) as i16
                })
                .collect()
        };

        Ok(Self {
            pcm: AudioChunk::from_samples(&mono).into_bytes(),
            position: 0,
            chunk_bytes: defaults::CHUNK_BYTES,
            sample_rate: spec.sample_rate,
        })
    }

    /// Sample rate of the file, for the recognition configuration message.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Override the chunk size (tests use small chunks).
    pub fn with_chunk_bytes(mut self, chunk_bytes: usize) -> Self {
        self.chunk_bytes = chunk_bytes;
        self
    }

    /// Total PCM payload length in bytes.
    pub fn len_bytes(&self) -> usize {
        self.pcm.len()
    }
}

#[async_trait]
impl AudioSource for WavFileSource {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    async fn next_chunk(&mut self) -> Result<Option<AudioChunk>> {
        if self.position >= self.pcm.len() {
            return Ok(None);
        }
        let end = (self.position + self.chunk_bytes).min(self.pcm.len());
        let chunk = AudioChunk::new(self.pcm[self.position..end].to_vec());
        self.position = end;
        Ok(Some(chunk))
    }
}
