//! Audio source abstraction and mock implementation.

use crate::error::{Result, VoxdriveError};
use async_trait::async_trait;
use std::collections::VecDeque;

/// One unit of raw audio: 16-bit little-endian PCM bytes.
///
/// Chunks are moved, never shared: ownership transfers from the source to
/// the producer and from the producer into the channel on write.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    data: Vec<u8>,
}

impl AudioChunk {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Build a chunk from i16 samples (little-endian byte order).
    pub fn from_samples(samples: &[i16]) -> Self {
        let mut data = Vec::with_capacity(samples.len() * 2);
        for sample in samples {
            data.extend_from_slice(&sample.to_le_bytes());
        }
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// Trait for audio source devices.
///
/// This trait allows swapping implementations (microphone, WAV file, mock).
/// A source must report end-of-input (`Ok(None)`) distinctly from errors.
#[async_trait]
pub trait AudioSource: Send {
    /// Start capturing audio from the source.
    fn start(&mut self) -> Result<()>;

    /// Stop capturing audio from the source.
    fn stop(&mut self) -> Result<()>;

    /// Wait for the next chunk of audio.
    ///
    /// # Returns
    /// `Ok(Some(chunk))` when audio is available, `Ok(None)` when the
    /// source is exhausted (end of file), or an error.
    async fn next_chunk(&mut self) -> Result<Option<AudioChunk>>;
}

/// Mock audio source for testing.
pub struct MockAudioSource {
    chunks: VecDeque<AudioChunk>,
    endless_chunk: Option<AudioChunk>,
    chunk_delay_ms: u64,
    is_started: bool,
    should_fail_start: bool,
    error_message: String,
}

impl MockAudioSource {
    /// Create a new mock audio source with no queued chunks.
    pub fn new() -> Self {
        Self {
            chunks: VecDeque::new(),
            endless_chunk: None,
            chunk_delay_ms: 1,
            is_started: false,
            should_fail_start: false,
            error_message: "mock audio error".to_string(),
        }
    }

    /// Configure the mock to yield the given chunks, then report exhaustion.
    pub fn with_chunks(mut self, chunks: Vec<AudioChunk>) -> Self {
        self.chunks = chunks.into();
        self
    }

    /// Configure the mock to yield `count` identical chunks of `size` bytes.
    pub fn with_chunk_count(mut self, count: usize, size: usize) -> Self {
        self.chunks = (0..count).map(|_| AudioChunk::new(vec![0u8; size])).collect();
        self
    }

    /// Configure the mock to never exhaust: after the queued chunks it keeps
    /// yielding copies of the given chunk, like a live microphone.
    pub fn endless(mut self, chunk: AudioChunk) -> Self {
        self.endless_chunk = Some(chunk);
        self
    }

    /// Configure the mock to fail on start.
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Check if the source is started.
    pub fn is_started(&self) -> bool {
        self.is_started
    }
}

impl Default for MockAudioSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioSource for MockAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.should_fail_start {
            Err(VoxdriveError::AudioCapture {
                message: self.error_message.clone(),
            })
        } else {
            self.is_started = true;
            Ok(())
        }
    }

    fn stop(&mut self) -> Result<()> {
        self.is_started = false;
        Ok(())
    }

    async fn next_chunk(&mut self) -> Result<Option<AudioChunk>> {
        // Small pause per chunk so concurrent readers get scheduled,
        // mimicking capture cadence.
        tokio::time::sleep(std::time::Duration::from_millis(self.chunk_delay_ms)).await;
        if let Some(chunk) = self.chunks.pop_front() {
            return Ok(Some(chunk));
        }
        match &self.endless_chunk {
            Some(chunk) => Ok(Some(chunk.clone())),
            None => Ok(None),
        }
    }
}
