//! Duplex recognition channel abstraction.
//!
//! A channel is started once, then split into its two halves: the write
//! half (owned by the audio producer) and the read half (owned by the
//! session). Each half has exactly one owner, so no locking is needed.
//! `finish` consumes the read half, making "called exactly once" a
//! type-level guarantee.

use crate::error::{Result, VoxdriveError};
use crate::stream::types::{ChannelStatus, OutboundMessage, RecognitionResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared event journal for tests that assert cross-component ordering.
pub type Journal = Arc<Mutex<Vec<String>>>;

pub(crate) fn record(journal: &Option<Journal>, event: &str) {
    if let Some(journal) = journal
        && let Ok(mut log) = journal.lock()
    {
        log.push(event.to_string());
    }
}

/// A bidirectional recognition stream, before it is split.
#[async_trait]
pub trait RecognitionChannel: Send {
    /// Establish the channel. Must succeed before any write or read.
    async fn start(&mut self) -> Result<()>;

    /// Split into the write half and the read half.
    fn split(self: Box<Self>) -> (Box<dyn AudioWriter>, Box<dyn ResultReader>);
}

/// Outbound half: configuration and audio messages.
#[async_trait]
pub trait AudioWriter: Send {
    /// Send one message. Returns `Ok(false)` — not an error — when the
    /// peer has already closed the stream; the caller must stop writing
    /// and proceed to finish. `urgent` asks the transport to flush
    /// immediately instead of batching.
    async fn write(&mut self, message: OutboundMessage, urgent: bool) -> Result<bool>;

    /// Half-close the outbound direction. Callers must call at most once.
    async fn writes_done(&mut self) -> Result<()>;
}

/// Inbound half: recognition results and the terminal status.
#[async_trait]
pub trait ResultReader: Send {
    /// Wait for the next result; `None` when the peer has signaled
    /// end-of-results.
    async fn read(&mut self) -> Option<RecognitionResult>;

    /// Drain the stream to termination and return the terminal status.
    /// Consumes the reader: exactly once per session.
    async fn finish(self: Box<Self>) -> ChannelStatus;
}

// ── Mock channel ──────────────────────────────────────────────────────────

/// Observable state of a [`MockChannel`], shared with the test.
#[derive(Debug, Default)]
pub struct MockChannelState {
    pub started: bool,
    /// Total accepted writes, the configuration message included.
    pub writes_accepted: u32,
    /// Audio writes attempted (accepted, refused, or failed).
    pub audio_writes_attempted: u32,
    pub config_writes: u32,
    pub writes_done_calls: u32,
    pub writes_after_done: u32,
    pub finish_calls: u32,
    /// Set when the first write of the session was not the configuration
    /// message.
    pub protocol_violation: bool,
}

#[derive(Debug, Default)]
struct MockBehavior {
    fail_start: bool,
    /// Refuse (return `false` from) audio writes after this many were
    /// accepted.
    peer_close_after_audio: Option<u32>,
    /// Hard-fail the n-th write (1-based, config included).
    fail_write_at: Option<u32>,
    finish_status: Option<ChannelStatus>,
}

/// Scripted in-memory channel for tests.
///
/// Enforces the session protocol: the first write must be the
/// configuration message, and nothing may be written after `writes_done`.
/// Results are handed out one per `read`; once they run out, `read` waits
/// for the write side to half-close before reporting end-of-results, the
/// way a real service only ends its result stream after the client is done
/// sending audio.
pub struct MockChannel {
    state: Arc<Mutex<MockChannelState>>,
    behavior: MockBehavior,
    results: VecDeque<RecognitionResult>,
    journal: Option<Journal>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockChannelState::default())),
            behavior: MockBehavior::default(),
            results: VecDeque::new(),
            journal: None,
        }
    }

    /// Handle for inspecting the channel after the session ends.
    pub fn state(&self) -> Arc<Mutex<MockChannelState>> {
        Arc::clone(&self.state)
    }

    /// Script the results the service will deliver, in order.
    pub fn with_results(mut self, results: Vec<RecognitionResult>) -> Self {
        self.results = results.into();
        self
    }

    /// Fail `start()` with a `ChannelStart` error.
    pub fn with_start_failure(mut self) -> Self {
        self.behavior.fail_start = true;
        self
    }

    /// Return `false` from audio writes after `accepted` of them succeeded.
    pub fn with_peer_close_after(mut self, accepted: u32) -> Self {
        self.behavior.peer_close_after_audio = Some(accepted);
        self
    }

    /// Hard-fail the n-th write (1-based, configuration counts).
    pub fn with_write_failure_at(mut self, nth: u32) -> Self {
        self.behavior.fail_write_at = Some(nth);
        self
    }

    /// Terminal status returned by `finish()`.
    pub fn with_finish_status(mut self, status: ChannelStatus) -> Self {
        self.behavior.finish_status = Some(status);
        self
    }

    /// Attach a shared event journal for ordering assertions.
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecognitionChannel for MockChannel {
    async fn start(&mut self) -> Result<()> {
        if self.behavior.fail_start {
            return Err(VoxdriveError::ChannelStart {
                message: "mock start failure".to_string(),
            });
        }
        if let Ok(mut state) = self.state.lock() {
            state.started = true;
        }
        Ok(())
    }

    fn split(self: Box<Self>) -> (Box<dyn AudioWriter>, Box<dyn ResultReader>) {
        let writer = MockWriter {
            state: Arc::clone(&self.state),
            behavior: self.behavior,
            total_writes: 0,
            journal: self.journal.clone(),
        };
        let reader = MockReader {
            state: Arc::clone(&self.state),
            results: self.results,
            finish_status: writer.behavior.finish_status.clone(),
            journal: self.journal,
        };
        (Box::new(writer), Box::new(reader))
    }
}

struct MockWriter {
    state: Arc<Mutex<MockChannelState>>,
    behavior: MockBehavior,
    total_writes: u32,
    journal: Option<Journal>,
}

#[async_trait]
impl AudioWriter for MockWriter {
    async fn write(&mut self, message: OutboundMessage, _urgent: bool) -> Result<bool> {
        self.total_writes += 1;
        let mut state = self.state.lock().expect("mock state lock");

        if !state.started {
            state.protocol_violation = true;
            return Err(VoxdriveError::ChannelWrite {
                message: "write before start".to_string(),
            });
        }
        if state.writes_done_calls > 0 {
            state.writes_after_done += 1;
            return Err(VoxdriveError::ChannelWrite {
                message: "write after writes_done".to_string(),
            });
        }
        if self.total_writes == 1 && !message.is_config() {
            state.protocol_violation = true;
            return Err(VoxdriveError::ChannelWrite {
                message: "protocol violation: first message must be the configuration"
                    .to_string(),
            });
        }
        if self.total_writes > 1 && message.is_config() {
            state.protocol_violation = true;
            return Err(VoxdriveError::ChannelWrite {
                message: "protocol violation: configuration sent twice".to_string(),
            });
        }
        if let Some(nth) = self.behavior.fail_write_at
            && self.total_writes == nth
        {
            return Err(VoxdriveError::ChannelWrite {
                message: "mock write failure".to_string(),
            });
        }

        match &message {
            OutboundMessage::Config(_) => {
                state.config_writes += 1;
            }
            OutboundMessage::Audio(_) => {
                state.audio_writes_attempted += 1;
                if let Some(limit) = self.behavior.peer_close_after_audio
                    && state.audio_writes_attempted > limit
                {
                    // Peer closed: refusal, not an error.
                    return Ok(false);
                }
            }
        }
        state.writes_accepted += 1;
        Ok(true)
    }

    async fn writes_done(&mut self) -> Result<()> {
        record(&self.journal, "writes_done");
        let mut state = self.state.lock().expect("mock state lock");
        state.writes_done_calls += 1;
        Ok(())
    }
}

struct MockReader {
    state: Arc<Mutex<MockChannelState>>,
    results: VecDeque<RecognitionResult>,
    finish_status: Option<ChannelStatus>,
    journal: Option<Journal>,
}

impl MockReader {
    fn writes_done(&self) -> bool {
        self.state
            .lock()
            .map(|s| s.writes_done_calls > 0)
            .unwrap_or(true)
    }
}

#[async_trait]
impl ResultReader for MockReader {
    async fn read(&mut self) -> Option<RecognitionResult> {
        if let Some(result) = self.results.pop_front() {
            return Some(result);
        }
        // End-of-results only after the client half-closed, with a safety
        // cap so a broken producer cannot hang a test forever.
        for _ in 0..400 {
            if self.writes_done() {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        None
    }

    async fn finish(self: Box<Self>) -> ChannelStatus {
        record(&self.journal, "finish");
        if let Ok(mut state) = self.state.lock() {
            state.finish_calls += 1;
        }
        self.finish_status.unwrap_or_else(ChannelStatus::ok)
    }
}
