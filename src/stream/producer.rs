//! Audio producer: feeds chunks from the source into the recognition
//! channel until something tells it to stop.
//!
//! Runs as its own task, concurrently with the session's result loop. The
//! producer owns the write half of the channel exclusively; on any
//! termination path it half-closes the stream exactly once and never
//! writes again.

use crate::audio::source::AudioSource;
use crate::error::Result;
use crate::stream::channel::AudioWriter;
use crate::stream::types::OutboundMessage;
use std::time::Duration;
use tokio::sync::watch;

/// Why the producer stopped streaming. First condition to occur wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    /// The session duration cap elapsed.
    DurationElapsed,
    /// The session asked the producer to stop.
    StopSignal,
    /// The channel refused a write because the peer closed.
    PeerClosed,
    /// The audio source ran out of input (end of file).
    SourceExhausted,
}

/// Summary of a finished producer run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerReport {
    pub chunks_sent: u64,
    pub bytes_sent: u64,
    pub stopped_by: StopCause,
}

/// Streams audio chunks into the channel's write half.
pub struct AudioProducer {
    source: Box<dyn AudioSource>,
    writer: Box<dyn AudioWriter>,
    max_duration: Duration,
    stop_rx: watch::Receiver<bool>,
}

impl AudioProducer {
    pub fn new(
        source: Box<dyn AudioSource>,
        writer: Box<dyn AudioWriter>,
        max_duration: Duration,
        stop_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source,
            writer,
            max_duration,
            stop_rx,
        }
    }

    /// Run until a termination condition, then half-close and return.
    ///
    /// The configuration message is the session's responsibility and has
    /// already been written when the producer starts; this task sends
    /// audio only. Audio writes are urgent: chunks must reach the service
    /// at capture cadence, not sit in a transport buffer.
    pub async fn run(mut self) -> Result<ProducerReport> {
        self.source.start()?;

        let mut chunks_sent: u64 = 0;
        let mut bytes_sent: u64 = 0;

        let deadline = tokio::time::sleep(self.max_duration);
        tokio::pin!(deadline);

        let stopped_by = loop {
            tokio::select! {
                _ = &mut deadline => {
                    break StopCause::DurationElapsed;
                }
                changed = self.stop_rx.changed() => {
                    // A dropped sender also means the session is gone.
                    if changed.is_err() || *self.stop_rx.borrow() {
                        break StopCause::StopSignal;
                    }
                }
                chunk = self.source.next_chunk() => {
                    match chunk {
                        Ok(Some(chunk)) => {
                            let len = chunk.len() as u64;
                            match self.writer.write(OutboundMessage::Audio(chunk), true).await {
                                Ok(true) => {
                                    chunks_sent += 1;
                                    bytes_sent += len;
                                }
                                Ok(false) => break StopCause::PeerClosed,
                                Err(e) => {
                                    // Hard write failure: still half-close so
                                    // the reader can drain, then surface the
                                    // error.
                                    let _ = self.writer.writes_done().await;
                                    let _ = self.source.stop();
                                    return Err(e);
                                }
                            }
                        }
                        Ok(None) => break StopCause::SourceExhausted,
                        Err(e) => {
                            let _ = self.writer.writes_done().await;
                            let _ = self.source.stop();
                            return Err(e);
                        }
                    }
                }
            }
        };

        self.writer.writes_done().await?;
        if let Err(e) = self.source.stop() {
            eprintln!("voxdrive: failed to stop audio capture: {e}");
        }

        Ok(ProducerReport {
            chunks_sent,
            bytes_sent,
            stopped_by,
        })
    }
}
