//! Session orchestrator: wires source, channel, resolver and actuator
//! together and owns shutdown sequencing.
//!
//! A session moves through Init (actuator opened by the caller) →
//! Configuring → Streaming → Draining → Closed. Whatever happens after a
//! successful Init, the actuator is released exactly once, after all other
//! cleanup, before the outcome is surfaced.

use crate::actuator::CommandActuator;
use crate::audio::source::AudioSource;
use crate::command::normalize::normalize;
use crate::command::resolver::CommandMapping;
use crate::error::{Result, VoxdriveError};
use crate::output;
use crate::stream::channel::{AudioWriter, RecognitionChannel, ResultReader};
use crate::stream::producer::AudioProducer;
use crate::stream::types::{OutboundMessage, RecognitionConfig};
use std::time::Duration;
use tokio::sync::watch;

/// Session-level options.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub recognition: RecognitionConfig,
    pub max_duration: Duration,
    /// Label shown when echoing dispatched commands (the serial port path).
    pub port_label: String,
    pub quiet: bool,
    pub verbose: u8,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            recognition: RecognitionConfig::default(),
            max_duration: crate::defaults::MAX_SESSION,
            port_label: String::new(),
            quiet: true,
            verbose: 0,
        }
    }
}

/// One live streaming session. At most one exists per process run.
pub struct Session {
    channel: Box<dyn RecognitionChannel>,
    source: Box<dyn AudioSource>,
    actuator: Box<dyn CommandActuator>,
    mapping: CommandMapping,
    options: SessionOptions,
}

impl Session {
    pub fn new(
        channel: Box<dyn RecognitionChannel>,
        source: Box<dyn AudioSource>,
        actuator: Box<dyn CommandActuator>,
        mapping: CommandMapping,
        options: SessionOptions,
    ) -> Self {
        Self {
            channel,
            source,
            actuator,
            mapping,
            options,
        }
    }

    /// Run the session to completion.
    ///
    /// The actuator is closed on every path out of this function; the
    /// first error encountered wins and is returned after cleanup.
    pub async fn run(self) -> Result<()> {
        let Session {
            channel,
            source,
            mut actuator,
            mapping,
            options,
        } = self;

        let outcome =
            Self::run_pipeline(channel, source, actuator.as_mut(), &mapping, &options).await;

        // Closed: release the device unconditionally, after everything
        // else, whatever the outcome was.
        if let Err(e) = actuator.close() {
            output::warn(&format!("failed to close actuator: {e}"));
        }

        outcome
    }

    /// Configuring → Streaming → Draining.
    async fn run_pipeline(
        mut channel: Box<dyn RecognitionChannel>,
        source: Box<dyn AudioSource>,
        actuator: &mut dyn CommandActuator,
        mapping: &CommandMapping,
        options: &SessionOptions,
    ) -> Result<()> {
        // Configuring: establish the channel and send the configuration
        // message before any audio.
        channel.start().await?;
        let (mut writer, reader) = channel.split();

        let config_msg = OutboundMessage::Config(options.recognition.clone());
        match writer.write(config_msg, true).await {
            Ok(true) => {}
            Ok(false) => {
                // Stream closed before the configuration was accepted;
                // the terminal status explains why.
                let status = reader.finish().await;
                return Err(VoxdriveError::ChannelFinish { status });
            }
            Err(e) => {
                let status = reader.finish().await;
                if !status.is_ok() {
                    return Err(VoxdriveError::ChannelFinish { status });
                }
                return Err(e);
            }
        }

        // Streaming: producer task + result loop, concurrently.
        let (stop_tx, stop_rx) = watch::channel(false);
        let producer = AudioProducer::new(source, writer, options.max_duration, stop_rx);
        let producer_task = tokio::spawn(producer.run());

        let mut reader = reader;
        let mut session_err: Option<VoxdriveError> = None;

        'results: while let Some(result) = reader.read().await {
            if !options.quiet {
                output::print_stability(result.stability);
            }
            for alternative in &result.alternatives {
                if !options.quiet {
                    output::print_alternative(alternative.confidence, &alternative.transcript);
                }
                // The dispatch decision is local to this alternative;
                // nothing carries over between results.
                let command = mapping.resolve(&normalize(&alternative.transcript));
                if let Some(code) = command {
                    if !options.quiet {
                        output::print_dispatch(code, &options.port_label);
                    }
                    if let Err(e) = actuator.send(code) {
                        session_err = Some(e);
                        break 'results;
                    }
                }
            }
        }

        // Draining: stop the producer (a no-op if it already finished),
        // join it, then finish the channel exactly once.
        let _ = stop_tx.send(true);
        match producer_task.await {
            Ok(Ok(report)) => {
                if options.verbose >= 1 {
                    output::print_producer_report(&report);
                }
            }
            Ok(Err(e)) => {
                if session_err.is_none() {
                    session_err = Some(e);
                }
            }
            Err(join_err) => {
                if session_err.is_none() {
                    session_err = Some(VoxdriveError::AudioCapture {
                        message: format!("audio producer task failed: {join_err}"),
                    });
                }
            }
        }

        let status = reader.finish().await;
        if !status.is_ok() && session_err.is_none() {
            session_err = Some(VoxdriveError::ChannelFinish { status });
        }

        match session_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::MockActuator;
    use crate::audio::source::{AudioChunk, MockAudioSource};
    use crate::command::resolver::CommandCode;
    use crate::stream::channel::{Journal, MockChannel};
    use crate::stream::types::{Alternative, ChannelStatus, RecognitionResult};
    use std::sync::{Arc, Mutex};

    fn result_with(transcripts: &[(&str, f32)]) -> RecognitionResult {
        RecognitionResult {
            stability: 0.9,
            alternatives: transcripts
                .iter()
                .map(|(t, c)| Alternative {
                    transcript: t.to_string(),
                    confidence: *c,
                })
                .collect(),
        }
    }

    fn options() -> SessionOptions {
        SessionOptions {
            max_duration: Duration::from_secs(5),
            ..SessionOptions::default()
        }
    }

    #[tokio::test]
    async fn test_happy_path_dispatches_one_command() {
        let channel =
            MockChannel::new().with_results(vec![result_with(&[("  Robot Go Forward  ", 0.9)])]);
        let channel_state = channel.state();
        let actuator = MockActuator::new();
        let actuator_state = actuator.state();
        let source = MockAudioSource::new().with_chunk_count(2, 32);

        let session = Session::new(
            Box::new(channel),
            Box::new(source),
            Box::new(actuator),
            CommandMapping::builtin(),
            options(),
        );
        session.run().await.unwrap();

        let actuator_state = actuator_state.lock().unwrap();
        assert_eq!(actuator_state.sent, vec![CommandCode::Forward]);
        assert_eq!(actuator_state.close_count, 1);

        let channel_state = channel_state.lock().unwrap();
        assert_eq!(channel_state.config_writes, 1);
        assert_eq!(channel_state.writes_done_calls, 1);
        assert_eq!(channel_state.finish_calls, 1);
        assert!(!channel_state.protocol_violation);
    }

    #[tokio::test]
    async fn test_multiple_alternatives_dispatch_in_order() {
        let channel = MockChannel::new().with_results(vec![result_with(&[
            ("hello", 0.8),
            ("dance", 0.5),
        ])]);
        let actuator = MockActuator::new();
        let actuator_state = actuator.state();
        let source = MockAudioSource::new().with_chunk_count(1, 32);

        let session = Session::new(
            Box::new(channel),
            Box::new(source),
            Box::new(actuator),
            CommandMapping::builtin(),
            options(),
        );
        session.run().await.unwrap();

        let state = actuator_state.lock().unwrap();
        assert_eq!(state.sent, vec![CommandCode::Greet, CommandCode::Dance]);
    }

    #[tokio::test]
    async fn test_unmatched_transcript_touches_no_device() {
        let channel = MockChannel::new().with_results(vec![result_with(&[("banana", 0.7)])]);
        let actuator = MockActuator::new();
        let actuator_state = actuator.state();
        let source = MockAudioSource::new().with_chunk_count(1, 32);

        let session = Session::new(
            Box::new(channel),
            Box::new(source),
            Box::new(actuator),
            CommandMapping::builtin(),
            options(),
        );
        session.run().await.unwrap();

        let state = actuator_state.lock().unwrap();
        assert!(state.sent.is_empty());
        assert_eq!(state.close_count, 1);
    }

    #[tokio::test]
    async fn test_start_failure_still_closes_actuator() {
        let channel = MockChannel::new().with_start_failure();
        let actuator = MockActuator::new();
        let actuator_state = actuator.state();
        let source = MockAudioSource::new().with_chunk_count(1, 32);

        let session = Session::new(
            Box::new(channel),
            Box::new(source),
            Box::new(actuator),
            CommandMapping::builtin(),
            options(),
        );
        let result = session.run().await;

        assert!(matches!(result, Err(VoxdriveError::ChannelStart { .. })));
        assert_eq!(actuator_state.lock().unwrap().close_count, 1);
    }

    #[tokio::test]
    async fn test_actuator_failure_mid_stream_still_drains_and_closes() {
        let journal: Journal = Arc::new(Mutex::new(Vec::new()));
        let channel = MockChannel::new()
            .with_results(vec![result_with(&[("hello", 0.9)])])
            .with_journal(Arc::clone(&journal));
        let channel_state = channel.state();
        let actuator = MockActuator::new()
            .with_send_failure()
            .with_journal(Arc::clone(&journal));
        let actuator_state = actuator.state();
        let source = MockAudioSource::new().endless(AudioChunk::new(vec![0u8; 32]));

        let session = Session::new(
            Box::new(channel),
            Box::new(source),
            Box::new(actuator),
            CommandMapping::builtin(),
            options(),
        );
        let result = session.run().await;

        assert!(matches!(result, Err(VoxdriveError::DeviceWrite { .. })));
        assert_eq!(actuator_state.lock().unwrap().close_count, 1);

        let channel_state = channel_state.lock().unwrap();
        assert_eq!(channel_state.writes_done_calls, 1);
        assert_eq!(channel_state.finish_calls, 1);

        // Close is the last event, after the channel was finished.
        let log = journal.lock().unwrap();
        assert_eq!(log.last().map(String::as_str), Some("close"));
        let finish_at = log.iter().position(|e| e == "finish").unwrap();
        let close_at = log.iter().position(|e| e == "close").unwrap();
        assert!(finish_at < close_at);
    }

    #[tokio::test]
    async fn test_non_ok_finish_status_is_an_error_after_clean_exchange() {
        let channel = MockChannel::new()
            .with_results(vec![result_with(&[("hello", 0.9)])])
            .with_finish_status(ChannelStatus::error(1011, "quota exceeded"));
        let actuator = MockActuator::new();
        let actuator_state = actuator.state();
        let source = MockAudioSource::new().with_chunk_count(2, 32);

        let session = Session::new(
            Box::new(channel),
            Box::new(source),
            Box::new(actuator),
            CommandMapping::builtin(),
            options(),
        );
        let result = session.run().await;

        match result {
            Err(VoxdriveError::ChannelFinish { status }) => {
                assert_eq!(status.message(), "quota exceeded");
            }
            other => panic!("expected ChannelFinish, got {:?}", other.map(|_| ())),
        }
        // Dispatch happened before the bad finish, and the device was
        // still released exactly once.
        let state = actuator_state.lock().unwrap();
        assert_eq!(state.sent, vec![CommandCode::Greet]);
        assert_eq!(state.close_count, 1);
    }

    #[tokio::test]
    async fn test_peer_close_mid_stream_is_not_an_error() {
        let channel = MockChannel::new().with_peer_close_after(2);
        let channel_state = channel.state();
        let actuator = MockActuator::new();
        let actuator_state = actuator.state();
        let source = MockAudioSource::new().with_chunk_count(10, 32);

        let session = Session::new(
            Box::new(channel),
            Box::new(source),
            Box::new(actuator),
            CommandMapping::builtin(),
            options(),
        );
        session.run().await.unwrap();

        let channel_state = channel_state.lock().unwrap();
        assert_eq!(channel_state.audio_writes_attempted, 3);
        assert_eq!(channel_state.writes_done_calls, 1);
        assert_eq!(channel_state.writes_after_done, 0);
        assert_eq!(actuator_state.lock().unwrap().close_count, 1);
    }

    #[tokio::test]
    async fn test_stale_command_is_not_reused_across_results() {
        // A matching result followed by a non-matching one must dispatch
        // exactly once.
        let channel = MockChannel::new().with_results(vec![
            result_with(&[("dance", 0.9)]),
            result_with(&[("banana", 0.9)]),
        ]);
        let actuator = MockActuator::new();
        let actuator_state = actuator.state();
        let source = MockAudioSource::new().with_chunk_count(2, 32);

        let session = Session::new(
            Box::new(channel),
            Box::new(source),
            Box::new(actuator),
            CommandMapping::builtin(),
            options(),
        );
        session.run().await.unwrap();

        assert_eq!(actuator_state.lock().unwrap().sent, vec![CommandCode::Dance]);
    }
}
