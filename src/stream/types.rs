//! Messages exchanged with the recognition service.

use crate::audio::source::AudioChunk;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Parameters sent in the mandatory first message of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionConfig {
    pub sample_rate: u32,
    pub encoding: String,
    pub language: String,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            sample_rate: crate::defaults::SAMPLE_RATE,
            encoding: crate::defaults::ENCODING.to_string(),
            language: crate::defaults::LANGUAGE.to_string(),
        }
    }
}

/// One candidate transcription for a segment of audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    pub transcript: String,
    #[serde(default)]
    pub confidence: f32,
}

/// One incremental result from the service: a stability score plus the
/// candidate transcriptions in ranked order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    #[serde(default)]
    pub stability: f32,
    pub alternatives: Vec<Alternative>,
}

/// A message on the outbound (client → service) direction.
///
/// The first message of a session must be `Config`; every later message
/// carries exactly one audio chunk. Violating the order is a caller bug.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Config(RecognitionConfig),
    Audio(AudioChunk),
}

impl OutboundMessage {
    pub fn is_config(&self) -> bool {
        matches!(self, OutboundMessage::Config(_))
    }
}

/// Terminal status of a recognition stream, reported by `finish()`.
///
/// Codes follow WebSocket close semantics: 1000 is a normal closure,
/// anything else is a failure. The service may also report a failure
/// in-band before closing; that surfaces here too.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelStatus {
    code: u16,
    message: String,
}

/// Close code for a normal, successful termination.
pub const STATUS_OK: u16 = 1000;

impl ChannelStatus {
    pub fn ok() -> Self {
        Self {
            code: STATUS_OK,
            message: String::new(),
        }
    }

    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == STATUS_OK
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            write!(f, "ok")
        } else if self.message.is_empty() {
            write!(f, "code {}", self.code)
        } else {
            write!(f, "code {}: {}", self.code, self.message)
        }
    }
}

/// Wire frame sent by the client as JSON text.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub(crate) enum ClientFrame<'a> {
    Config {
        sample_rate: u32,
        encoding: &'a str,
        language: &'a str,
    },
}

/// Wire frame received from the service as JSON text.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub(crate) enum ServerFrame {
    /// Informational acknowledgement after the configuration message.
    Ready {
        #[serde(default)]
        #[allow(dead_code)]
        sample_rate: u32,
    },
    Result {
        #[serde(default)]
        stability: f32,
        alternatives: Vec<Alternative>,
    },
    Error {
        message: String,
    },
}
