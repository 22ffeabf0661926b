//! Default configuration constants for voxdrive.
//!
//! This module provides shared constants used across different configuration
//! types to ensure consistency and eliminate duplication.

use std::time::Duration;

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard for speech recognition and provides a good balance
/// between quality and computational efficiency for voice applications.
pub const SAMPLE_RATE: u32 = 16000;

/// Default audio encoding advertised in the configuration message.
pub const ENCODING: &str = "linear16";

/// Default recognition language (BCP-47 tag).
pub const LANGUAGE: &str = "en-US";

/// Default recognition service endpoint.
pub const ENDPOINT: &str = "ws://127.0.0.1:5003/asr";

/// Size of one outbound audio chunk in bytes.
///
/// Audio is streamed in 64 KiB units, simulating content arriving from a
/// microphone driver that hands over one filled buffer at a time.
pub const CHUNK_BYTES: usize = 64 * 1024;

/// Number of audio chunks buffered between the capture callback and the
/// producer. Two in-flight buffers are enough to absorb callback jitter
/// without letting stale audio accumulate.
pub const CAPTURE_QUEUE_DEPTH: usize = 2;

/// Maximum session length. The producer half-closes the stream when this
/// elapses, even if the microphone keeps delivering audio.
pub const MAX_SESSION: Duration = Duration::from_secs(60 * 10);

/// Serial line defaults for the robot: 9600 baud, 8 data bits, odd parity,
/// one stop bit.
pub const SERIAL_BAUD: u32 = 9600;
pub const SERIAL_DATA_BITS: u8 = 8;
pub const SERIAL_PARITY: &str = "odd";
pub const SERIAL_STOP_BITS: u8 = 1;

/// Serial write timeout in milliseconds.
///
/// Commands are single bytes; anything slower than this means the line is
/// wedged and the session should fail rather than stall dispatch.
pub const SERIAL_TIMEOUT_MS: u64 = 60;
