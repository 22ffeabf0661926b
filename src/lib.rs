//! voxdrive - voice control for a serial-attached robot
//!
//! Streams captured audio to a remote speech-recognition service over a
//! duplex channel and maps recognized phrases onto single-byte robot
//! commands.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod actuator;
pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod command;
pub mod config;
pub mod defaults;
pub mod error;
pub mod output;
pub mod session;
pub mod stream;

// Core traits (source → channel → resolve → actuate)
pub use actuator::CommandActuator;
pub use audio::source::{AudioChunk, AudioSource};
pub use stream::channel::{AudioWriter, RecognitionChannel, ResultReader};

// Session
pub use session::{Session, SessionOptions};

// Command grammar
pub use command::normalize::normalize;
pub use command::resolver::{CommandCode, CommandMapping};

// Error handling
pub use error::{Result, VoxdriveError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_contains_plus_when_git_hash_present() {
        let ver = version_string();
        if option_env!("GIT_HASH").is_some_and(|h| !h.is_empty()) {
            assert!(
                ver.contains('+'),
                "With GIT_HASH set, version should contain '+', got: {}",
                ver
            );
        } else {
            assert_eq!(ver, env!("CARGO_PKG_VERSION"));
        }
    }
}
