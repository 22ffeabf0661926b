//! Error types for voxdrive.

use crate::stream::types::ChannelStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxdriveError {
    // Recognition channel errors
    #[error("Failed to start recognition stream: {message}")]
    ChannelStart { message: String },

    #[error("Failed to write to recognition stream: {message}")]
    ChannelWrite { message: String },

    #[error("Recognition stream finished with an error: {status}")]
    ChannelFinish { status: ChannelStatus },

    // Actuator device errors
    #[error("Failed to open serial device {port}: {message}")]
    DeviceOpen { port: String, message: String },

    #[error("Failed to write command to serial device: {message}")]
    DeviceWrite { message: String },

    // Audio capture errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    #[error("Unsupported audio input: {message}")]
    AudioFormat { message: String },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, VoxdriveError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_channel_start_display() {
        let error = VoxdriveError::ChannelStart {
            message: "connection refused".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to start recognition stream: connection refused"
        );
    }

    #[test]
    fn test_channel_write_display() {
        let error = VoxdriveError::ChannelWrite {
            message: "broken pipe".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to write to recognition stream: broken pipe"
        );
    }

    #[test]
    fn test_channel_finish_display_includes_status_verbatim() {
        let error = VoxdriveError::ChannelFinish {
            status: ChannelStatus::error(1011, "internal service error"),
        };
        assert!(
            error.to_string().contains("internal service error"),
            "finish error should carry the terminal status text: {}",
            error
        );
    }

    #[test]
    fn test_device_open_display() {
        let error = VoxdriveError::DeviceOpen {
            port: "/dev/ttyUSB0".to_string(),
            message: "permission denied".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to open serial device /dev/ttyUSB0: permission denied"
        );
    }

    #[test]
    fn test_device_write_display() {
        let error = VoxdriveError::DeviceWrite {
            message: "timed out".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to write command to serial device: timed out"
        );
    }

    #[test]
    fn test_audio_device_not_found_display() {
        let error = VoxdriveError::AudioDeviceNotFound {
            device: "hw:9".to_string(),
        };
        assert_eq!(error.to_string(), "Audio device not found: hw:9");
    }

    #[test]
    fn test_config_invalid_value_display() {
        let error = VoxdriveError::ConfigInvalidValue {
            key: "serial.parity".to_string(),
            message: "expected one of: none, odd, even".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for serial.parity: expected one of: none, odd, even"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: VoxdriveError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_str = "invalid = toml = syntax";
        let toml_error = toml::from_str::<toml::Value>(toml_str).unwrap_err();
        let error: VoxdriveError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<VoxdriveError>();
        assert_sync::<VoxdriveError>();
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);
    }
}
