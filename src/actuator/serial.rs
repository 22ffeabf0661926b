//! Serial-port actuator for the robot.

use crate::actuator::CommandActuator;
use crate::command::resolver::CommandCode;
use crate::config::SerialSection;
use crate::error::{Result, VoxdriveError};
use serialport::SerialPort;
use std::io::Write;
use std::time::Duration;

/// Map config strings to serialport parity values.
fn parse_parity(value: &str) -> Result<serialport::Parity> {
    match value {
        "none" => Ok(serialport::Parity::None),
        "odd" => Ok(serialport::Parity::Odd),
        "even" => Ok(serialport::Parity::Even),
        other => Err(VoxdriveError::ConfigInvalidValue {
            key: "serial.parity".to_string(),
            message: format!("'{}' (expected one of: none, odd, even)", other),
        }),
    }
}

fn parse_data_bits(value: u8) -> Result<serialport::DataBits> {
    match value {
        5 => Ok(serialport::DataBits::Five),
        6 => Ok(serialport::DataBits::Six),
        7 => Ok(serialport::DataBits::Seven),
        8 => Ok(serialport::DataBits::Eight),
        other => Err(VoxdriveError::ConfigInvalidValue {
            key: "serial.data_bits".to_string(),
            message: format!("'{}' (expected 5, 6, 7 or 8)", other),
        }),
    }
}

fn parse_stop_bits(value: u8) -> Result<serialport::StopBits> {
    match value {
        1 => Ok(serialport::StopBits::One),
        2 => Ok(serialport::StopBits::Two),
        other => Err(VoxdriveError::ConfigInvalidValue {
            key: "serial.stop_bits".to_string(),
            message: format!("'{}' (expected 1 or 2)", other),
        }),
    }
}

/// Exclusive handle on the robot's serial line.
///
/// Opened once at session start and closed once at session end; commands
/// are single bytes written through synchronously.
pub struct SerialActuator {
    port: Option<Box<dyn SerialPort>>,
    path: String,
}

impl SerialActuator {
    /// Open and configure the serial device.
    pub fn open(path: &str, settings: &SerialSection) -> Result<Self> {
        let port = serialport::new(path, settings.baud_rate)
            .data_bits(parse_data_bits(settings.data_bits)?)
            .parity(parse_parity(&settings.parity)?)
            .stop_bits(parse_stop_bits(settings.stop_bits)?)
            .timeout(Duration::from_millis(settings.timeout_ms))
            .open()
            .map_err(|e| VoxdriveError::DeviceOpen {
                port: path.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            port: Some(port),
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl CommandActuator for SerialActuator {
    fn send(&mut self, code: CommandCode) -> Result<()> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| VoxdriveError::DeviceWrite {
                message: "serial port already closed".to_string(),
            })?;
        port.write_all(&[code.wire_byte()])
            .map_err(|e| VoxdriveError::DeviceWrite {
                message: e.to_string(),
            })?;
        port.flush().map_err(|e| VoxdriveError::DeviceWrite {
            message: e.to_string(),
        })
    }

    fn close(&mut self) -> Result<()> {
        // Dropping the handle releases the device; a second close is a
        // no-op.
        if let Some(mut port) = self.port.take() {
            let _ = port.flush();
        }
        Ok(())
    }
}
