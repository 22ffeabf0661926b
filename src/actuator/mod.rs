//! Command actuator: the one output device the robot listens on.

pub mod serial;

use crate::command::resolver::CommandCode;
use crate::error::{Result, VoxdriveError};
use crate::stream::channel::{record, Journal};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Exclusive handle on the robot's command input.
///
/// `send` blocks until the device acknowledges the write or fails. The
/// session serializes dispatch, so at most one command is in flight at a
/// time. `close` releases the device and must be idempotent; the session
/// calls it exactly once, on every exit path.
pub trait CommandActuator: Send {
    fn send(&mut self, code: CommandCode) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// Observable state of a [`MockActuator`].
#[derive(Debug, Default)]
pub struct MockActuatorState {
    pub sent: Vec<CommandCode>,
    pub close_count: u32,
    pub sent_after_close: u32,
}

/// Recording actuator for tests.
///
/// Detects overlapping `send` calls without a mutex around the whole call:
/// a flag is raised on entry and lowered on exit, so a second caller
/// arriving before the first returns trips `overlap_detected`.
pub struct MockActuator {
    state: Arc<Mutex<MockActuatorState>>,
    in_flight: Arc<AtomicBool>,
    overlap_detected: Arc<AtomicBool>,
    fail_send: bool,
    journal: Option<Journal>,
}

impl MockActuator {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockActuatorState::default())),
            in_flight: Arc::new(AtomicBool::new(false)),
            overlap_detected: Arc::new(AtomicBool::new(false)),
            fail_send: false,
            journal: None,
        }
    }

    /// Handle for inspecting the actuator after the session ends.
    pub fn state(&self) -> Arc<Mutex<MockActuatorState>> {
        Arc::clone(&self.state)
    }

    /// Configure `send` to fail with a `DeviceWrite` error.
    pub fn with_send_failure(mut self) -> Self {
        self.fail_send = true;
        self
    }

    /// Attach a shared event journal for ordering assertions.
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn overlap_detected(&self) -> bool {
        self.overlap_detected.load(Ordering::SeqCst)
    }

    /// Handle to the overlap flag, usable after the actuator is boxed.
    pub fn overlap_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.overlap_detected)
    }
}

impl Default for MockActuator {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandActuator for MockActuator {
    fn send(&mut self, code: CommandCode) -> Result<()> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.overlap_detected.store(true, Ordering::SeqCst);
        }

        record(&self.journal, &format!("send {}", code.name()));
        let result = if self.fail_send {
            Err(VoxdriveError::DeviceWrite {
                message: "mock device write failure".to_string(),
            })
        } else {
            let mut state = self.state.lock().expect("mock actuator lock");
            if state.close_count > 0 {
                state.sent_after_close += 1;
            }
            state.sent.push(code);
            Ok(())
        };

        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    fn close(&mut self) -> Result<()> {
        record(&self.journal, "close");
        let mut state = self.state.lock().expect("mock actuator lock");
        state.close_count += 1;
        Ok(())
    }
}
