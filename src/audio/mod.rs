//! Audio sources: live capture and file playback.

#[cfg(feature = "cpal-audio")]
pub mod capture;
pub mod source;
pub mod wav;
