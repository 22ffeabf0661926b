//! Live audio capture using CPAL (Cross-Platform Audio Library).
//!
//! The device callback fills fixed-size chunks and hands them to the
//! producer through a bounded queue, decoupling driver reentrancy from the
//! streaming pipeline.

use crate::audio::source::{AudioChunk, AudioSource};
use crate::defaults;
use crate::error::{Result, VoxdriveError};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Run a closure with stderr temporarily redirected to /dev/null.
///
/// This suppresses noisy ALSA/JACK/PipeWire messages that CPAL triggers
/// when probing audio backends. The messages are harmless but confusing.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2
/// (stderr). Safe as long as no other thread is concurrently manipulating
/// fd 2.
fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

/// Preferred device names for desktop PipeWire/PulseAudio environments.
const PREFERRED_DEVICES: &[&str] = &["pipewire", "pulse", "PulseAudio"];

/// Device name patterns to filter out (not useful for voice input).
const FILTERED_PATTERNS: &[&str] = &[
    "surround",
    "front:",
    "rear:",
    "center:",
    "side:",
    "Digital Output",
    "HDMI",
    "S/PDIF",
];

fn should_filter_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    FILTERED_PATTERNS
        .iter()
        .any(|pattern| lower.contains(&pattern.to_lowercase()))
}

fn is_preferred_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    PREFERRED_DEVICES
        .iter()
        .any(|pref| lower.contains(&pref.to_lowercase()))
}

/// List all available audio input devices with filtering and recommendations.
///
/// # Returns
/// A vector of device names, with preferred devices marked with
/// "\[recommended\]". Filters out obviously unusable devices (surround
/// channels, HDMI, etc.).
pub fn list_devices() -> Result<Vec<String>> {
    let (host, devices) = with_suppressed_stderr(|| {
        let host = cpal::default_host();
        let devices = host.input_devices();
        (host, devices)
    });
    let _ = host; // keep host alive while iterating devices
    let devices = devices.map_err(|e| VoxdriveError::AudioCapture {
        message: format!("Failed to enumerate input devices: {}", e),
    })?;

    let mut device_names = Vec::new();
    for device in devices {
        if let Ok(name) = device.name() {
            if should_filter_device(&name) {
                continue;
            }
            if is_preferred_device(&name) {
                device_names.push(format!("{} [recommended]", name));
            } else {
                device_names.push(name);
            }
        }
    }

    Ok(device_names)
}

/// Get the best default input device, preferring PipeWire/PulseAudio.
fn get_best_default_device() -> Result<cpal::Device> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();

        if let Ok(devices) = host.input_devices() {
            for device in devices {
                if let Ok(name) = device.name()
                    && is_preferred_device(&name)
                {
                    return Ok(device);
                }
            }
        }

        host.default_input_device()
            .ok_or_else(|| VoxdriveError::AudioDeviceNotFound {
                device: "default".to_string(),
            })
    })
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: the stream is only accessed from a single thread at a time
/// through the owning `CpalAudioSource`; its methods are called
/// synchronously and never cross thread boundaries unsafely.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Microphone source delivering fixed-size 16-bit PCM chunks.
///
/// The CPAL callback accumulates samples into a pending buffer; each time
/// it reaches the chunk size, the filled chunk is pushed onto a bounded
/// queue. When the queue is full (the network is slower than the
/// microphone) the freshly filled chunk is dropped and counted, keeping the
/// callback non-blocking and the queue depth at two in-flight buffers.
pub struct CpalAudioSource {
    device: cpal::Device,
    stream: Option<SendableStream>,
    rx: mpsc::Receiver<AudioChunk>,
    tx: Option<mpsc::Sender<AudioChunk>>,
    dropped: Arc<AtomicU64>,
    sample_rate: u32,
    chunk_bytes: usize,
}

impl CpalAudioSource {
    /// Create a new CPAL audio source.
    ///
    /// # Arguments
    /// * `device_name` - Optional device name. If None, uses the default
    ///   input device (preferring PipeWire/PulseAudio).
    /// * `sample_rate` - Capture rate in Hz.
    pub fn new(device_name: Option<&str>, sample_rate: u32) -> Result<Self> {
        let device = with_suppressed_stderr(|| {
            let host = cpal::default_host();

            if let Some(name) = device_name {
                let devices = host
                    .input_devices()
                    .map_err(|e| VoxdriveError::AudioCapture {
                        message: format!("Failed to enumerate devices: {}", e),
                    })?;

                let mut found_device = None;
                for dev in devices {
                    if let Ok(dev_name) = dev.name()
                        && dev_name == name
                    {
                        found_device = Some(dev);
                        break;
                    }
                }

                found_device.ok_or_else(|| VoxdriveError::AudioDeviceNotFound {
                    device: name.to_string(),
                })
            } else {
                get_best_default_device()
            }
        })?;

        let (tx, rx) = mpsc::channel(defaults::CAPTURE_QUEUE_DEPTH);

        Ok(Self {
            device,
            stream: None,
            rx,
            tx: Some(tx),
            dropped: Arc::new(AtomicU64::new(0)),
            sample_rate,
            chunk_bytes: defaults::CHUNK_BYTES,
        })
    }

    /// Number of chunks dropped because the queue was full.
    pub fn dropped_chunks(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Build the input stream. Tries i16 at the requested rate first,
    /// falling back to f32 with software conversion for devices that only
    /// expose float formats.
    fn build_stream(&self, tx: mpsc::Sender<AudioChunk>) -> Result<cpal::Stream> {
        let config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let err_callback = |err| {
            eprintln!("voxdrive: audio stream error: {}", err);
        };

        let chunk_bytes = self.chunk_bytes;

        // i16 path — PipeWire/PulseAudio convert transparently
        let pending = Arc::new(Mutex::new(Vec::<u8>::with_capacity(chunk_bytes)));
        let i16_pending = Arc::clone(&pending);
        let i16_tx = tx.clone();
        let i16_dropped = Arc::clone(&self.dropped);
        if let Ok(stream) = self.device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                push_samples(data, &i16_pending, chunk_bytes, &i16_tx, &i16_dropped);
            },
            err_callback,
            None,
        ) {
            return Ok(stream);
        }

        // f32 path — convert to i16 in software
        let f32_pending = Arc::new(Mutex::new(Vec::<u8>::with_capacity(chunk_bytes)));
        let f32_dropped = Arc::clone(&self.dropped);
        self.device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let converted: Vec<i16> = data
                        .iter()
                        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                        .collect();
                    push_samples(&converted, &f32_pending, chunk_bytes, &tx, &f32_dropped);
                },
                err_callback,
                None,
            )
            .map_err(|e| VoxdriveError::AudioCapture {
                message: format!("Failed to build input stream: {}", e),
            })
    }
}

/// Append samples to the pending buffer and push full chunks to the queue.
fn push_samples(
    data: &[i16],
    pending: &Arc<Mutex<Vec<u8>>>,
    chunk_bytes: usize,
    tx: &mpsc::Sender<AudioChunk>,
    dropped: &Arc<AtomicU64>,
) {
    let Ok(mut buf) = pending.lock() else {
        return;
    };
    for sample in data {
        buf.extend_from_slice(&sample.to_le_bytes());
    }
    while buf.len() >= chunk_bytes {
        let rest = buf.split_off(chunk_bytes);
        let chunk = AudioChunk::new(std::mem::replace(&mut *buf, rest));
        if tx.try_send(chunk).is_err() {
            // Queue full or receiver gone; drop rather than block the
            // audio thread.
            dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[async_trait]
impl AudioSource for CpalAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(()); // Already started
        }
        let tx = self
            .tx
            .take()
            .ok_or_else(|| VoxdriveError::AudioCapture {
                message: "capture source cannot be restarted after stop".to_string(),
            })?;
        let stream = self.build_stream(tx)?;
        stream.play().map_err(|e| VoxdriveError::AudioCapture {
            message: format!("Failed to start audio stream: {}", e),
        })?;
        self.stream = Some(SendableStream(stream));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            stream.0.pause().map_err(|e| VoxdriveError::AudioCapture {
                message: format!("Failed to stop audio stream: {}", e),
            })?;
            // Dropping the stream drops the callback and its sender, so
            // next_chunk observes the end of the queue.
            drop(stream);
        }
        Ok(())
    }

    async fn next_chunk(&mut self) -> Result<Option<AudioChunk>> {
        Ok(self.rx.recv().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_filter_device() {
        assert!(should_filter_device("surround51"));
        assert!(should_filter_device("front:CARD=PCH"));
        assert!(should_filter_device("HDMI Output"));
        assert!(should_filter_device("Digital Output S/PDIF"));
        assert!(!should_filter_device("pipewire"));
        assert!(!should_filter_device("Built-in Audio"));
    }

    #[test]
    fn test_is_preferred_device() {
        assert!(is_preferred_device("pipewire"));
        assert!(is_preferred_device("PipeWire"));
        assert!(is_preferred_device("PulseAudio"));
        assert!(!is_preferred_device("hw:0,0"));
        assert!(!is_preferred_device("default"));
    }

    #[test]
    fn test_push_samples_emits_full_chunks_only() {
        let pending = Arc::new(Mutex::new(Vec::new()));
        let (tx, mut rx) = mpsc::channel(4);
        let dropped = Arc::new(AtomicU64::new(0));

        // chunk size 8 bytes = 4 samples; feed 6 samples
        push_samples(&[1i16, 2, 3, 4, 5, 6], &pending, 8, &tx, &dropped);

        let chunk = rx.try_recv().expect("one full chunk expected");
        assert_eq!(chunk.len(), 8);
        assert!(rx.try_recv().is_err(), "partial chunk must stay pending");
        assert_eq!(pending.lock().unwrap().len(), 4);
        assert_eq!(dropped.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_push_samples_drops_when_queue_full() {
        let pending = Arc::new(Mutex::new(Vec::new()));
        let (tx, mut rx) = mpsc::channel(1);
        let dropped = Arc::new(AtomicU64::new(0));

        // chunk size 4 bytes = 2 samples; feed 6 samples → 3 chunks, queue
        // holds 1
        push_samples(&[1i16, 2, 3, 4, 5, 6], &pending, 4, &tx, &dropped);

        assert!(rx.try_recv().is_ok());
        assert_eq!(dropped.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_push_samples_multiple_calls_accumulate() {
        let pending = Arc::new(Mutex::new(Vec::new()));
        let (tx, mut rx) = mpsc::channel(4);
        let dropped = Arc::new(AtomicU64::new(0));

        push_samples(&[1i16], &pending, 4, &tx, &dropped);
        assert!(rx.try_recv().is_err());
        push_samples(&[2i16], &pending, 4, &tx, &dropped);
        let chunk = rx.try_recv().expect("chunk after second call");
        assert_eq!(chunk.as_bytes(), &[0x01, 0x00, 0x02, 0x00]);
    }

    #[test]
    #[ignore] // Requires audio hardware
    fn test_list_devices_returns_at_least_one_device() {
        let devices = list_devices();
        assert!(devices.is_ok());
        assert!(!devices.unwrap().is_empty());
    }

    #[test]
    #[ignore] // Requires audio hardware
    fn test_create_with_default_device() {
        let source = CpalAudioSource::new(None, 16000);
        assert!(source.is_ok());
    }

    #[test]
    fn test_create_with_invalid_device_name() {
        let source = CpalAudioSource::new(Some("NonExistentDevice12345"), 16000);
        match source {
            Err(VoxdriveError::AudioDeviceNotFound { device }) => {
                assert_eq!(device, "NonExistentDevice12345");
            }
            Err(VoxdriveError::AudioCapture { .. }) => {
                // No audio backend at all in CI — also acceptable
            }
            other => panic!("Expected device error, got {:?}", other.map(|_| ())),
        }
    }
}
