use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use tracing::{debug, info, warn};

use crate::dsp::frames::SampleBuffer;
use crate::error::{Result, VoiceError};

/// How many seconds of recent audio the live tap keeps.
const RECENT_SECONDS: usize = 1;

/// Read side of an ongoing capture, shared with the live monitor.
pub trait CaptureSource: Send + Sync {
    fn sample_rate(&self) -> u32;

    /// The most recent `len` samples, oldest first, or `None` until that
    /// many have arrived.
    fn latest_window(&self, len: usize) -> Option<Vec<f32>>;
}

/// A running capture that can be stopped to yield the whole recording.
pub trait Capture {
    /// Shared handle to the live tap for the monitor.
    fn source(&self) -> Arc<dyn CaptureSource>;

    /// Stop capturing, flush anything in flight, and hand over the recording.
    /// Device handles are released even when this returns an error.
    fn finish(self) -> Result<SampleBuffer>;
}

/// Bounded window of the latest samples.
///
/// The audio thread writes with `try_lock` and simply skips an update when
/// the monitor happens to be reading, so capture never waits on display.
pub struct RecentSamples {
    buffer: Mutex<VecDeque<f32>>,
    capacity: usize,
    sample_rate: u32,
}

impl RecentSamples {
    pub fn new(sample_rate: u32, capacity: usize) -> Self {
        Self {
            buffer: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            sample_rate,
        }
    }

    /// Append a chunk without blocking. Returns false if the update was
    /// skipped because a reader held the lock.
    pub fn push(&self, chunk: &[f32]) -> bool {
        let Ok(mut buf) = self.buffer.try_lock() else {
            return false;
        };
        let chunk = if chunk.len() > self.capacity {
            &chunk[chunk.len() - self.capacity..]
        } else {
            chunk
        };
        let overflow = (buf.len() + chunk.len()).saturating_sub(self.capacity);
        let len = buf.len();
        buf.drain(..overflow.min(len));
        buf.extend(chunk.iter().copied());
        true
    }
}

impl CaptureSource for RecentSamples {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn latest_window(&self, len: usize) -> Option<Vec<f32>> {
        let buf = self.buffer.lock().ok()?;
        if len == 0 || buf.len() < len {
            return None;
        }
        Some(buf.iter().skip(buf.len() - len).copied().collect())
    }
}

/// Live tap size: a second of audio, or the monitor window if that is longer.
pub fn tap_capacity(sample_rate: u32, window_size: usize) -> usize {
    (sample_rate as usize * RECENT_SECONDS).max(window_size)
}

/// Microphone capture through cpal.
///
/// Architecture:
///   cpal audio callback (runs on audio thread)
///     → pushes the newest samples into `RecentSamples` (non-blocking)
///     → sends mono f32 chunks via mpsc channel
///       → collector thread appends them to the full recording
///   AtomicBool stop signal ← `finish`
pub struct MicCapture {
    stream: cpal::Stream,
    stop: Arc<AtomicBool>,
    recent: Arc<RecentSamples>,
    collector: JoinHandle<Vec<f32>>,
    sample_rate: u32,
}

impl MicCapture {
    /// Open the named input device ("default" for the system default) and
    /// start streaming. The live tap holds at least `window_size` samples.
    pub fn start(device_name: &str, window_size: usize) -> Result<Self> {
        let host = cpal::default_host();
        let device = find_device(&host, device_name)?;

        let config = device
            .default_input_config()
            .map_err(|e| VoiceError::CaptureUnavailable(format!("no input config: {e}")))?;

        let sample_rate = config.sample_rate().0;
        let channels = config.channels() as usize;
        let format = config.sample_format();

        let recent = Arc::new(RecentSamples::new(
            sample_rate,
            tap_capacity(sample_rate, window_size),
        ));
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel::<Vec<f32>>();

        let stream = match format {
            SampleFormat::F32 => {
                let stop = Arc::clone(&stop);
                let recent = Arc::clone(&recent);
                device.build_input_stream(
                    &config.into(),
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        if stop.load(Ordering::Relaxed) {
                            return;
                        }
                        let mono: Vec<f32> = data.iter().step_by(channels).copied().collect();
                        recent.push(&mono);
                        let _ = tx.send(mono);
                    },
                    |err| warn!("stream error: {err}"),
                    None,
                )
            }
            SampleFormat::I16 => {
                let stop = Arc::clone(&stop);
                let recent = Arc::clone(&recent);
                device.build_input_stream(
                    &config.into(),
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        if stop.load(Ordering::Relaxed) {
                            return;
                        }
                        let mono: Vec<f32> = data
                            .iter()
                            .step_by(channels)
                            .map(|&s| s as f32 / i16::MAX as f32)
                            .collect();
                        recent.push(&mono);
                        let _ = tx.send(mono);
                    },
                    |err| warn!("stream error: {err}"),
                    None,
                )
            }
            other => {
                return Err(VoiceError::CaptureUnavailable(format!(
                    "unsupported sample format: {other:?}"
                )))
            }
        }
        .map_err(|e| VoiceError::CaptureUnavailable(format!("failed to build input stream: {e}")))?;

        stream
            .play()
            .map_err(|e| VoiceError::CaptureUnavailable(format!("failed to start stream: {e}")))?;

        // rx.iter() ends once the stream (and the tx it owns) is dropped
        let collector = std::thread::spawn(move || {
            let mut all_samples = Vec::new();
            for chunk in rx.iter() {
                all_samples.extend(chunk);
            }
            all_samples
        });

        info!(sample_rate, channels, "capture started");

        Ok(Self {
            stream,
            stop,
            recent,
            collector,
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Capture for MicCapture {
    fn source(&self) -> Arc<dyn CaptureSource> {
        self.recent.clone()
    }

    fn finish(self) -> Result<SampleBuffer> {
        self.stop.store(true, Ordering::Relaxed);

        // Dropping the stream stops cpal from calling our callback and drops
        // the sender, which lets the collector drain and exit.
        drop(self.stream);

        let samples = self
            .collector
            .join()
            .map_err(|_| VoiceError::WorkerPanicked)?;

        debug!(samples = samples.len(), "capture flushed");
        Ok(SampleBuffer::new(samples, self.sample_rate))
    }
}

fn find_device(host: &cpal::Host, name: &str) -> Result<cpal::Device> {
    if name.is_empty() || name == "default" {
        return host
            .default_input_device()
            .ok_or_else(|| VoiceError::CaptureUnavailable("no default input device found".into()));
    }

    let mut devices = host
        .input_devices()
        .map_err(|e| VoiceError::CaptureUnavailable(format!("failed to list devices: {e}")))?;

    devices
        .find(|d| d.name().map(|n| n == name).unwrap_or(false))
        .ok_or_else(|| VoiceError::CaptureUnavailable(format!("input device not found: {name}")))
}
