//! Live pitch monitor.
//!
//! Ticks on a fixed cadence, estimates the pitch of the newest raw window
//! and publishes the result through an `ArcSwap` cell so the display can
//! read it without locking. No filtering happens here; the monitor trades
//! accuracy for latency and the batch pass does the careful work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::Serialize;
use tracing::{debug, trace};

use crate::audio::capture::CaptureSource;
use crate::config::MonitorConfig;
use crate::dsp::notes::note_name;
use crate::dsp::pitch::PitchEstimator;
use crate::util;

/// What the user sees while singing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LiveState {
    /// `None` when the window was unvoiced.
    pub frequency_hz: Option<f32>,
    pub note_name: Option<String>,
    /// Linear RMS of the window.
    pub volume_level: f32,
}

impl LiveState {
    pub fn volume_db(&self) -> f32 {
        util::to_db(self.volume_level)
    }
}

/// Destination for live updates.
pub trait LiveSink: Send + Sync {
    fn publish(&self, state: LiveState);
}

/// Latest-value cell. Writers replace, readers get a snapshot; whoever
/// publishes last wins.
pub struct LiveStateCell {
    state: ArcSwap<LiveState>,
}

impl LiveStateCell {
    pub fn new() -> Self {
        Self {
            state: ArcSwap::from_pointee(LiveState::default()),
        }
    }

    pub fn snapshot(&self) -> Arc<LiveState> {
        self.state.load_full()
    }
}

impl Default for LiveStateCell {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveSink for LiveStateCell {
    fn publish(&self, state: LiveState) {
        self.state.store(Arc::new(state));
    }
}

pub struct LiveMonitor {
    estimator: Box<dyn PitchEstimator>,
    window_size: usize,
    tick: Duration,
}

impl LiveMonitor {
    pub fn new(config: &MonitorConfig, estimator: Box<dyn PitchEstimator>) -> Self {
        Self {
            estimator,
            window_size: config.window_size,
            tick: Duration::from_millis(config.tick_ms),
        }
    }

    /// One bounded unit of work: read the newest window and estimate it.
    /// Returns `None` until the source has a full window.
    pub fn tick(&mut self, source: &dyn CaptureSource) -> Option<LiveState> {
        let window = source.latest_window(self.window_size)?;
        let estimate = self.estimator.estimate(&window, source.sample_rate());
        let frequency_hz = estimate.frequency();
        Some(LiveState {
            frequency_hz,
            note_name: frequency_hz.and_then(note_name),
            volume_level: util::rms(&window),
        })
    }

    /// Tick until `cancel` is set. The flag is checked once per tick, so no
    /// update is published after cancellation is observed. Returns the
    /// number of ticks run.
    pub fn run(&mut self, source: &dyn CaptureSource, sink: &dyn LiveSink, cancel: &AtomicBool) -> usize {
        let mut ticks = 0;
        while !cancel.load(Ordering::Acquire) {
            if let Some(state) = self.tick(source) {
                trace!(frequency = ?state.frequency_hz, "live tick");
                sink.publish(state);
            }
            ticks += 1;
            std::thread::sleep(self.tick);
        }
        debug!(ticks, estimator = self.estimator.name(), "live monitor stopped");
        ticks
    }

    /// Run on a dedicated thread.
    pub fn spawn(
        mut self,
        source: Arc<dyn CaptureSource>,
        sink: Arc<dyn LiveSink>,
        cancel: Arc<AtomicBool>,
    ) -> JoinHandle<usize> {
        std::thread::spawn(move || self.run(source.as_ref(), sink.as_ref(), &cancel))
    }
}
