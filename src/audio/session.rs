use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{debug, info, warn};

use crate::analysis::batch::{AnalysisReport, BatchAnalyzer};
use crate::audio::capture::Capture;
use crate::audio::monitor::{LiveMonitor, LiveStateCell};
use crate::config::{AnalysisConfig, AppConfig};
use crate::dsp::frames::SampleBuffer;
use crate::dsp::pitch;
use crate::error::{Result, VoiceError};

/// Owns the configuration and the single in-flight flag shared by every
/// session started from it.
///
/// A session holds the flag from `start` until its batch analysis ends
/// (or until it is dropped), so a new recording can't begin while the
/// previous one is still being analyzed.
pub struct SessionContext {
    config: AppConfig,
    in_flight: Arc<AtomicBool>,
}

impl SessionContext {
    pub fn new(config: AppConfig) -> Result<Self> {
        config.analysis.validate()?;
        config.monitor.validate()?;
        Ok(Self {
            config,
            in_flight: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// True while a session is recording or its analysis is pending.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Open a capture with `open` and start the live monitor on it.
    ///
    /// `open` is only called once the in-flight flag is taken, so a busy
    /// context never touches the device.
    pub fn start<C, F>(&self, open: F) -> Result<RecordingSession<C>>
    where
        C: Capture,
        F: FnOnce() -> Result<C>,
    {
        let guard = InFlightGuard::acquire(&self.in_flight)?;
        let capture = open()?;

        let live = Arc::new(LiveStateCell::new());
        let cancel = Arc::new(AtomicBool::new(false));
        let estimator = pitch::build_estimator(self.config.analysis.estimator, (&self.config.analysis).into());
        let handle = LiveMonitor::new(&self.config.monitor, estimator).spawn(
            capture.source(),
            live.clone(),
            Arc::clone(&cancel),
        );

        info!("recording started");
        Ok(RecordingSession {
            capture,
            live,
            monitor: MonitorHandle {
                cancel,
                handle: Some(handle),
            },
            guard,
            analysis: self.config.analysis.clone(),
        })
    }
}

/// Clears the in-flight flag when dropped.
struct InFlightGuard {
    flag: Arc<AtomicBool>,
}

impl InFlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| VoiceError::SessionBusy)?;
        Ok(Self {
            flag: Arc::clone(flag),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Cancels and joins the monitor thread, at the latest when dropped.
struct MonitorHandle {
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<usize>>,
}

impl MonitorHandle {
    fn stop(&mut self) {
        self.cancel.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            match handle.join() {
                Ok(ticks) => debug!(ticks, "live monitor joined"),
                Err(_) => warn!("live monitor thread panicked"),
            }
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A recording in progress: capture running, live monitor ticking.
pub struct RecordingSession<C: Capture> {
    capture: C,
    live: Arc<LiveStateCell>,
    monitor: MonitorHandle,
    guard: InFlightGuard,
    analysis: AnalysisConfig,
}

impl<C: Capture> RecordingSession<C> {
    /// The cell the live monitor publishes into.
    pub fn live_state(&self) -> Arc<LiveStateCell> {
        self.live.clone()
    }

    /// Stop the monitor, then the capture.
    ///
    /// Both are released even when finishing the capture fails; in that
    /// case the in-flight flag is cleared too.
    pub fn finish(self) -> Result<FinishedRecording> {
        let RecordingSession {
            capture,
            mut monitor,
            guard,
            analysis,
            ..
        } = self;

        monitor.stop();
        let buffer = capture.finish()?;

        info!(secs = buffer.duration_secs(), "recording stopped");
        Ok(FinishedRecording {
            buffer,
            guard,
            analysis,
        })
    }
}

/// A stopped recording waiting for batch analysis. Still counts as in
/// flight until analyzed or dropped.
pub struct FinishedRecording {
    buffer: SampleBuffer,
    guard: InFlightGuard,
    analysis: AnalysisConfig,
}

impl FinishedRecording {
    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    /// Analyze on the calling thread.
    pub fn analyze(self) -> Result<AnalysisReport> {
        let FinishedRecording {
            buffer,
            guard,
            analysis,
        } = self;
        let report = BatchAnalyzer::new(analysis)?.analyze(&buffer);
        drop(guard);
        report
    }

    /// Analyze on a worker thread. The in-flight flag is cleared when the
    /// worker finishes, whatever the outcome.
    pub fn analyze_in_background(self) -> BatchHandle {
        let FinishedRecording {
            buffer,
            guard,
            analysis,
        } = self;

        let total = frames_for(&analysis, buffer.len());
        let progress = Arc::new(AtomicUsize::new(0));
        let worker_progress = Arc::clone(&progress);

        let handle = std::thread::spawn(move || {
            let _guard = guard;
            let analyzer = BatchAnalyzer::new(analysis)?;
            analyzer.analyze_with_progress(&buffer, |done| {
                worker_progress.store(done, Ordering::Relaxed);
            })
        });

        BatchHandle {
            handle,
            progress,
            total,
        }
    }
}

fn frames_for(analysis: &AnalysisConfig, len: usize) -> usize {
    crate::dsp::frames::window_count(len, analysis.window_size, analysis.hop_size)
}

/// Pending batch analysis.
pub struct BatchHandle {
    handle: JoinHandle<Result<AnalysisReport>>,
    progress: Arc<AtomicUsize>,
    total: usize,
}

impl BatchHandle {
    /// (windows processed, windows total)
    pub fn progress(&self) -> (usize, usize) {
        (self.progress.load(Ordering::Relaxed), self.total)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the report. Errors are passed through as-is.
    pub fn join(self) -> Result<AnalysisReport> {
        self.handle.join().map_err(|_| VoiceError::WorkerPanicked)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::capture::{CaptureSource, RecentSamples};
    use crate::dsp::notes::VoiceRange;
    use std::f32::consts::PI;
    use std::time::Duration;

    const SR: u32 = 48000;

    struct MemoryCapture {
        recent: Arc<RecentSamples>,
        recording: Option<SampleBuffer>,
    }

    impl MemoryCapture {
        fn new(recording: Vec<f32>) -> Self {
            let recent = Arc::new(RecentSamples::new(SR, SR as usize));
            recent.push(&recording);
            Self {
                recent,
                recording: Some(SampleBuffer::new(recording, SR)),
            }
        }

        fn failing() -> Self {
            Self {
                recent: Arc::new(RecentSamples::new(SR, 16)),
                recording: None,
            }
        }
    }

    impl Capture for MemoryCapture {
        fn source(&self) -> Arc<dyn CaptureSource> {
            self.recent.clone()
        }

        fn finish(self) -> Result<SampleBuffer> {
            self.recording
                .ok_or_else(|| VoiceError::CaptureUnavailable("device unplugged".into()))
        }
    }

    fn tone(freq_hz: f32, secs: f32) -> Vec<f32> {
        let n = (SR as f32 * secs) as usize;
        (0..n)
            .map(|i| 0.5 * (2.0 * PI * freq_hz * i as f32 / SR as f32).sin())
            .collect()
    }

    fn context() -> SessionContext {
        SessionContext::new(AppConfig::default()).unwrap()
    }

    #[test]
    fn record_then_analyze() {
        let ctx = context();
        let session = ctx.start(|| Ok(MemoryCapture::new(tone(220.0, 1.0)))).unwrap();
        assert!(ctx.is_busy());

        let finished = session.finish().unwrap();
        assert_eq!(finished.buffer().len(), SR as usize);

        let report = finished.analyze().unwrap();
        assert_eq!(report.range, VoiceRange::Tenor);
        assert!((report.avg_frequency_hz - 220.0).abs() < 2.2);
        assert!(!ctx.is_busy());
    }

    #[test]
    fn live_monitor_publishes_while_recording() {
        let ctx = context();
        let session = ctx.start(|| Ok(MemoryCapture::new(tone(440.0, 0.5)))).unwrap();
        let live = session.live_state();

        for _ in 0..200 {
            if live.snapshot().frequency_hz.is_some() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(live.snapshot().note_name.as_deref(), Some("A4"));
        session.finish().unwrap();
    }

    #[test]
    fn new_session_refused_while_batch_pending() {
        let ctx = context();
        let finished = ctx
            .start(|| Ok(MemoryCapture::new(tone(220.0, 0.5))))
            .unwrap()
            .finish()
            .unwrap();

        let mut opened = false;
        let second = ctx.start(|| {
            opened = true;
            Ok(MemoryCapture::new(Vec::new()))
        });
        assert!(matches!(second, Err(VoiceError::SessionBusy)));
        assert!(!opened, "device must not be opened while busy");

        finished.analyze_in_background().join().unwrap();
        assert!(!ctx.is_busy());
        assert!(ctx.start(|| Ok(MemoryCapture::new(Vec::new()))).is_ok());
    }

    #[test]
    fn capture_failure_releases_everything() {
        let ctx = context();
        let session = ctx.start(|| Ok(MemoryCapture::failing())).unwrap();
        let result = session.finish();
        assert!(matches!(result, Err(VoiceError::CaptureUnavailable(_))));
        assert!(!ctx.is_busy());
    }

    #[test]
    fn open_failure_releases_guard() {
        let ctx = context();
        let result: Result<RecordingSession<MemoryCapture>> =
            ctx.start(|| Err(VoiceError::CaptureUnavailable("no mic".into())));
        assert!(result.is_err());
        assert!(!ctx.is_busy());
    }

    #[test]
    fn silent_recording_surfaces_insufficient_data() {
        let ctx = context();
        let handle = ctx
            .start(|| Ok(MemoryCapture::new(vec![0.0; SR as usize])))
            .unwrap()
            .finish()
            .unwrap()
            .analyze_in_background();

        assert!(matches!(handle.join(), Err(VoiceError::InsufficientVoiceData)));
        assert!(!ctx.is_busy());
    }

    #[test]
    fn background_matches_foreground() {
        let ctx = context();
        let samples = tone(300.0, 1.0);

        let foreground = BatchAnalyzer::new(ctx.config().analysis.clone())
            .unwrap()
            .analyze(&SampleBuffer::new(samples.clone(), SR))
            .unwrap();

        let handle = ctx
            .start(|| Ok(MemoryCapture::new(samples)))
            .unwrap()
            .finish()
            .unwrap()
            .analyze_in_background();
        let (_, total) = handle.progress();
        assert_eq!(total, foreground.total_windows);

        let background = handle.join().unwrap();
        assert_eq!(background, foreground);
    }

    #[test]
    fn dropping_a_session_frees_the_context() {
        let ctx = context();
        let session = ctx.start(|| Ok(MemoryCapture::new(tone(220.0, 0.2)))).unwrap();
        drop(session);
        assert!(!ctx.is_busy());
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut config = AppConfig::default();
        config.analysis.hop_size = 0;
        assert!(matches!(
            SessionContext::new(config),
            Err(VoiceError::InvalidConfiguration(_))
        ));
    }
}
