/// A mono recording at a fixed sample rate, amplitudes in [-1.0, 1.0].
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// A fixed-length view into a buffer plus where it starts.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisWindow<'a> {
    pub start: usize,
    pub samples: &'a [f32],
}

impl AnalysisWindow<'_> {
    /// Start time in seconds.
    pub fn time(&self, sample_rate: u32) -> f32 {
        self.start as f32 / sample_rate as f32
    }
}

/// Slide a window of `window_size` samples across `samples`, advancing by
/// `hop_size`. Only full windows are yielded; a buffer shorter than one
/// window yields nothing.
pub fn windows(
    samples: &[f32],
    window_size: usize,
    hop_size: usize,
) -> impl Iterator<Item = AnalysisWindow<'_>> {
    let count = window_count(samples.len(), window_size, hop_size);
    (0..count).map(move |i| {
        let start = i * hop_size;
        AnalysisWindow {
            start,
            samples: &samples[start..start + window_size],
        }
    })
}

/// Number of full windows `windows` will yield.
pub fn window_count(len: usize, window_size: usize, hop_size: usize) -> usize {
    if window_size == 0 || hop_size == 0 || len < window_size {
        return 0;
    }
    (len - window_size) / hop_size + 1
}
