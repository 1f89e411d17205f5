use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::debug;

use crate::dsp::frames::SampleBuffer;
use crate::error::Result;

/// Standard WAV spec for saved recordings: mono 16-bit PCM.
pub fn recording_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Create a WavWriter at the given path, creating parent directories as needed.
pub fn create_writer(path: &Path, spec: WavSpec) -> Result<WavWriter<BufWriter<File>>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(WavWriter::create(path, spec)?)
}

/// Write a recording to disk as mono 16-bit PCM. Samples outside
/// [-1.0, 1.0] are clipped.
pub fn save_samples(path: &Path, buffer: &SampleBuffer) -> Result<()> {
    let mut writer = create_writer(path, recording_spec(buffer.sample_rate()))?;
    for &sample in buffer.samples() {
        let s16 = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(s16)?;
    }
    writer.finalize()?;
    debug!(path = %path.display(), samples = buffer.len(), "wrote recording");
    Ok(())
}

/// Load a WAV file as mono f32 in [-1.0, 1.0].
///
/// Multi-channel files are downmixed by averaging each frame.
pub fn load_samples(path: &Path) -> Result<SampleBuffer> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<hound::Result<Vec<_>>>()?
        }
        SampleFormat::Float => reader.samples::<f32>().collect::<hound::Result<Vec<_>>>()?,
    };

    let samples = downmix(&interleaved, spec.channels as usize);
    debug!(
        path = %path.display(),
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        samples = samples.len(),
        "loaded recording"
    );
    Ok(SampleBuffer::new(samples, spec.sample_rate))
}

fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
