use anyhow::{Context, Result};
use std::path::Path;

/// Final output of the graph: the unfiltered source with the element volume
/// applied. Everything the listener would hear ends up here.
pub struct Destination {
    channels: usize,
    sample_rate: u32,
    samples: Vec<f32>,
}

impl Destination {
    pub fn new(channels: usize, sample_rate: u32) -> Self {
        Self {
            channels: channels.max(1),
            sample_rate,
            samples: Vec::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Accepts one interleaved block. Channel layouts that differ from the
    /// sink's are up/down-mixed through mono.
    pub fn write(&mut self, interleaved: &[f32], channels: usize, gain: f32) {
        if channels == self.channels {
            self.samples.extend(interleaved.iter().map(|s| s * gain));
            return;
        }
        for frame in interleaved.chunks(channels.max(1)) {
            let mono = frame.iter().sum::<f32>() / frame.len() as f32 * gain;
            self.samples
                .extend(std::iter::repeat(mono).take(self.channels));
        }
    }

    pub fn frames_written(&self) -> usize {
        self.samples.len() / self.channels
    }

    #[cfg(test)]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn write_wav(&self, path: &Path) -> Result<()> {
        let spec = hound::WavSpec {
            channels: self.channels as u16,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec)
            .with_context(|| format!("Failed to create WAV file: {}", path.display()))?;
        for &s in &self.samples {
            writer.write_sample(s)?;
        }
        writer
            .finalize()
            .with_context(|| format!("Failed to finalize WAV file: {}", path.display()))?;

        log::info!(
            "Wrote {} output frames to {}",
            self.frames_written(),
            path.display()
        );
        Ok(())
    }
}
