use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use super::AudioSink;

/// Offline sink writing 32-bit float mono WAV.
pub struct WavSink {
    writer: Option<WavWriter<BufWriter<File>>>,
    path: PathBuf,
    sample_rate: u32,
    written: u64,
}

impl WavSink {
    pub fn create(path: impl AsRef<Path>, sample_rate: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let writer = WavWriter::create(&path, spec)
            .with_context(|| format!("Failed to create WAV file: {}", path.display()))?;

        Ok(Self {
            writer: Some(writer),
            path,
            sample_rate,
            written: 0,
        })
    }

    pub fn samples_written(&self) -> u64 {
        self.written
    }
}

impl AudioSink for WavSink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn push_block(&mut self, block: &[f32]) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            anyhow::bail!("WAV file {} is already finalized", self.path.display());
        };
        for &sample in block {
            writer
                .write_sample(sample)
                .with_context(|| format!("Failed to write to {}", self.path.display()))?;
        }
        self.written += block.len() as u64;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer
                .finalize()
                .with_context(|| format!("Failed to finalize {}", self.path.display()))?;
            log::info!("wrote {} samples to {}", self.samples_written(), self.path.display());
        }
        Ok(())
    }
}

impl Drop for WavSink {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            log::error!("{e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_readable_mono_float_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");

        let mut sink = WavSink::create(&path, 22050).unwrap();
        sink.push_block(&[0.0, 0.25, -0.5]).unwrap();
        sink.push_block(&[1.5]).unwrap();
        assert_eq!(sink.samples_written(), 4);
        sink.finish().unwrap();
        assert!(sink.push_block(&[0.0]).is_err());

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 22050);
        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0.0, 0.25, -0.5, 1.5]);
    }
}
