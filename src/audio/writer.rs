use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::warn;

use super::backend::NativeFormat;

/// Append-only WAV writer for one capture stream.
///
/// Appends arrive on the source's capture thread while `finalize` runs on the
/// stop path, so the underlying writer sits behind a per-stream lock. After
/// `finalize` the slot is `None` and late appends become silent no-ops; no
/// frame is ever written to a disposed writer.
pub struct StreamWriter {
    path: PathBuf,
    format: NativeFormat,
    inner: Mutex<Option<hound::WavWriter<BufWriter<File>>>>,
    samples_written: AtomicU64,
}

impl StreamWriter {
    /// Create the output file and write its WAV header for `format`.
    pub fn create(path: impl AsRef<Path>, format: NativeFormat) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let spec = hound::WavSpec {
            channels: format.channels,
            sample_rate: format.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = hound::WavWriter::create(&path, spec)
            .with_context(|| format!("Failed to create WAV file: {:?}", path))?;

        Ok(Self {
            path,
            format,
            inner: Mutex::new(Some(writer)),
            samples_written: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> NativeFormat {
        self.format
    }

    /// Total interleaved samples written so far.
    pub fn samples_written(&self) -> u64 {
        self.samples_written.load(Ordering::Relaxed)
    }

    /// Append interleaved samples. A zero-length slice is a no-op, and an
    /// append after `finalize` is dropped rather than treated as an error.
    pub fn append(&self, samples: &[i16]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let mut guard = self.inner.lock().unwrap();
        if let Some(writer) = guard.as_mut() {
            for &sample in samples {
                writer
                    .write_sample(sample)
                    .context("Failed to write sample to WAV")?;
            }
            self.samples_written
                .fetch_add(samples.len() as u64, Ordering::Relaxed);
        }

        Ok(())
    }

    /// Append `duration_ms` worth of zero-valued samples in this stream's
    /// native format.
    pub fn append_silence(&self, duration_ms: u64) -> Result<()> {
        let count = (duration_ms as f64 * self.format.samples_per_ms()).round() as usize;
        // Keep whole sample frames so channels stay aligned
        let count = count - count % self.format.channels as usize;
        self.append(&vec![0i16; count])
    }

    /// Flush and close the file, patching the WAV header. Idempotent: a second
    /// call finds the slot empty and returns Ok.
    pub fn finalize(&self) -> Result<()> {
        let writer = self.inner.lock().unwrap().take();
        if let Some(writer) = writer {
            writer
                .finalize()
                .with_context(|| format!("Failed to finalize WAV file: {:?}", self.path))?;
        }
        Ok(())
    }

    /// Whether the writer still accepts appends.
    pub fn is_open(&self) -> bool {
        self.inner.lock().unwrap().is_some()
    }
}

impl Drop for StreamWriter {
    fn drop(&mut self) {
        if let Some(writer) = self.inner.lock().unwrap().take() {
            if let Err(e) = writer.finalize() {
                warn!("Failed to finalize WAV writer on drop: {}", e);
            }
        }
    }
}
