use anyhow::{Context, Result};
use hound::WavReader;
use std::path::Path;
use tracing::info;

use super::backend::NativeFormat;

/// A WAV file loaded fully into memory for post-processing.
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let reader = WavReader::open(path)
            .with_context(|| format!("Failed to open WAV file: {:?}", path))?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    pub fn format(&self) -> NativeFormat {
        NativeFormat {
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            channels: self.channels,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Write interleaved 16-bit samples as a WAV file in `format`.
pub fn write_wav(path: impl AsRef<Path>, format: NativeFormat, samples: &[i16]) -> Result<()> {
    let path = path.as_ref();
    let spec = hound::WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file: {:?}", path))?;

    for &sample in samples {
        writer
            .write_sample(sample)
            .context("Failed to write sample to WAV")?;
    }

    writer
        .finalize()
        .with_context(|| format!("Failed to finalize WAV file: {:?}", path))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_open_roundtrip_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");

        let format = NativeFormat {
            sample_rate: 22050,
            bits_per_sample: 16,
            channels: 1,
        };
        write_wav(&path, format, &[0, 100, -100, 50]).unwrap();

        let audio = AudioFile::open(&path).unwrap();
        assert_eq!(audio.sample_rate, 22050);
        assert_eq!(audio.channels, 1);
        assert_eq!(audio.samples, vec![0, 100, -100, 50]);
        assert_eq!(audio.format(), format);
    }

    #[test]
    fn test_open_nonexistent_fails() {
        let result = AudioFile::open("/nonexistent/path/to/audio.wav");
        assert!(result.is_err(), "Opening nonexistent file should fail");
    }

    #[test]
    fn test_empty_file_has_zero_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");

        let format = NativeFormat {
            sample_rate: 44100,
            bits_per_sample: 16,
            channels: 2,
        };
        write_wav(&path, format, &[]).unwrap();

        let audio = AudioFile::open(&path).unwrap();
        assert!(audio.is_empty());
        assert_eq!(audio.duration_seconds, 0.0);
    }
}
