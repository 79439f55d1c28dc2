use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::audio::{NativeFormat, PipelineConfig};
use crate::session::SessionConfig;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub recording: RecordingConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub bind: String,
    pub port: u16,
}

/// Canonical output format and where recordings land by default
#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    pub recordings_path: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

#[derive(Debug, Deserialize)]
pub struct RecordingConfig {
    /// Wait after signaling stop before writers are disposed
    pub grace_interval_ms: u64,
    /// Startup delays beyond this get leading-silence compensation
    pub padding_threshold_ms: u64,
    /// Duration of the synthesized output when both sources are empty
    pub fallback_silence_ms: u64,
}

impl Config {
    /// Load configuration, layering an optional file over built-in defaults.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("service.name", "duplex-recorder")?
            .set_default("service.bind", "127.0.0.1")?
            .set_default("service.port", 8888)?
            .set_default("audio.recordings_path", ".")?
            .set_default("audio.sample_rate", 44100)?
            .set_default("audio.channels", 2)?
            .set_default("audio.bits_per_sample", 16)?
            .set_default("recording.grace_interval_ms", 300)?
            .set_default("recording.padding_threshold_ms", 40)?
            .set_default("recording.fallback_silence_ms", 1000)?
            .add_source(config::File::with_name(path).required(false))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Session-level view of this configuration.
    pub fn session_config(&self) -> SessionConfig {
        let recordings_dir = PathBuf::from(&self.audio.recordings_path);
        SessionConfig {
            recordings_dir: recordings_dir.clone(),
            grace_interval: Duration::from_millis(self.recording.grace_interval_ms),
            padding_threshold: Duration::from_millis(self.recording.padding_threshold_ms),
            pipeline: PipelineConfig {
                target: NativeFormat {
                    sample_rate: self.audio.sample_rate,
                    bits_per_sample: self.audio.bits_per_sample,
                    channels: self.audio.channels,
                },
                fallback_silence_ms: self.recording.fallback_silence_ms,
                default_output_dir: recordings_dir,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_config_file() {
        let cfg = Config::load("config/does-not-exist").unwrap();

        assert_eq!(cfg.service.name, "duplex-recorder");
        assert_eq!(cfg.service.port, 8888);
        assert_eq!(cfg.audio.sample_rate, 44100);
        assert_eq!(cfg.audio.channels, 2);
        assert_eq!(cfg.recording.grace_interval_ms, 300);
    }

    #[test]
    fn test_session_config_mapping() {
        let cfg = Config::load("config/does-not-exist").unwrap();
        let session = cfg.session_config();

        assert_eq!(session.grace_interval, Duration::from_millis(300));
        assert_eq!(session.pipeline.target.sample_rate, 44100);
        assert_eq!(session.pipeline.target.channels, 2);
        assert_eq!(session.pipeline.fallback_silence_ms, 1000);
    }
}
