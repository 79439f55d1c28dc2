use std::path::PathBuf;
use std::time::Duration;

use crate::audio::PipelineConfig;

/// Configuration shared by every recording session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Directory for generated default output filenames (and the substitute
    /// location when a requested path is unwritable)
    pub recordings_dir: PathBuf,

    /// Bounded wait after signaling stop, letting in-flight callback
    /// deliveries land before the writers are disposed
    pub grace_interval: Duration,

    /// Startup delays longer than this get compensated with leading silence
    pub padding_threshold: Duration,

    /// Mixing pipeline settings (canonical format, fallback silence)
    pub pipeline: PipelineConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let pipeline = PipelineConfig::default();
        Self {
            recordings_dir: pipeline.default_output_dir.clone(),
            grace_interval: Duration::from_millis(300),
            padding_threshold: Duration::from_millis(40),
            pipeline,
        }
    }
}
