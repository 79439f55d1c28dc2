use anyhow::{Context, Result};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::config::SessionConfig;
use crate::audio::{
    AudioFrame, CaptureSource, FrameSink, MixResult, MixingPipeline, SourceFactory, SourceKind,
    StreamWriter,
};

/// One capture stream owned by the active session: a fresh device handle (if
/// the device opened) and the writer persisting its raw file.
struct CaptureStream {
    kind: SourceKind,
    writer: Arc<StreamWriter>,
    /// None when the device failed to open or start; the writer stays open
    /// but receives no frames
    source: Option<Box<dyn CaptureSource>>,
}

impl CaptureStream {
    /// Frames written so far, as milliseconds of audio in the native format.
    fn written_ms(&self) -> u64 {
        (self.writer.samples_written() as f64 / self.writer.format().samples_per_ms()) as u64
    }
}

/// A single recording in progress: two capture streams writing raw files
/// into a session-unique temp dir, finalized into mixed output on `finish`.
pub struct RecordingSession {
    session_id: String,
    requested_path: Option<PathBuf>,
    started_at: chrono::DateTime<chrono::Utc>,
    temp_dir: PathBuf,
    system: CaptureStream,
    microphone: CaptureStream,
    config: SessionConfig,
}

impl RecordingSession {
    /// Open fresh devices and begin capturing both streams.
    ///
    /// Per-source failures are logged and tolerated: a stream whose device
    /// cannot open or start simply produces an empty raw file. Only
    /// environment-level failures (temp dir, file creation) propagate.
    pub async fn begin(
        config: SessionConfig,
        factory: &dyn SourceFactory,
        requested_path: Option<PathBuf>,
    ) -> Result<Self> {
        let session_id = format!("session-{}", uuid::Uuid::new_v4());
        let started_at = Utc::now();

        // The logical start instant anchors silence-padding for both streams
        let logical_start = Instant::now();

        let temp_dir = std::env::temp_dir().join(format!(
            "duplex-recording-{}-{}",
            started_at.format("%Y%m%d_%H%M%S"),
            &session_id[8..16]
        ));
        std::fs::create_dir_all(&temp_dir)
            .with_context(|| format!("Failed to create temp dir: {:?}", temp_dir))?;

        info!("Starting recording session {} in {:?}", session_id, temp_dir);

        let system = open_stream(
            SourceKind::SystemLoopback,
            temp_dir.join("system_audio.wav"),
            factory,
            &config,
            logical_start,
        )
        .await?;

        let microphone = open_stream(
            SourceKind::Microphone,
            temp_dir.join("microphone.wav"),
            factory,
            &config,
            logical_start,
        )
        .await?;

        Ok(Self {
            session_id,
            requested_path,
            started_at,
            temp_dir,
            system,
            microphone,
            config,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn started_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.started_at
    }

    /// Stop both streams, finalize the raw files and run the mixing
    /// pipeline. Consumes the session; devices are never reused.
    ///
    /// Never fails: the pipeline degrades rather than erroring, and every
    /// cleanup problem is logged instead of propagated.
    pub async fn finish(mut self, final_path: Option<PathBuf>) -> MixResult {
        info!("Stopping recording session {}", self.session_id);

        for stream in [&mut self.system, &mut self.microphone] {
            if let Some(source) = stream.source.as_mut() {
                if let Err(e) = source.stop().await {
                    warn!("Failed to stop {} capture: {}", stream.kind, e);
                }
            }
        }

        // Callback delivery is asynchronous relative to the stop signal and
        // there is no synchronous drain primitive, so allow in-flight frames
        // to land before the writers go away.
        tokio::time::sleep(self.config.grace_interval).await;

        for stream in [&self.system, &self.microphone] {
            debug!(
                "{} stream captured ~{}ms of audio",
                stream.kind,
                stream.written_ms()
            );
            if let Err(e) = stream.writer.finalize() {
                error!("Failed to finalize {} raw file: {}", stream.kind, e);
            }
        }

        let output_path = final_path
            .or_else(|| self.requested_path.clone())
            .unwrap_or_else(|| {
                self.config.recordings_dir.join(format!(
                    "recording_{}.wav",
                    self.started_at.format("%Y%m%d_%H%M%S")
                ))
            });

        let pipeline = MixingPipeline::new(self.config.pipeline.clone());
        let result = pipeline.run(
            self.system.writer.path(),
            self.microphone.writer.path(),
            &output_path,
        );

        if result.succeeded {
            // Forensic material is only kept when something went wrong
            if let Err(e) = std::fs::remove_dir_all(&self.temp_dir) {
                warn!("Failed to remove temp dir {:?}: {}", self.temp_dir, e);
            }
        } else {
            warn!(
                "Finalization degraded; raw files kept in {:?} for recovery",
                self.temp_dir
            );
        }

        info!(
            "Recording session {} finished: {:?}",
            self.session_id, result.mixed_path
        );
        result
    }
}

/// Open one stream: writer first (against the device's reported native
/// format, or the canonical format when the device is unavailable), then the
/// sink, then capture.
async fn open_stream(
    kind: SourceKind,
    raw_path: PathBuf,
    factory: &dyn SourceFactory,
    config: &SessionConfig,
    logical_start: Instant,
) -> Result<CaptureStream> {
    let mut source = match factory.open(kind) {
        Ok(source) => Some(source),
        Err(e) => {
            warn!("{} device unavailable, continuing without it: {}", kind, e);
            None
        }
    };

    let format = source
        .as_ref()
        .map(|s| s.native_format())
        .unwrap_or(config.pipeline.target);

    let writer = Arc::new(StreamWriter::create(&raw_path, format)?);

    if let Some(src) = source.as_mut() {
        let sink = make_sink(kind, Arc::clone(&writer), logical_start, config);
        if let Err(e) = src.start(sink).await {
            warn!("Failed to start {} capture, continuing without it: {}", kind, e);
            source = None;
        }
    }

    Ok(CaptureStream {
        kind,
        writer,
        source,
    })
}

/// Build the frame sink for one stream. Runs on the source's capture thread;
/// all writer access is serialized by the writer's own lock.
fn make_sink(
    kind: SourceKind,
    writer: Arc<StreamWriter>,
    logical_start: Instant,
    config: &SessionConfig,
) -> FrameSink {
    let threshold = config.padding_threshold;
    let first_frame_seen = AtomicBool::new(false);

    Arc::new(move |frame: AudioFrame| {
        if frame.is_empty() {
            return;
        }

        // Startup-latency compensation: pad the file with leading silence so
        // its duration matches wall-clock elapsed since the logical start.
        // Applied at most once, on the first non-empty frame.
        if !first_frame_seen.swap(true, Ordering::SeqCst) {
            let delay = logical_start.elapsed();
            if delay > threshold {
                let delay_ms = delay.as_millis() as u64;
                match writer.append_silence(delay_ms) {
                    Ok(()) => info!("{} stream padded with {}ms of leading silence", kind, delay_ms),
                    Err(e) => warn!("Failed to pad {} stream: {}", kind, e),
                }
            }
        }

        if let Err(e) = writer.append(&frame.samples) {
            warn!("Failed to append {} frame: {}", kind, e);
        }
    })
}
