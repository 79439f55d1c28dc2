// Mixing pipeline: combine the two raw captured files into one playable
// output, plus labeled per-source copies.
//
// Every stage has an explicit fallback. The pipeline never returns an error;
// the MixResult's degraded_reason records which fallback path was taken.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::backend::{NativeFormat, SourceKind};
use super::file::{write_wav, AudioFile};
use super::resample::{convert_to, ConversionStrategy, Converted};

/// Configuration for the mixing pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Canonical output format; every produced file targets this regardless
    /// of the sources' native formats
    pub target: NativeFormat,
    /// Duration of the synthesized silent output when both sources are empty
    pub fallback_silence_ms: u64,
    /// Known-writable directory substituted when the requested path is unusable
    pub default_output_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            // Standard CD-quality stereo so downstream players always cope
            target: NativeFormat {
                sample_rate: 44100,
                bits_per_sample: 16,
                channels: 2,
            },
            fallback_silence_ms: 1000,
            default_output_dir: std::env::temp_dir(),
        }
    }
}

/// Outcome of one finalization run. Immutable once produced.
#[derive(Debug, Clone)]
pub struct MixResult {
    /// The mixed output file (always set; the pipeline always produces one)
    pub mixed_path: PathBuf,
    /// Labeled copy of the system-audio stream, if that stream had a raw file
    pub system_path: Option<PathBuf>,
    /// Labeled copy of the microphone stream, if that stream had a raw file
    pub microphone_path: Option<PathBuf>,
    /// False only when even the last-resort outputs could not be written
    pub succeeded: bool,
    /// Which fallback path was taken, when any was
    pub degraded_reason: Option<String>,
}

/// One loaded-and-converted input stream.
struct PreparedStream {
    kind: SourceKind,
    converted: Converted,
    /// Path of the raw capture file this stream came from
    raw_path: PathBuf,
}

pub struct MixingPipeline {
    config: PipelineConfig,
}

impl MixingPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        info!(
            "Mixing pipeline initialized: target {}, fallback silence {}ms",
            config.target, config.fallback_silence_ms
        );
        Self { config }
    }

    /// Combine the two raw capture files into `requested` (plus labeled
    /// per-source copies next to it). Both writers must already be disposed;
    /// this reads the raw files exclusively.
    pub fn run(&self, system_raw: &Path, mic_raw: &Path, requested: &Path) -> MixResult {
        let mut degradations: Vec<String> = Vec::new();

        let mixed_path = self.resolve_output_path(requested, &mut degradations);

        let system = self.prepare(SourceKind::SystemLoopback, system_raw, &mut degradations);
        let mic = self.prepare(SourceKind::Microphone, mic_raw, &mut degradations);

        // Labeled per-source copies are persisted regardless of mixing
        // outcome so the pre-mix material stays recoverable.
        let system_path = self.persist_labeled(&mixed_path, system.as_ref(), &mut degradations);
        let microphone_path = self.persist_labeled(&mixed_path, mic.as_ref(), &mut degradations);

        let succeeded = match self.write_mixed(&mixed_path, system.as_ref(), mic.as_ref()) {
            Ok(Some(reason)) => {
                degradations.push(reason);
                true
            }
            Ok(None) => true,
            Err(e) => {
                warn!("Mixing failed, trying single-source fallback: {}", e);
                degradations.push(format!("mixing failed: {}", e));
                self.write_fallback(&mixed_path, system.as_ref(), mic.as_ref(), &mut degradations)
            }
        };

        let degraded_reason = if degradations.is_empty() {
            None
        } else {
            Some(degradations.join("; "))
        };

        if let Some(reason) = &degraded_reason {
            warn!("Mix finished degraded: {}", reason);
        } else {
            info!("Mix complete: {:?}", mixed_path);
        }

        MixResult {
            mixed_path,
            system_path,
            microphone_path,
            succeeded,
            degraded_reason,
        }
    }

    /// Validate the requested path, substituting a generated default under
    /// the known-writable directory when its parent cannot be created.
    fn resolve_output_path(&self, requested: &Path, degradations: &mut Vec<String>) -> PathBuf {
        if let Some(parent) = requested.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    warn!(
                        "Requested output dir {:?} is unusable ({}), substituting default",
                        parent, e
                    );
                    degradations.push(format!("requested path unusable: {}", e));
                    let name = requested
                        .file_name()
                        .map(PathBuf::from)
                        .unwrap_or_else(|| PathBuf::from("recording.wav"));
                    return self.config.default_output_dir.join(name);
                }
            }
        }
        requested.to_path_buf()
    }

    /// Load one raw capture file and convert it toward the target format.
    /// A missing or unreadable file becomes `None`, never an error.
    fn prepare(
        &self,
        kind: SourceKind,
        raw_path: &Path,
        degradations: &mut Vec<String>,
    ) -> Option<PreparedStream> {
        let audio = match AudioFile::open(raw_path) {
            Ok(audio) => audio,
            Err(e) => {
                warn!("{} stream has no usable raw file: {}", kind, e);
                return None;
            }
        };

        let converted = convert_to(&audio.samples, audio.format(), self.config.target);
        match converted.strategy {
            ConversionStrategy::PassThrough | ConversionStrategy::RubatoFft => {}
            ConversionStrategy::Linear => {
                degradations.push(format!("{}: fallback linear resampler used", kind));
            }
            ConversionStrategy::RawCopy => {
                degradations.push(format!(
                    "{}: kept native format {} (no resampler accepted the conversion)",
                    kind, converted.format
                ));
            }
        }

        Some(PreparedStream {
            kind,
            converted,
            raw_path: raw_path.to_path_buf(),
        })
    }

    /// Write `<stem>_system.wav` / `<stem>_mic.wav` next to the mixed file.
    fn persist_labeled(
        &self,
        mixed_path: &Path,
        stream: Option<&PreparedStream>,
        degradations: &mut Vec<String>,
    ) -> Option<PathBuf> {
        let stream = stream?;
        let path = labeled_path(mixed_path, stream.kind.label());

        let result = if stream.converted.strategy == ConversionStrategy::RawCopy {
            // Conversion fell through entirely; keep the untouched native file
            std::fs::copy(&stream.raw_path, &path)
                .map(|_| ())
                .with_context(|| format!("Failed to copy raw {} file", stream.kind))
        } else {
            write_wav(&path, stream.converted.format, &stream.converted.samples)
        };

        match result {
            Ok(()) => {
                info!("{} audio saved: {:?}", stream.kind, path);
                Some(path)
            }
            Err(e) => {
                warn!("Failed to persist {} audio: {}", stream.kind, e);
                degradations.push(format!("{} copy not written: {}", stream.kind, e));
                None
            }
        }
    }

    /// Sum the prepared streams into the mixed output file.
    ///
    /// Returns `Ok(Some(reason))` when a defined fallback produced the file
    /// (single source, or synthesized silence) and `Err` only when writing
    /// itself failed.
    fn write_mixed(
        &self,
        mixed_path: &Path,
        system: Option<&PreparedStream>,
        mic: Option<&PreparedStream>,
    ) -> Result<Option<String>> {
        // Only streams that actually reached the target format can be summed
        fn usable(s: Option<&PreparedStream>, target: NativeFormat) -> Option<&PreparedStream> {
            s.filter(|s| s.converted.format == target && !s.converted.samples.is_empty())
        }
        let system = usable(system, self.config.target);
        let mic = usable(mic, self.config.target);

        match (system, mic) {
            (Some(sys), Some(mic)) => {
                let mixed = sum_streams(&sys.converted.samples, &mic.converted.samples);
                write_wav(mixed_path, self.config.target, &mixed)?;
                Ok(None)
            }
            (Some(only), None) | (None, Some(only)) => {
                write_wav(mixed_path, self.config.target, &only.converted.samples)?;
                Ok(Some(format!(
                    "mixed output is {} audio only (other source empty)",
                    only.kind
                )))
            }
            (None, None) => {
                let silence = self.silent_samples();
                write_wav(mixed_path, self.config.target, &silence)?;
                Ok(Some(
                    "no mixable audio captured; synthesized silent output".to_string(),
                ))
            }
        }
    }

    /// Last-resort chain after a mixing failure: copy system audio alone,
    /// then microphone alone, then a synthesized silent file.
    fn write_fallback(
        &self,
        mixed_path: &Path,
        system: Option<&PreparedStream>,
        mic: Option<&PreparedStream>,
        degradations: &mut Vec<String>,
    ) -> bool {
        for stream in [system, mic].into_iter().flatten() {
            if std::fs::copy(&stream.raw_path, mixed_path).is_ok() {
                degradations.push(format!("mixed output is a raw {} copy", stream.kind));
                return true;
            }
        }

        match write_wav(mixed_path, self.config.target, &self.silent_samples()) {
            Ok(()) => {
                degradations.push("mixed output synthesized as silence".to_string());
                true
            }
            Err(e) => {
                warn!("Even the silent fallback could not be written: {}", e);
                degradations.push(format!("no output written: {}", e));
                false
            }
        }
    }

    fn silent_samples(&self) -> Vec<i16> {
        let count =
            (self.config.fallback_silence_ms as f64 * self.config.target.samples_per_ms()) as usize;
        let count = count - count % self.config.target.channels as usize;
        vec![0i16; count]
    }
}

/// Labeled sibling of the mixed output: `<dir>/<stem>_<label>.<ext>`.
fn labeled_path(mixed_path: &Path, label: &str) -> PathBuf {
    let stem = mixed_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "recording".to_string());
    let ext = mixed_path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "wav".to_string());
    mixed_path.with_file_name(format!("{}_{}.{}", stem, label, ext))
}

/// Sum two interleaved streams at unity gain with clipping. Output length is
/// the longer of the two; the shorter stream contributes zeros past its end.
fn sum_streams(a: &[i16], b: &[i16]) -> Vec<i16> {
    let len = a.len().max(b.len());
    let mut mixed = Vec::with_capacity(len);

    for i in 0..len {
        let sum = a.get(i).copied().unwrap_or(0) as i32 + b.get(i).copied().unwrap_or(0) as i32;
        mixed.push(sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16);
    }

    mixed
}
