use anyhow::Result;
use std::sync::Arc;

/// Audio stream source type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// System output loopback (what the speakers are playing)
    SystemLoopback,
    /// Microphone input
    Microphone,
}

impl SourceKind {
    /// Short label used in file names and log lines
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::SystemLoopback => "system",
            SourceKind::Microphone => "mic",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Native sample format reported by a capture device at open time.
///
/// The two capture devices commonly disagree (e.g. 48kHz stereo loopback vs
/// 44.1kHz mono microphone); that is expected and resolved by the mixing
/// pipeline, not at capture time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeFormat {
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub channels: u16,
}

impl NativeFormat {
    /// Number of interleaved samples covering one millisecond of audio.
    pub fn samples_per_ms(&self) -> f64 {
        self.sample_rate as f64 * self.channels as f64 / 1000.0
    }
}

impl std::fmt::Display for NativeFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}Hz/{}bit/{}ch",
            self.sample_rate, self.bits_per_sample, self.channels
        )
    }
}

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Which stream delivered this frame
    pub source: SourceKind,
}

impl AudioFrame {
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Sink invoked by a capture source for every delivered frame.
///
/// Contract: the sink is called from the source's dedicated capture thread,
/// concurrently with whatever thread drives `stop`. Implementations must do
/// their own locking and tolerate frames arriving after stop was signaled.
pub type FrameSink = Arc<dyn Fn(AudioFrame) + Send + Sync>;

/// Audio capture source
///
/// Implementations:
/// - cpal: real devices (microphone input, loopback/monitor capture)
/// - scripted: deterministic in-process frames for tests
#[async_trait::async_trait]
pub trait CaptureSource: Send + Sync {
    /// Which stream this source feeds
    fn kind(&self) -> SourceKind;

    /// Format the device reported when it was opened. Frames pushed into the
    /// sink match this rate and channel count.
    fn native_format(&self) -> NativeFormat;

    /// Begin capture, pushing frames into `sink` from a dedicated thread
    /// until `stop` is called. Starting an already-started source is an error.
    async fn start(&mut self, sink: FrameSink) -> Result<()>;

    /// Signal the capture thread to stop and release the device. Frames whose
    /// delivery is already in flight may still reach the sink afterwards.
    async fn stop(&mut self) -> Result<()>;

    /// Check if the source is currently capturing
    fn is_capturing(&self) -> bool;

    /// Source name for logging
    fn name(&self) -> &str;
}

/// Factory producing fresh capture sources for every session.
///
/// Capture devices are single-shot: a stopped source is never restarted, the
/// session asks the factory for new ones instead.
pub trait SourceFactory: Send + Sync {
    fn open(&self, kind: SourceKind) -> Result<Box<dyn CaptureSource>>;
}
