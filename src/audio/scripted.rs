// Scripted capture source: delivers a predetermined sequence of frames from
// its own thread, mimicking a real device's warm-up delay and pacing. Used by
// the integration tests and useful for exercising the pipeline without
// hardware.

use anyhow::{bail, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use super::backend::{AudioFrame, CaptureSource, FrameSink, NativeFormat, SourceFactory, SourceKind};

/// What a scripted source delivers once started.
#[derive(Debug, Clone)]
pub struct Script {
    /// Simulated device warm-up before the first frame
    pub initial_delay: Duration,
    /// Number of frames to deliver
    pub frame_count: usize,
    /// Interleaved samples per frame
    pub samples_per_frame: usize,
    /// Constant sample value, distinguishable from padding silence
    pub sample_value: i16,
    /// Pacing between frames (zero = deliver as fast as possible)
    pub frame_interval: Duration,
}

impl Script {
    /// A burst of `frame_count` frames with no warm-up and no pacing.
    pub fn burst(frame_count: usize, samples_per_frame: usize, sample_value: i16) -> Self {
        Self {
            initial_delay: Duration::ZERO,
            frame_count,
            samples_per_frame,
            sample_value,
            frame_interval: Duration::ZERO,
        }
    }

    /// No frames at all: the source starts but stays silent.
    pub fn silent() -> Self {
        Self::burst(0, 0, 0)
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }
}

pub struct ScriptedSource {
    kind: SourceKind,
    format: NativeFormat,
    script: Script,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    capturing: bool,
}

impl ScriptedSource {
    pub fn new(kind: SourceKind, format: NativeFormat, script: Script) -> Self {
        Self {
            kind,
            format,
            script,
            stop: Arc::new(AtomicBool::new(false)),
            thread: None,
            capturing: false,
        }
    }
}

#[async_trait::async_trait]
impl CaptureSource for ScriptedSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn native_format(&self) -> NativeFormat {
        self.format
    }

    async fn start(&mut self, sink: FrameSink) -> Result<()> {
        if self.capturing {
            bail!("Already capturing");
        }

        let kind = self.kind;
        let format = self.format;
        let script = self.script.clone();
        let stop = Arc::clone(&self.stop);

        let thread = std::thread::Builder::new()
            .name(format!("scripted-{}", kind))
            .spawn(move || {
                if !script.initial_delay.is_zero() {
                    std::thread::sleep(script.initial_delay);
                }

                for _ in 0..script.frame_count {
                    if stop.load(Ordering::SeqCst) {
                        break;
                    }
                    sink(AudioFrame {
                        samples: vec![script.sample_value; script.samples_per_frame],
                        sample_rate: format.sample_rate,
                        channels: format.channels,
                        source: kind,
                    });
                    if !script.frame_interval.is_zero() {
                        std::thread::sleep(script.frame_interval);
                    }
                }
            })?;

        self.thread = Some(thread);
        self.capturing = true;
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        self.capturing = false;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Factory producing scripted sources, one script per stream. A `None` script
/// makes `open` fail for that stream, simulating an unavailable device.
pub struct ScriptedFactory {
    pub format: NativeFormat,
    pub system: Option<Script>,
    pub microphone: Option<Script>,
}

impl SourceFactory for ScriptedFactory {
    fn open(&self, kind: SourceKind) -> Result<Box<dyn CaptureSource>> {
        let script = match kind {
            SourceKind::SystemLoopback => self.system.clone(),
            SourceKind::Microphone => self.microphone.clone(),
        };
        match script {
            Some(script) => Ok(Box::new(ScriptedSource::new(kind, self.format, script))),
            None => bail!("{} device unavailable", kind),
        }
    }
}
