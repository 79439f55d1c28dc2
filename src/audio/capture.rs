// cpal-backed capture sources.
//
// A cpal::Stream is not Send, so each source runs its stream on a dedicated
// capture thread: the thread builds the stream, plays it, then parks until
// the stop signal arrives and the stream is dropped. Frames are pushed into
// the registered sink from cpal's callback on that thread.

use anyhow::{bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use tracing::{info, warn};

use super::backend::{AudioFrame, CaptureSource, FrameSink, NativeFormat, SourceFactory, SourceKind};

pub struct CpalSource {
    kind: SourceKind,
    device_name: String,
    /// Taken by `start` and moved onto the capture thread
    device: Option<Device>,
    native_format: NativeFormat,
    stream_config: StreamConfig,
    sample_format: SampleFormat,
    stop_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
    capturing: bool,
}

impl CpalSource {
    /// Resolve the device for `kind` and query its native format. The device
    /// handle is fresh; previously stopped sources are never reopened.
    pub fn open(kind: SourceKind) -> Result<Self> {
        let host = cpal::default_host();

        let device = match kind {
            SourceKind::Microphone => host
                .default_input_device()
                .context("No default microphone device available")?,
            SourceKind::SystemLoopback => resolve_loopback_device(&host)?,
        };

        let device_name = device
            .description()
            .map(|d| d.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        let supported = device
            .default_input_config()
            .with_context(|| format!("Device {:?} has no input config", device_name))?;

        let native_format = NativeFormat {
            sample_rate: supported.sample_rate(),
            bits_per_sample: 16,
            channels: supported.channels(),
        };
        let sample_format = supported.sample_format();
        let stream_config: StreamConfig = supported.into();

        info!(
            "{} capture device opened: {} ({})",
            kind, device_name, native_format
        );

        Ok(Self {
            kind,
            device_name,
            device: Some(device),
            native_format,
            stream_config,
            sample_format,
            stop_tx: None,
            thread: None,
            capturing: false,
        })
    }
}

#[async_trait::async_trait]
impl CaptureSource for CpalSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn native_format(&self) -> NativeFormat {
        self.native_format
    }

    async fn start(&mut self, sink: FrameSink) -> Result<()> {
        if self.capturing {
            bail!("Already capturing");
        }
        let device = self
            .device
            .take()
            .context("Capture device already consumed; sources are single-shot")?;

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel::<Result<()>>();

        let kind = self.kind;
        let config = self.stream_config.clone();
        let sample_format = self.sample_format;
        let native_format = self.native_format;

        let thread = std::thread::Builder::new()
            .name(format!("capture-{}", kind))
            .spawn(move || {
                let stream =
                    match build_capture_stream(&device, &config, sample_format, native_format, kind, sink)
                        .and_then(|stream| {
                            stream.play().context("Failed to start capture stream")?;
                            Ok(stream)
                        }) {
                        Ok(stream) => {
                            let _ = ready_tx.send(Ok(()));
                            stream
                        }
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };

                // Park until stop is signaled (or the source is dropped)
                let _ = stop_rx.recv();
                drop(stream);
            })
            .context("Failed to spawn capture thread")?;

        self.stop_tx = Some(stop_tx);
        self.thread = Some(thread);

        ready_rx
            .await
            .context("Capture thread exited before reporting readiness")??;

        self.capturing = true;
        info!("{} capture started on {}", self.kind, self.device_name);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("{} capture thread panicked", self.kind);
            }
        }
        self.capturing = false;
        info!("{} capture stopped", self.kind);
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        &self.device_name
    }
}

impl Drop for CpalSource {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Pick a device that exposes the system output as a capture stream.
///
/// PulseAudio/PipeWire publish "monitor" inputs; Windows exposes "Stereo Mix"
/// on some drivers and WASAPI allows capturing the render endpoint directly.
fn resolve_loopback_device(host: &cpal::Host) -> Result<Device> {
    for device in host.input_devices()? {
        if let Ok(desc) = device.description() {
            let lower = desc.to_string().to_lowercase();
            if lower.contains("monitor") || lower.contains("loopback") || lower.contains("stereo mix")
            {
                return Ok(device);
            }
        }
    }

    if cfg!(target_os = "windows") {
        if let Some(device) = host.default_output_device() {
            return Ok(device);
        }
    }

    bail!("No loopback capture device available on this system")
}

/// Dispatch stream building on the device's native sample format.
fn build_capture_stream(
    device: &Device,
    config: &StreamConfig,
    sample_format: SampleFormat,
    native_format: NativeFormat,
    kind: SourceKind,
    sink: FrameSink,
) -> Result<Stream> {
    match sample_format {
        SampleFormat::F32 => build_stream::<f32>(device, config, native_format, kind, sink),
        SampleFormat::I16 => build_stream::<i16>(device, config, native_format, kind, sink),
        SampleFormat::U16 => build_stream::<u16>(device, config, native_format, kind, sink),
        other => bail!("Unsupported sample format: {:?}", other),
    }
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    native_format: NativeFormat,
    kind: SourceKind,
    sink: FrameSink,
) -> Result<Stream>
where
    T: cpal::SizedSample,
    i16: cpal::FromSample<T>,
{
    // Stream errors are common on Linux (especially USB audio) and non-fatal;
    // report the first and then rate-limit.
    let error_count = Arc::new(AtomicU64::new(0));
    let err_fn = move |err| {
        let count = error_count.fetch_add(1, Ordering::Relaxed);
        if count == 0 {
            warn!("Audio stream error (non-fatal, recording continues): {}", err);
        } else if count % 1000 == 0 {
            warn!("Audio stream: {} non-fatal errors so far", count);
        }
    };

    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let samples: Vec<i16> =
                    data.iter().map(|&s| cpal::Sample::from_sample(s)).collect();
                sink(AudioFrame {
                    samples,
                    sample_rate: native_format.sample_rate,
                    channels: native_format.channels,
                    source: kind,
                });
            },
            err_fn,
            None,
        )
        .context("Failed to build capture stream")?;

    Ok(stream)
}

/// Factory handing out fresh cpal sources for every session.
pub struct CpalSourceFactory;

impl SourceFactory for CpalSourceFactory {
    fn open(&self, kind: SourceKind) -> Result<Box<dyn CaptureSource>> {
        Ok(Box::new(CpalSource::open(kind)?))
    }
}
