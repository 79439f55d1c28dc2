pub mod audio;
pub mod config;
pub mod server;
pub mod session;

pub use audio::{
    AudioFile, AudioFrame, CaptureSource, ConversionStrategy, CpalSourceFactory, FrameSink,
    MixResult, MixingPipeline, NativeFormat, PipelineConfig, Script, ScriptedFactory,
    ScriptedSource, SourceFactory, SourceKind, StreamWriter,
};
pub use config::Config;
pub use server::{reply, Command};
pub use session::{RecordingController, RecordingSession, SessionConfig};
