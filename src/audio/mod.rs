pub mod backend;
pub mod capture;
pub mod file;
pub mod mixer;
pub mod resample;
pub mod scripted;
pub mod writer;

pub use backend::{AudioFrame, CaptureSource, FrameSink, NativeFormat, SourceFactory, SourceKind};
pub use capture::{CpalSource, CpalSourceFactory};
pub use file::AudioFile;
pub use mixer::{MixResult, MixingPipeline, PipelineConfig};
pub use resample::{convert_to, convert_with, ConversionStrategy, Converted};
pub use scripted::{Script, ScriptedFactory, ScriptedSource};
pub use writer::StreamWriter;
