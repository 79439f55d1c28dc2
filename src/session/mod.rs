//! Recording session management
//!
//! This module provides the recording lifecycle:
//! - `RecordingController`: process-wide single-session registry
//! - `RecordingSession`: two capture streams, silence padding, finalization
//! - `SessionConfig`: timing knobs and pipeline settings

mod config;
mod controller;
mod session;

pub use config::SessionConfig;
pub use controller::RecordingController;
pub use session::RecordingSession;
