use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use super::config::SessionConfig;
use super::session::RecordingSession;
use crate::audio::{MixResult, SourceFactory};

/// Single authority over the process-wide recording lifecycle.
///
/// At most one session is active at a time; the registry is one mutex-guarded
/// slot rather than ambient static state. A `start` while recording first
/// finalizes the previous session ("always succeed, never queue"), a `stop`
/// while idle is a no-op.
pub struct RecordingController {
    config: SessionConfig,
    factory: Arc<dyn SourceFactory>,
    active: Mutex<Option<RecordingSession>>,
}

impl RecordingController {
    pub fn new(config: SessionConfig, factory: Arc<dyn SourceFactory>) -> Self {
        Self {
            config,
            factory,
            active: Mutex::new(None),
        }
    }

    /// Begin a new recording session. Any active session is stopped and
    /// fully finalized (files written and closed) before new devices open.
    /// Returns promptly; capture proceeds asynchronously.
    pub async fn start(&self, requested_path: Option<PathBuf>) -> Result<()> {
        let mut active = self.active.lock().await;

        if let Some(previous) = active.take() {
            info!(
                "Start requested while session {} is active; stopping it first",
                previous.session_id()
            );
            previous.finish(None).await;
        }

        let session =
            RecordingSession::begin(self.config.clone(), self.factory.as_ref(), requested_path)
                .await?;
        info!("Session {} is recording", session.session_id());
        *active = Some(session);

        Ok(())
    }

    /// Stop the active session and produce its MixResult. `Ok(None)` when no
    /// session is active; no files are created in that case.
    pub async fn stop(&self, final_path: Option<PathBuf>) -> Result<Option<MixResult>> {
        let session = self.active.lock().await.take();

        match session {
            Some(session) => Ok(Some(session.finish(final_path).await)),
            None => {
                info!("Stop requested but no session is active");
                Ok(None)
            }
        }
    }

    pub async fn is_recording(&self) -> bool {
        self.active.lock().await.is_some()
    }
}
