//! Background composition jobs, one per session

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{ComposeError, CompositionEngine, CompositionOutcome};

type Jobs = Arc<Mutex<HashMap<String, CancellationToken>>>;

/// Runs compositions on blocking threads and tracks their cancel tokens
#[derive(Clone)]
pub struct CompositionManager {
    engine: Arc<CompositionEngine>,
    jobs: Jobs,
}

/// Removes the job entry when the composition ends, however it ends
struct JobGuard {
    jobs: Jobs,
    session_id: String,
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.remove(&self.session_id);
        }
    }
}

impl CompositionManager {
    pub fn new(engine: CompositionEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start composing `session_id` in the background
    pub fn start(
        &self,
        session_id: impl Into<String>,
    ) -> Result<JoinHandle<Result<CompositionOutcome, ComposeError>>, ComposeError> {
        let session_id = session_id.into();
        let cancel = CancellationToken::new();
        {
            let mut jobs = self
                .jobs
                .lock()
                .map_err(|e| ComposeError::TaskFailed(format!("Lock error: {}", e)))?;
            if jobs.contains_key(&session_id) {
                return Err(ComposeError::AlreadyRunning(session_id));
            }
            jobs.insert(session_id.clone(), cancel.clone());
        }

        info!("Starting composition of {}", session_id);
        let engine = self.engine.clone();
        let guard = JobGuard {
            jobs: self.jobs.clone(),
            session_id: session_id.clone(),
        };

        Ok(tokio::task::spawn_blocking(move || {
            let _guard = guard;
            engine.compose(&session_id, &cancel)
        }))
    }

    /// Request cancellation. Returns whether a job was running; calling it
    /// again or for an idle session is harmless.
    pub fn cancel(&self, session_id: &str) -> bool {
        match self.jobs.lock() {
            Ok(jobs) => match jobs.get(session_id) {
                Some(token) => {
                    info!("Cancelling composition of {}", session_id);
                    token.cancel();
                    true
                }
                None => false,
            },
            Err(e) => {
                warn!("Lock error: {}", e);
                false
            }
        }
    }

    pub fn is_running(&self, session_id: &str) -> bool {
        self.jobs
            .lock()
            .map(|jobs| jobs.contains_key(session_id))
            .unwrap_or(false)
    }

    /// Cancel every running job
    pub fn cancel_all(&self) {
        if let Ok(jobs) = self.jobs.lock() {
            for token in jobs.values() {
                token.cancel();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ComposerConfig;
    use chrono::Utc;
    use media_io::{MemoryBackend, VideoFrame};
    use session_events::{EventBus, VideoState};
    use std::path::PathBuf;
    use storage::{Repository, TelemetryStore, VideoSessionMetadata};

    fn manager(frames: u64) -> (CompositionManager, tempfile::TempDir) {
        let backend = Arc::new(MemoryBackend::small());
        backend.insert_file(
            "/raw/s1_raw.mkv",
            (1..=frames).map(|i| VideoFrame::solid(16, 8, [0, 0, 0], i)).collect(),
        );
        let store = Arc::new(Repository::new());
        store
            .insert_video_metadata(&VideoSessionMetadata {
                session_id: "s1".to_string(),
                start_time: Utc::now(),
                width: 16,
                height: 8,
                format: "matroska".to_string(),
                codec: "h264".to_string(),
                frame_rate: 30.0,
                bit_rate: 1_000_000,
                raw_path: PathBuf::from("/raw/s1_raw.mkv"),
                total_video_frames: frames,
                delay_ms: 0,
                generated_path: None,
            })
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let config = ComposerConfig {
            output_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let engine = CompositionEngine::new(backend, store, EventBus::default(), config);
        (CompositionManager::new(engine), dir)
    }

    #[tokio::test]
    async fn test_job_is_removed_when_done() {
        let (manager, _dir) = manager(3);

        let outcome = manager.start("s1").unwrap().await.unwrap().unwrap();
        assert_eq!(outcome.state, VideoState::Finished);
        assert!(!manager.is_running("s1"));
        assert!(!manager.cancel("s1"));
    }

    #[tokio::test]
    async fn test_second_start_rejected_while_running() {
        let (manager, _dir) = manager(3);
        let token = CancellationToken::new();
        manager.jobs.lock().unwrap().insert("s1".to_string(), token);

        assert!(matches!(manager.start("s1"), Err(ComposeError::AlreadyRunning(_))));
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let (manager, _dir) = manager(3);
        let token = CancellationToken::new();
        manager.jobs.lock().unwrap().insert("s1".to_string(), token.clone());

        assert!(manager.cancel("s1"));
        assert!(manager.cancel("s1"));
        assert!(token.is_cancelled());
        assert!(!manager.cancel("other"));
    }

    #[tokio::test]
    async fn test_unknown_session_fails_and_clears_job() {
        let (manager, _dir) = manager(1);

        let result = manager.start("missing").unwrap().await.unwrap();
        assert!(matches!(result, Err(ComposeError::UnknownSession(_))));
        assert!(!manager.is_running("missing"));
    }
}
