//! Capture supervision
//!
//! `CaptureService` is an actor owning the connection loop and at most one
//! running capture loop. It opens the stream, restarts it after a backoff
//! when it ends, and turns finished recordings into persisted metadata
//! plus frame sync records.

use chrono::Utc;
use media_io::{MediaBackend, SinkSettings, StreamProperties, StreamSource, VideoFrame};
use session_events::{EventBus, SessionEvent};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use storage::{TelemetryStore, VideoSessionMetadata};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::RecorderConfig;
use crate::connector::StreamConnector;
use crate::recorder::{CaptureEnd, CaptureReport, FrameSyncRecorder, RecorderHandle};
use crate::CaptureError;

type ConnectFuture = Pin<Box<dyn Future<Output = Option<Box<dyn StreamSource>>> + Send>>;

/// Outcome of a stopped recording
#[derive(Debug, Clone)]
pub struct CaptureSummary {
    pub session_id: String,
    pub raw_path: PathBuf,
    pub total_frames: u64,
    pub discarded: bool,
    pub end: CaptureEnd,
}

enum ServiceCommand {
    StartRecording {
        session_id: String,
        delay_ms: i64,
        reply: oneshot::Sender<Result<PathBuf, CaptureError>>,
    },
    StopRecording {
        discard: bool,
        reply: oneshot::Sender<Result<Option<CaptureSummary>, CaptureError>>,
    },
    Shutdown,
}

/// Cloneable control handle for a spawned `CaptureService`
#[derive(Clone)]
pub struct CaptureHandle {
    commands: mpsc::Sender<ServiceCommand>,
    ticks: Arc<watch::Sender<i64>>,
    stream: watch::Receiver<Option<StreamProperties>>,
}

impl CaptureHandle {
    /// Telemetry tick: frames pulled from now on map to `timestamp_ms`
    pub fn tick(&self, timestamp_ms: i64) {
        self.ticks.send_replace(timestamp_ms);
    }

    pub fn last_tick(&self) -> i64 {
        *self.ticks.borrow()
    }

    /// Properties of the connected stream, `None` while disconnected
    pub fn stream(&self) -> Option<StreamProperties> {
        self.stream.borrow().clone()
    }

    pub fn watch_stream(&self) -> watch::Receiver<Option<StreamProperties>> {
        self.stream.clone()
    }

    /// Start recording the connected stream. Returns the raw file path.
    pub async fn start_recording(&self, session_id: impl Into<String>, delay_ms: i64) -> Result<PathBuf, CaptureError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(ServiceCommand::StartRecording {
                session_id: session_id.into(),
                delay_ms,
                reply,
            })
            .await
            .map_err(|_| CaptureError::ServiceStopped)?;
        rx.await.map_err(|_| CaptureError::ServiceStopped)?
    }

    /// Stop the running recording. `Ok(None)` when nothing was recording.
    pub async fn stop_recording(&self, discard: bool) -> Result<Option<CaptureSummary>, CaptureError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(ServiceCommand::StopRecording { discard, reply })
            .await
            .map_err(|_| CaptureError::ServiceStopped)?;
        rx.await.map_err(|_| CaptureError::ServiceStopped)?
    }

    /// Stop the service. A running recording is finished and persisted.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(ServiceCommand::Shutdown).await;
        self.commands.closed().await;
    }
}

struct ActiveSession {
    metadata: VideoSessionMetadata,
    /// Set once a stop was requested; holds the discard choice
    stopping: Option<bool>,
}

pub struct CaptureService {
    backend: Arc<dyn MediaBackend>,
    store: Arc<dyn TelemetryStore>,
    events: EventBus,
    config: RecorderConfig,
    connector: StreamConnector,
    ticks: watch::Receiver<i64>,
    stream_tx: watch::Sender<Option<StreamProperties>>,
    preview: Option<mpsc::Sender<VideoFrame>>,
    recorder: Option<RecorderHandle>,
    session: Option<ActiveSession>,
}

impl CaptureService {
    /// Spawn the service on the current runtime and start connecting to `url`
    pub fn spawn(
        backend: Arc<dyn MediaBackend>,
        store: Arc<dyn TelemetryStore>,
        events: EventBus,
        url: impl Into<String>,
        config: RecorderConfig,
        preview: Option<mpsc::Sender<VideoFrame>>,
    ) -> CaptureHandle {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (ticks_tx, ticks_rx) = watch::channel(0);
        let (stream_tx, stream_rx) = watch::channel(None);

        let service = Self {
            connector: StreamConnector::new(backend.clone(), url, config.reconnect_backoff()),
            backend,
            store,
            events,
            config,
            ticks: ticks_rx,
            stream_tx,
            preview,
            recorder: None,
            session: None,
        };
        tokio::spawn(service.run(command_rx));

        CaptureHandle {
            commands: command_tx,
            ticks: Arc::new(ticks_tx),
            stream: stream_rx,
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<ServiceCommand>) {
        let cancel = CancellationToken::new();
        let mut connecting: Option<ConnectFuture> =
            Some(Box::pin(self.connector.clone().connect(Duration::ZERO, cancel.clone())));

        info!("Capture service started for {}", self.connector.url());

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(ServiceCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                source = next_source(&mut connecting) => {
                    connecting = None;
                    match source {
                        Some(source) => self.on_connected(source),
                        None => break,
                    }
                }
                report = next_report(&mut self.recorder) => {
                    self.recorder = None;
                    self.on_capture_ended(report);
                }
            }

            if self.recorder.is_none() && connecting.is_none() {
                connecting = Some(Box::pin(
                    self.connector
                        .clone()
                        .connect(self.config.reconnect_backoff(), cancel.clone()),
                ));
            }
        }

        cancel.cancel();
        if let Some(discard) = self.pending_discard() {
            if let Err(e) = self.stop_recording(discard).await {
                error!("Failed to finish recording on shutdown: {}", e);
            }
        }
        if let Some(mut recorder) = self.recorder.take() {
            recorder.stop();
            let report = tokio::time::timeout(self.config.stop_timeout(), recorder.wait()).await;
            match (report, self.pending_discard()) {
                (Ok(Some(report)), Some(discard)) => {
                    if let Err(e) = self.finish_session(report, discard) {
                        error!("Failed to persist recording on shutdown: {}", e);
                    }
                }
                (Err(_), Some(_)) => error!("Capture loop still blocked at shutdown, recording lost"),
                _ => {}
            }
        }
        self.stream_tx.send_replace(None);
        info!("Capture service stopped");
    }

    async fn handle_command(&mut self, command: ServiceCommand) {
        match command {
            ServiceCommand::StartRecording {
                session_id,
                delay_ms,
                reply,
            } => {
                let _ = reply.send(self.start_recording(session_id, delay_ms));
            }
            ServiceCommand::StopRecording { discard, reply } => {
                let _ = reply.send(self.stop_recording(discard).await);
            }
            ServiceCommand::Shutdown => {}
        }
    }

    fn on_connected(&mut self, source: Box<dyn StreamSource>) {
        let props = source.properties().clone();
        info!(
            "Stream connected: {}x{} @ {:.2} fps, {} {}",
            props.width, props.height, props.frame_rate, props.format, props.codec
        );

        let mut recorder = FrameSyncRecorder::new(source, self.ticks.clone());
        if let Some(preview) = &self.preview {
            recorder = recorder.with_preview(preview.clone(), self.config.preview_every);
        }
        self.recorder = Some(recorder.start());

        self.events.publish(SessionEvent::StreamConnected {
            width: props.width,
            height: props.height,
            frame_rate: props.frame_rate,
        });
        self.stream_tx.send_replace(Some(props));
    }

    /// The capture loop exited on its own
    fn on_capture_ended(&mut self, report: Option<CaptureReport>) {
        self.stream_tx.send_replace(None);
        self.events.publish(SessionEvent::StreamLost);

        let Some(report) = report else {
            error!("Capture loop terminated without a report");
            if let Some(session) = self.session.take() {
                error!("Recording {} lost", session.metadata.session_id);
            }
            return;
        };

        warn!("Stream ended: {:?}", report.end);
        if let Some(discard) = self.pending_discard() {
            if let Err(e) = self.finish_session(report, discard) {
                error!("Failed to persist recording: {}", e);
            }
        }
    }

    /// Discard choice of the active session, `false` until a stop asks otherwise
    fn pending_discard(&self) -> Option<bool> {
        self.session
            .as_ref()
            .map(|session| session.stopping.unwrap_or(false))
    }

    fn start_recording(&mut self, session_id: String, delay_ms: i64) -> Result<PathBuf, CaptureError> {
        if let Some(session) = &self.session {
            return Err(CaptureError::AlreadyRecording(session.metadata.session_id.clone()));
        }
        let recorder = self.recorder.as_ref().ok_or(CaptureError::NotConnected)?;
        if !recorder.is_capturing() {
            return Err(CaptureError::NotConnected);
        }

        std::fs::create_dir_all(&self.config.raw_dir)?;
        let raw_path = self.config.raw_path(&session_id);
        let settings = SinkSettings::matching(recorder.properties());
        let sink = self.backend.open_sink(&raw_path, &settings)?;
        recorder.start_recording(session_id.clone(), sink)?;

        let metadata = VideoSessionMetadata {
            session_id: session_id.clone(),
            start_time: Utc::now(),
            width: settings.width,
            height: settings.height,
            format: settings.format,
            codec: settings.codec,
            frame_rate: settings.frame_rate,
            bit_rate: settings.bit_rate,
            raw_path: raw_path.clone(),
            total_video_frames: 0,
            delay_ms,
            generated_path: None,
        };
        self.session = Some(ActiveSession {
            metadata,
            stopping: None,
        });

        info!("Recording {} to {:?} (delay {} ms)", session_id, raw_path, delay_ms);
        self.events.publish(SessionEvent::RecordingStarted { session_id });
        Ok(raw_path)
    }

    async fn stop_recording(&mut self, discard: bool) -> Result<Option<CaptureSummary>, CaptureError> {
        let Some(session) = self.session.as_mut() else {
            debug!("Stop requested with no active recording");
            return Ok(None);
        };
        session.stopping = Some(discard);

        let report = match self.recorder.as_mut() {
            Some(recorder) => {
                recorder.stop();
                let waited = tokio::time::timeout(self.config.stop_timeout(), recorder.wait()).await;
                match waited {
                    Ok(report) => report,
                    Err(_) => {
                        // The loop is stuck in a read; its report is picked up
                        // by the service loop once the read returns.
                        warn!("Capture loop did not stop within {:?}", self.config.stop_timeout());
                        self.stream_tx.send_replace(None);
                        return Err(CaptureError::StopTimeout);
                    }
                }
            }
            None => None,
        };
        self.recorder = None;
        self.stream_tx.send_replace(None);

        match report {
            Some(report) => self.finish_session(report, discard),
            None => {
                let session = self.session.take();
                error!("Capture loop gone, recording {:?} lost", session.map(|s| s.metadata.session_id));
                Err(CaptureError::LoopExited)
            }
        }
    }

    /// Persist or discard the active session from the loop's final report
    fn finish_session(&mut self, report: CaptureReport, discard: bool) -> Result<Option<CaptureSummary>, CaptureError> {
        let Some(ActiveSession { mut metadata, .. }) = self.session.take() else {
            return Ok(None);
        };
        let session_id = metadata.session_id.clone();

        let recording = report
            .recording
            .filter(|recording| recording.session_id == session_id);
        let total_frames = recording.as_ref().map(|r| r.frames_written).unwrap_or(0);

        let summary = CaptureSummary {
            session_id: session_id.clone(),
            raw_path: metadata.raw_path.clone(),
            total_frames,
            discarded: discard,
            end: report.end,
        };

        if discard {
            self.backend.remove(&metadata.raw_path)?;
            info!("Recording {} discarded", session_id);
            self.events.publish(SessionEvent::RecordingDiscarded { session_id });
            return Ok(Some(summary));
        }

        metadata.total_video_frames = total_frames;
        if self.store.get_video_metadata(&session_id)?.is_some() {
            self.store.update_video_metadata(&metadata)?;
        } else {
            self.store.insert_video_metadata(&metadata)?;
        }
        // A session id recorded again must not keep the previous run's ticks
        let records = recording
            .as_ref()
            .map(|r| r.sync_map.to_records())
            .unwrap_or_default();
        self.store.replace_video_frame_sync_records(&session_id, &records)?;

        info!(
            "Recording {} finished: {} frames, {:?}",
            session_id, total_frames, summary.end
        );
        self.events.publish(SessionEvent::RecordingFinished {
            session_id,
            total_frames,
        });
        Ok(Some(summary))
    }
}

async fn next_source(connecting: &mut Option<ConnectFuture>) -> Option<Box<dyn StreamSource>> {
    match connecting.as_mut() {
        Some(connect) => connect.await,
        None => std::future::pending().await,
    }
}

async fn next_report(recorder: &mut Option<RecorderHandle>) -> Option<CaptureReport> {
    match recorder.as_mut() {
        Some(recorder) => recorder.wait().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use media_io::{MemoryBackend, MemoryStats};
    use std::sync::mpsc as std_mpsc;
    use storage::Repository;
    use tokio::sync::broadcast;

    struct Rig {
        backend: Arc<MemoryBackend>,
        store: Arc<Repository>,
        events: broadcast::Receiver<SessionEvent>,
        handle: CaptureHandle,
        _dir: tempfile::TempDir,
    }

    fn rig(preview: Option<mpsc::Sender<VideoFrame>>) -> (Rig, std_mpsc::Sender<VideoFrame>) {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::small());
        let feed = backend.push_live_stream();
        let store = Arc::new(Repository::new());
        let bus = EventBus::new(64);
        let events = bus.subscribe();

        let handle = CaptureService::spawn(
            backend.clone(),
            store.clone(),
            bus,
            "rtsp://cam/live",
            RecorderConfig::fast(dir.path()),
            preview,
        );
        (
            Rig {
                backend,
                store,
                events,
                handle,
                _dir: dir,
            },
            feed,
        )
    }

    async fn wait_for_stream(handle: &CaptureHandle) {
        let mut stream = handle.watch_stream();
        while stream.borrow_and_update().is_none() {
            stream.changed().await.unwrap();
        }
    }

    /// Feeds frames like a camera until the stream is dropped
    fn camera(backend: Arc<MemoryBackend>, feed: std_mpsc::Sender<VideoFrame>) -> std::thread::JoinHandle<()> {
        std::thread::spawn(move || {
            let mut sequence = 0;
            loop {
                sequence += 1;
                if feed.send(backend.frame(sequence)).is_err() {
                    break;
                }
                std::thread::sleep(Duration::from_millis(2));
                if sequence > 5_000 {
                    break;
                }
            }
        })
    }

    async fn next_event(events: &mut broadcast::Receiver<SessionEvent>, wanted: fn(&SessionEvent) -> bool) -> SessionEvent {
        loop {
            let event = events.recv().await.unwrap();
            if wanted(&event) {
                return event;
            }
        }
    }

    #[tokio::test]
    async fn test_recording_persists_metadata_and_sync_map() {
        let (mut rig, feed) = rig(None);
        wait_for_stream(&rig.handle).await;

        rig.handle.tick(5_000);
        let raw_path = rig.handle.start_recording("ride-7", 250).await.unwrap();
        assert!(raw_path.ends_with("ride-7_raw.mkv"));

        let camera = camera(rig.backend.clone(), feed);
        while rig.backend.file_frames(&raw_path).map(|f| f.len()).unwrap_or(0) < 5 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        rig.handle.tick(6_000);
        while rig.backend.file_frames(&raw_path).map(|f| f.len()).unwrap_or(0) < 10 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let summary = rig.handle.stop_recording(false).await.unwrap().unwrap();
        assert!(!summary.discarded);
        assert_eq!(summary.end, CaptureEnd::Stopped);

        let written = rig.backend.file_frames(&raw_path).unwrap().len() as u64;
        assert_eq!(summary.total_frames, written);

        let metadata = rig.store.get_video_metadata("ride-7").unwrap().unwrap();
        assert_eq!(metadata.total_video_frames, written);
        assert_eq!(metadata.delay_ms, 250);
        assert_eq!((metadata.width, metadata.height), (16, 8));
        assert_eq!(metadata.codec, "h264");

        let records = rig.store.get_frame_sync_records("ride-7").unwrap();
        assert_eq!(records.len() as u64, written);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.frame_number, i as u64 + 1);
        }
        assert_eq!(records[0].sync_timestamp_ms, 5_000);
        assert_eq!(records.last().unwrap().sync_timestamp_ms, 6_000);
        assert!(records.windows(2).all(|w| w[0].sync_timestamp_ms <= w[1].sync_timestamp_ms));

        let finished = next_event(&mut rig.events, |e| matches!(e, SessionEvent::RecordingFinished { .. })).await;
        assert_eq!(
            finished,
            SessionEvent::RecordingFinished {
                session_id: "ride-7".to_string(),
                total_frames: written,
            }
        );

        // Second stop is a no-op
        assert!(rig.handle.stop_recording(false).await.unwrap().is_none());
        let stats = rig.backend.stats();
        assert_eq!(MemoryStats::get(&stats.sinks_finished), 1);
        assert_eq!(MemoryStats::get(&stats.sources_released), 1);

        rig.handle.shutdown().await;
        camera.join().unwrap();
    }

    #[tokio::test]
    async fn test_discard_deletes_raw_file_and_skips_persistence() {
        let (mut rig, feed) = rig(None);
        wait_for_stream(&rig.handle).await;

        let raw_path = rig.handle.start_recording("ride-8", 0).await.unwrap();
        let camera = camera(rig.backend.clone(), feed);
        while rig.backend.file_frames(&raw_path).map(|f| f.len()).unwrap_or(0) < 3 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let summary = rig.handle.stop_recording(true).await.unwrap().unwrap();
        assert!(summary.discarded);
        assert!(rig.backend.file_frames(&raw_path).is_none());
        assert!(rig.store.get_video_metadata("ride-8").unwrap().is_none());
        assert!(rig.store.get_frame_sync_records("ride-8").unwrap().is_empty());

        let discarded = next_event(&mut rig.events, |e| {
            matches!(e, SessionEvent::RecordingDiscarded { .. } | SessionEvent::RecordingFinished { .. })
        })
        .await;
        assert_eq!(
            discarded,
            SessionEvent::RecordingDiscarded {
                session_id: "ride-8".to_string()
            }
        );

        rig.handle.shutdown().await;
        camera.join().unwrap();
    }

    #[tokio::test]
    async fn test_second_start_is_rejected() {
        let (rig, feed) = rig(None);
        wait_for_stream(&rig.handle).await;

        rig.handle.start_recording("a", 0).await.unwrap();
        assert!(matches!(
            rig.handle.start_recording("b", 0).await,
            Err(CaptureError::AlreadyRecording(id)) if id == "a"
        ));

        drop(feed);
        rig.handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_stream_end_finishes_recording_and_reconnects() {
        let (mut rig, feed) = rig(None);
        wait_for_stream(&rig.handle).await;
        let second_feed = rig.backend.push_live_stream();

        let raw_path = rig.handle.start_recording("ride-9", 0).await.unwrap();
        for sequence in 1..=4 {
            feed.send(rig.backend.frame(sequence)).unwrap();
        }
        while rig.backend.file_frames(&raw_path).map(|f| f.len()).unwrap_or(0) < 4 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        drop(feed);

        next_event(&mut rig.events, |e| matches!(e, SessionEvent::StreamLost)).await;
        next_event(&mut rig.events, |e| matches!(e, SessionEvent::RecordingFinished { .. })).await;
        let metadata = rig.store.get_video_metadata("ride-9").unwrap().unwrap();
        assert_eq!(metadata.total_video_frames, 4);

        next_event(&mut rig.events, |e| matches!(e, SessionEvent::StreamConnected { .. })).await;
        assert!(rig.handle.stop_recording(false).await.unwrap().is_none());

        drop(second_feed);
        rig.handle.shutdown().await;
    }

    async fn wait_for_frames(backend: &MemoryBackend, path: &std::path::Path, count: usize) {
        while backend.file_frames(path).map(|f| f.len()).unwrap_or(0) < count {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    #[tokio::test]
    async fn test_recording_again_replaces_sync_records() {
        let (rig, feed) = rig(None);
        wait_for_stream(&rig.handle).await;
        let second_feed = rig.backend.push_live_stream();

        rig.handle.tick(1_000);
        let raw_path = rig.handle.start_recording("ride-10", 0).await.unwrap();
        let first_camera = camera(rig.backend.clone(), feed);
        wait_for_frames(&rig.backend, &raw_path, 3).await;
        rig.handle.stop_recording(false).await.unwrap().unwrap();
        first_camera.join().unwrap();
        assert!(!rig.store.get_frame_sync_records("ride-10").unwrap().is_empty());

        wait_for_stream(&rig.handle).await;
        rig.handle.tick(9_000);
        let raw_path = rig.handle.start_recording("ride-10", 0).await.unwrap();
        let second_camera = camera(rig.backend.clone(), second_feed);
        wait_for_frames(&rig.backend, &raw_path, 2).await;
        let summary = rig.handle.stop_recording(false).await.unwrap().unwrap();

        let metadata = rig.store.get_video_metadata("ride-10").unwrap().unwrap();
        assert_eq!(metadata.total_video_frames, summary.total_frames);
        let records = rig.store.get_frame_sync_records("ride-10").unwrap();
        assert_eq!(records.len() as u64, summary.total_frames);
        assert!(records.iter().all(|r| r.sync_timestamp_ms == 9_000));

        rig.handle.shutdown().await;
        second_camera.join().unwrap();
    }

    #[tokio::test]
    async fn test_stalled_stream_keeps_recording_after_stop_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::small());
        let feed = backend.push_live_stream();
        let store = Arc::new(Repository::new());
        let bus = EventBus::new(64);
        let mut events = bus.subscribe();
        let config = RecorderConfig {
            stop_timeout_ms: 100,
            ..RecorderConfig::fast(dir.path())
        };
        let handle = CaptureService::spawn(backend.clone(), store.clone(), bus, "rtsp://cam/live", config, None);
        wait_for_stream(&handle).await;

        handle.tick(1_000);
        let raw_path = handle.start_recording("ride-11", 0).await.unwrap();
        for sequence in 1..=3 {
            feed.send(backend.frame(sequence)).unwrap();
        }
        wait_for_frames(&backend, &raw_path, 3).await;

        // Camera goes quiet with the connection still open
        assert!(matches!(
            handle.stop_recording(false).await,
            Err(CaptureError::StopTimeout)
        ));
        assert!(handle.stream().is_none());
        assert!(store.get_video_metadata("ride-11").unwrap().is_none());
        assert!(matches!(
            handle.start_recording("ride-12", 0).await,
            Err(CaptureError::AlreadyRecording(id)) if id == "ride-11"
        ));

        // The blocked read returns and the loop hands over its report
        drop(feed);
        let finished = next_event(&mut events, |e| matches!(e, SessionEvent::RecordingFinished { .. })).await;
        assert_eq!(
            finished,
            SessionEvent::RecordingFinished {
                session_id: "ride-11".to_string(),
                total_frames: 3,
            }
        );

        let metadata = store.get_video_metadata("ride-11").unwrap().unwrap();
        assert_eq!(metadata.total_video_frames, 3);
        let records = store.get_frame_sync_records("ride-11").unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.sync_timestamp_ms == 1_000));
        assert_eq!(backend.file_frames(&raw_path).unwrap().len(), 3);

        assert!(handle.stop_recording(false).await.unwrap().is_none());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_without_stream_fails() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::small());
        let handle = CaptureService::spawn(
            backend,
            Arc::new(Repository::new()),
            EventBus::new(8),
            "rtsp://cam/live",
            RecorderConfig::fast(dir.path()),
            None,
        );

        assert!(matches!(
            handle.start_recording("x", 0).await,
            Err(CaptureError::NotConnected)
        ));
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_preview_frames_flow_before_recording() {
        let (preview_tx, mut preview_rx) = mpsc::channel(8);
        let (rig, feed) = rig(Some(preview_tx));
        wait_for_stream(&rig.handle).await;

        feed.send(rig.backend.frame(1)).unwrap();
        let frame = preview_rx.recv().await.unwrap();
        assert_eq!(frame.sequence, 1);

        drop(feed);
        rig.handle.shutdown().await;
    }
}
