//! Blocking capture loop
//!
//! One dedicated thread owns the source and, while a session records, the
//! sink and the sync map builder. The async side only flips the capture
//! flag, queues commands and waits for the final report.

use media_io::{FrameSink, StreamProperties, StreamSource, VideoFrame};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::sync_map::{SyncMap, SyncMapBuilder};
use crate::CaptureError;

/// Why the capture loop exited
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEnd {
    /// Capture flag cleared
    Stopped,
    /// Source reported end of stream or lost its connection
    EndOfStream,
    WriteFailed(String),
    ReadFailed(String),
}

/// Result of the session that was recording when the loop exited
#[derive(Debug, Clone)]
pub struct RecordingReport {
    pub session_id: String,
    pub sync_map: SyncMap,
    pub frames_written: u64,
}

/// Handed over once the loop has released its sink and source
#[derive(Debug, Clone)]
pub struct CaptureReport {
    pub properties: StreamProperties,
    pub recording: Option<RecordingReport>,
    pub end: CaptureEnd,
}

enum LoopCommand {
    StartRecording {
        session_id: String,
        sink: Box<dyn FrameSink>,
    },
}

struct ActiveRecording {
    session_id: String,
    sink: Box<dyn FrameSink>,
    builder: SyncMapBuilder,
}

/// Pulls frames from a started source, writes them while recording and
/// maps every written frame to the telemetry tick current at pull time.
pub struct FrameSyncRecorder {
    source: Box<dyn StreamSource>,
    ticks: watch::Receiver<i64>,
    preview: Option<(mpsc::Sender<VideoFrame>, u64)>,
    recording: Option<(String, Box<dyn FrameSink>)>,
}

impl FrameSyncRecorder {
    pub fn new(source: Box<dyn StreamSource>, ticks: watch::Receiver<i64>) -> Self {
        Self {
            source,
            ticks,
            preview: None,
            recording: None,
        }
    }

    /// Forward every `every`-th frame to `tx` while not recording
    pub fn with_preview(mut self, tx: mpsc::Sender<VideoFrame>, every: u64) -> Self {
        self.preview = Some((tx, every.max(1)));
        self
    }

    /// Record from the first pulled frame
    pub fn recording_from_start(mut self, session_id: impl Into<String>, sink: Box<dyn FrameSink>) -> Self {
        self.recording = Some((session_id.into(), sink));
        self
    }

    /// Spawn the capture thread
    pub fn start(self) -> RecorderHandle {
        let properties = self.source.properties().clone();
        let capturing = Arc::new(AtomicBool::new(true));
        let (command_tx, command_rx) = std_mpsc::channel();
        let (report_tx, report_rx) = oneshot::channel();

        let flag = capturing.clone();
        std::thread::spawn(move || {
            let report = self.run(&flag, command_rx);
            flag.store(false, Ordering::SeqCst);
            if report_tx.send(report).is_err() {
                debug!("Capture report receiver dropped");
            }
        });

        RecorderHandle {
            properties,
            capturing,
            commands: command_tx,
            report: Some(report_rx),
        }
    }

    fn run(self, capturing: &AtomicBool, commands: std_mpsc::Receiver<LoopCommand>) -> CaptureReport {
        let Self {
            mut source,
            ticks,
            preview,
            recording,
        } = self;
        let properties = source.properties().clone();

        let mut active = recording.map(|(session_id, sink)| ActiveRecording {
            builder: SyncMapBuilder::new(session_id.clone()),
            session_id,
            sink,
        });
        let mut pulled: u64 = 0;

        let end = loop {
            if !capturing.load(Ordering::SeqCst) {
                break CaptureEnd::Stopped;
            }
            if !source.is_connected() {
                break CaptureEnd::EndOfStream;
            }

            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break CaptureEnd::EndOfStream,
                Err(e) => {
                    error!("Stream read failed: {}", e);
                    break CaptureEnd::ReadFailed(e.to_string());
                }
            };
            // Telemetry time at the moment the frame arrived
            let tick = *ticks.borrow();
            pulled += 1;

            while let Ok(command) = commands.try_recv() {
                match command {
                    LoopCommand::StartRecording { session_id, mut sink } => match &active {
                        Some(current) => {
                            warn!(
                                "Ignoring recording request for {}, {} is recording",
                                session_id, current.session_id
                            );
                            if let Err(e) = sink.finish() {
                                warn!("Failed to release rejected sink for {}: {}", session_id, e);
                            }
                        }
                        None => {
                            info!("Recording session {}", session_id);
                            active = Some(ActiveRecording {
                                builder: SyncMapBuilder::new(session_id.clone()),
                                session_id,
                                sink,
                            });
                        }
                    },
                }
            }

            match active.as_mut() {
                Some(recording) => {
                    if let Err(e) = recording.sink.write(&frame) {
                        error!("Write failed for session {}: {}", recording.session_id, e);
                        break CaptureEnd::WriteFailed(e.to_string());
                    }
                    recording.builder.record(tick);
                    metrics::counter!("frames_captured_total").increment(1);
                }
                None => {
                    if let Some((tx, every)) = &preview {
                        if pulled % every == 0 {
                            let _ = tx.try_send(frame);
                        }
                    }
                }
            }
        };

        // Sink before source
        let recording = active.map(|mut recording| {
            if let Err(e) = recording.sink.finish() {
                warn!("Failed to finalise recording {}: {}", recording.session_id, e);
            }
            RecordingReport {
                frames_written: recording.sink.frames_written(),
                sync_map: recording.builder.finish(),
                session_id: recording.session_id,
            }
        });
        source.stop();

        info!("Capture loop exited: {:?}", end);
        CaptureReport {
            properties,
            recording,
            end,
        }
    }
}

/// Async side of a running capture loop
pub struct RecorderHandle {
    properties: StreamProperties,
    capturing: Arc<AtomicBool>,
    commands: std_mpsc::Sender<LoopCommand>,
    report: Option<oneshot::Receiver<CaptureReport>>,
}

impl RecorderHandle {
    pub fn properties(&self) -> &StreamProperties {
        &self.properties
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    /// Start writing frames to `sink` from the next pulled frame on
    pub fn start_recording(&self, session_id: impl Into<String>, sink: Box<dyn FrameSink>) -> Result<(), CaptureError> {
        if !self.is_capturing() {
            return Err(CaptureError::LoopExited);
        }
        self.commands
            .send(LoopCommand::StartRecording {
                session_id: session_id.into(),
                sink,
            })
            .map_err(|_| CaptureError::LoopExited)
    }

    /// Ask the loop to exit after the current frame
    pub fn stop(&self) {
        self.capturing.store(false, Ordering::SeqCst);
    }

    /// Wait for the loop's report. Cancel safe; `None` once the report has
    /// been taken or if the loop thread died.
    pub async fn wait(&mut self) -> Option<CaptureReport> {
        let rx = self.report.as_mut()?;
        let report = rx.await.ok();
        self.report = None;
        report
    }
}

impl Drop for RecorderHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use media_io::{MediaBackend, MediaError, MemoryBackend, MemoryStats, SinkSettings};
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;

    /// Advances the telemetry clock just before handing out each frame
    struct TickingSource {
        props: StreamProperties,
        ticks: Vec<i64>,
        next: usize,
        clock: watch::Sender<i64>,
        stops: Arc<AtomicUsize>,
        connected: bool,
    }

    impl StreamSource for TickingSource {
        fn properties(&self) -> &StreamProperties {
            &self.props
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn next_frame(&mut self) -> Result<Option<VideoFrame>, MediaError> {
            let Some(tick) = self.ticks.get(self.next).copied() else {
                self.connected = false;
                return Ok(None);
            };
            self.next += 1;
            self.clock.send_replace(tick);
            Ok(Some(VideoFrame::solid(self.props.width, self.props.height, [9, 9, 9], self.next as u64)))
        }

        fn stop(&mut self) {
            self.connected = false;
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn sink(backend: &MemoryBackend, path: &str) -> Box<dyn FrameSink> {
        backend
            .open_sink(Path::new(path), &SinkSettings::matching(backend.properties()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_each_frame_gets_tick_at_pull_time() {
        let backend = MemoryBackend::small();
        let (clock, ticks) = watch::channel(0);
        let stops = Arc::new(AtomicUsize::new(0));
        let source = TickingSource {
            props: backend.properties().clone(),
            ticks: vec![1000, 1000, 1033, 1066, 1066],
            next: 0,
            clock,
            stops: stops.clone(),
            connected: true,
        };

        let mut handle = FrameSyncRecorder::new(Box::new(source), ticks)
            .recording_from_start("ride-1", sink(&backend, "/raw/ride-1_raw.mkv"))
            .start();
        let report = handle.wait().await.unwrap();

        assert_eq!(report.end, CaptureEnd::EndOfStream);
        let recording = report.recording.unwrap();
        assert_eq!(recording.frames_written, 5);
        assert_eq!(recording.sync_map.len(), 5);
        assert_eq!(recording.sync_map.get(1), Some(1000));
        assert_eq!(recording.sync_map.get(2), Some(1000));
        assert_eq!(recording.sync_map.get(3), Some(1033));
        assert_eq!(recording.sync_map.get(5), Some(1066));

        let written = backend.file_frames(Path::new("/raw/ride-1_raw.mkv")).unwrap();
        assert_eq!(written.len(), 5);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert!(handle.wait().await.is_none());
    }

    #[tokio::test]
    async fn test_write_failure_releases_everything() {
        let backend = MemoryBackend::small().with_write_failure_after(3);
        backend.push_stream(10);
        let source = backend.open_stream("rtsp://cam/live").unwrap();
        let (_clock, ticks) = watch::channel(42);

        let mut handle = FrameSyncRecorder::new(source, ticks)
            .recording_from_start("ride-2", sink(&backend, "/raw/ride-2_raw.mkv"))
            .start();
        let report = handle.wait().await.unwrap();

        assert!(matches!(report.end, CaptureEnd::WriteFailed(_)));
        let recording = report.recording.unwrap();
        assert_eq!(recording.frames_written, 3);
        assert_eq!(recording.sync_map.len(), 3);

        let stats = backend.stats();
        assert_eq!(MemoryStats::get(&stats.sinks_finished), 1);
        assert_eq!(MemoryStats::get(&stats.sources_released), 1);
    }

    #[tokio::test]
    async fn test_preview_while_not_recording() {
        let backend = MemoryBackend::small();
        backend.push_stream(6);
        let source = backend.open_stream("rtsp://cam/live").unwrap();
        let (_clock, ticks) = watch::channel(0);
        let (preview_tx, mut preview_rx) = mpsc::channel(16);

        let mut handle = FrameSyncRecorder::new(source, ticks)
            .with_preview(preview_tx, 2)
            .start();
        let report = handle.wait().await.unwrap();
        assert!(report.recording.is_none());

        let mut sequences = Vec::new();
        while let Ok(frame) = preview_rx.try_recv() {
            sequences.push(frame.sequence);
        }
        assert_eq!(sequences, vec![2, 4, 6]);
    }

    #[tokio::test]
    async fn test_rejected_start_releases_its_sink() {
        let backend = MemoryBackend::small();
        let feed = backend.push_live_stream();
        let source = backend.open_stream("rtsp://cam/live").unwrap();
        let (_clock, ticks) = watch::channel(0);

        let mut handle = FrameSyncRecorder::new(source, ticks)
            .recording_from_start("a", sink(&backend, "/raw/a_raw.mkv"))
            .start();
        handle.start_recording("b", sink(&backend, "/raw/b_raw.mkv")).unwrap();
        feed.send(backend.frame(1)).unwrap();

        let written = Path::new("/raw/a_raw.mkv");
        while backend.file_frames(written).map(|f| f.len()).unwrap_or(0) < 1 {
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        handle.stop();
        let _ = feed.send(backend.frame(2));

        let report = handle.wait().await.unwrap();
        assert_eq!(report.recording.unwrap().session_id, "a");
        assert_eq!(backend.file_frames(Path::new("/raw/b_raw.mkv")).unwrap().len(), 0);
        assert_eq!(MemoryStats::get(&backend.stats().sinks_finished), 2);
    }

    #[tokio::test]
    async fn test_stop_exits_after_current_frame() {
        let backend = MemoryBackend::small();
        let feed = backend.push_live_stream();
        let source = backend.open_stream("rtsp://cam/live").unwrap();
        let (_clock, ticks) = watch::channel(0);

        let mut handle = FrameSyncRecorder::new(source, ticks).start();
        handle.stop();
        // Unblocks a pull that may already be waiting
        let _ = feed.send(backend.frame(1));

        let report = handle.wait().await.unwrap();
        assert_eq!(report.end, CaptureEnd::Stopped);
        assert!(!handle.is_capturing());
        assert!(matches!(
            handle.start_recording("late", sink(&backend, "/raw/late_raw.mkv")),
            Err(CaptureError::LoopExited)
        ));
    }
}
