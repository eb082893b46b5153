//! In-memory media backend
//!
//! Streams are scripted frame lists handed out in order; sinks record into
//! an in-memory file table that `open_decoder` replays. Used for tests and
//! dry runs without a camera or ffmpeg.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex};

use crate::stream::{FrameSink, MediaBackend, SinkSettings, StreamProperties, StreamSource};
use crate::{MediaError, VideoFrame};

/// Handle counters, for asserting that every handle gets released once
#[derive(Debug, Default)]
pub struct MemoryStats {
    pub stream_attempts: AtomicU64,
    pub sources_opened: AtomicU64,
    pub sources_released: AtomicU64,
    pub sinks_opened: AtomicU64,
    pub sinks_finished: AtomicU64,
}

impl MemoryStats {
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
struct MemoryFile {
    settings: SinkSettings,
    frames: Vec<VideoFrame>,
}

type FileTable = Arc<Mutex<HashMap<PathBuf, MemoryFile>>>;

enum ScriptedStream {
    Frames(Vec<VideoFrame>),
    /// Frames pushed by the test; the stream ends when the sender is dropped
    Live(mpsc::Receiver<VideoFrame>),
}

fn lock_error<T>(e: std::sync::PoisonError<T>) -> MediaError {
    MediaError::Open(format!("Lock error: {}", e))
}

/// In-memory backend
pub struct MemoryBackend {
    props: StreamProperties,
    streams: Mutex<VecDeque<ScriptedStream>>,
    files: FileTable,
    fail_write_after: Option<u64>,
    fail_decode_after: Option<u64>,
    stats: Arc<MemoryStats>,
}

impl MemoryBackend {
    /// Backend whose streams report `props`
    pub fn new(props: StreamProperties) -> Self {
        Self {
            props,
            streams: Mutex::new(VecDeque::new()),
            files: Arc::new(Mutex::new(HashMap::new())),
            fail_write_after: None,
            fail_decode_after: None,
            stats: Arc::new(MemoryStats::default()),
        }
    }

    /// Small 16x8 @ 30fps backend
    pub fn small() -> Self {
        Self::new(StreamProperties {
            width: 16,
            height: 8,
            format: "rtsp".to_string(),
            codec: "h264".to_string(),
            frame_rate: 30.0,
            bit_rate: 1_000_000,
        })
    }

    /// Sinks fail on the write after `frames` successful ones
    pub fn with_write_failure_after(mut self, frames: u64) -> Self {
        self.fail_write_after = Some(frames);
        self
    }

    /// Decoders fail on the read after `frames` successful ones
    pub fn with_decode_failure_after(mut self, frames: u64) -> Self {
        self.fail_decode_after = Some(frames);
        self
    }

    /// Queue one stream connection delivering `count` frames then ending
    pub fn push_stream(&self, count: usize) {
        let frames = (0..count)
            .map(|i| self.frame(i as u64 + 1))
            .collect();
        self.push_stream_frames(frames);
    }

    /// Queue one stream connection delivering exactly `frames`
    pub fn push_stream_frames(&self, frames: Vec<VideoFrame>) {
        if let Ok(mut streams) = self.streams.lock() {
            streams.push_back(ScriptedStream::Frames(frames));
        }
    }

    /// Queue one live stream connection. Pulls block until a frame is sent;
    /// dropping the sender ends the stream.
    pub fn push_live_stream(&self) -> mpsc::Sender<VideoFrame> {
        let (tx, rx) = mpsc::channel();
        if let Ok(mut streams) = self.streams.lock() {
            streams.push_back(ScriptedStream::Live(rx));
        }
        tx
    }

    /// A frame matching this backend's stream size
    pub fn frame(&self, sequence: u64) -> VideoFrame {
        VideoFrame::solid(self.props.width, self.props.height, [0, 0, 0], sequence)
    }

    /// Store a recording directly, as if a sink had written it
    pub fn insert_file(&self, path: impl Into<PathBuf>, frames: Vec<VideoFrame>) {
        let settings = SinkSettings::matching(&self.props);
        if let Ok(mut files) = self.files.lock() {
            files.insert(path.into(), MemoryFile { settings, frames });
        }
    }

    /// Frames recorded at `path`
    pub fn file_frames(&self, path: &Path) -> Option<Vec<VideoFrame>> {
        self.files.lock().ok()?.get(path).map(|f| f.frames.clone())
    }

    pub fn stats(&self) -> Arc<MemoryStats> {
        self.stats.clone()
    }

    pub fn properties(&self) -> &StreamProperties {
        &self.props
    }
}

impl MediaBackend for MemoryBackend {
    fn open_stream(&self, url: &str) -> Result<Box<dyn StreamSource>, MediaError> {
        self.stats.stream_attempts.fetch_add(1, Ordering::SeqCst);
        let stream = self
            .streams
            .lock()
            .map_err(lock_error)?
            .pop_front()
            .ok_or_else(|| MediaError::Open(format!("{} unreachable", url)))?;

        let (frames, live) = match stream {
            ScriptedStream::Frames(frames) => (frames.into(), None),
            ScriptedStream::Live(rx) => (VecDeque::new(), Some(rx)),
        };

        self.stats.sources_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySource {
            frames,
            live,
            props: self.props.clone(),
            connected: true,
            fail_after: None,
            read: 0,
            released: false,
            stats: self.stats.clone(),
        }))
    }

    fn open_sink(&self, path: &Path, settings: &SinkSettings) -> Result<Box<dyn FrameSink>, MediaError> {
        self.files.lock().map_err(lock_error)?.insert(
            path.to_path_buf(),
            MemoryFile {
                settings: settings.clone(),
                frames: Vec::new(),
            },
        );

        self.stats.sinks_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySink {
            path: path.to_path_buf(),
            files: self.files.clone(),
            frame_size: VideoFrame::byte_len(settings.width, settings.height),
            written: 0,
            fail_after: self.fail_write_after,
            finished: false,
            stats: self.stats.clone(),
        }))
    }

    fn open_decoder(&self, path: &Path) -> Result<Box<dyn StreamSource>, MediaError> {
        let file = self
            .files
            .lock()
            .map_err(lock_error)?
            .get(path)
            .cloned()
            .ok_or_else(|| MediaError::Open(format!("{:?} not found", path)))?;

        self.stats.sources_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySource {
            frames: file.frames.into(),
            live: None,
            props: StreamProperties {
                width: file.settings.width,
                height: file.settings.height,
                format: file.settings.format,
                codec: file.settings.codec,
                frame_rate: file.settings.frame_rate,
                bit_rate: file.settings.bit_rate,
            },
            connected: true,
            fail_after: self.fail_decode_after,
            read: 0,
            released: false,
            stats: self.stats.clone(),
        }))
    }

    fn remove(&self, path: &Path) -> Result<(), MediaError> {
        self.files.lock().map_err(lock_error)?.remove(path);
        Ok(())
    }
}

/// Scripted frame source
pub struct MemorySource {
    frames: VecDeque<VideoFrame>,
    live: Option<mpsc::Receiver<VideoFrame>>,
    props: StreamProperties,
    connected: bool,
    fail_after: Option<u64>,
    read: u64,
    released: bool,
    stats: Arc<MemoryStats>,
}

impl StreamSource for MemorySource {
    fn properties(&self) -> &StreamProperties {
        &self.props
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn next_frame(&mut self) -> Result<Option<VideoFrame>, MediaError> {
        if !self.connected {
            return Ok(None);
        }
        if self.fail_after == Some(self.read) {
            return Err(MediaError::Decode(format!("Corrupt frame {}", self.read + 1)));
        }
        let next = match &self.live {
            Some(rx) => rx.recv().ok(),
            None => self.frames.pop_front(),
        };
        match next {
            Some(frame) => {
                self.read += 1;
                Ok(Some(frame))
            }
            None => {
                self.connected = false;
                Ok(None)
            }
        }
    }

    fn stop(&mut self) {
        self.connected = false;
        if !self.released {
            self.released = true;
            self.frames.clear();
            self.live = None;
            self.stats.sources_released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Sink recording into the backend's file table
pub struct MemorySink {
    path: PathBuf,
    files: FileTable,
    frame_size: usize,
    written: u64,
    fail_after: Option<u64>,
    finished: bool,
    stats: Arc<MemoryStats>,
}

impl FrameSink for MemorySink {
    fn write(&mut self, frame: &VideoFrame) -> Result<(), MediaError> {
        if self.finished {
            return Err(MediaError::Released);
        }
        if self.fail_after == Some(self.written) {
            return Err(MediaError::Encode("Disk full".to_string()));
        }
        if frame.data.len() != self.frame_size {
            return Err(MediaError::FrameSize {
                expected: self.frame_size,
                actual: frame.data.len(),
            });
        }

        let mut files = self.files.lock().map_err(lock_error)?;
        let file = files
            .get_mut(&self.path)
            .ok_or_else(|| MediaError::Encode(format!("{:?} was removed", self.path)))?;
        file.frames.push(frame.clone());
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), MediaError> {
        if !self.finished {
            self.finished = true;
            self.stats.sinks_finished.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.written
    }
}
