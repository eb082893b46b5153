//! Media I/O for Ride Video Recording
//!
//! Provides the frame type and the media collaborators used by the
//! capture and composition pipelines:
//! - Pull-based network stream sources (RTSP/HTTP action cameras)
//! - Frame sinks that encode into a matroska/H.264 container
//! - Raw-file decoders that replay a finished recording frame by frame
//!
//! The production backend drives `ffmpeg`/`ffprobe` subprocesses; an
//! in-memory backend is provided for tests and dry runs.

pub mod endpoint;
pub mod ffmpeg;
pub mod frame;
pub mod memory;
pub mod stream;

pub use endpoint::StreamEndpoint;
pub use ffmpeg::{FfmpegBackend, FfmpegConfig};
pub use frame::VideoFrame;
pub use memory::{MemoryBackend, MemoryStats};
pub use stream::{FrameSink, MediaBackend, SinkSettings, StreamProperties, StreamSource};

use thiserror::Error;

/// Media error types
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Failed to open stream: {0}")]
    Open(String),

    #[error("Probe failed: {0}")]
    Probe(String),

    #[error("Decoding error: {0}")]
    Decode(String),

    #[error("Encoding error: {0}")]
    Encode(String),

    #[error("Frame size mismatch: expected {expected} bytes, got {actual}")]
    FrameSize { expected: usize, actual: usize },

    #[error("Sink already released")]
    Released,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
