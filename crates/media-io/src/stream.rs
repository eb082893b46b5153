//! Media collaborator traits
//!
//! A `StreamSource` yields frames with a blocking pull; a `FrameSink`
//! accepts frames and finalises a container file. `MediaBackend` opens
//! both, for live streams as well as for replaying a raw recording.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{MediaError, VideoFrame};

/// Properties reported by an opened stream or file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamProperties {
    pub width: u32,
    pub height: u32,
    /// Container format name (e.g. "rtsp", "matroska")
    pub format: String,
    /// Codec name (e.g. "h264")
    pub codec: String,
    /// Frames per second
    pub frame_rate: f64,
    /// Bits per second (0 when unknown)
    pub bit_rate: u64,
}

/// Encoder configuration for a sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkSettings {
    pub width: u32,
    pub height: u32,
    pub codec: String,
    pub format: String,
    pub frame_rate: f64,
    pub bit_rate: u64,
}

impl SinkSettings {
    /// Output codec for every recording
    pub const CODEC: &'static str = "h264";
    /// Output container for every recording
    pub const FORMAT: &'static str = "matroska";

    /// Sink matching a source's resolution, frame rate and bitrate
    pub fn matching(props: &StreamProperties) -> Self {
        Self {
            width: props.width,
            height: props.height,
            codec: Self::CODEC.to_string(),
            format: Self::FORMAT.to_string(),
            frame_rate: props.frame_rate,
            bit_rate: props.bit_rate,
        }
    }
}

/// A started, pull-based frame source
pub trait StreamSource: Send {
    /// Properties negotiated when the source was opened
    fn properties(&self) -> &StreamProperties;

    /// Whether the source still delivers frames
    fn is_connected(&self) -> bool;

    /// Blocking pull of the next frame. `Ok(None)` means end of stream.
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, MediaError>;

    /// Stop the source and release its handles. Calling it again is a no-op.
    fn stop(&mut self);
}

/// A started frame writer
pub trait FrameSink: Send {
    /// Append one frame
    fn write(&mut self, frame: &VideoFrame) -> Result<(), MediaError>;

    /// Flush and close the container. Calling it again is a no-op.
    fn finish(&mut self) -> Result<(), MediaError>;

    /// Frames accepted so far
    fn frames_written(&self) -> u64;
}

/// Factory for media handles
pub trait MediaBackend: Send + Sync {
    /// Open a live stream by URL
    fn open_stream(&self, url: &str) -> Result<Box<dyn StreamSource>, MediaError>;

    /// Open a sink writing to `path`
    fn open_sink(&self, path: &Path, settings: &SinkSettings) -> Result<Box<dyn FrameSink>, MediaError>;

    /// Open a finished recording for frame-by-frame decoding
    fn open_decoder(&self, path: &Path) -> Result<Box<dyn StreamSource>, MediaError>;

    /// Delete a recording. Missing files are not an error.
    fn remove(&self, path: &Path) -> Result<(), MediaError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_matches_source_but_forces_container() {
        let props = StreamProperties {
            width: 1280,
            height: 720,
            format: "rtsp".to_string(),
            codec: "hevc".to_string(),
            frame_rate: 29.97,
            bit_rate: 4_000_000,
        };

        let sink = SinkSettings::matching(&props);
        assert_eq!((sink.width, sink.height), (1280, 720));
        assert_eq!(sink.codec, "h264");
        assert_eq!(sink.format, "matroska");
        assert_eq!(sink.bit_rate, 4_000_000);
    }
}
