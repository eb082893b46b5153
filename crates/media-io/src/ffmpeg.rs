//! FFmpeg subprocess backend
//!
//! Sources run `ffmpeg ... -f rawvideo -pix_fmt rgb24 -` and read whole
//! frames from stdout. Sinks pipe raw RGB frames into an `ffmpeg` encoder
//! writing matroska/H.264. Stream properties come from `ffprobe`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{BufReader, ErrorKind, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tracing::{debug, info, warn};

use crate::stream::{FrameSink, MediaBackend, SinkSettings, StreamProperties, StreamSource};
use crate::{MediaError, VideoFrame};

/// FFmpeg backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FfmpegConfig {
    /// Path to the ffmpeg binary
    pub ffmpeg_bin: String,
    /// Path to the ffprobe binary
    pub ffprobe_bin: String,
    /// Network connect/read timeout (ms)
    pub network_timeout_ms: u64,
    /// x264 preset used by sinks
    pub preset: String,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            network_timeout_ms: 5000,
            preset: "veryfast".to_string(),
        }
    }
}

impl FfmpegConfig {
    /// Input options for a network URL (TCP transport plus timeouts)
    fn network_input_args(&self, url: &str) -> Vec<String> {
        let timeout_us = (self.network_timeout_ms * 1000).to_string();
        if url.starts_with("rtsp") {
            vec![
                "-rtsp_transport".to_string(),
                "tcp".to_string(),
                "-timeout".to_string(),
                timeout_us,
            ]
        } else {
            vec!["-rw_timeout".to_string(), timeout_us]
        }
    }
}

/// Media backend spawning ffmpeg/ffprobe processes
#[derive(Debug, Clone, Default)]
pub struct FfmpegBackend {
    config: FfmpegConfig,
}

impl FfmpegBackend {
    pub fn new(config: FfmpegConfig) -> Self {
        Self { config }
    }

    fn probe(&self, input_args: &[String], input: &str) -> Result<StreamProperties, MediaError> {
        let output = Command::new(&self.config.ffprobe_bin)
            .args(["-v", "error"])
            .args(input_args)
            .args([
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height,codec_name,r_frame_rate,bit_rate:format=format_name,bit_rate",
                "-of",
                "default=noprint_wrappers=1",
                input,
            ])
            .output()
            .map_err(|e| MediaError::Probe(format!("Failed to run ffprobe: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::Probe(format!("ffprobe failed: {}", stderr.trim())));
        }

        parse_probe_output(&String::from_utf8_lossy(&output.stdout))
    }

    fn spawn_source(
        &self,
        input_args: Vec<String>,
        input: &str,
        props: StreamProperties,
    ) -> Result<FfmpegSource, MediaError> {
        let size = format!("{}x{}", props.width, props.height);
        let mut process = Command::new(&self.config.ffmpeg_bin)
            .args(["-hide_banner", "-loglevel", "error"])
            .args(&input_args)
            .args(["-i", input, "-an", "-f", "rawvideo", "-pix_fmt", "rgb24", "-s", &size, "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| MediaError::Open(format!("Failed to start ffmpeg decoder: {}", e)))?;

        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| MediaError::Open("Failed to capture ffmpeg stdout".to_string()))?;

        let frame_size = VideoFrame::byte_len(props.width, props.height);
        info!(
            "Opened {} ({}x{} {} @ {:.2}fps)",
            input, props.width, props.height, props.codec, props.frame_rate
        );

        Ok(FfmpegSource {
            process: Some(process),
            stdout: BufReader::with_capacity(frame_size * 2, stdout),
            frame_size,
            frames_read: 0,
            connected: true,
            props,
        })
    }
}

impl MediaBackend for FfmpegBackend {
    fn open_stream(&self, url: &str) -> Result<Box<dyn StreamSource>, MediaError> {
        let input_args = self.config.network_input_args(url);
        let props = self.probe(&input_args, url)?;
        Ok(Box::new(self.spawn_source(input_args, url, props)?))
    }

    fn open_sink(&self, path: &Path, settings: &SinkSettings) -> Result<Box<dyn FrameSink>, MediaError> {
        Ok(Box::new(FfmpegSink::spawn(&self.config, path, settings)?))
    }

    fn open_decoder(&self, path: &Path) -> Result<Box<dyn StreamSource>, MediaError> {
        let input = path.to_string_lossy();
        let props = self.probe(&[], &input)?;
        Ok(Box::new(self.spawn_source(Vec::new(), &input, props)?))
    }

    fn remove(&self, path: &Path) -> Result<(), MediaError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Parse `key=value` lines produced by ffprobe
pub fn parse_probe_output(output: &str) -> Result<StreamProperties, MediaError> {
    let fields: HashMap<&str, &str> = output
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim(), v.trim()))
        .collect();

    let dimension = |key: &str| -> Result<u32, MediaError> {
        fields
            .get(key)
            .and_then(|v| v.parse().ok())
            .filter(|&v: &u32| v > 0)
            .ok_or_else(|| MediaError::Probe(format!("Missing or invalid {}", key)))
    };

    let width = dimension("width")?;
    let height = dimension("height")?;

    // "30/1" or "30000/1001"
    let frame_rate = fields
        .get("r_frame_rate")
        .and_then(|v| match v.split_once('/') {
            Some((num, den)) => {
                let num: f64 = num.parse().ok()?;
                let den: f64 = den.parse().ok()?;
                (den > 0.0).then(|| num / den)
            }
            None => v.parse().ok(),
        })
        .filter(|fps| *fps > 0.0)
        .unwrap_or(30.0);

    // Stream bitrate first, container bitrate as fallback; both appear under the same key.
    let bit_rate = output
        .lines()
        .filter_map(|line| line.strip_prefix("bit_rate="))
        .find_map(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(0);

    let format = fields
        .get("format_name")
        .and_then(|v| v.split(',').next())
        .unwrap_or("unknown")
        .to_string();

    let codec = fields.get("codec_name").copied().unwrap_or("unknown").to_string();

    Ok(StreamProperties {
        width,
        height,
        format,
        codec,
        frame_rate,
        bit_rate,
    })
}

/// Frame source reading raw RGB frames from an ffmpeg process
pub struct FfmpegSource {
    process: Option<Child>,
    stdout: BufReader<ChildStdout>,
    frame_size: usize,
    frames_read: u64,
    connected: bool,
    props: StreamProperties,
}

impl StreamSource for FfmpegSource {
    fn properties(&self) -> &StreamProperties {
        &self.props
    }

    fn is_connected(&self) -> bool {
        self.connected && self.process.is_some()
    }

    fn next_frame(&mut self) -> Result<Option<VideoFrame>, MediaError> {
        if !self.is_connected() {
            return Ok(None);
        }

        let mut buffer = vec![0u8; self.frame_size];
        match self.stdout.read_exact(&mut buffer) {
            Ok(()) => {
                let timestamp_ns = (self.frames_read as f64 * 1e9 / self.props.frame_rate) as u64;
                self.frames_read += 1;
                Ok(Some(VideoFrame::new(
                    buffer,
                    self.props.width,
                    self.props.height,
                    timestamp_ns,
                    self.frames_read,
                )))
            }
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                debug!("End of stream after {} frames", self.frames_read);
                self.connected = false;
                Ok(None)
            }
            Err(e) => {
                self.connected = false;
                Err(MediaError::Decode(format!("Failed to read frame: {}", e)))
            }
        }
    }

    fn stop(&mut self) {
        self.connected = false;
        if let Some(mut process) = self.process.take() {
            let _ = process.kill();
            let _ = process.wait();
            debug!("Decoder process released after {} frames", self.frames_read);
        }
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Frame sink piping raw RGB frames into an ffmpeg encoder
pub struct FfmpegSink {
    process: Option<Child>,
    stdin: Option<ChildStdin>,
    frame_size: usize,
    frames_written: u64,
}

impl FfmpegSink {
    fn spawn(config: &FfmpegConfig, path: &Path, settings: &SinkSettings) -> Result<Self, MediaError> {
        let encoder = match settings.codec.as_str() {
            "h264" | "libx264" => "libx264",
            other => other,
        };

        let mut args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-y".to_string(),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgb24".to_string(),
            "-s".to_string(),
            format!("{}x{}", settings.width, settings.height),
            "-r".to_string(),
            settings.frame_rate.to_string(),
            "-i".to_string(),
            "-".to_string(),
            "-c:v".to_string(),
            encoder.to_string(),
            "-preset".to_string(),
            config.preset.clone(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
        ];
        if settings.bit_rate > 0 {
            args.extend(["-b:v".to_string(), settings.bit_rate.to_string()]);
        }
        args.extend(["-f".to_string(), settings.format.clone()]);
        args.push(path.to_string_lossy().into_owned());

        let mut process = Command::new(&config.ffmpeg_bin)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| MediaError::Encode(format!("Failed to start ffmpeg encoder: {}", e)))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| MediaError::Encode("Failed to capture ffmpeg stdin".to_string()))?;

        info!(
            "Encoding {}x{} @ {:.2}fps to {:?}",
            settings.width, settings.height, settings.frame_rate, path
        );

        Ok(Self {
            process: Some(process),
            stdin: Some(stdin),
            frame_size: VideoFrame::byte_len(settings.width, settings.height),
            frames_written: 0,
        })
    }
}

impl FrameSink for FfmpegSink {
    fn write(&mut self, frame: &VideoFrame) -> Result<(), MediaError> {
        if frame.data.len() != self.frame_size {
            return Err(MediaError::FrameSize {
                expected: self.frame_size,
                actual: frame.data.len(),
            });
        }
        let stdin = self.stdin.as_mut().ok_or(MediaError::Released)?;
        stdin
            .write_all(&frame.data)
            .map_err(|e| MediaError::Encode(format!("Failed to write frame: {}", e)))?;
        self.frames_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), MediaError> {
        // Closing stdin lets ffmpeg flush and write the container trailer.
        drop(self.stdin.take());

        let Some(mut process) = self.process.take() else {
            return Ok(());
        };
        let status = process.wait()?;
        if !status.success() {
            return Err(MediaError::Encode(format!("ffmpeg exited with {}", status)));
        }
        debug!("Encoder finished after {} frames", self.frames_written);
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if let Some(mut process) = self.process.take() {
            warn!("Encoder dropped without finish, killing process");
            drop(self.stdin.take());
            let _ = process.kill();
            let _ = process.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_output() {
        let output = "codec_name=h264\nwidth=1920\nheight=1080\nr_frame_rate=30000/1001\nbit_rate=8000000\nformat_name=matroska,webm\nbit_rate=8100000\n";
        let props = parse_probe_output(output).unwrap();

        assert_eq!((props.width, props.height), (1920, 1080));
        assert_eq!(props.codec, "h264");
        assert_eq!(props.format, "matroska");
        assert!((props.frame_rate - 29.97).abs() < 0.01);
        assert_eq!(props.bit_rate, 8_000_000);
    }

    #[test]
    fn test_parse_probe_falls_back_to_container_bitrate() {
        let output = "codec_name=h264\nwidth=640\nheight=480\nr_frame_rate=25/1\nbit_rate=N/A\nformat_name=rtsp\nbit_rate=1500000\n";
        let props = parse_probe_output(output).unwrap();
        assert_eq!(props.bit_rate, 1_500_000);
        assert_eq!(props.frame_rate, 25.0);
    }

    #[test]
    fn test_parse_probe_requires_dimensions() {
        assert!(matches!(
            parse_probe_output("codec_name=h264\nwidth=0\n"),
            Err(MediaError::Probe(_))
        ));
    }

    #[test]
    fn test_rtsp_input_uses_tcp() {
        let args = FfmpegConfig::default().network_input_args("rtsp://cam/live");
        assert_eq!(args, vec!["-rtsp_transport", "tcp", "-timeout", "5000000"]);

        let args = FfmpegConfig::default().network_input_args("http://cam/live.ts");
        assert_eq!(args, vec!["-rw_timeout", "5000000"]);
    }
}
