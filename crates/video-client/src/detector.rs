//! Visual marker detection
//!
//! Detection is slow compared to the frame rate, so requests go through a
//! queue that keeps at most one detection running. Frames offered while a
//! detection is in flight are dropped.

use media_io::VideoFrame;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::ClientError;

/// Finds a text pattern in a still image (OCR or similar)
pub trait MarkerDetector: Send + Sync + 'static {
    /// Blocking check whether `pattern` is visible in `image`
    fn detect(&self, image: &VideoFrame, pattern: &str) -> Result<bool, ClientError>;
}

/// A successful detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerDetection {
    pub pattern: String,
    /// Capture time of the frame the pattern was found in (ms)
    pub captured_at_ms: i64,
}

/// Runs detections on the blocking pool, one at a time
pub struct DetectionQueue {
    detector: Arc<dyn MarkerDetector>,
    results: mpsc::Sender<MarkerDetection>,
    in_flight: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
}

impl DetectionQueue {
    pub fn new(detector: Arc<dyn MarkerDetector>, results: mpsc::Sender<MarkerDetection>) -> Self {
        Self {
            detector,
            results,
            in_flight: Arc::new(AtomicBool::new(false)),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Offer a frame. Returns false if a detection is already running.
    ///
    /// A `MarkerDetection` is sent at most once per accepted frame, and only
    /// when the pattern was found.
    pub fn try_submit(&self, frame: VideoFrame, pattern: &str, captured_at_ms: i64) -> bool {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let detector = self.detector.clone();
        let results = self.results.clone();
        let in_flight = self.in_flight.clone();
        let pattern = pattern.to_string();

        tokio::task::spawn_blocking(move || {
            match detector.detect(&frame, &pattern) {
                Ok(true) => {
                    debug!("Marker {:?} found in frame captured at {}", pattern, captured_at_ms);
                    let detection = MarkerDetection {
                        pattern,
                        captured_at_ms,
                    };
                    if results.try_send(detection).is_err() {
                        warn!("Detection result dropped, client not keeping up");
                    }
                }
                Ok(false) => {}
                Err(e) => warn!("Marker detection failed: {}", e),
            }
            in_flight.store(false, Ordering::Release);
        });
        true
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Frames rejected because a detection was running
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Detector driven by external signals: a pattern counts as visible
/// between `show` and `hide`. Lets an out-of-process OCR service or an
/// operator report markers.
#[derive(Debug, Default)]
pub struct SignalledDetector {
    visible: Mutex<HashSet<String>>,
}

impl SignalledDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&self, pattern: &str) {
        if let Ok(mut visible) = self.visible.lock() {
            visible.insert(pattern.to_string());
        }
    }

    pub fn hide(&self, pattern: &str) {
        if let Ok(mut visible) = self.visible.lock() {
            visible.remove(pattern);
        }
    }
}

impl MarkerDetector for SignalledDetector {
    fn detect(&self, _image: &VideoFrame, pattern: &str) -> Result<bool, ClientError> {
        let visible = self
            .visible
            .lock()
            .map_err(|e| ClientError::Detector(format!("Lock error: {}", e)))?;
        Ok(visible.contains(pattern))
    }
}
