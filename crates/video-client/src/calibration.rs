//! Display delay calibration
//!
//! The camera overlay first shows a start marker; once it is seen in the
//! received stream the control time is taken. The camera then shows a
//! delay marker, and the delay is the capture time of the frame where it
//! was found minus the control time.

use std::sync::atomic::{AtomicI64, Ordering};

/// Millisecond wall clock
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// System time in Unix milliseconds
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Manually advanced clock for simulations
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    pub fn set(&self, ms: i64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Timing bookkeeping for one calibration attempt
#[derive(Debug, Clone, Default)]
pub struct DelayCalibrator {
    /// When the start marker search began (t0)
    started_at_ms: Option<i64>,
    /// When the start marker was found (tControl)
    control_at_ms: Option<i64>,
    /// Last calibrated or stored delay
    delay_ms: Option<i64>,
    timeout_ms: Option<u64>,
}

impl DelayCalibrator {
    pub fn new(timeout_ms: Option<u64>) -> Self {
        Self {
            timeout_ms,
            ..Default::default()
        }
    }

    /// Start searching for the start marker
    pub fn begin(&mut self, now_ms: i64) {
        self.started_at_ms = Some(now_ms);
        self.control_at_ms = None;
    }

    /// Start marker found
    pub fn mark_control(&mut self, now_ms: i64) {
        self.control_at_ms = Some(now_ms);
    }

    /// Delay marker found in a frame captured at `detection_ms`.
    /// Returns the delay, or `None` if the start marker was never seen.
    pub fn complete(&mut self, detection_ms: i64) -> Option<i64> {
        let control = self.control_at_ms?;
        let delay = detection_ms - control;
        self.delay_ms = Some(delay);
        self.started_at_ms = None;
        self.control_at_ms = None;
        Some(delay)
    }

    /// Use a delay measured in an earlier session
    pub fn store(&mut self, delay_ms: i64) {
        self.delay_ms = Some(delay_ms);
        self.started_at_ms = None;
        self.control_at_ms = None;
    }

    /// Whether an attempt is running
    pub fn in_progress(&self) -> bool {
        self.started_at_ms.is_some()
    }

    /// Abandon the running attempt, keeping the last known delay
    pub fn abort(&mut self) {
        self.started_at_ms = None;
        self.control_at_ms = None;
    }

    /// The running attempt exceeded its timeout
    pub fn expired(&self, now_ms: i64) -> bool {
        match (self.started_at_ms, self.timeout_ms) {
            (Some(started), Some(timeout)) => now_ms.saturating_sub(started) > timeout as i64,
            _ => false,
        }
    }

    pub fn delay_ms(&self) -> Option<i64> {
        self.delay_ms
    }

    pub fn control_at_ms(&self) -> Option<i64> {
        self.control_at_ms
    }
}
