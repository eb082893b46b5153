//! Session Events
//!
//! Outbound notifications of the recording pipeline and the bus that
//! carries them. Every component receives an `EventBus` clone through its
//! constructor; there is no process-wide registry.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Remote video client connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
    WaitingForStartMarker,
    WaitingForDelayMarker,
    Synchronized,
    Consuming,
}

/// Outcome of one delay calibration attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationResult {
    /// Display delay of the stream (ms)
    pub delay_ms: i64,
    pub success: bool,
}

/// Composition progress state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoState {
    Composing,
    Finished,
    Failed,
}

/// Notification published on the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    ConnectionStateChanged(ConnectionState),
    DelayCalibrated(CalibrationResult),
    StreamConnected { width: u32, height: u32, frame_rate: f64 },
    StreamLost,
    RecordingStarted { session_id: String },
    /// Recording stopped and persisted; composition may begin
    RecordingFinished { session_id: String, total_frames: u64 },
    RecordingDiscarded { session_id: String },
    VideoComposition { session_id: String, state: VideoState, percent: u8 },
}

/// Cloneable publish/subscribe handle
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// Bus buffering up to `capacity` events per slow subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish to every current subscriber; events with no subscriber are dropped
    pub fn publish(&self, event: SessionEvent) {
        trace!("Publishing {:?}", event);
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_subscriber_receives_events() {
        let bus = EventBus::default();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.publish(SessionEvent::ConnectionStateChanged(ConnectionState::Connected));

        let expected = SessionEvent::ConnectionStateChanged(ConnectionState::Connected);
        assert_eq!(first.recv().await.unwrap(), expected);
        assert_eq!(second.recv().await.unwrap(), expected);
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let bus = EventBus::new(4);
        bus.publish(SessionEvent::StreamLost);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
