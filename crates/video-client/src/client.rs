//! Remote video client task
//!
//! Owns the state machine and its listener. Commands, preview frames,
//! detection results and timeout ticks are all handled on one task, so
//! state changes never race.

use media_io::VideoFrame;
use session_events::{CalibrationResult, ConnectionState, EventBus, SessionEvent};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::calibration::{Clock, DelayCalibrator};
use crate::config::CalibrationConfig;
use crate::detector::{DetectionQueue, MarkerDetection, MarkerDetector};
use crate::state::{ConnectionStateMachine, StateListener, Transition};
use crate::ClientError;

/// Inbound control signals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCommand {
    Connect,
    StartSynchronization,
    /// Skip calibration and reuse a known delay (ms)
    UseStoredDelay(i64),
    ConsumeVideo,
    Disconnect,
    /// The stream or its display surface went away
    StreamLost,
}

/// Listener side effects: calibration timing and notifications
struct ClientListener {
    calibrator: DelayCalibrator,
    clock: Arc<dyn Clock>,
    events: EventBus,
    state_tx: watch::Sender<ConnectionState>,
    delay_tx: watch::Sender<Option<i64>>,
}

impl ClientListener {
    fn announce(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
        self.events.publish(SessionEvent::ConnectionStateChanged(state));
    }
}

impl StateListener for ClientListener {
    fn on_connect(&mut self) {
        info!("Remote video connected");
        self.announce(ConnectionState::Connected);
    }

    fn on_need_synchronization(&mut self) {
        self.calibrator.begin(self.clock.now_ms());
        info!("Waiting for start marker");
        self.announce(ConnectionState::WaitingForStartMarker);
    }

    fn on_calculate_delay(&mut self) {
        self.calibrator.mark_control(self.clock.now_ms());
        info!("Start marker found, measuring delay");
        self.announce(ConnectionState::WaitingForDelayMarker);
    }

    fn on_save_delay(&mut self) {
        let delay_ms = self.calibrator.delay_ms().unwrap_or(0);
        info!("Video delay is {} ms", delay_ms);
        metrics::gauge!("calibration_delay_ms").set(delay_ms as f64);

        self.delay_tx.send_replace(Some(delay_ms));
        self.events.publish(SessionEvent::DelayCalibrated(CalibrationResult {
            delay_ms,
            success: true,
        }));
        self.announce(ConnectionState::Synchronized);
    }

    fn on_consume_video(&mut self) {
        info!("Consuming video");
        self.announce(ConnectionState::Consuming);
    }

    fn on_disconnect(&mut self) {
        if self.calibrator.in_progress() {
            warn!("Calibration abandoned");
            self.calibrator.abort();
            self.events.publish(SessionEvent::DelayCalibrated(CalibrationResult {
                delay_ms: self.calibrator.delay_ms().unwrap_or(0),
                success: false,
            }));
        }
        info!("Remote video disconnected");
        self.announce(ConnectionState::Disconnected);
    }
}

/// Remote video client
pub struct RemoteVideoClient {
    machine: ConnectionStateMachine,
    listener: ClientListener,
    queue: DetectionQueue,
    detections: mpsc::Receiver<MarkerDetection>,
    config: CalibrationConfig,
    state_rx: watch::Receiver<ConnectionState>,
    delay_rx: watch::Receiver<Option<i64>>,
}

impl RemoteVideoClient {
    pub fn new(
        config: CalibrationConfig,
        detector: Arc<dyn MarkerDetector>,
        clock: Arc<dyn Clock>,
        events: EventBus,
    ) -> Self {
        let (results_tx, detections) = mpsc::channel(4);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (delay_tx, delay_rx) = watch::channel(None);

        Self {
            machine: ConnectionStateMachine::new(),
            listener: ClientListener {
                calibrator: DelayCalibrator::new(config.marker_timeout_ms),
                clock,
                events,
                state_tx,
                delay_tx,
            },
            queue: DetectionQueue::new(detector, results_tx),
            detections,
            config,
            state_rx,
            delay_rx,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.machine.state()
    }

    /// Last calibrated or stored delay (ms)
    pub fn delay_ms(&self) -> Option<i64> {
        self.listener.calibrator.delay_ms()
    }

    pub fn handle_command(&mut self, command: ClientCommand) {
        debug!("Command {:?} in state {:?}", command, self.machine.state());
        let listener = &mut self.listener;

        match command {
            ClientCommand::Connect => {
                self.machine.connect(listener);
            }
            ClientCommand::StartSynchronization => {
                self.machine.need_synchronization(listener);
            }
            ClientCommand::UseStoredDelay(delay_ms) => {
                if self.machine.state() == ConnectionState::Connected {
                    listener.calibrator.store(delay_ms);
                    self.machine.save_delay(listener);
                } else {
                    warn!("Ignoring stored delay in state {:?}", self.machine.state());
                }
            }
            ClientCommand::ConsumeVideo => {
                self.machine.consume_video(listener);
            }
            ClientCommand::Disconnect => {
                self.machine.disconnect(listener);
            }
            ClientCommand::StreamLost => {
                if self.machine.can_apply(Transition::Disconnect) {
                    warn!("Stream lost in state {:?}", self.machine.state());
                }
                self.machine.disconnect(listener);
            }
        }
    }

    /// Preview frame arrived. Offers it to the detector while a marker is
    /// awaited; returns whether a detection was started.
    pub fn on_frame(&mut self, frame: VideoFrame) -> bool {
        let pattern = match self.machine.state() {
            ConnectionState::WaitingForStartMarker => &self.config.control_text,
            ConnectionState::WaitingForDelayMarker => &self.config.delay_text,
            _ => return false,
        };
        let captured_at_ms = self.listener.clock.now_ms();
        self.queue.try_submit(frame, pattern, captured_at_ms)
    }

    /// Detector found a marker
    pub fn on_detection(&mut self, detection: MarkerDetection) {
        let state = self.machine.state();
        let listener = &mut self.listener;

        match state {
            ConnectionState::WaitingForStartMarker if detection.pattern == self.config.control_text => {
                self.machine.calculate_delay(listener);
            }
            ConnectionState::WaitingForDelayMarker if detection.pattern == self.config.delay_text => {
                if listener.calibrator.complete(detection.captured_at_ms).is_some() {
                    self.machine.save_delay(listener);
                } else {
                    warn!("Delay marker found before control time was taken");
                }
            }
            _ => debug!(
                "Discarding {:?} detection in state {:?}",
                detection.pattern, state
            ),
        }
    }

    /// Disconnect if a marker has been awaited for too long
    pub fn check_timeout(&mut self) -> bool {
        let waiting = matches!(
            self.machine.state(),
            ConnectionState::WaitingForStartMarker | ConnectionState::WaitingForDelayMarker
        );
        let now = self.listener.clock.now_ms();

        if waiting && self.listener.calibrator.expired(now) {
            warn!("No marker found in time while {:?}", self.machine.state());
            self.machine.disconnect(&mut self.listener);
            return true;
        }
        false
    }

    /// Run the client on its own task
    pub fn spawn(self, frames: mpsc::Receiver<VideoFrame>) -> ClientHandle {
        let (commands_tx, commands_rx) = mpsc::channel(16);
        let handle = ClientHandle {
            commands: commands_tx,
            state: self.state_rx.clone(),
            delay: self.delay_rx.clone(),
        };
        tokio::spawn(self.run(commands_rx, frames));
        handle
    }

    async fn run(mut self, mut commands: mpsc::Receiver<ClientCommand>, mut frames: mpsc::Receiver<VideoFrame>) {
        let mut ticker = tokio::time::interval(self.config.timeout_check_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(frame) = frames.recv() => {
                    self.on_frame(frame);
                }
                Some(detection) = self.detections.recv() => self.on_detection(detection),
                _ = ticker.tick() => {
                    self.check_timeout();
                }
            }
        }

        debug!("Client handles dropped, shutting down");
        self.handle_command(ClientCommand::Disconnect);
    }
}

/// Cloneable handle to a running client
#[derive(Clone)]
pub struct ClientHandle {
    commands: mpsc::Sender<ClientCommand>,
    state: watch::Receiver<ConnectionState>,
    delay: watch::Receiver<Option<i64>>,
}

impl ClientHandle {
    pub async fn send(&self, command: ClientCommand) -> Result<(), ClientError> {
        self.commands.send(command).await.map_err(|_| ClientError::Closed)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Last calibrated or stored delay (ms)
    pub fn delay_ms(&self) -> Option<i64> {
        *self.delay.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }
}
