//! Event bus wiring between the pipeline components
//!
//! Stream connection changes drive the remote video client, and finished
//! recordings start their composition.

use composer::{ComposeError, CompositionManager};
use session_events::{EventBus, SessionEvent};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use video_client::{ClientCommand, ClientHandle};

/// Start composing `session_id` and log the outcome in the background
pub fn spawn_composition(compositions: &CompositionManager, session_id: &str) -> Result<(), ComposeError> {
    let job = compositions.start(session_id)?;
    metrics::counter!("compositions_started_total").increment(1);
    let session_id = session_id.to_string();
    tokio::spawn(async move {
        match job.await {
            Ok(Ok(outcome)) => info!(
                "Composition of {} ended {:?} ({}/{} frames)",
                session_id, outcome.state, outcome.composed_frames, outcome.expected_frames
            ),
            Ok(Err(e)) => warn!("Composition of {} failed: {}", session_id, e),
            Err(e) => error!("Composition task of {} panicked: {}", session_id, e),
        }
    });
    Ok(())
}

pub fn spawn_bridge(
    events: &EventBus,
    client: ClientHandle,
    compositions: CompositionManager,
    auto_compose: bool,
) -> JoinHandle<()> {
    let mut rx = events.subscribe();

    tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Bridge lagged, {} events skipped", skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let command = match event {
                SessionEvent::StreamConnected { .. } => Some(ClientCommand::Connect),
                SessionEvent::StreamLost => Some(ClientCommand::StreamLost),
                SessionEvent::RecordingFinished { session_id, .. } if auto_compose => {
                    if let Err(e) = spawn_composition(&compositions, &session_id) {
                        warn!("Could not compose {}: {}", session_id, e);
                    }
                    None
                }
                _ => None,
            };

            if let Some(command) = command {
                if client.send(command).await.is_err() {
                    debug!("Video client stopped, bridge exiting");
                    break;
                }
            }
        }
    })
}
