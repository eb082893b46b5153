//! Offline composition of one recorded session

use media_io::{FrameSink, MediaBackend, SinkSettings, StreamSource, VideoFrame};
use overlay::OverlayRenderer;
use serde::Serialize;
use session_events::{EventBus, SessionEvent, VideoState};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use storage::{TelemetryStore, VideoSessionMetadata};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::progress::{percent, ProgressThrottle};
use crate::{ComposeError, ComposerConfig, TelemetryResolver};

/// Result of a composition that ran to the end of the raw recording
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositionOutcome {
    pub session_id: String,
    pub state: VideoState,
    pub composed_frames: u64,
    pub expected_frames: u64,
    pub output_path: PathBuf,
}

/// Decodes a raw recording, draws the telemetry overlay on every frame
/// and encodes the result
pub struct CompositionEngine {
    backend: Arc<dyn MediaBackend>,
    store: Arc<dyn TelemetryStore>,
    events: EventBus,
    config: ComposerConfig,
}

impl CompositionEngine {
    pub fn new(
        backend: Arc<dyn MediaBackend>,
        store: Arc<dyn TelemetryStore>,
        events: EventBus,
        config: ComposerConfig,
    ) -> Self {
        Self {
            backend,
            store,
            events,
            config,
        }
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    fn publish(&self, session_id: &str, state: VideoState, percent: u8) {
        self.events.publish(SessionEvent::VideoComposition {
            session_id: session_id.to_string(),
            state,
            percent,
        });
    }

    /// Compose `session_id`. Blocking; run it on a blocking thread.
    ///
    /// A recording that decodes fewer frames than were captured yields a
    /// `Failed` outcome rather than an error. Media, storage and overlay
    /// failures, and cancellation, publish `Failed` and return the error.
    pub fn compose(&self, session_id: &str, cancel: &CancellationToken) -> Result<CompositionOutcome, ComposeError> {
        let metadata = self
            .store
            .get_video_metadata(session_id)?
            .ok_or_else(|| ComposeError::UnknownSession(session_id.to_string()))?;

        match self.run(metadata, cancel) {
            Ok(outcome) => {
                self.publish(session_id, outcome.state, 100);
                Ok(outcome)
            }
            Err(e) => {
                warn!("Composition of {} failed: {}", session_id, e);
                metrics::counter!("compositions_failed_total").increment(1);
                self.publish(session_id, VideoState::Failed, 100);
                Err(e)
            }
        }
    }

    fn run(&self, mut metadata: VideoSessionMetadata, cancel: &CancellationToken) -> Result<CompositionOutcome, ComposeError> {
        let session_id = metadata.session_id.clone();
        let expected = metadata.total_video_frames;

        let records = self.store.get_frame_sync_records(&session_id)?;
        let enabled = self.store.get_enabled_metrics(&session_id)?;
        let max_speed = self.store.get_max_speed(&session_id)?;
        info!(
            "Composing {}: {} frames, {} sync records, delay {} ms",
            session_id,
            expected,
            records.len(),
            metadata.delay_ms
        );
        self.publish(&session_id, VideoState::Composing, 0);

        let renderer = OverlayRenderer::new(metadata.width, metadata.height, max_speed, enabled, &self.config.style)?;
        let mut resolver = TelemetryResolver::new(self.store.as_ref(), &session_id, metadata.delay_ms, enabled, &records);

        std::fs::create_dir_all(&self.config.output_dir)?;
        let output_path = self.config.output_path(&session_id, chrono::Local::now());
        let settings = SinkSettings {
            width: metadata.width,
            height: metadata.height,
            codec: metadata.codec.clone(),
            format: metadata.format.clone(),
            frame_rate: metadata.frame_rate,
            bit_rate: metadata.bit_rate,
        };

        let mut decoder = self.backend.open_decoder(&metadata.raw_path)?;
        let mut sink = match self.backend.open_sink(&output_path, &settings) {
            Ok(sink) => sink,
            Err(e) => {
                decoder.stop();
                return Err(e.into());
            }
        };

        let composed = self.compose_frames(
            &session_id,
            expected,
            decoder.as_mut(),
            sink.as_mut(),
            &renderer,
            &mut resolver,
            cancel,
        );

        let finished = sink.finish();
        decoder.stop();
        let composed = composed?;
        finished?;

        debug!("{} telemetry fetches for {} frames", resolver.fetches(), composed);

        let state = if composed >= expected {
            VideoState::Finished
        } else {
            warn!("Composed {} of {} frames for {}", composed, expected, session_id);
            VideoState::Failed
        };

        if state == VideoState::Finished {
            metadata.generated_path = Some(output_path.clone());
            self.store.update_video_metadata(&metadata)?;
            info!("Composed {} into {:?}", session_id, output_path);
        }

        Ok(CompositionOutcome {
            session_id,
            state,
            composed_frames: composed,
            expected_frames: expected,
            output_path,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn compose_frames(
        &self,
        session_id: &str,
        expected: u64,
        decoder: &mut dyn StreamSource,
        sink: &mut dyn FrameSink,
        renderer: &OverlayRenderer,
        resolver: &mut TelemetryResolver<'_>,
        cancel: &CancellationToken,
    ) -> Result<u64, ComposeError> {
        let mut throttle = ProgressThrottle::new(self.config.progress_interval(), Instant::now());
        let mut composed: u64 = 0;

        while let Some(frame) = decoder.next_frame()? {
            if cancel.is_cancelled() {
                info!("Composition of {} cancelled after {} frames", session_id, composed);
                return Err(ComposeError::Cancelled);
            }

            let (location, inclination) = resolver.resolve(composed + 1)?;
            let (mut canvas, timing) = frame.into_image()?;
            renderer.render(&mut canvas, location, inclination)?;
            sink.write(&VideoFrame::from_image(canvas, timing))?;

            composed += 1;
            metrics::counter!("frames_composed_total").increment(1);

            if throttle.ready(Instant::now()) {
                self.publish(session_id, VideoState::Composing, percent(composed, expected));
            }
        }
        Ok(composed)
    }
}
