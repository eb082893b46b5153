//! Repository Implementation

use crate::records::{
    EnabledMetrics, FrameSyncRecord, InclinationSnapshot, LocationSnapshot, VideoSessionMetadata,
};
use crate::StorageError;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Persistence contract used by the capture and composition pipelines
pub trait TelemetryStore: Send + Sync {
    /// Location sample of the session closest in time to `timestamp_ms`
    fn get_location(&self, session_id: &str, timestamp_ms: i64)
        -> Result<Option<LocationSnapshot>, StorageError>;

    /// Inclination sample of the session closest in time to `timestamp_ms`
    fn get_inclination(&self, session_id: &str, timestamp_ms: i64)
        -> Result<Option<InclinationSnapshot>, StorageError>;

    fn get_video_metadata(&self, session_id: &str) -> Result<Option<VideoSessionMetadata>, StorageError>;

    /// Highest recorded speed of the session (m/s), 0 when none
    fn get_max_speed(&self, session_id: &str) -> Result<f32, StorageError>;

    /// Bulk insert; existing (session, frame) keys are left untouched
    fn insert_video_frame_sync_records(&self, records: &[FrameSyncRecord]) -> Result<(), StorageError>;

    /// Drop every sync record of the session, then insert `records`
    fn replace_video_frame_sync_records(&self, session_id: &str, records: &[FrameSyncRecord])
        -> Result<(), StorageError>;

    /// Replace the metadata of an existing session
    fn update_video_metadata(&self, metadata: &VideoSessionMetadata) -> Result<(), StorageError>;

    fn insert_video_metadata(&self, metadata: &VideoSessionMetadata) -> Result<(), StorageError>;

    /// Frame sync records of the session ordered by frame number
    fn get_frame_sync_records(&self, session_id: &str) -> Result<Vec<FrameSyncRecord>, StorageError>;

    fn insert_location(&self, session_id: &str, sample: LocationSnapshot) -> Result<(), StorageError>;

    fn insert_inclination(&self, session_id: &str, sample: InclinationSnapshot) -> Result<(), StorageError>;

    fn set_enabled_metrics(&self, session_id: &str, metrics: EnabledMetrics) -> Result<(), StorageError>;

    /// Metrics selected for the session, all enabled when never set
    fn get_enabled_metrics(&self, session_id: &str) -> Result<EnabledMetrics, StorageError>;
}

#[derive(Debug, Default)]
struct SessionData {
    metadata: Option<VideoSessionMetadata>,
    frame_sync: BTreeMap<u64, i64>,
    locations: BTreeMap<i64, LocationSnapshot>,
    inclinations: BTreeMap<i64, InclinationSnapshot>,
    metrics: Option<EnabledMetrics>,
}

/// Repository for data access (in-memory implementation)
pub struct Repository {
    sessions: Mutex<HashMap<String, SessionData>>,
    /// Max telemetry samples kept per session and kind
    max_samples_per_session: usize,
}

impl Repository {
    /// Create a new in-memory repository
    pub fn new() -> Self {
        info!("Creating in-memory repository");
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_samples_per_session: 200_000, // ~5.5 hours at 10Hz
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, SessionData>>, StorageError> {
        self.sessions
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))
    }

    /// Number of sessions with any stored data
    pub fn session_count(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Drop everything stored for a session
    pub fn remove_session(&self, session_id: &str) -> Result<(), StorageError> {
        self.lock()?.remove(session_id);
        Ok(())
    }
}

impl Default for Repository {
    fn default() -> Self {
        Self::new()
    }
}

/// Entry whose key is closest to `ts`; ties resolve to the earlier sample
fn nearest<V: Clone>(samples: &BTreeMap<i64, V>, ts: i64) -> Option<V> {
    let before = samples.range(..=ts).next_back();
    let after = samples.range(ts..).next();
    match (before, after) {
        (Some((tb, vb)), Some((ta, va))) => {
            if ts.abs_diff(*tb) <= ta.abs_diff(ts) {
                Some(vb.clone())
            } else {
                Some(va.clone())
            }
        }
        (Some((_, v)), None) | (None, Some((_, v))) => Some(v.clone()),
        (None, None) => None,
    }
}

fn insert_bounded<V>(samples: &mut BTreeMap<i64, V>, ts: i64, value: V, max: usize) {
    samples.insert(ts, value);
    while samples.len() > max {
        samples.pop_first();
    }
}

impl TelemetryStore for Repository {
    fn get_location(
        &self,
        session_id: &str,
        timestamp_ms: i64,
    ) -> Result<Option<LocationSnapshot>, StorageError> {
        let sessions = self.lock()?;
        Ok(sessions
            .get(session_id)
            .and_then(|s| nearest(&s.locations, timestamp_ms)))
    }

    fn get_inclination(
        &self,
        session_id: &str,
        timestamp_ms: i64,
    ) -> Result<Option<InclinationSnapshot>, StorageError> {
        let sessions = self.lock()?;
        Ok(sessions
            .get(session_id)
            .and_then(|s| nearest(&s.inclinations, timestamp_ms)))
    }

    fn get_video_metadata(&self, session_id: &str) -> Result<Option<VideoSessionMetadata>, StorageError> {
        let sessions = self.lock()?;
        Ok(sessions.get(session_id).and_then(|s| s.metadata.clone()))
    }

    fn get_max_speed(&self, session_id: &str) -> Result<f32, StorageError> {
        let sessions = self.lock()?;
        Ok(sessions
            .get(session_id)
            .map(|s| s.locations.values().map(|l| l.speed).fold(0.0, f32::max))
            .unwrap_or(0.0))
    }

    fn insert_video_frame_sync_records(&self, records: &[FrameSyncRecord]) -> Result<(), StorageError> {
        let mut sessions = self.lock()?;
        let mut skipped = 0usize;

        for record in records {
            let session = sessions.entry(record.session_id.clone()).or_default();
            if session.frame_sync.contains_key(&record.frame_number) {
                skipped += 1;
                continue;
            }
            session.frame_sync.insert(record.frame_number, record.sync_timestamp_ms);
        }

        if skipped > 0 {
            warn!("Skipped {} duplicate frame sync records", skipped);
        }
        debug!("Inserted {} frame sync records", records.len() - skipped);
        Ok(())
    }

    fn replace_video_frame_sync_records(
        &self,
        session_id: &str,
        records: &[FrameSyncRecord],
    ) -> Result<(), StorageError> {
        let mut sessions = self.lock()?;
        let frame_sync = &mut sessions.entry(session_id.to_string()).or_default().frame_sync;
        let previous = frame_sync.len();
        frame_sync.clear();
        frame_sync.extend(
            records
                .iter()
                .filter(|r| r.session_id == session_id)
                .map(|r| (r.frame_number, r.sync_timestamp_ms)),
        );
        debug!(
            "Replaced {} frame sync records of {} with {}",
            previous,
            session_id,
            frame_sync.len()
        );
        Ok(())
    }

    fn update_video_metadata(&self, metadata: &VideoSessionMetadata) -> Result<(), StorageError> {
        let mut sessions = self.lock()?;
        let slot = sessions
            .get_mut(&metadata.session_id)
            .and_then(|s| s.metadata.as_mut())
            .ok_or(StorageError::NotFound)?;
        *slot = metadata.clone();
        Ok(())
    }

    fn insert_video_metadata(&self, metadata: &VideoSessionMetadata) -> Result<(), StorageError> {
        let mut sessions = self.lock()?;
        sessions.entry(metadata.session_id.clone()).or_default().metadata = Some(metadata.clone());
        debug!("Inserted video metadata for session {}", metadata.session_id);
        Ok(())
    }

    fn get_frame_sync_records(&self, session_id: &str) -> Result<Vec<FrameSyncRecord>, StorageError> {
        let sessions = self.lock()?;
        Ok(sessions
            .get(session_id)
            .map(|s| {
                s.frame_sync
                    .iter()
                    .map(|(&frame_number, &sync_timestamp_ms)| FrameSyncRecord {
                        session_id: session_id.to_string(),
                        frame_number,
                        sync_timestamp_ms,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn insert_location(&self, session_id: &str, sample: LocationSnapshot) -> Result<(), StorageError> {
        let mut sessions = self.lock()?;
        let session = sessions.entry(session_id.to_string()).or_default();
        insert_bounded(&mut session.locations, sample.timestamp_ms, sample, self.max_samples_per_session);
        Ok(())
    }

    fn insert_inclination(&self, session_id: &str, sample: InclinationSnapshot) -> Result<(), StorageError> {
        let mut sessions = self.lock()?;
        let session = sessions.entry(session_id.to_string()).or_default();
        insert_bounded(
            &mut session.inclinations,
            sample.timestamp_ms,
            sample,
            self.max_samples_per_session,
        );
        Ok(())
    }

    fn set_enabled_metrics(&self, session_id: &str, metrics: EnabledMetrics) -> Result<(), StorageError> {
        let mut sessions = self.lock()?;
        sessions.entry(session_id.to_string()).or_default().metrics = Some(metrics);
        Ok(())
    }

    fn get_enabled_metrics(&self, session_id: &str) -> Result<EnabledMetrics, StorageError> {
        let sessions = self.lock()?;
        Ok(sessions
            .get(session_id)
            .and_then(|s| s.metrics)
            .unwrap_or_default())
    }
}
