//! Per-frame telemetry lookup
//!
//! Telemetry is sampled far less often than video, so consecutive frames
//! usually share a sync timestamp. The resolver keeps the last snapshots
//! and only queries the store when the timestamp changes.

use std::collections::HashMap;
use storage::{EnabledMetrics, FrameSyncRecord, InclinationSnapshot, LocationSnapshot, TelemetryStore};
use tracing::trace;

use crate::ComposeError;

pub struct TelemetryResolver<'a> {
    store: &'a dyn TelemetryStore,
    session_id: String,
    /// Display delay subtracted from every sync timestamp (ms)
    delay_ms: i64,
    metrics: EnabledMetrics,
    sync: HashMap<u64, i64>,
    last_timestamp: Option<i64>,
    location: Option<LocationSnapshot>,
    inclination: Option<InclinationSnapshot>,
    fetches: u64,
}

impl<'a> TelemetryResolver<'a> {
    pub fn new(
        store: &'a dyn TelemetryStore,
        session_id: impl Into<String>,
        delay_ms: i64,
        metrics: EnabledMetrics,
        records: &[FrameSyncRecord],
    ) -> Self {
        Self {
            store,
            session_id: session_id.into(),
            delay_ms,
            metrics,
            sync: records
                .iter()
                .map(|record| (record.frame_number, record.sync_timestamp_ms))
                .collect(),
            last_timestamp: None,
            location: None,
            inclination: None,
            fetches: 0,
        }
    }

    /// Telemetry for a 1-based frame number. Frames without a sync record
    /// keep the previous frame's telemetry.
    pub fn resolve(
        &mut self,
        frame_number: u64,
    ) -> Result<(Option<&LocationSnapshot>, Option<&InclinationSnapshot>), ComposeError> {
        if let Some(sync_timestamp) = self.sync.get(&frame_number) {
            let timestamp = sync_timestamp - self.delay_ms;
            if self.last_timestamp != Some(timestamp) {
                trace!("Frame {} -> telemetry at {}", frame_number, timestamp);
                if self.metrics.needs_location() {
                    self.location = self.store.get_location(&self.session_id, timestamp)?;
                }
                if self.metrics.needs_inclination() {
                    self.inclination = self.store.get_inclination(&self.session_id, timestamp)?;
                }
                self.last_timestamp = Some(timestamp);
                self.fetches += 1;
            }
        }
        Ok((self.location.as_ref(), self.inclination.as_ref()))
    }

    /// Store round trips so far
    pub fn fetches(&self) -> u64 {
        self.fetches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use storage::{Repository, StorageError, VideoSessionMetadata};

    /// Counts location lookups made against an inner repository
    #[derive(Default)]
    struct CountingStore {
        inner: Repository,
        lookups: AtomicU64,
        last_requested: std::sync::Mutex<Option<i64>>,
    }

    impl TelemetryStore for CountingStore {
        fn get_location(&self, session_id: &str, timestamp_ms: i64) -> Result<Option<LocationSnapshot>, StorageError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            *self.last_requested.lock().unwrap() = Some(timestamp_ms);
            self.inner.get_location(session_id, timestamp_ms)
        }
        fn get_inclination(&self, session_id: &str, timestamp_ms: i64) -> Result<Option<InclinationSnapshot>, StorageError> {
            self.inner.get_inclination(session_id, timestamp_ms)
        }
        fn get_video_metadata(&self, session_id: &str) -> Result<Option<VideoSessionMetadata>, StorageError> {
            self.inner.get_video_metadata(session_id)
        }
        fn get_max_speed(&self, session_id: &str) -> Result<f32, StorageError> {
            self.inner.get_max_speed(session_id)
        }
        fn insert_video_frame_sync_records(&self, records: &[FrameSyncRecord]) -> Result<(), StorageError> {
            self.inner.insert_video_frame_sync_records(records)
        }
        fn replace_video_frame_sync_records(&self, session_id: &str, records: &[FrameSyncRecord]) -> Result<(), StorageError> {
            self.inner.replace_video_frame_sync_records(session_id, records)
        }
        fn update_video_metadata(&self, metadata: &VideoSessionMetadata) -> Result<(), StorageError> {
            self.inner.update_video_metadata(metadata)
        }
        fn insert_video_metadata(&self, metadata: &VideoSessionMetadata) -> Result<(), StorageError> {
            self.inner.insert_video_metadata(metadata)
        }
        fn get_frame_sync_records(&self, session_id: &str) -> Result<Vec<FrameSyncRecord>, StorageError> {
            self.inner.get_frame_sync_records(session_id)
        }
        fn insert_location(&self, session_id: &str, sample: LocationSnapshot) -> Result<(), StorageError> {
            self.inner.insert_location(session_id, sample)
        }
        fn insert_inclination(&self, session_id: &str, sample: InclinationSnapshot) -> Result<(), StorageError> {
            self.inner.insert_inclination(session_id, sample)
        }
        fn set_enabled_metrics(&self, session_id: &str, metrics: EnabledMetrics) -> Result<(), StorageError> {
            self.inner.set_enabled_metrics(session_id, metrics)
        }
        fn get_enabled_metrics(&self, session_id: &str) -> Result<EnabledMetrics, StorageError> {
            self.inner.get_enabled_metrics(session_id)
        }
    }

    fn records(timestamps: &[i64]) -> Vec<FrameSyncRecord> {
        timestamps
            .iter()
            .enumerate()
            .map(|(i, ts)| FrameSyncRecord {
                session_id: "s".to_string(),
                frame_number: i as u64 + 1,
                sync_timestamp_ms: *ts,
            })
            .collect()
    }

    fn store_with_speeds() -> CountingStore {
        let store = CountingStore::default();
        for (ts, speed) in [(1_000, 5.0), (2_000, 10.0)] {
            store
                .insert_location(
                    "s",
                    LocationSnapshot {
                        timestamp_ms: ts,
                        speed,
                        ..Default::default()
                    },
                )
                .unwrap();
        }
        store
    }

    #[test]
    fn test_same_timestamp_fetches_once() {
        let store = store_with_speeds();
        let records = records(&[1_000; 10]);
        let mut resolver = TelemetryResolver::new(&store, "s", 0, EnabledMetrics::default(), &records);

        for frame in 1..=10 {
            let (location, _) = resolver.resolve(frame).unwrap();
            assert_eq!(location.unwrap().speed, 5.0);
        }
        assert_eq!(resolver.fetches(), 1);
        assert_eq!(store.lookups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_refetch_on_change_and_delay_offset() {
        let store = store_with_speeds();
        let records = records(&[2_250, 2_250, 2_300]);
        let mut resolver = TelemetryResolver::new(&store, "s", 250, EnabledMetrics::default(), &records);

        let (location, _) = resolver.resolve(1).unwrap();
        assert_eq!(location.unwrap().speed, 10.0);
        assert_eq!(*store.last_requested.lock().unwrap(), Some(2_000));

        resolver.resolve(2).unwrap();
        resolver.resolve(3).unwrap();
        assert_eq!(resolver.fetches(), 2);
        assert_eq!(*store.last_requested.lock().unwrap(), Some(2_050));
    }

    #[test]
    fn test_unmapped_frame_keeps_previous_telemetry() {
        let store = store_with_speeds();
        let records = records(&[1_000]);
        let mut resolver = TelemetryResolver::new(&store, "s", 0, EnabledMetrics::default(), &records);

        resolver.resolve(1).unwrap();
        let (location, inclination) = resolver.resolve(2).unwrap();
        assert_eq!(location.unwrap().speed, 5.0);
        assert!(inclination.is_none());
        assert_eq!(resolver.fetches(), 1);
    }
}
