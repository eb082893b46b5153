//! Frame to telemetry timestamp mapping

use storage::FrameSyncRecord;

/// Accumulates the mapping while a session records.
///
/// Owned by the capture loop only; readers get an immutable `SyncMap`
/// once the loop has finished.
#[derive(Debug, Clone)]
pub struct SyncMapBuilder {
    session_id: String,
    entries: Vec<i64>,
}

impl SyncMapBuilder {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            entries: Vec::new(),
        }
    }

    /// Record the telemetry timestamp for the next written frame.
    /// Returns the frame number, starting at 1.
    pub fn record(&mut self, sync_timestamp_ms: i64) -> u64 {
        self.entries.push(sync_timestamp_ms);
        self.entries.len() as u64
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn finish(self) -> SyncMap {
        SyncMap {
            session_id: self.session_id,
            entries: self.entries,
        }
    }
}

/// Finished frame number to telemetry timestamp mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncMap {
    session_id: String,
    entries: Vec<i64>,
}

impl SyncMap {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Telemetry timestamp of a 1-based frame number
    pub fn get(&self, frame_number: u64) -> Option<i64> {
        let index = usize::try_from(frame_number.checked_sub(1)?).ok()?;
        self.entries.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_records(&self) -> Vec<FrameSyncRecord> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, ts)| FrameSyncRecord {
                session_id: self.session_id.clone(),
                frame_number: i as u64 + 1,
                sync_timestamp_ms: *ts,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_frame_numbers_start_at_one() {
        let mut builder = SyncMapBuilder::new("s1");
        assert_eq!(builder.record(1000), 1);
        assert_eq!(builder.record(1000), 2);
        assert_eq!(builder.record(1033), 3);

        let map = builder.finish();
        assert_eq!(map.get(0), None);
        assert_eq!(map.get(1), Some(1000));
        assert_eq!(map.get(3), Some(1033));
        assert_eq!(map.get(4), None);
    }

    proptest! {
        #[test]
        fn prop_records_cover_every_frame(ticks in prop::collection::vec(0i64..1_000_000, 0..200)) {
            let mut builder = SyncMapBuilder::new("ride");
            for tick in &ticks {
                builder.record(*tick);
            }
            let records = builder.finish().to_records();

            prop_assert_eq!(records.len(), ticks.len());
            for (i, record) in records.iter().enumerate() {
                prop_assert_eq!(record.frame_number, i as u64 + 1);
                prop_assert_eq!(record.sync_timestamp_ms, ticks[i]);
                prop_assert_eq!(record.session_id.as_str(), "ride");
            }
        }
    }
}
