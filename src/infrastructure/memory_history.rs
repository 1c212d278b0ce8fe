// In-memory history repository
use crate::application::history_repository::HistoryRepository;
use crate::application::reading_generator::ReadingGenerator;
use crate::domain::device::{Device, DeviceId};
use crate::domain::reading::Reading;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Keeps every reading ever appended, grouped by device.
///
/// Appends take the write lock for a single `Vec::push`; queries copy the
/// matching readings out under the read lock, so a reader never observes a
/// partially inserted element.
#[derive(Debug, Default)]
pub struct InMemoryHistory {
    series: RwLock<HashMap<DeviceId, Vec<Reading>>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-filled with `lookback_hours` of synthetic history per
    /// device, one reading every `interval_minutes`, the last one at `now`.
    pub fn seeded(
        generator: &ReadingGenerator,
        devices: &[Device],
        lookback_hours: u32,
        interval_minutes: u32,
        now: DateTime<Utc>,
    ) -> Self {
        let store = Self::new();
        store.seed(generator, devices, lookback_hours, interval_minutes, now);
        store
    }

    fn seed(
        &self,
        generator: &ReadingGenerator,
        devices: &[Device],
        lookback_hours: u32,
        interval_minutes: u32,
        now: DateTime<Utc>,
    ) {
        let interval_minutes = interval_minutes.max(1);
        let points = i64::from(lookback_hours * 60 / interval_minutes);
        let step_minutes = i64::from(interval_minutes);

        let mut series = self.series.write().unwrap_or_else(PoisonError::into_inner);
        for device in devices {
            let readings: Vec<Reading> = (0..points)
                .map(|i| {
                    let offset = Duration::minutes(step_minutes * (points - 1 - i));
                    generator.generate(device, now - offset)
                })
                .collect();
            series.insert(device.id.clone(), readings);
        }

        tracing::debug!(
            "Seeded history for {} devices: {} points each, {}min apart",
            devices.len(),
            points,
            interval_minutes
        );
    }
}

impl HistoryRepository for InMemoryHistory {
    fn append(&self, reading: Reading) {
        let mut series = self.series.write().unwrap_or_else(PoisonError::into_inner);
        series.entry(reading.device_id.clone()).or_default().push(reading);
    }

    fn query(
        &self,
        device_id: &DeviceId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<Reading> {
        if start > end {
            return Vec::new();
        }

        let mut readings: Vec<Reading> = {
            let series = self.series.read().unwrap_or_else(PoisonError::into_inner);
            match series.get(device_id) {
                Some(points) => points
                    .iter()
                    .filter(|r| r.timestamp >= start && r.timestamp <= end)
                    .cloned()
                    .collect(),
                None => Vec::new(),
            }
        };

        // Insertion order is not trusted to be chronological.
        readings.sort_by_key(|r| r.timestamp);
        readings
    }

    fn count(&self, device_id: &DeviceId) -> usize {
        let series = self.series.read().unwrap_or_else(PoisonError::into_inner);
        series.get(device_id).map(Vec::len).unwrap_or(0)
    }
}
