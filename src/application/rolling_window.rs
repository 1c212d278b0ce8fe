// Rolling window projector - Bounded chart series for one device
use crate::application::history_repository::HistoryRepository;
use crate::application::ports::ReadingObserver;
use crate::domain::device::DeviceId;
use crate::domain::reading::Reading;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Consistent copy of the projected series. All three vectors have the same
/// length and are aligned index by index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowSnapshot {
    pub device: Option<DeviceId>,
    pub timestamps: Vec<DateTime<Utc>>,
    pub speed: Vec<f64>,
    pub throughput: Vec<f64>,
}

impl WindowSnapshot {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

#[derive(Debug, Default)]
struct WindowState {
    device: Option<DeviceId>,
    timestamps: VecDeque<DateTime<Utc>>,
    speed: VecDeque<f64>,
    throughput: VecDeque<f64>,
    latest: Option<Reading>,
}

impl WindowState {
    fn clear(&mut self) {
        self.timestamps.clear();
        self.speed.clear();
        self.throughput.clear();
        self.latest = None;
    }

    fn append(&mut self, reading: &Reading, capacity: usize) {
        self.timestamps.push_back(reading.timestamp);
        self.speed.push_back(reading.speed);
        self.throughput.push_back(reading.throughput);
        if self.timestamps.len() > capacity {
            self.timestamps.pop_front();
            self.speed.pop_front();
            self.throughput.pop_front();
        }
        self.latest = Some(reading.clone());
    }
}

/// Fixed-capacity FIFO projection of one device's speed and throughput.
///
/// The three series live behind a single lock, so a snapshot taken while the
/// tick loop is pushing always sees them at equal length.
#[derive(Debug)]
pub struct RollingWindowProjector {
    capacity: usize,
    seed_hours: u32,
    state: Mutex<WindowState>,
}

impl RollingWindowProjector {
    pub fn new(capacity: usize, seed_hours: u32) -> Self {
        Self {
            capacity: capacity.max(1),
            seed_hours,
            state: Mutex::new(WindowState::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, WindowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a live reading of the projected device.
    ///
    /// Readings of other devices are dropped, as are readings that are not
    /// newer than the current tail (already loaded from history).
    pub fn push(&self, reading: &Reading) {
        let mut state = self.lock();
        if state.device.as_ref() != Some(&reading.device_id) {
            return;
        }
        if let Some(latest) = &state.latest {
            if reading.timestamp < latest.timestamp || reading == latest {
                return;
            }
        }
        state.append(reading, self.capacity);
    }

    pub fn snapshot(&self) -> WindowSnapshot {
        let state = self.lock();
        WindowSnapshot {
            device: state.device.clone(),
            timestamps: state.timestamps.iter().copied().collect(),
            speed: state.speed.iter().copied().collect(),
            throughput: state.throughput.iter().copied().collect(),
        }
    }

    /// Newest projected reading.
    pub fn latest(&self) -> Option<Reading> {
        self.lock().latest.clone()
    }

    /// Switch the projection to `device`: clear every series and reload it
    /// from recent history in one critical section.
    pub fn select_device(&self, device: DeviceId, history: &dyn HistoryRepository) {
        let mut state = self.lock();
        state.clear();

        let recent = history.query_recent(&device, self.seed_hours);
        let skip = recent.len().saturating_sub(self.capacity);
        for reading in &recent[skip..] {
            state.append(reading, self.capacity);
        }

        tracing::debug!(
            "Projecting {}: seeded {} of {} recent readings",
            device,
            recent.len() - skip,
            recent.len()
        );
        state.device = Some(device);
    }
}

impl ReadingObserver for RollingWindowProjector {
    fn on_reading(&self, reading: &Reading) -> anyhow::Result<()> {
        self.push(reading);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::reading::fixtures::reading_at;
    use crate::infrastructure::memory_history::InMemoryHistory;
    use std::sync::Arc;

    fn projecting(device: &str, capacity: usize) -> RollingWindowProjector {
        let projector = RollingWindowProjector::new(capacity, 12);
        projector.select_device(DeviceId::new(device), &InMemoryHistory::new());
        projector
    }

    #[test]
    fn test_fifo_eviction_keeps_last_capacity_readings() {
        let capacity = 240;
        let projector = projecting("BELT-001", capacity);

        let pushed: Vec<Reading> = (0..capacity as i64 + 75)
            .map(|i| reading_at("BELT-001", i, 1.8 + i as f64 / 1000.0, 180.0 + i as f64))
            .collect();
        for reading in &pushed {
            projector.push(reading);
        }

        let snapshot = projector.snapshot();
        assert_eq!(snapshot.len(), capacity);
        assert_eq!(snapshot.speed.len(), capacity);
        assert_eq!(snapshot.throughput.len(), capacity);

        let expected = &pushed[pushed.len() - capacity..];
        for (i, reading) in expected.iter().enumerate() {
            assert_eq!(snapshot.timestamps[i], reading.timestamp);
            assert_eq!(snapshot.speed[i], reading.speed);
            assert_eq!(snapshot.throughput[i], reading.throughput);
        }
        assert_eq!(projector.latest().as_ref(), pushed.last());
    }

    #[test]
    fn test_readings_of_other_devices_are_ignored() {
        let projector = projecting("BELT-001", 10);
        projector.push(&reading_at("BELT-002", 0, 2.0, 200.0));
        assert!(projector.snapshot().is_empty());

        projector.push(&reading_at("BELT-001", 1, 2.0, 200.0));
        assert_eq!(projector.snapshot().len(), 1);
    }

    #[test]
    fn test_nothing_is_projected_before_a_device_is_selected() {
        let projector = RollingWindowProjector::new(10, 12);
        projector.push(&reading_at("BELT-001", 0, 2.0, 200.0));
        assert_eq!(projector.snapshot(), WindowSnapshot::default());
    }

    #[test]
    fn test_stale_and_duplicate_readings_are_dropped() {
        let projector = projecting("BELT-001", 10);
        let reading = reading_at("BELT-001", 5, 2.0, 200.0);
        projector.push(&reading);
        projector.push(&reading);
        projector.push(&reading_at("BELT-001", 4, 2.0, 200.0));
        assert_eq!(projector.snapshot().len(), 1);
    }

    #[test]
    fn test_switching_device_resets_and_reseeds() {
        let history = InMemoryHistory::new();
        let now = Utc::now();
        for minutes_ago in [30, 20, 10] {
            let mut reading = reading_at("BELT-002", 0, 1.9, 190.0);
            reading.timestamp = now - chrono::Duration::minutes(minutes_ago);
            history.append(reading);
        }
        let mut old = reading_at("BELT-002", 0, 1.0, 100.0);
        old.timestamp = now - chrono::Duration::hours(13);
        history.append(old);

        let projector = projecting("BELT-001", 10);
        projector.push(&reading_at("BELT-001", 0, 2.0, 200.0));

        projector.select_device(DeviceId::new("BELT-002"), &history);
        let snapshot = projector.snapshot();
        assert_eq!(snapshot.device, Some(DeviceId::new("BELT-002")));
        assert_eq!(snapshot.len(), 3);
        assert!(snapshot.speed.iter().all(|&s| s == 1.9));

        // A late push for the abandoned device must not land.
        let mut late = reading_at("BELT-001", 0, 2.0, 200.0);
        late.timestamp = now;
        projector.push(&late);
        assert_eq!(projector.snapshot().len(), 3);
    }

    #[test]
    fn test_reseed_is_capped_at_capacity() {
        let history = InMemoryHistory::new();
        let now = Utc::now();
        for minutes_ago in (0..50).rev() {
            let mut reading = reading_at("BELT-001", 0, 2.0, 200.0);
            reading.timestamp = now - chrono::Duration::minutes(minutes_ago);
            history.append(reading);
        }

        let projector = RollingWindowProjector::new(20, 12);
        projector.select_device(DeviceId::new("BELT-001"), &history);
        let snapshot = projector.snapshot();
        assert_eq!(snapshot.len(), 20);
        assert_eq!(snapshot.timestamps.last(), Some(&now));
    }

    #[test]
    fn test_snapshot_never_torn_under_concurrent_pushes() {
        let projector = Arc::new(projecting("BELT-001", 50));

        let pusher = {
            let projector = projector.clone();
            std::thread::spawn(move || {
                for i in 0..5_000 {
                    projector.push(&reading_at("BELT-001", i, 2.0, 200.0));
                }
            })
        };

        for _ in 0..1_000 {
            let snapshot = projector.snapshot();
            assert_eq!(snapshot.timestamps.len(), snapshot.speed.len());
            assert_eq!(snapshot.speed.len(), snapshot.throughput.len());
            assert!(snapshot.len() <= 50);
        }
        pusher.join().unwrap();
        assert_eq!(projector.snapshot().len(), 50);
    }

    #[test]
    fn test_switch_is_not_contaminated_by_concurrent_pushes() {
        let history = InMemoryHistory::new();
        let now = Utc::now();
        for minutes_ago in [30, 20, 10] {
            let mut reading = reading_at("BELT-002", 0, 1.9, 190.0);
            reading.timestamp = now - chrono::Duration::minutes(minutes_ago);
            history.append(reading);
        }

        let projector = Arc::new(projecting("BELT-001", 50));
        let done = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let pusher = {
            let projector = projector.clone();
            let done = done.clone();
            std::thread::spawn(move || {
                let mut minute = 0;
                while !done.load(std::sync::atomic::Ordering::Relaxed) {
                    projector.push(&reading_at("BELT-001", minute, 2.0, 200.0));
                    minute += 1;
                }
            })
        };

        for _ in 0..500 {
            projector.select_device(DeviceId::new("BELT-001"), &history);
            projector.select_device(DeviceId::new("BELT-002"), &history);
            let snapshot = projector.snapshot();
            assert_eq!(snapshot.device, Some(DeviceId::new("BELT-002")));
            assert_eq!(snapshot.len(), 3);
            assert!(snapshot.speed.iter().all(|&s| s == 1.9));
            assert_eq!(projector.latest().map(|r| r.device_id), Some(DeviceId::new("BELT-002")));
        }

        done.store(true, std::sync::atomic::Ordering::Relaxed);
        pusher.join().unwrap();
    }
}
