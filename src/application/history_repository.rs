// Repository trait for per-device reading history
use crate::domain::device::DeviceId;
use crate::domain::reading::Reading;
use chrono::{DateTime, Duration, Utc};

pub trait HistoryRepository: Send + Sync {
    /// Store one reading. No deduplication and no ordering check.
    fn append(&self, reading: Reading);

    /// Readings of `device_id` with `start <= timestamp <= end`, oldest first.
    /// Unknown devices and inverted ranges yield an empty vector.
    fn query(&self, device_id: &DeviceId, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Reading>;

    /// Number of readings stored for `device_id`.
    fn count(&self, device_id: &DeviceId) -> usize;

    fn query_recent_at(&self, device_id: &DeviceId, hours: u32, now: DateTime<Utc>) -> Vec<Reading> {
        self.query(device_id, hours_before(now, hours), now)
    }

    fn query_recent(&self, device_id: &DeviceId, hours: u32) -> Vec<Reading> {
        self.query_recent_at(device_id, hours, Utc::now())
    }
}

/// `now` minus `hours`, clamped to the earliest representable instant.
pub fn hours_before(now: DateTime<Utc>, hours: u32) -> DateTime<Utc> {
    now.checked_sub_signed(Duration::hours(i64::from(hours)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hours_before_clamps_at_earliest_instant() {
        let now = Utc::now();
        assert_eq!(hours_before(now, 2), now - Duration::hours(2));
        assert_eq!(hours_before(now, u32::MAX), DateTime::<Utc>::MIN_UTC);
    }
}
