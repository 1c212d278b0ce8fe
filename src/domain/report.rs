// Report domain model - statistics over a span of readings
use super::device::DeviceId;
use super::reading::{DeviceStatus, Reading};
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// History points are five minutes apart, so each t/h sample covers 1/12 h.
const SAMPLES_PER_HOUR: f64 = 12.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ReportSummary {
    pub record_count: usize,
    pub mean_speed: f64,
    pub min_speed: f64,
    pub max_speed: f64,
    pub mean_throughput: f64,
    /// Conveyed mass in tonnes.
    pub total_mass: f64,
    pub error_count: usize,
    pub warning_count: usize,
}

impl ReportSummary {
    /// Returns `None` for an empty slice, where means are undefined.
    pub fn from_readings(readings: &[Reading]) -> Option<Self> {
        if readings.is_empty() {
            return None;
        }

        let count = readings.len() as f64;
        let speed_sum: f64 = readings.iter().map(|r| r.speed).sum();
        let throughput_sum: f64 = readings.iter().map(|r| r.throughput).sum();
        let min_speed = readings.iter().map(|r| r.speed).fold(f64::INFINITY, f64::min);
        let max_speed = readings
            .iter()
            .map(|r| r.speed)
            .fold(f64::NEG_INFINITY, f64::max);

        Some(Self {
            record_count: readings.len(),
            mean_speed: round_to(speed_sum / count, 2),
            min_speed: round_to(min_speed, 2),
            max_speed: round_to(max_speed, 2),
            mean_throughput: round_to(throughput_sum / count, 1),
            total_mass: round_to(throughput_sum / SAMPLES_PER_HOUR, 1),
            error_count: count_status(readings, DeviceStatus::Error),
            warning_count: count_status(readings, DeviceStatus::Warning),
        })
    }
}

fn count_status(readings: &[Reading], status: DeviceStatus) -> usize {
    readings.iter().filter(|r| r.status == status).count()
}

/// Round half away from zero to `digits` decimal places.
pub fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}

/// Readings of one device over a time span together with their statistics.
#[derive(Debug, Clone)]
pub struct IndustrialReport {
    pub device_id: DeviceId,
    pub device_name: String,
    pub generated_at: DateTime<Utc>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub summary: Option<ReportSummary>,
    pub readings: Vec<Reading>,
}

/// Entry of the "recent exports" list.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportHistoryItem {
    pub file_name: String,
    pub full_path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub device_id: DeviceId,
}
