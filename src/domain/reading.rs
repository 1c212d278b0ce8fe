// Telemetry reading domain model
use super::device::DeviceId;
use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceStatus {
    Stopped,
    Running,
    Warning,
    Error,
}

impl DeviceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceStatus::Stopped => "Stopped",
            DeviceStatus::Running => "Running",
            DeviceStatus::Warning => "Warning",
            DeviceStatus::Error => "Error",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sensor sample of a conveyor belt.
///
/// Readings are values: they are built once by the generator and only ever
/// copied afterwards, never edited in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub device_id: DeviceId,
    pub device_name: String,
    /// Belt speed in m/s.
    pub speed: f64,
    /// Conveyed mass rate in t/h.
    pub throughput: f64,
    pub timestamp: DateTime<Utc>,
    pub status: DeviceStatus,
    /// Drive temperature in °C.
    pub temperature: Option<f64>,
}

impl Reading {
    pub fn new(
        device_id: DeviceId,
        device_name: String,
        speed: f64,
        throughput: f64,
        timestamp: DateTime<Utc>,
        status: DeviceStatus,
        temperature: Option<f64>,
    ) -> Self {
        Self {
            device_id,
            device_name,
            speed,
            throughput,
            timestamp,
            status,
            temperature,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    /// Running reading for `device` at `minute` minutes past a fixed epoch.
    pub fn reading_at(device: &str, minute: i64, speed: f64, throughput: f64) -> Reading {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        Reading::new(
            DeviceId::new(device),
            format!("{device} name"),
            speed,
            throughput,
            base + chrono::Duration::minutes(minute),
            DeviceStatus::Running,
            Some(50.0),
        )
    }
}
