// Reading generator - Synthetic conveyor telemetry
use crate::domain::device::Device;
use crate::domain::reading::{DeviceStatus, Reading};
use crate::domain::report::round_to;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use std::sync::{Mutex, PoisonError};

const NOISE_FRACTION: f64 = 0.1;
const WARNING_PROBABILITY: f64 = 0.02;
const ERROR_PROBABILITY: f64 = 0.01;
const TEMPERATURE_FLOOR: f64 = 45.0;
const TEMPERATURE_SPAN: f64 = 15.0;

/// How the status of a reading is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusModel {
    /// One draw: 2% Warning, 1% Error, otherwise Running.
    #[default]
    Categorical,
    /// Warning on a first draw below 2%, else Error on a fresh second draw
    /// below 1%, so Error lands on slightly under 1% of readings.
    Independent,
}

pub struct ReadingGenerator {
    rng: Mutex<StdRng>,
    status_model: StatusModel,
}

impl ReadingGenerator {
    pub fn new(status_model: StatusModel, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            rng: Mutex::new(rng),
            status_model,
        }
    }

    pub fn status_model(&self) -> StatusModel {
        self.status_model
    }

    /// Generate one reading for `device` stamped with `timestamp`.
    pub fn generate(&self, device: &Device, timestamp: DateTime<Utc>) -> Reading {
        let base_speed = device.profile.base_speed();
        let base_throughput = device.profile.base_throughput();

        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);

        let speed = base_speed * (1.0 + rng.random_range(-NOISE_FRACTION..NOISE_FRACTION));
        let throughput =
            base_throughput * (1.0 + rng.random_range(-NOISE_FRACTION..NOISE_FRACTION));
        let status = self.draw_status(&mut *rng);
        let temperature = TEMPERATURE_FLOOR + rng.random::<f64>() * TEMPERATURE_SPAN;

        Reading::new(
            device.id.clone(),
            device.name.clone(),
            round_to(speed, 2),
            round_to(throughput, 1),
            timestamp,
            status,
            Some(round_to(temperature, 1)),
        )
    }

    fn draw_status(&self, rng: &mut StdRng) -> DeviceStatus {
        match self.status_model {
            StatusModel::Categorical => {
                let draw = rng.random::<f64>();
                if draw < WARNING_PROBABILITY {
                    DeviceStatus::Warning
                } else if draw < WARNING_PROBABILITY + ERROR_PROBABILITY {
                    DeviceStatus::Error
                } else {
                    DeviceStatus::Running
                }
            }
            StatusModel::Independent => {
                if rng.random::<f64>() < WARNING_PROBABILITY {
                    DeviceStatus::Warning
                } else if rng.random::<f64>() < ERROR_PROBABILITY {
                    DeviceStatus::Error
                } else {
                    DeviceStatus::Running
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::device::reference_devices;
    use std::collections::HashMap;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_values_stay_within_profile_bounds() {
        for model in [StatusModel::Categorical, StatusModel::Independent] {
            let generator = ReadingGenerator::new(model, Some(42));
            for device in reference_devices() {
                let base_speed = device.profile.base_speed();
                let base_throughput = device.profile.base_throughput();
                for _ in 0..2_000 {
                    let reading = generator.generate(&device, Utc::now());
                    assert!(reading.speed >= base_speed * 0.9 - EPSILON);
                    assert!(reading.speed <= base_speed * 1.1 + EPSILON);
                    assert!(reading.throughput >= base_throughput * 0.9 - EPSILON);
                    assert!(reading.throughput <= base_throughput * 1.1 + EPSILON);

                    let temperature = reading.temperature.expect("temperature always present");
                    assert!((45.0..=60.0).contains(&temperature));
                    assert_ne!(reading.status, DeviceStatus::Stopped);
                }
            }
        }
    }

    #[test]
    fn test_values_are_rounded() {
        let generator = ReadingGenerator::new(StatusModel::Categorical, Some(3));
        let device = &reference_devices()[0];
        for _ in 0..200 {
            let reading = generator.generate(device, Utc::now());
            assert!((reading.speed * 100.0 - (reading.speed * 100.0).round()).abs() < 1e-6);
            assert!((reading.throughput * 10.0 - (reading.throughput * 10.0).round()).abs() < 1e-6);
        }
    }

    #[test]
    fn test_same_seed_same_readings() {
        let device = &reference_devices()[1];
        let timestamp = Utc::now();
        let a = ReadingGenerator::new(StatusModel::Independent, Some(11));
        let b = ReadingGenerator::new(StatusModel::Independent, Some(11));
        for _ in 0..50 {
            assert_eq!(a.generate(device, timestamp), b.generate(device, timestamp));
        }
    }

    #[test]
    fn test_reading_carries_device_identity() {
        let generator = ReadingGenerator::new(StatusModel::Categorical, Some(5));
        let device = &reference_devices()[2];
        let timestamp = Utc::now();
        let reading = generator.generate(device, timestamp);
        assert_eq!(reading.device_id, device.id);
        assert_eq!(reading.device_name, "Auxiliary Belt C");
        assert_eq!(reading.timestamp, timestamp);
    }

    #[test]
    fn test_status_is_mostly_running() {
        let generator = ReadingGenerator::new(StatusModel::Categorical, Some(99));
        let device = &reference_devices()[0];
        let mut counts: HashMap<DeviceStatus, usize> = HashMap::new();
        for _ in 0..20_000 {
            *counts.entry(generator.generate(device, Utc::now()).status).or_default() += 1;
        }
        let running = counts.get(&DeviceStatus::Running).copied().unwrap_or_default();
        let warning = counts.get(&DeviceStatus::Warning).copied().unwrap_or_default();
        let error = counts.get(&DeviceStatus::Error).copied().unwrap_or_default();

        assert!(running > 19_000, "running = {running}");
        assert!((200..=600).contains(&warning), "warning = {warning}");
        assert!((80..=350).contains(&error), "error = {error}");
    }
}
