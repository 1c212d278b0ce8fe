// Conveyor belt device domain model
use serde::Deserialize;
use std::fmt;

/// Stable identifier of a conveyor belt, e.g. `BELT-001`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Load class of a belt; decides the nominal speed and throughput.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceProfile {
    #[default]
    Standard,
    Light,
}

impl DeviceProfile {
    /// Nominal belt speed in m/s.
    pub fn base_speed(self) -> f64 {
        match self {
            DeviceProfile::Standard => 2.0,
            DeviceProfile::Light => 1.5,
        }
    }

    /// Nominal throughput in t/h.
    pub fn base_throughput(self) -> f64 {
        match self {
            DeviceProfile::Standard => 200.0,
            DeviceProfile::Light => 150.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub profile: DeviceProfile,
}

impl Device {
    pub fn new(id: impl Into<DeviceId>, name: impl Into<String>, profile: DeviceProfile) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            profile,
        }
    }

    /// Label used in report headers: "Main Belt A (BELT-001)".
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            return self.id.to_string();
        }
        format!("{} ({})", self.name, self.id)
    }
}

/// The three belts of the reference deployment.
pub fn reference_devices() -> Vec<Device> {
    vec![
        Device::new("BELT-001", "Main Belt A", DeviceProfile::Standard),
        Device::new("BELT-002", "Main Belt B", DeviceProfile::Standard),
        Device::new("BELT-003", "Auxiliary Belt C", DeviceProfile::Light),
    ]
}
