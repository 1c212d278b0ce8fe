use crate::application::reading_generator::StatusModel;
use crate::domain::device::{Device, DeviceId, DeviceProfile, reference_devices};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

pub const PEPPER_ENV_VAR: &str = "INDUSTRIAL_PANEL_SEED";
pub const FALLBACK_PEPPER: &str = "DefaultPepper_v1";

#[derive(Debug, Deserialize, Clone)]
pub struct PanelConfig {
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default = "default_devices")]
    pub devices: Vec<DeviceConfig>,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub operator: OperatorSettings,
    #[serde(default)]
    pub export: ExportSettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EngineSettings {
    pub tick_interval_ms: u64,
    pub lookback_hours: u32,
    pub seed_interval_minutes: u32,
    pub window_capacity: usize,
    pub window_seed_hours: u32,
    pub status_model: StatusModel,
    pub rng_seed: Option<u64>,
    pub broadcast_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 2000,
            lookback_hours: 24,
            seed_interval_minutes: 5,
            window_capacity: 240,
            window_seed_hours: 12,
            status_model: StatusModel::default(),
            rng_seed: None,
            broadcast_capacity: 256,
        }
    }
}

impl EngineSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub profile: DeviceProfile,
}

impl DeviceConfig {
    pub fn to_device(&self) -> Device {
        Device::new(self.id.as_str(), self.name.clone(), self.profile)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthSettings {
    pub pepper: Option<String>,
    #[serde(default = "default_users")]
    pub users: Vec<UserConfig>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            pepper: None,
            users: default_users(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct UserConfig {
    pub username: String,
    pub password: String,
    pub full_name: String,
    #[serde(default = "default_role")]
    pub role: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OperatorSettings {
    pub username: String,
    pub password: String,
    pub selected_device: String,
}

impl Default for OperatorSettings {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "admin123".to_string(),
            selected_device: "BELT-001".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExportSettings {
    pub directory: PathBuf,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("reports"),
        }
    }
}

fn default_devices() -> Vec<DeviceConfig> {
    reference_devices()
        .into_iter()
        .map(|d| DeviceConfig {
            id: d.id.to_string(),
            name: d.name,
            profile: d.profile,
        })
        .collect()
}

fn default_users() -> Vec<UserConfig> {
    vec![UserConfig {
        username: "admin".to_string(),
        password: "admin123".to_string(),
        full_name: "System Administrator".to_string(),
        role: "Administrator".to_string(),
    }]
}

fn default_role() -> String {
    "Operator".to_string()
}

impl PanelConfig {
    pub fn devices(&self) -> Vec<Device> {
        self.devices.iter().map(DeviceConfig::to_device).collect()
    }

    pub fn selected_device(&self) -> DeviceId {
        DeviceId::new(self.operator.selected_device.as_str())
    }

    /// Pepper precedence: config file or `PANEL_AUTH__PEPPER`, then
    /// `INDUSTRIAL_PANEL_SEED`, then the built-in fallback.
    pub fn resolve_pepper(&self) -> String {
        resolve_pepper(self.auth.pepper.clone(), std::env::var(PEPPER_ENV_VAR).ok())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let engine = &self.engine;
        anyhow::ensure!(!self.devices.is_empty(), "at least one device must be configured");
        anyhow::ensure!(engine.tick_interval_ms > 0, "tick_interval_ms must be positive");
        anyhow::ensure!(engine.window_capacity > 0, "window_capacity must be positive");
        anyhow::ensure!(engine.broadcast_capacity > 0, "broadcast_capacity must be positive");
        anyhow::ensure!(
            engine.seed_interval_minutes > 0
                && (engine.lookback_hours * 60) % engine.seed_interval_minutes == 0,
            "seed_interval_minutes ({}) must divide the {}h look-back window",
            engine.seed_interval_minutes,
            engine.lookback_hours
        );

        let mut seen = HashSet::new();
        for device in &self.devices {
            anyhow::ensure!(seen.insert(device.id.as_str()), "duplicate device id {}", device.id);
        }
        anyhow::ensure!(
            seen.contains(self.operator.selected_device.as_str()),
            "selected device {} is not configured",
            self.operator.selected_device
        );
        Ok(())
    }
}

fn resolve_pepper(configured: Option<String>, from_env: Option<String>) -> String {
    configured
        .filter(|p| !p.is_empty())
        .or(from_env.filter(|p| !p.is_empty()))
        .unwrap_or_else(|| FALLBACK_PEPPER.to_string())
}

pub fn load_panel_config() -> anyhow::Result<PanelConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/panel").required(false))
        .add_source(
            config::Environment::with_prefix("PANEL")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let panel: PanelConfig = settings.try_deserialize()?;
    panel.validate()?;
    Ok(panel)
}
