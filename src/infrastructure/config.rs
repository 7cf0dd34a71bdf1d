use crate::application::acquisition::AcquisitionSettings;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "config/monitor";
const ENV_PREFIX: &str = "MONITOR";

#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    pub http: HttpSettings,
    pub acquisition: AcquisitionConfig,
    pub window: WindowConfig,
    pub storage: StorageConfig,
    pub transport: TransportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpSettings {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AcquisitionConfig {
    pub poll_interval_ms: u64,
    pub reconnect_interval_ms: u64,
    pub max_reconnect_attempts: u32,
}

impl AcquisitionConfig {
    pub fn settings(&self) -> AcquisitionSettings {
        AcquisitionSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            reconnect_interval: Duration::from_millis(self.reconnect_interval_ms),
            max_reconnect_attempts: self.max_reconnect_attempts,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WindowConfig {
    pub time_frame_secs: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub selection_path: PathBuf,
    /// Root that every recording path requested over HTTP is resolved under.
    pub recordings_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Simulated,
    Replay,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TransportConfig {
    pub kind: TransportKind,
    #[serde(default)]
    pub replay_path: Option<PathBuf>,
}

/// Defaults, then `config/monitor.toml` if present, then `MONITOR__SECTION__KEY` variables.
pub fn load_monitor_config() -> anyhow::Result<MonitorConfig> {
    load_config_from(Path::new(CONFIG_FILE))
}

pub fn load_config_from(file: &Path) -> anyhow::Result<MonitorConfig> {
    let settings = config::Config::builder()
        .set_default("http.bind", "127.0.0.1:8080")?
        .set_default("acquisition.poll_interval_ms", 100)?
        .set_default("acquisition.reconnect_interval_ms", 1000)?
        .set_default("acquisition.max_reconnect_attempts", 30)?
        .set_default("window.time_frame_secs", 10)?
        .set_default("storage.selection_path", "device-monitor-selection.toml")?
        .set_default("storage.recordings_dir", "recordings")?
        .set_default("transport.kind", "simulated")?
        .add_source(config::File::from(file.to_path_buf()).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}
