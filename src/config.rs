//! Configuration loading and management

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::link::{LinkSettings, PeerScript, SERVICE_UUID};
use crate::state::{Mode, Timing};

/// Env var naming an optional JSON config file
const CONFIG_ENV: &str = "SONAFLOW_CONFIG";

/// Env var overriding the data directory
const DATA_DIR_ENV: &str = "SONAFLOW_DATA_DIR";

/// Daemon configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory for runtime data (feature log)
    pub data_dir: PathBuf,

    /// Name advertised to peers
    pub device_name: String,

    /// Raw identifier of the first mode entered after bring-up
    pub initial_mode: u8,

    /// Outbound frame queue slots
    pub queue_capacity: usize,

    pub enqueue_timeout_ms: u64,
    pub stream_interval_ms: u64,
    pub idle_poll_ms: u64,
    pub connected_idle_delay_ms: u64,
    pub heartbeat_ms: u64,

    /// Simulated hardware
    pub simulation: SimulationConfig,
}

/// Parameters of the simulated microphone and peer
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub tone_hz: f64,
    pub envelope_secs: f64,
    pub connect_after_ms: u64,
    pub session_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            device_name: "SonaFlow".to_string(),
            initial_mode: Mode::WaitingForConnection as u8,
            queue_capacity: 10,
            enqueue_timeout_ms: 100,
            stream_interval_ms: 20,
            idle_poll_ms: 100,
            connected_idle_delay_ms: 10,
            heartbeat_ms: 500,
            simulation: SimulationConfig::default(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tone_hz: 440.0,
            envelope_secs: 4.0,
            connect_after_ms: 1500,
            session_ms: 10_000,
        }
    }
}

fn default_data_dir() -> PathBuf {
    let home = std::env::var_os("HOME").unwrap_or_else(|| ".".into());
    PathBuf::from(home)
        .join(".local")
        .join("share")
        .join("sonaflow")
}

impl Config {
    /// Load configuration from defaults, the optional config file and
    /// environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };

        if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
            config.data_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file; absent fields keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json(&contents)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            bail!("queue_capacity must be at least 1");
        }
        if self.device_name.is_empty() {
            bail!("device_name must not be empty");
        }
        Ok(())
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }

    /// Path of the CSV feature log
    pub fn feature_log_path(&self) -> PathBuf {
        self.data_dir.join("audio_log.csv")
    }

    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            device_name: self.device_name.clone(),
            service_uuid: SERVICE_UUID,
            queue_capacity: self.queue_capacity,
            enqueue_timeout: Duration::from_millis(self.enqueue_timeout_ms),
        }
    }

    pub fn timing(&self) -> Timing {
        Timing {
            stream_interval: Duration::from_millis(self.stream_interval_ms),
            idle_poll: Duration::from_millis(self.idle_poll_ms),
            connected_idle_delay: Duration::from_millis(self.connected_idle_delay_ms),
            heartbeat: Duration::from_millis(self.heartbeat_ms),
        }
    }

    pub fn peer_script(&self) -> PeerScript {
        PeerScript {
            connect_after: Duration::from_millis(self.simulation.connect_after_ms),
            session: Duration::from_millis(self.simulation.session_ms),
        }
    }
}
