use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::Level;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "off" => LogLevel::Off,
            "error" => LogLevel::Error,
            "warn" => LogLevel::Warn,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            _ => LogLevel::Info,
        }
    }

    pub fn as_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

/// Device-bus settings. The four entity paths are fixed (see `bus`); only
/// the service name varies between battery installations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub service: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            service: "com.victronenergy.battery.socketcan_can0".to_string(),
        }
    }
}

/// Where the energy indexes are checkpointed. The removable mount point is
/// preferred when it exists at startup; otherwise the working directory is
/// used for the lifetime of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub removable_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            removable_dir: PathBuf::from("/run/media/sda1"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    pub update_interval_ms: u64,
    pub log_level: LogLevel,
    pub bus: BusConfig,
    pub storage: StorageConfig,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 100,
            log_level: LogLevel::Info,
            bus: BusConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl UserConfig {
    pub fn load() -> Self {
        let path = config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        let _ = ensure_dirs();
        let path = config_path();
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        fs::write(path, content)
    }
}

pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("coulomb")
}

pub fn runtime_dir() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::cache_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("coulomb")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Zero-byte marker whose presence asks a running monitor to checkpoint and
/// exit. Lives in the runtime dir so `coulomb stop` agrees on the location
/// no matter where it is invoked from.
pub fn sentinel_path() -> PathBuf {
    runtime_dir().join("stop")
}

pub fn ensure_dirs() -> std::io::Result<()> {
    fs::create_dir_all(config_dir())?;
    fs::create_dir_all(runtime_dir())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = UserConfig::default();
        assert_eq!(config.update_interval_ms, 100);
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(
            config.bus.service,
            "com.victronenergy.battery.socketcan_can0"
        );
        assert_eq!(
            config.storage.removable_dir,
            PathBuf::from("/run/media/sda1")
        );
    }

    #[test]
    fn test_toml_round_trip() {
        let config = UserConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: UserConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.update_interval_ms, config.update_interval_ms);
        assert_eq!(parsed.bus.service, config.bus.service);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: UserConfig = toml::from_str("update_interval_ms = 250\n").unwrap();
        assert_eq!(parsed.update_interval_ms, 250);
        assert_eq!(parsed.log_level, LogLevel::Info);
        assert_eq!(
            parsed.storage.removable_dir,
            PathBuf::from("/run/media/sda1")
        );
    }

    #[test]
    fn test_log_level_from_str() {
        assert_eq!(LogLevel::from_str("debug"), LogLevel::Debug);
        assert_eq!(LogLevel::from_str("OFF"), LogLevel::Off);
        assert_eq!(LogLevel::from_str("bogus"), LogLevel::Info);
        assert!(LogLevel::Off.as_tracing_level().is_none());
    }
}
