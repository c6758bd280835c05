use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::battery::DEFAULT_SUPPLY_PATH;
use crate::template::DEFAULT_MAX_COMMAND_LEN;

pub const DEFAULT_WARN_MINUTES: u32 = 25;
pub const DEFAULT_SHUTDOWN_MINUTES: u32 = 5;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

pub const DEFAULT_WARN_COMMAND: &str = r#"yad --image=gnome-shutdown --fixed --button gtk-ok:0 --text "<b>Critical Battery Status</b>\nThe system battery currently has <b>$battery_minutes</b> remaining \nand will automatically shutdown in <b>$shutdown_minutes</b>.""#;
pub const DEFAULT_SHUTDOWN_COMMAND: &str = "systemctl poweroff";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub commands: CommandConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub power: PowerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    #[serde(default = "default_warn_minutes")]
    pub warn_minutes: u32,
    #[serde(default = "default_shutdown_minutes")]
    pub shutdown_minutes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    #[serde(default = "default_warn_command")]
    pub warn: String,
    #[serde(default = "default_shutdown_command")]
    pub shutdown: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_command_len")]
    pub max_command_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerConfig {
    #[serde(default = "default_supply_path")]
    pub supply_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<String>,
}

// Defaults

fn default_warn_minutes() -> u32 { DEFAULT_WARN_MINUTES }
fn default_shutdown_minutes() -> u32 { DEFAULT_SHUTDOWN_MINUTES }
fn default_warn_command() -> String { DEFAULT_WARN_COMMAND.into() }
fn default_shutdown_command() -> String { DEFAULT_SHUTDOWN_COMMAND.into() }
fn default_poll_interval() -> u64 { DEFAULT_POLL_INTERVAL_SECS }
fn default_max_command_len() -> usize { DEFAULT_MAX_COMMAND_LEN }
fn default_supply_path() -> PathBuf { PathBuf::from(DEFAULT_SUPPLY_PATH) }

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            warn_minutes: default_warn_minutes(),
            shutdown_minutes: default_shutdown_minutes(),
        }
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            warn: default_warn_command(),
            shutdown: default_shutdown_command(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            max_command_len: default_max_command_len(),
        }
    }
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            supply_path: default_supply_path(),
            battery: None,
        }
    }
}

/// Validated runtime settings. Fixed for the life of the process.
#[derive(Debug, Clone)]
pub struct Settings {
    pub warn_minutes: u32,
    pub shutdown_minutes: u32,
    pub warn_command: String,
    pub shutdown_command: String,
    pub verbose: bool,
    pub poll_interval: Duration,
    pub max_command_len: usize,
    pub supply_path: PathBuf,
    pub battery: Option<String>,
}

impl Settings {
    pub fn new(config: &DaemonConfig, verbose: bool) -> Result<Self> {
        anyhow::ensure!(
            config.thresholds.warn_minutes >= 1,
            "Illegal warn threshold: {} (must be at least 1 minute)",
            config.thresholds.warn_minutes
        );
        anyhow::ensure!(
            config.thresholds.shutdown_minutes >= 1,
            "Illegal shutdown threshold: {} (must be at least 1 minute)",
            config.thresholds.shutdown_minutes
        );
        anyhow::ensure!(
            config.monitor.poll_interval_secs >= 1,
            "Illegal poll interval: {} (must be at least 1 second)",
            config.monitor.poll_interval_secs
        );
        anyhow::ensure!(config.monitor.max_command_len > 0, "max_command_len must be positive");
        anyhow::ensure!(!config.commands.warn.trim().is_empty(), "Warn command is empty");
        anyhow::ensure!(!config.commands.shutdown.trim().is_empty(), "Shutdown command is empty");

        if config.thresholds.shutdown_minutes > config.thresholds.warn_minutes {
            log::warn!(
                "Shutdown threshold ({}) is above warn threshold ({}); shutdown may run without a warning",
                config.thresholds.shutdown_minutes,
                config.thresholds.warn_minutes
            );
        }

        Ok(Self {
            warn_minutes: config.thresholds.warn_minutes,
            shutdown_minutes: config.thresholds.shutdown_minutes,
            warn_command: config.commands.warn.clone(),
            shutdown_command: config.commands.shutdown.clone(),
            verbose,
            poll_interval: Duration::from_secs(config.monitor.poll_interval_secs),
            max_command_len: config.monitor.max_command_len,
            supply_path: config.power.supply_path.clone(),
            battery: config.power.battery.clone(),
        })
    }
}

pub fn default_config_path() -> PathBuf {
    dirs_path().join("config.toml")
}

fn dirs_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
            PathBuf::from(home).join(".config")
        });
    base.join("lowbatd")
}

pub fn load_config(path: &Path) -> Result<DaemonConfig> {
    if !path.exists() {
        log::info!("Config file not found at {}, generating default", path.display());
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match std::fs::write(path, generate_default_config()) {
            Ok(()) => log::info!("Created default config at {}", path.display()),
            Err(e) => log::warn!("Failed to write default config: {}", e),
        }
        return Ok(DaemonConfig::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let config: DaemonConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;
    Ok(config)
}

fn generate_default_config() -> String {
    format!(
        r#"# lowbatd - low battery daemon
# Configuration file, generated automatically on first run.
# Command line flags override these values.

[thresholds]
# Run the warn command once when this many minutes (or fewer) remain
warn_minutes = {warn}
# Run the shutdown command and exit at this many minutes
shutdown_minutes = {shutdown}

[commands]
# Run with /bin/sh -c. $battery_minutes and $shutdown_minutes are
# replaced with e.g. "12 minutes" in the warn command.
warn = '{warn_cmd}'
shutdown = '{shutdown_cmd}'

[monitor]
# Seconds between battery polls
poll_interval_secs = {interval}
# Longest expanded warn command accepted, in bytes
max_command_len = {max_len}

[power]
# sysfs power_supply class directory
supply_path = "{supply}"
# Battery to watch (default: first supply of type Battery)
# battery = "BAT0"
"#,
        warn = DEFAULT_WARN_MINUTES,
        shutdown = DEFAULT_SHUTDOWN_MINUTES,
        warn_cmd = DEFAULT_WARN_COMMAND,
        shutdown_cmd = DEFAULT_SHUTDOWN_COMMAND,
        interval = DEFAULT_POLL_INTERVAL_SECS,
        max_len = DEFAULT_MAX_COMMAND_LEN,
        supply = DEFAULT_SUPPLY_PATH,
    )
}
