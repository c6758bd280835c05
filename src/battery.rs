use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SUPPLY_PATH: &str = "/sys/class/power_supply";

/// Reported in `minutes_remaining` when no estimate is available.
pub const UNKNOWN_MINUTES: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerStatus {
    pub on_ac_power: bool,
    pub battery_percent: u8,
    pub minutes_remaining: i32,
}

/// Something the monitor can poll for the current power state.
pub trait PowerSource {
    fn read(&mut self) -> Result<PowerStatus>;
}

/// Reads battery and adapter state from a sysfs `power_supply` class directory.
#[derive(Debug)]
pub struct SysfsPower {
    supply_dir: PathBuf,
    battery: PathBuf,
}

impl SysfsPower {
    /// Locate the battery to watch: `name` if given, otherwise the first supply
    /// (by name) whose type is `Battery`. Paths are made absolute, since the
    /// daemon changes directory to `/` after discovery.
    pub fn discover(supply_dir: &Path, name: Option<&str>) -> Result<Self> {
        let supply_dir = &fs::canonicalize(supply_dir)
            .with_context(|| format!("Failed to resolve {}", supply_dir.display()))?;

        if let Some(name) = name {
            let battery = supply_dir.join(name);
            anyhow::ensure!(
                battery.is_dir(),
                "Battery {} not found under {}",
                name,
                supply_dir.display()
            );
            return Ok(Self { supply_dir: supply_dir.to_path_buf(), battery });
        }

        for path in supply_entries(supply_dir)? {
            if read_trimmed(&path.join("type")).as_deref() == Some("Battery") {
                return Ok(Self { supply_dir: supply_dir.to_path_buf(), battery: path });
            }
        }

        anyhow::bail!("No battery found under {}", supply_dir.display())
    }

    pub fn battery_path(&self) -> &Path {
        &self.battery
    }

    /// `Some(online)` if any mains or USB adapter is present.
    fn adapter_online(&self) -> Result<Option<bool>> {
        let mut found = None;
        for path in supply_entries(&self.supply_dir)? {
            let Some(typ) = read_trimmed(&path.join("type")) else { continue };
            if typ != "Mains" && !typ.starts_with("USB") {
                continue;
            }
            let online = read_trimmed(&path.join("online")).as_deref() == Some("1");
            if online {
                return Ok(Some(true));
            }
            found = Some(false);
        }
        Ok(found)
    }
}

impl PowerSource for SysfsPower {
    fn read(&mut self) -> Result<PowerStatus> {
        let capacity = self.battery.join("capacity");
        let percent: u8 = fs::read_to_string(&capacity)
            .with_context(|| format!("Failed to read {}", capacity.display()))?
            .trim()
            .parse()
            .with_context(|| format!("Failed to parse {}", capacity.display()))?;

        let status_file = self.battery.join("status");
        let status = fs::read_to_string(&status_file)
            .with_context(|| format!("Failed to read {}", status_file.display()))?;

        let on_ac_power = match self.adapter_online()? {
            Some(online) => online,
            None => matches!(status.trim(), "Charging" | "Full"),
        };

        Ok(PowerStatus {
            on_ac_power,
            battery_percent: percent.min(100),
            minutes_remaining: estimate_minutes(&self.battery),
        })
    }
}

fn supply_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?;
    let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    paths.sort();
    Ok(paths)
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

fn read_number(path: &Path) -> Option<i64> {
    read_trimmed(path)?.parse::<i64>().ok().map(i64::abs)
}

/// Minutes until empty, from the driver's own estimate or from the
/// remaining energy (charge) divided by the current draw.
fn estimate_minutes(battery: &Path) -> i32 {
    if let Some(secs) = read_number(&battery.join("time_to_empty_now")).filter(|s| *s > 0) {
        return clamp_minutes(secs / 60);
    }

    for (amount, rate) in [("energy_now", "power_now"), ("charge_now", "current_now")] {
        let (Some(amount), Some(rate)) = (read_number(&battery.join(amount)), read_number(&battery.join(rate)))
        else {
            continue;
        };
        if rate == 0 {
            return UNKNOWN_MINUTES;
        }
        return clamp_minutes(amount.saturating_mul(60) / rate);
    }

    UNKNOWN_MINUTES
}

fn clamp_minutes(minutes: i64) -> i32 {
    minutes.min(i64::from(i32::MAX)) as i32
}
