use std::time::Duration;
use thiserror::Error;

use crate::battery::{PowerSource, PowerStatus};
use crate::config::Settings;
use crate::exec::CommandLauncher;
use crate::logging::report;
use crate::template::{compose_warn_command, minutes_text};

/// Minutes above the warn threshold the battery must recover to before
/// another warning can fire.
pub const REARM_MARGIN_MINUTES: i64 = 10;

/// Whether the warn command has already run for the current low-battery episode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WarnState {
    #[default]
    Armed,
    Warned,
}

/// What a single poll decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    OnAc,
    Warned,
    Shutdown,
    Rearmed,
    Idle,
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("can't read power status: {0:#}")]
    PowerRead(anyhow::Error),
}

pub struct Monitor<P, L> {
    settings: Settings,
    power: P,
    launcher: L,
    state: WarnState,
}

impl<P: PowerSource, L: CommandLauncher> Monitor<P, L> {
    pub fn new(settings: Settings, power: P, launcher: L) -> Self {
        Self {
            settings,
            power,
            launcher,
            state: WarnState::Armed,
        }
    }

    /// Poll until the shutdown command has been issued. A failed power read
    /// is reported and ends the loop with an error.
    pub fn run(&mut self) -> Result<(), MonitorError> {
        self.run_with(std::thread::sleep)
    }

    fn run_with(&mut self, mut sleep: impl FnMut(Duration)) -> Result<(), MonitorError> {
        loop {
            match self.tick() {
                Ok(TickOutcome::Shutdown) => return Ok(()),
                Ok(_) => {}
                Err(e) => {
                    report(&e);
                    return Err(e);
                }
            }
            sleep(self.settings.poll_interval);
        }
    }

    pub fn tick(&mut self) -> Result<TickOutcome, MonitorError> {
        let status = self.power.read().map_err(MonitorError::PowerRead)?;
        Ok(self.evaluate(&status))
    }

    fn evaluate(&mut self, status: &PowerStatus) -> TickOutcome {
        if status.on_ac_power {
            return TickOutcome::OnAc;
        }

        if self.settings.verbose {
            log::info!(
                "low battery ({}%), off AC, {} remaining",
                status.battery_percent,
                minutes_text(status.minutes_remaining)
            );
        }

        let minutes = i64::from(status.minutes_remaining);
        let warn = i64::from(self.settings.warn_minutes);
        let shutdown = i64::from(self.settings.shutdown_minutes);

        if minutes <= warn && self.state == WarnState::Armed {
            self.state = WarnState::Warned;
            self.warn(status);
            TickOutcome::Warned
        } else if minutes <= shutdown {
            report(format!(
                "minutes remaining below {}, running shutdown command: {}",
                shutdown, self.settings.shutdown_command
            ));
            if let Err(e) = self.launcher.launch(&self.settings.shutdown_command) {
                report(format!("failed to start {}: {}", self.settings.shutdown_command, e));
            }
            TickOutcome::Shutdown
        } else if minutes >= warn + REARM_MARGIN_MINUTES {
            if self.state == WarnState::Warned {
                log::info!("Battery recovered to {} minutes, warning re-armed", minutes);
            }
            self.state = WarnState::Armed;
            TickOutcome::Rearmed
        } else {
            TickOutcome::Idle
        }
    }

    fn warn(&mut self, status: &PowerStatus) {
        let command = match compose_warn_command(
            &self.settings.warn_command,
            status,
            self.settings.shutdown_minutes,
            self.settings.max_command_len,
        ) {
            Ok(command) => command,
            Err(e) => {
                report(format!("can't build warn command: {}", e));
                return;
            }
        };

        report(format!(
            "minutes remaining below {}, running warn command: {}",
            self.settings.warn_minutes, command
        ));
        if let Err(e) = self.launcher.launch(&command) {
            report(format!("failed to start {}: {}", command, e));
        }
    }
}
