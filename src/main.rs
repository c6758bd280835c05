mod battery;
mod config;
mod exec;
mod logging;
mod monitor;
mod template;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::battery::SysfsPower;
use crate::config::{DaemonConfig, Settings};
use crate::exec::ShellLauncher;
use crate::monitor::Monitor;

#[derive(Parser, Debug)]
#[command(name = "lowbatd", version, about = "Run a warning, then shut down, when the battery runs low")]
pub struct Cli {
    /// Stay in the foreground and log to stderr
    #[arg(short = 'v')]
    verbose: bool,

    /// Minutes remaining at which the shutdown command runs
    #[arg(short = 's', value_name = "MINUTES", value_parser = clap::value_parser!(u32).range(1..))]
    shutdown_minutes: Option<u32>,

    /// Shutdown command
    #[arg(short = 'S', value_name = "COMMAND")]
    shutdown_command: Option<String>,

    /// Minutes remaining at which the warn command runs
    #[arg(short = 'w', value_name = "MINUTES", value_parser = clap::value_parser!(u32).range(1..))]
    warn_minutes: Option<u32>,

    /// Warn command; $battery_minutes and $shutdown_minutes are expanded
    #[arg(short = 'W', value_name = "TEMPLATE")]
    warn_command: Option<String>,

    /// Seconds between battery polls
    #[arg(short = 'i', long = "interval", value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    interval: Option<u64>,

    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Generate shell completions and exit
    #[arg(long, value_name = "SHELL")]
    completions: Option<Shell>,
}

fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Usage errors exit 1; --help and --version exit 0.
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    run_daemon(cli)
}

fn run_daemon(args: Cli) -> Result<()> {
    logging::init(args.verbose)?;

    if let Some(shell) = args.completions {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "lowbatd", &mut std::io::stdout());
        return Ok(());
    }

    let config_path = args.config.clone().unwrap_or_else(config::default_config_path);
    let mut config = config::load_config(&config_path)?;
    apply_overrides(&args, &mut config);

    if args.print_config {
        print!("{}", toml::to_string(&config).context("Failed to serialize config")?);
        return Ok(());
    }

    let settings = Settings::new(&config, args.verbose)?;
    let power = SysfsPower::discover(&settings.supply_path, settings.battery.as_deref())?;
    log::info!("Watching battery {}", power.battery_path().display());

    if !settings.verbose {
        nix::unistd::daemon(false, false).context("Failed to daemonize")?;
    }

    log::info!(
        "Starting lowbatd: warn at {} minutes, shutdown at {} minutes, polling every {:?}",
        settings.warn_minutes,
        settings.shutdown_minutes,
        settings.poll_interval
    );

    Monitor::new(settings, power, ShellLauncher).run()?;

    Ok(())
}

fn apply_overrides(args: &Cli, config: &mut DaemonConfig) {
    if let Some(minutes) = args.shutdown_minutes {
        config.thresholds.shutdown_minutes = minutes;
    }
    if let Some(minutes) = args.warn_minutes {
        config.thresholds.warn_minutes = minutes;
    }
    if let Some(command) = &args.shutdown_command {
        config.commands.shutdown = command.clone();
    }
    if let Some(template) = &args.warn_command {
        config.commands.warn = template.clone();
    }
    if let Some(secs) = args.interval {
        config.monitor.poll_interval_secs = secs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "lowbatd", "-v", "-s", "3", "-w", "15", "-S", "poweroff", "-W", "echo $battery_minutes", "-i", "30",
        ])
        .unwrap();
        assert!(cli.verbose);

        let mut config = DaemonConfig::default();
        apply_overrides(&cli, &mut config);
        assert_eq!(config.thresholds.shutdown_minutes, 3);
        assert_eq!(config.thresholds.warn_minutes, 15);
        assert_eq!(config.commands.shutdown, "poweroff");
        assert_eq!(config.commands.warn, "echo $battery_minutes");
        assert_eq!(config.monitor.poll_interval_secs, 30);
    }

    #[test]
    fn no_flags_keep_config() {
        let cli = Cli::try_parse_from(["lowbatd"]).unwrap();
        let mut config = DaemonConfig::default();
        config.thresholds.warn_minutes = 40;
        apply_overrides(&cli, &mut config);
        assert_eq!(config.thresholds.warn_minutes, 40);
        assert_eq!(config.commands.shutdown, config::DEFAULT_SHUTDOWN_COMMAND);
    }

    #[test]
    fn illegal_thresholds_are_usage_errors() {
        for argv in [
            ["lowbatd", "-s", "0"],
            ["lowbatd", "-w", "0"],
            ["lowbatd", "-w", "-4"],
            ["lowbatd", "-s", "5x"],
            ["lowbatd", "-i", "0"],
        ] {
            let err = Cli::try_parse_from(argv).unwrap_err();
            assert!(err.use_stderr(), "{argv:?} should be rejected");
        }
    }

    #[test]
    fn unknown_flag_is_a_usage_error() {
        let err = Cli::try_parse_from(["lowbatd", "-x"]).unwrap_err();
        assert!(err.use_stderr());
    }

    #[test]
    fn help_is_not_an_error_exit() {
        let err = Cli::try_parse_from(["lowbatd", "--help"]).unwrap_err();
        assert!(!err.use_stderr());
    }
}
