use std::io;
use std::process::{Command, Stdio};

/// Starts shell commands on behalf of the monitor.
pub trait CommandLauncher {
    /// Start `command` and return as soon as it is running.
    fn launch(&mut self, command: &str) -> io::Result<()>;
}

/// Runs commands through `/bin/sh -c`, detached from the daemon.
#[derive(Debug, Default)]
pub struct ShellLauncher;

impl CommandLauncher for ShellLauncher {
    fn launch(&mut self, command: &str) -> io::Result<()> {
        let child = Command::new("/bin/sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        log::debug!("Started pid {} for: {}", child.id(), command);
        // Unsupervised: never waited on.
        drop(child);
        Ok(())
    }
}
