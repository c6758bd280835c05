use anyhow::{Context, Result};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::ffi::{CStr, CString};

const SYSLOG_IDENT: &CStr = c"lowbatd";

/// Install the process logger: env_logger on stderr when running in the
/// foreground, syslog otherwise.
pub fn init(verbose: bool) -> Result<()> {
    if verbose {
        verbose_builder().init();
        return Ok(());
    }

    // SAFETY: the ident is a 'static C string, as openlog requires.
    unsafe { libc::openlog(SYSLOG_IDENT.as_ptr(), libc::LOG_PID, libc::LOG_DAEMON) };
    log::set_boxed_logger(Box::new(SyslogLogger)).context("Failed to install syslog logger")?;
    log::set_max_level(LevelFilter::Info);
    Ok(())
}

fn verbose_builder() -> env_logger::Builder {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.target(env_logger::Target::Stderr);
    builder
}

/// Tell the operator about something that happened. Reports are logged at
/// error level, which syslog receives as an alert.
pub fn report(message: impl std::fmt::Display) {
    log::error!("{}", message);
}

/// `log` backend writing to the system log.
pub struct SyslogLogger;

fn syslog_priority(level: Level) -> libc::c_int {
    match level {
        Level::Error => libc::LOG_ALERT,
        Level::Warn => libc::LOG_WARNING,
        Level::Info => libc::LOG_INFO,
        Level::Debug | Level::Trace => libc::LOG_DEBUG,
    }
}

fn syslog_message(record: &Record) -> CString {
    let text = record.args().to_string().replace('\0', "");
    CString::new(text).unwrap_or_default()
}

impl Log for SyslogLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = syslog_message(record);
        // SAFETY: both pointers are valid NUL-terminated strings for the call.
        unsafe { libc::syslog(syslog_priority(record.level()), c"%s".as_ptr(), message.as_ptr()) };
    }

    fn flush(&self) {}
}

/// In-process logger for tests that assert on emitted records.
#[cfg(test)]
pub(crate) mod capture {
    use log::{Level, LevelFilter, Log, Metadata, Record};
    use std::sync::{Mutex, Once};

    static LINES: Mutex<Vec<(Level, String)>> = Mutex::new(Vec::new());
    static LOGGER: CaptureLogger = CaptureLogger;

    struct CaptureLogger;

    impl Log for CaptureLogger {
        fn enabled(&self, _: &Metadata) -> bool {
            true
        }

        fn log(&self, record: &Record) {
            if let Ok(mut lines) = LINES.lock() {
                lines.push((record.level(), record.args().to_string()));
            }
        }

        fn flush(&self) {}
    }

    pub fn install() {
        static ONCE: Once = Once::new();
        ONCE.call_once(|| {
            let _ = log::set_logger(&LOGGER);
            log::set_max_level(LevelFilter::Trace);
        });
    }

    pub fn lines_containing(needle: &str) -> Vec<(Level, String)> {
        LINES
            .lock()
            .map(|lines| lines.iter().filter(|(_, l)| l.contains(needle)).cloned().collect())
            .unwrap_or_default()
    }
}
