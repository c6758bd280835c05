use thiserror::Error;

use crate::battery::PowerStatus;

/// Placeholder replaced with the estimated time until the battery is empty.
pub const BATTERY_MINUTES_TOKEN: &str = "$battery_minutes";
/// Placeholder replaced with the time left before the shutdown command runs.
pub const SHUTDOWN_MINUTES_TOKEN: &str = "$shutdown_minutes";

/// Default upper bound on an expanded command, in bytes.
pub const DEFAULT_MAX_COMMAND_LEN: usize = 4096;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExpandError {
    #[error("expanded command needs {needed} bytes, limit is {limit}")]
    BufferOverflow { limit: usize, needed: usize },
}

/// Replace every non-overlapping occurrence of `token` in `template`, scanning
/// left to right. Inserted text is never scanned again.
///
/// The result must fit in `limit` bytes; longer output is an error rather than
/// a truncated command.
pub fn expand(template: &str, token: &str, replacement: &str, limit: usize) -> Result<String, ExpandError> {
    let mut out = String::with_capacity(template.len());

    if token.is_empty() {
        out.push_str(template);
    } else {
        let mut rest = template;
        while let Some(pos) = rest.find(token) {
            out.push_str(&rest[..pos]);
            out.push_str(replacement);
            rest = &rest[pos + token.len()..];
        }
        out.push_str(rest);
    }

    if out.len() > limit {
        return Err(ExpandError::BufferOverflow { limit, needed: out.len() });
    }
    Ok(out)
}

/// "1 minute", otherwise "N minutes" (zero and negatives included).
pub fn minutes_text(minutes: i32) -> String {
    format!("{} minute{}", minutes, if minutes == 1 { "" } else { "s" })
}

/// Build the warn command from its template and the current reading.
pub fn compose_warn_command(
    template: &str,
    status: &PowerStatus,
    shutdown_minutes: u32,
    limit: usize,
) -> Result<String, ExpandError> {
    let battery_text = minutes_text(status.minutes_remaining);
    let intermediate = expand(template, BATTERY_MINUTES_TOKEN, &battery_text, limit)?;

    let shutdown_text = minutes_text(status.minutes_remaining.saturating_sub_unsigned(shutdown_minutes));
    expand(&intermediate, SHUTDOWN_MINUTES_TOKEN, &shutdown_text, limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discharging(minutes: i32) -> PowerStatus {
        PowerStatus { on_ac_power: false, battery_percent: 10, minutes_remaining: minutes }
    }

    #[test]
    fn absent_token_leaves_template_alone() {
        let t = "notify-send 'battery low'";
        assert_eq!(expand(t, "$battery_minutes", "7 minutes", 4096).unwrap(), t);
        assert_eq!(expand("", "$x", "y", 4096).unwrap(), "");
    }

    #[test]
    fn every_occurrence_is_replaced() {
        let t = "$a and $a, then $a";
        let out = expand(t, "$a", "xyz", 4096).unwrap();
        assert_eq!(out, "xyz and xyz, then xyz");
        assert_eq!(out.len() as isize - t.len() as isize, 3 * ("xyz".len() as isize - "$a".len() as isize));
    }

    #[test]
    fn token_at_end_is_replaced() {
        assert_eq!(expand("left: $m", "$m", "3 minutes", 4096).unwrap(), "left: 3 minutes");
        assert_eq!(expand("$m", "$m", "", 4096).unwrap(), "");
    }

    #[test]
    fn replacement_is_not_rescanned() {
        assert_eq!(expand("[$t]", "$t", "$t$t", 4096).unwrap(), "[$t$t]");
        assert_eq!(expand("$t$t", "$t", "a$", 4096).unwrap(), "a$a$");
    }

    #[test]
    fn empty_token_is_a_no_op() {
        assert_eq!(expand("abc", "", "zzz", 4096).unwrap(), "abc");
    }

    #[test]
    fn overflow_is_an_error() {
        let err = expand("$v", "$v", "0123456789", 8).unwrap_err();
        assert_eq!(err, ExpandError::BufferOverflow { limit: 8, needed: 10 });
        assert!(expand("$v", "$v", "01234567", 8).is_ok());
    }

    #[test]
    fn pluralization() {
        assert_eq!(minutes_text(1), "1 minute");
        assert!(minutes_text(0).ends_with("0 minutes"));
        assert!(minutes_text(2).ends_with("2 minutes"));
        assert!(minutes_text(-3).ends_with("-3 minutes"));
        assert!(minutes_text(-1).ends_with("minutes"));
    }

    #[test]
    fn composes_both_placeholders() {
        let cmd = compose_warn_command(
            "echo '$battery_minutes left, off in $shutdown_minutes'",
            &discharging(24),
            5,
            4096,
        )
        .unwrap();
        assert_eq!(cmd, "echo '24 minutes left, off in 19 minutes'");
    }

    #[test]
    fn shutdown_text_is_not_clamped() {
        let cmd = compose_warn_command("$shutdown_minutes", &discharging(6), 5, 4096).unwrap();
        assert_eq!(cmd, "1 minute");
        let cmd = compose_warn_command("$shutdown_minutes", &discharging(5), 5, 4096).unwrap();
        assert_eq!(cmd, "0 minutes");
        let cmd = compose_warn_command("$shutdown_minutes", &discharging(2), 5, 4096).unwrap();
        assert_eq!(cmd, "-3 minutes");
    }

    #[test]
    fn battery_expansion_does_not_leak_into_shutdown_placeholder() {
        let cmd = compose_warn_command("$battery_minutes|$shutdown_minutes|$battery_minutes", &discharging(1), 5, 4096)
            .unwrap();
        assert_eq!(cmd, "1 minute|-4 minutes|1 minute");
    }

    #[test]
    fn compose_reports_overflow() {
        let err = compose_warn_command("$battery_minutes", &discharging(100), 5, 4).unwrap_err();
        assert!(matches!(err, ExpandError::BufferOverflow { limit: 4, .. }));
    }
}
