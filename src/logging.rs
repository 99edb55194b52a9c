use chrono::Local;
use std::borrow::Cow;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding an `EnvFilter` directive.
pub const LOG_FILTER_ENV: &str = "SMTPD_FILTER_LOG";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Renders control characters as escapes so mail content cannot mess with
/// the terminal or the log file.
pub fn safe_log_string(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\0' => result.push_str("\\0"),
            '\t' => result.push_str("\\t"),
            '\r' => result.push_str("\\r"),
            '\n' => result.push_str("\\n"),
            '\x01'..='\x08' | '\x0b' | '\x0c' | '\x0e'..='\x1f' | '\x7f' => {
                result.push_str(&format!("\\x{:02x}", c as u32));
            }
            _ if c.is_ascii() => result.push(c),
            _ => result.push_str(&format!("\\u{{{:x}}}", c as u32)),
        }
    }
    result
}

pub fn display_record(line: &str, raw: bool) -> Cow<'_, str> {
    if raw {
        Cow::Borrowed(line)
    } else {
        Cow::Owned(safe_log_string(line))
    }
}

/// Local wall-clock timestamps with millisecond precision.
struct LocalTime;

impl FormatTime for LocalTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format(TIMESTAMP_FORMAT))
    }
}

/// Diagnostic logging for the filter process.
///
/// Standard output belongs to the agent, so logs go to stderr or to a file.
pub struct LoggingConfig {
    pub verbose: bool,
    pub log_file: Option<PathBuf>,
}

impl LoggingConfig {
    pub fn init(&self) -> anyhow::Result<()> {
        let default_filter = if self.verbose { "debug" } else { "info" };
        let env_filter = EnvFilter::try_new(
            std::env::var(LOG_FILTER_ENV)
                .as_deref()
                .unwrap_or(default_filter),
        )?;

        let writer = match &self.log_file {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                BoxMakeWriter::new(Mutex::new(file))
            }
            None => BoxMakeWriter::new(std::io::stderr),
        };

        let layer = fmt::layer()
            .with_timer(LocalTime)
            .with_ansi(self.log_file.is_none())
            .with_writer(writer);

        tracing_subscriber::registry()
            .with(layer.with_filter(env_filter))
            .try_init()?;
        Ok(())
    }
}
