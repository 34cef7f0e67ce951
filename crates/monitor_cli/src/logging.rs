use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use chrono::{Local, NaiveDateTime};
use env_logger::{Builder, Target};
use log::Level;
use park_monitor::LoggingConfig;

/// Errors raised while installing the logger
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to open log file {}: {source}", .path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Logger already initialized: {0}")]
    AlreadyInitialized(#[from] log::SetLoggerError),
}

/// Install the global logger described by `config`.
///
/// `RUST_LOG`, when set, takes precedence over the configured level.
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    let file = match &config.log_file {
        Some(path) => Some(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LoggingError::LogFile {
                    path: path.clone(),
                    source,
                })?,
        ),
        None => None,
    };

    let sink = LogSink {
        console: config.console_output,
        file,
    };

    Builder::new()
        .filter_level(config.level_filter())
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{}",
                render_line(Local::now().naive_local(), record.level(), record.args())
            )
        })
        .target(Target::Pipe(Box::new(sink)))
        .try_init()?;

    Ok(())
}

/// Fallback logger for failures that happen before the configuration is known
pub fn init_default() {
    let _ = env_logger::Builder::from_env(env_logger::Env::new().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{}",
                render_line(Local::now().naive_local(), record.level(), record.args())
            )
        })
        .try_init();
}

fn render_line(at: NaiveDateTime, level: Level, message: impl Display) -> String {
    format!(
        "{} - {} - {}",
        at.format("%Y-%m-%d %H:%M:%S,%3f"),
        level,
        message
    )
}

/// Writes every log line to stderr, a file, or both
struct LogSink {
    console: bool,
    file: Option<File>,
}

impl Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.console {
            io::stderr().write_all(buf)?;
        }
        if let Some(file) = &mut self.file {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.console {
            io::stderr().flush()?;
        }
        if let Some(file) = &mut self.file {
            file.flush()?;
        }
        Ok(())
    }
}
