//! Logger setup: env_logger with a human or JSON line format, to stderr or a file.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// env_logger's default text lines
    Human,
    /// One JSON object per line (timestamp, level, target, message)
    Json,
}

/// Install the global logger. `level` is the default filter when RUST_LOG is unset.
/// With `file`, log lines are appended to that file instead of stderr.
pub fn init(level: &str, format: LogFormat, file: Option<&Path>) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));
    if format == LogFormat::Json {
        builder.format(|buf, record| {
            let line = json_line(&buf.timestamp().to_string(), record);
            writeln!(buf, "{}", line)
        });
    }
    if let Some(path) = file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening log file {}", path.display()))?;
        builder
            .target(env_logger::Target::Pipe(Box::new(file)))
            .write_style(env_logger::WriteStyle::Never);
    }
    builder.try_init().context("installing logger")
}

fn json_line(timestamp: &str, record: &log::Record<'_>) -> String {
    serde_json::json!({
        "timestamp": timestamp,
        "level": record.level().to_string(),
        "target": record.target(),
        "message": record.args().to_string(),
    })
    .to_string()
}
