//! Log initialization (ambient stack). The teacher reports failures to its
//! TUI status line and a panic-time backtrace dump; this headless daemon has
//! no status line to report to, so it adopts `fern`+`log` instead — the
//! stack the rest of the pack reaches for wherever a teacher module has no
//! direct equivalent of its own.

use anyhow::{Context, Result};
use std::path::Path;

/// Installs a `fern` dispatcher that writes to stderr, and additionally to
/// `log_file` when one is given. `level` follows `RUST_LOG`-style names
/// (`"trace"`, `"debug"`, `"info"`, `"warn"`, `"error"`).
pub fn init(level: &str, log_file: Option<&Path>) -> Result<()> {
    let level = level.parse().unwrap_or(log::LevelFilter::Info);

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr());

    if let Some(path) = log_file {
        let file = fern::log_file(path).with_context(|| format!("opening log file {}", path.display()))?;
        dispatch = dispatch.chain(file);
    }

    dispatch.apply().context("installing logger")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_level_name_falls_back_to_info() {
        let parsed: log::LevelFilter = "not-a-level".parse().unwrap_or(log::LevelFilter::Info);
        assert_eq!(parsed, log::LevelFilter::Info);
    }
}
