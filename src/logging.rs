//! Logger setup and the one-line decision record.

use std::fs::OpenOptions;
use std::path::Path;

use log::{LevelFilter, info};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode, WriteLogger};

use crate::config::expand_path;
use crate::eval::RuleMatch;

/// Where decisions are logged when no path is given.
pub const DEFAULT_LOG_PATH: &str = "~/.local/share/cmdgate/decisions.log";

/// Install the global logger.
///
/// With a path, log lines are appended to that file (parent directories
/// are created); otherwise they go to stderr. Returns `false` if a logger
/// was already installed or the file could not be opened. Logging must
/// never stop a command from being evaluated, so failure is not an error.
pub fn init(level: LevelFilter, path: Option<&str>) -> bool {
    let config = ConfigBuilder::new()
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .set_time_format_rfc3339()
        .build();

    match path {
        Some(path) => {
            let path = expand_path(path);
            match open_append(&path) {
                Some(file) => WriteLogger::init(level, config, file).is_ok(),
                None => false,
            }
        }
        None => TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto).is_ok(),
    }
}

fn open_append(path: &Path) -> Option<std::fs::File> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).ok()?;
    }
    OpenOptions::new().create(true).append(true).open(path).ok()
}

/// Emit one `info` record for an evaluated command.
pub fn log_decision(command: &str, result: &RuleMatch) {
    info!("{}", decision_line(command, result));
}

/// Tab-separated `decision, command, reason` with the command truncated
/// and the reason flattened to one line.
pub fn decision_line(command: &str, result: &RuleMatch) -> String {
    let reason_oneline = result.reason.replace('\n', "; ");
    let cmd_truncated: String = command.chars().take(200).collect();
    format!(
        "{}\t{}\t{}",
        result.decision.as_str(),
        cmd_truncated,
        reason_oneline
    )
}
