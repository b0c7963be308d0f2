use std::fs;
use std::path::Path;
use time::macros::format_description;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::LogConfig;

/// `RUST_LOG` wins; otherwise the configured level, where `none` silences everything.
fn build_filter(log_config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_directive(log_config)))
}

fn level_directive(log_config: &LogConfig) -> String {
    match log_config.get_level().to_ascii_lowercase().as_str() {
        "none" => "off".to_string(),
        level => level.to_string(),
    }
}

/// Directory and file prefix for the daily rolling log, or `None` when
/// file logging is disabled.
fn rolling_target(log_file_path: &str) -> Option<(&Path, &str)> {
    let path = log_file_path.trim();
    if path.is_empty() || path == "/dev/null" {
        return None;
    }
    let path = Path::new(path);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let prefix = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("gh-relay");
    Some((dir, prefix))
}

pub fn setup_tracing(log_config: &LogConfig) {
    // 2025-12-03T09:50:56
    let timer = LocalTime::new(format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second]"
    ));

    let console_layer = fmt::layer()
        .with_timer(timer.clone())
        .with_writer(std::io::stdout)
        .with_target(false);
    let registry = tracing_subscriber::registry()
        .with(build_filter(log_config))
        .with(console_layer);

    let Some((dir, prefix)) = rolling_target(&log_config.log_file_path) else {
        if let Err(e) = registry.try_init() {
            eprintln!("Warning: failed to init console logging: {}", e);
        }
        return;
    };

    if let Err(e) = fs::create_dir_all(dir) {
        eprintln!("Warning: failed to create log dir '{}': {}", dir.display(), e);
    }

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, prefix));
    // The worker must outlive every log call.
    let _guard: &'static _ = Box::leak(Box::new(guard));

    let file_layer = fmt::layer()
        .with_timer(timer)
        .with_writer(writer)
        .with_target(false)
        .with_ansi(false);

    match registry.with(file_layer).try_init() {
        Ok(()) => eprintln!(
            "Logging to console and {}/{}.<date> (daily rotation)",
            dir.display(),
            prefix
        ),
        Err(e) => eprintln!("Warning: failed to init logging: {}", e),
    }
}
