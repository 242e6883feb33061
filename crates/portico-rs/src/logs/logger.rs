//! Logger configuration and structured output formatting.
//!
//! Structured line format with a colored level column and an aligned
//! target column, suitable for both interactive terminals and log
//! aggregation (set `NO_COLOR` for plain output).

use chrono::Local;
use env_logger::Builder;
use log::LevelFilter;
use std::env;
use std::io::Write;

/// Visible width of the `[LEVEL]` column including padding.
const LEVEL_FIELD_WIDTH: usize = 8;

/// Visible width of the target column including padding.
const TARGET_FIELD_WIDTH: usize = 26;

/// Configure and initialize the application's logging system.
///
/// # Logging Format
///
/// ```text
/// Mar 15 26 02:30:45 PM | [INFO]  | portico_gateway        | Gateway starting on 0.0.0.0:5900
/// Mar 15 26 02:30:45 PM | [WARN]  | portico_rs::services   | circuit for http://users-1:8080 opened
/// ```
///
/// # Environment Configuration
///
/// - `RUST_LOG` sets the level filter (default `info`)
/// - `NO_COLOR` disables colored output
///
/// Should be called once during startup, before any logging happens.
pub fn configure_logger() {
    let no_color = env::var("NO_COLOR").is_ok();

    let filter = env::var("RUST_LOG")
        .ok()
        .and_then(|value| value.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);

    Builder::new()
        .format(move |buf, record| {
            let level_plain = record.level().to_string();

            // Bold the whole line and color only the level; reset just the
            // foreground (39) so the bold survives to the line reset.
            let (prefix, colored_level, suffix) = if no_color {
                (String::new(), level_plain.clone(), String::new())
            } else {
                let colored = match record.level() {
                    log::Level::Error => format!("\x1b[31m{level_plain}\x1b[39m"),
                    log::Level::Warn => format!("\x1b[33m{level_plain}\x1b[39m"),
                    log::Level::Info => format!("\x1b[32m{level_plain}\x1b[39m"),
                    log::Level::Debug => format!("\x1b[34m{level_plain}\x1b[39m"),
                    log::Level::Trace => format!("\x1b[35m{level_plain}\x1b[39m"),
                };
                ("\x1b[1m".to_string(), colored, "\x1b[0m".to_string())
            };

            let level_display = format!("[{colored_level}]");
            // The ANSI escapes do not contribute to the visible width.
            let level_visible = level_plain.len() + 2;
            let level_padding = LEVEL_FIELD_WIDTH.saturating_sub(level_visible).max(1);

            let target = record.target();
            let target_padding = TARGET_FIELD_WIDTH.saturating_sub(target.len()).max(1);

            writeln!(
                buf,
                "{}{} | {}{}| {}{}| {}{}",
                prefix,
                Local::now().format("%b %d %y %I:%M:%S %p"),
                level_display,
                " ".repeat(level_padding),
                target,
                " ".repeat(target_padding),
                record.args(),
                suffix,
            )
        })
        .filter_level(filter)
        .init();
}
