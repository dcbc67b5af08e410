//! Logging shared by the hospitalization fetcher and the page builder.
//!
//! Both binaries are run unattended (usually from a scheduler), so the log on
//! stderr is the only record of what a run fetched and wrote.
//!
//! Usage:
//! - `HOSPSTATS_LOG=info` (default) - fetches, table shapes, written files
//! - `HOSPSTATS_LOG=debug` - per-column and per-template detail
//! - `HOSPSTATS_LOG=off` - no logs

use std::sync::Once;

// Re-export emit so macros can use it
pub use emit;

/// Environment variable selecting the minimum log level.
pub const LOG_ENV: &str = "HOSPSTATS_LOG";

static INIT: Once = Once::new();

/// Map a `HOSPSTATS_LOG` value to a level. `None` means logging is off.
///
/// Unknown values yield `Err` carrying the fallback level.
pub fn parse_level(value: &str) -> Result<Option<emit::Level>, emit::Level> {
    match value.trim().to_ascii_lowercase().as_str() {
        "off" => Ok(None),
        "error" => Ok(Some(emit::Level::Error)),
        "warn" => Ok(Some(emit::Level::Warn)),
        "" | "info" => Ok(Some(emit::Level::Info)),
        "debug" => Ok(Some(emit::Level::Debug)),
        _ => Err(emit::Level::Info),
    }
}

/// Initialize diagnostics based on the `HOSPSTATS_LOG` environment variable.
///
/// Call once at startup; later calls are ignored.
pub fn init_diagnostics() {
    INIT.call_once(|| {
        let raw = std::env::var(LOG_ENV).unwrap_or_else(|_| "info".to_string());

        let level = match parse_level(&raw) {
            Ok(None) => return,
            Ok(Some(level)) => level,
            Err(fallback) => {
                // Bootstrap warning, emitted before the runtime exists
                eprintln!("Warning: Unknown {LOG_ENV} value '{raw}', using 'info'");
                fallback
            }
        };

        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(level))
            .init();

        // The runtime lives for the whole process; flushing happens on exit.
        std::mem::forget(rt);
    });
}

/// Log run progress: fetched sources, table shapes, written files.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Log detail useful when a source changes shape upstream.
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Log recoverable oddities (duplicate rows, unreadable cells).
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

pub use init_diagnostics as init;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_safe_to_call_multiple_times() {
        init_diagnostics();
        init_diagnostics();
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("off"), Ok(None));
        assert_eq!(parse_level("DEBUG"), Ok(Some(emit::Level::Debug)));
        assert_eq!(parse_level(""), Ok(Some(emit::Level::Info)));
        assert_eq!(parse_level("verbose"), Err(emit::Level::Info));
    }

    #[test]
    fn test_macros_compile() {
        info!("Test message");
        debug!("Debug message with {value}", value: 42);
        warn!("Warning message");
        error!("Error message");
    }
}
