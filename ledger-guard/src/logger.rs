//! Logging Infrastructure
//!
//! tracing-subscriber with an env filter, optionally JSON, optionally into a
//! daily rolling file. Security decisions go to the `security` target (see
//! [`security_log!`](crate::security_log)).

use std::path::Path;

use tracing_subscriber::EnvFilter;

/// Logger settings, read from `LOG_LEVEL`, `LOG_FORMAT`, `LOG_DIR`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    pub json: bool,
    pub dir: Option<String>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            dir: None,
        }
    }
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            json: std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")),
            dir: std::env::var("LOG_DIR").ok().filter(|s| !s.is_empty()),
        }
    }
}

/// Initialize the logger from environment variables
pub fn init_logger() {
    init_logger_with_file(&LogSettings::from_env());
}

/// Initialize the logger; a missing log directory falls back to stdout
pub fn init_logger_with_file(settings: &LogSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.level.as_str()));

    let file_appender = settings.dir.as_deref().and_then(|dir| {
        let path = Path::new(dir);
        if path.is_dir() {
            Some(tracing_appender::rolling::daily(path, "ledger-guard"))
        } else {
            eprintln!("LOG_DIR {dir} does not exist, logging to stdout");
            None
        }
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false);

    let result = match (settings.json, file_appender) {
        (true, Some(writer)) => builder.json().with_writer(writer).try_init(),
        (true, None) => builder.json().try_init(),
        (false, Some(writer)) => builder.with_ansi(false).with_writer(writer).try_init(),
        (false, None) => builder.try_init(),
    };

    if let Err(e) = result {
        eprintln!("Logger already initialized: {e}");
    }
}
