//! Logging bootstrap and configuration.
//!
//! # Responsibility
//! - Resolve log level/directory from explicit values or environment.
//! - Start rolling file logs at most once per process.
//!
//! # Invariants
//! - Initialization never panics.
//! - Repeating init with the same config is a no-op; a different level or
//!   directory is rejected.
//! - Library code logs `event=<name> module=<module> status=<status>` lines.

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};

/// Environment variable holding the log level.
pub const ENV_LOG_LEVEL: &str = "RECORDKIT_LOG_LEVEL";
/// Environment variable holding the absolute log directory.
pub const ENV_LOG_DIR: &str = "RECORDKIT_LOG_DIR";

const LOG_FILE_BASENAME: &str = "recordkit";
const DEFAULT_LOG_DIR_NAME: &str = "recordkit-logs";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 5 * 1024 * 1024;
const MAX_LOG_FILES: usize = 3;
const MAX_PANIC_PAYLOAD_CHARS: usize = 160;

static ACTIVE_LOGGER: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK_INSTALLED: OnceCell<()> = OnceCell::new();

struct ActiveLogger {
    config: LoggingConfig,
    _handle: LoggerHandle,
}

/// Normalized logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    level: &'static str,
    log_dir: PathBuf,
}

impl LoggingConfig {
    /// Validates `level` (case-insensitive) and an absolute `log_dir`.
    pub fn new(level: &str, log_dir: &str) -> Result<Self, String> {
        Ok(Self {
            level: normalize_level(level)?,
            log_dir: normalize_log_dir(log_dir)?,
        })
    }

    /// Reads [`ENV_LOG_LEVEL`] and [`ENV_LOG_DIR`], falling back to
    /// [`default_log_level`] and a directory under the OS temp dir.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`LoggingConfig::from_env`] with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let level = lookup(ENV_LOG_LEVEL)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| default_log_level().to_string());
        let log_dir = match lookup(ENV_LOG_DIR).filter(|value| !value.trim().is_empty()) {
            Some(dir) => dir,
            None => std::env::temp_dir()
                .join(DEFAULT_LOG_DIR_NAME)
                .to_string_lossy()
                .into_owned(),
        };
        Self::new(&level, &log_dir)
    }

    pub fn level(&self) -> &'static str {
        self.level
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

/// Starts file logging for `config`.
///
/// # Errors
/// - Returns an error when logging is already active with another config.
/// - Returns an error when the directory cannot be created or the logger
///   backend fails to start.
pub fn init_logging(config: &LoggingConfig) -> Result<(), String> {
    let active = ACTIVE_LOGGER.get_or_try_init(|| start_logger(config))?;
    if active.config.log_dir != config.log_dir {
        return Err(format!(
            "logging already initialized at `{}`; refusing to switch to `{}`",
            active.config.log_dir.display(),
            config.log_dir.display()
        ));
    }
    if active.config.level != config.level {
        return Err(format!(
            "logging already initialized with level `{}`; refusing to switch to `{}`",
            active.config.level, config.level
        ));
    }
    Ok(())
}

/// Active `(level, log_dir)`, or `None` before initialization.
pub fn logging_status() -> Option<(&'static str, PathBuf)> {
    ACTIVE_LOGGER
        .get()
        .map(|active| (active.config.level, active.config.log_dir.clone()))
}

/// `debug` for debug builds, `info` for release builds.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn start_logger(config: &LoggingConfig) -> Result<ActiveLogger, String> {
    std::fs::create_dir_all(&config.log_dir).map_err(|err| {
        format!(
            "failed to create log directory `{}`: {err}",
            config.log_dir.display()
        )
    })?;

    let handle = Logger::try_with_str(config.level)
        .map_err(|err| format!("invalid log level `{}`: {err}", config.level))?
        .log_to_file(
            FileSpec::default()
                .directory(config.log_dir.as_path())
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(MAX_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| format!("failed to start logger: {err}"))?;

    install_panic_hook_once();
    info!(
        "event=logging_init module=logging status=ok level={} log_dir={} version={}",
        config.level,
        config.log_dir.display(),
        env!("CARGO_PKG_VERSION")
    );

    Ok(ActiveLogger {
        config: config.clone(),
        _handle: handle,
    })
}

fn normalize_level(level: &str) -> Result<&'static str, String> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(format!(
            "unsupported log level `{other}`; expected trace|debug|info|warn|error"
        )),
    }
}

fn normalize_log_dir(log_dir: &str) -> Result<PathBuf, String> {
    let trimmed = log_dir.trim();
    if trimmed.is_empty() {
        return Err("log_dir cannot be empty".to_string());
    }
    let path = Path::new(trimmed);
    if !path.is_absolute() {
        return Err(format!("log_dir must be an absolute path, got `{trimmed}`"));
    }
    Ok(path.to_path_buf())
}

fn install_panic_hook_once() {
    if PANIC_HOOK_INSTALLED.set(()).is_err() {
        return;
    }

    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = if let Some(message) = panic_info.payload().downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = panic_info.payload().downcast_ref::<String>() {
            message.clone()
        } else {
            "non-string panic payload".to_string()
        };
        error!(
            "event=panic_captured module=logging status=error location={} payload={}",
            location,
            single_line(&payload, MAX_PANIC_PAYLOAD_CHARS)
        );
        previous_hook(panic_info);
    }));
}

/// Flattens newlines and caps length so one message stays one log line.
fn single_line(value: &str, max_chars: usize) -> String {
    let flattened = value.replace(['\n', '\r'], " ");
    let mut capped: String = flattened.chars().take(max_chars).collect();
    if flattened.chars().count() > max_chars {
        capped.push_str("...");
    }
    capped
}

#[cfg(test)]
mod tests {
    use super::{
        init_logging, logging_status, single_line, LoggingConfig, ENV_LOG_DIR, ENV_LOG_LEVEL,
    };

    #[test]
    fn config_normalizes_level() {
        let config = LoggingConfig::new(" WARNING ", "/var/log/recordkit").expect("valid config");
        assert_eq!(config.level(), "warn");
    }

    #[test]
    fn config_rejects_relative_dir_and_unknown_level() {
        let err = LoggingConfig::new("info", "logs/dev").expect_err("relative dir must fail");
        assert!(err.contains("absolute"));
        let err = LoggingConfig::new("loud", "/tmp").expect_err("unknown level must fail");
        assert!(err.contains("unsupported log level"));
    }

    #[test]
    fn config_from_lookup_uses_overrides_and_defaults() {
        let config = LoggingConfig::from_lookup(|key| match key {
            ENV_LOG_LEVEL => Some("error".to_string()),
            ENV_LOG_DIR => Some("/srv/recordkit/logs".to_string()),
            _ => None,
        })
        .expect("lookup config");
        assert_eq!(config.level(), "error");
        assert_eq!(config.log_dir().to_str(), Some("/srv/recordkit/logs"));

        let fallback = LoggingConfig::from_lookup(|_| None).expect("default config");
        assert_eq!(fallback.level(), super::default_log_level());
        assert!(fallback.log_dir().ends_with("recordkit-logs"));
    }

    #[test]
    fn single_line_flattens_and_caps() {
        let line = single_line("a\nb\rc-long-tail", 5);
        assert!(!line.contains('\n'));
        assert!(!line.contains('\r'));
        assert!(line.ends_with("..."));
    }

    #[test]
    fn init_logging_is_idempotent_and_rejects_conflicts() {
        let first = tempfile::tempdir().expect("temp dir");
        let second = tempfile::tempdir().expect("temp dir");
        let first_dir = first.path().to_str().expect("utf-8 temp dir");
        let second_dir = second.path().to_str().expect("utf-8 temp dir");

        let config = LoggingConfig::new("info", first_dir).expect("config");
        init_logging(&config).expect("first init");
        init_logging(&config).expect("same config is idempotent");

        let level_err = init_logging(&LoggingConfig::new("debug", first_dir).expect("config"))
            .expect_err("level conflict must fail");
        assert!(level_err.contains("refusing to switch"));

        let dir_err = init_logging(&LoggingConfig::new("info", second_dir).expect("config"))
            .expect_err("dir conflict must fail");
        assert!(dir_err.contains("refusing to switch"));

        let (level, dir) = logging_status().expect("logging active");
        assert_eq!(level, "info");
        assert_eq!(dir, first.path());
    }
}
