use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

const ENABLED_ENV: &str = "STUDIO_STREAM_OBSERVABILITY";
const LEVEL_ENV: &str = "STUDIO_STREAM_LOG_LEVEL";
const JSON_PATH_ENV: &str = "STUDIO_STREAM_JSON_LOG_PATH";
const DEFAULT_LOG_FILE: &str = "studio-stream.logs.jsonl";

static INIT: OnceCell<()> = OnceCell::new();

/// Logging settings resolved from the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogSettings {
    pub enabled: bool,
    /// Filter directive; `None` falls back to `RUST_LOG`, then `info`.
    pub level: Option<String>,
    /// JSONL output file; console output when `None`.
    pub json_path: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            level: None,
            json_path: None,
        }
    }
}

impl LogSettings {
    /// Reads the `STUDIO_STREAM_*` variables listed on [`init_observability`].
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = lookup(ENABLED_ENV)
            .map(|value| parse_bool_env(&value).unwrap_or(true))
            .unwrap_or(true);
        let level = lookup(LEVEL_ENV).filter(|v| !v.trim().is_empty());
        let json_path = lookup(JSON_PATH_ENV)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        Self {
            enabled,
            level,
            json_path,
        }
    }

    fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        if let Some(level) = &self.level
            && let Ok(filter) = tracing_subscriber::EnvFilter::try_new(level)
        {
            return filter;
        }
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    }
}

fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Appender for the JSONL log file, creating missing parent directories.
fn json_log_writer(path: &Path) -> tracing_appender::rolling::RollingFileAppender {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let _ = std::fs::create_dir_all(dir);
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE);
    tracing_appender::rolling::never(dir, file_name)
}

/// Installs the global tracing subscriber once per process.
///
/// Environment variables:
/// - `STUDIO_STREAM_OBSERVABILITY`: set to `0`/`false`/`off` to disable logging (default enabled).
/// - `STUDIO_STREAM_LOG_LEVEL`: filter directive (`info`, `studio_stream=debug`, ...).
/// - `STUDIO_STREAM_JSON_LOG_PATH`: write JSONL to this file instead of the console.
/// - `RUST_LOG`: used when no level is set.
///
/// Console output goes to stderr so stdout stays free for rendered responses.
pub fn init_observability() {
    init_with(LogSettings::from_env());
}

/// Like [`init_observability`] with explicit settings. Later calls are no-ops.
pub fn init_with(settings: LogSettings) {
    INIT.get_or_init(|| {
        if !settings.enabled {
            return;
        }

        let env_filter = settings.env_filter();
        match &settings.json_path {
            Some(path) => {
                let writer = json_log_writer(path);
                let json_layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true)
                    .with_writer(writer);
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(json_layer)
                    .try_init();
            }
            None => {
                let console_layer = tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr);
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(console_layer)
                    .try_init();
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> LogSettings {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LogSettings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_to_enabled_console_logging() {
        assert_eq!(settings(&[]), LogSettings::default());
    }

    #[test]
    fn reads_flags_level_and_path() {
        let s = settings(&[
            (ENABLED_ENV, "off"),
            (LEVEL_ENV, "studio_stream=debug"),
            (JSON_PATH_ENV, "logs/out.jsonl"),
        ]);
        assert!(!s.enabled);
        assert_eq!(s.level.as_deref(), Some("studio_stream=debug"));
        assert_eq!(s.json_path, Some(PathBuf::from("logs/out.jsonl")));
    }

    #[test]
    fn unknown_flag_values_keep_logging_on() {
        assert!(settings(&[(ENABLED_ENV, "maybe")]).enabled);
        assert_eq!(parse_bool_env(" YES "), Some(true));
        assert_eq!(parse_bool_env("0"), Some(false));
    }

    #[test]
    fn json_writer_creates_missing_directories() {
        use std::io::Write as _;

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("run.jsonl");
        let mut writer = json_log_writer(&path);
        writer.write_all(b"{\"msg\":\"hi\"}\n").expect("write");
        writer.flush().expect("flush");
        let written = std::fs::read_to_string(&path).expect("read");
        assert_eq!(written, "{\"msg\":\"hi\"}\n");
    }
}
