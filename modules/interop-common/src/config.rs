use std::env;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::InteropError;

pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 256 * 1024 * 1024;
pub const DEFAULT_FILE_PREFIX: &str = "EventTrace";

/// Event tracing configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct TracingConfig {
    pub enabled: bool,
    pub max_file_size_bytes: u64,
    pub sampling_probability: f64,
    pub file_prefix: String,
    /// Directory trace files are written to. Created on demand.
    pub trace_dir: PathBuf,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            sampling_probability: 1.0,
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            trace_dir: PathBuf::from("data").join("EventTracing"),
        }
    }
}

impl TracingConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, InteropError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// `EVENT_LOG_PATH` names a log file supplied from outside the process;
    /// traces land next to it. Otherwise they go to `<DATA_DIR>/EventTracing`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, InteropError> {
        let enabled = lookup("EVENT_TRACING_ENABLED")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        let max_file_size_bytes = match lookup("EVENT_TRACING_MAX_FILE_SIZE_BYTES") {
            Some(v) => v.trim().parse().map_err(|_| {
                InteropError::Config(format!(
                    "EVENT_TRACING_MAX_FILE_SIZE_BYTES must be a byte count, got {v:?}"
                ))
            })?,
            None => DEFAULT_MAX_FILE_SIZE_BYTES,
        };

        let sampling_probability = match lookup("EVENT_TRACING_SAMPLING_PROBABILITY") {
            Some(v) => {
                let p: f64 = v.trim().parse().map_err(|_| {
                    InteropError::Config(format!(
                        "EVENT_TRACING_SAMPLING_PROBABILITY must be a number, got {v:?}"
                    ))
                })?;
                if !(0.0..=1.0).contains(&p) {
                    return Err(InteropError::Config(format!(
                        "EVENT_TRACING_SAMPLING_PROBABILITY must be within [0, 1], got {p}"
                    )));
                }
                p
            }
            None => 1.0,
        };

        let file_prefix = lookup("EVENT_TRACING_FILE_PREFIX")
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILE_PREFIX.to_string());

        let trace_dir = match lookup("EVENT_LOG_PATH") {
            Some(path) => log_path_dir(Path::new(&path)),
            None => {
                let data_dir = lookup("DATA_DIR").unwrap_or_else(|| "data".to_string());
                PathBuf::from(data_dir).join("EventTracing")
            }
        };

        Ok(Self {
            enabled,
            max_file_size_bytes,
            sampling_probability,
            file_prefix,
            trace_dir,
        })
    }

    pub fn enabled(mut self) -> Self {
        self.enabled = true;
        self
    }

    pub fn with_trace_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.trace_dir = dir.into();
        self
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size_bytes = bytes;
        self
    }

    pub fn with_sampling_probability(mut self, probability: f64) -> Self {
        self.sampling_probability = probability.clamp(0.0, 1.0);
        self
    }

    pub fn log_summary(&self) {
        info!(
            enabled = self.enabled,
            max_file_size_bytes = self.max_file_size_bytes,
            sampling_probability = self.sampling_probability,
            file_prefix = self.file_prefix.as_str(),
            trace_dir = %self.trace_dir.display(),
            "Event tracing config"
        );
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn log_path_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = TracingConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, TracingConfig::default());
    }

    #[test]
    fn reads_all_variables() {
        let config = TracingConfig::from_lookup(lookup(&[
            ("EVENT_TRACING_ENABLED", "TRUE"),
            ("EVENT_TRACING_MAX_FILE_SIZE_BYTES", "4096"),
            ("EVENT_TRACING_SAMPLING_PROBABILITY", "0.25"),
            ("EVENT_TRACING_FILE_PREFIX", "Trace"),
            ("DATA_DIR", "/srv/data"),
        ]))
        .unwrap();

        assert!(config.enabled);
        assert_eq!(config.max_file_size_bytes, 4096);
        assert_eq!(config.sampling_probability, 0.25);
        assert_eq!(config.file_prefix, "Trace");
        assert_eq!(config.trace_dir, PathBuf::from("/srv/data/EventTracing"));
    }

    #[test]
    fn log_path_overrides_data_dir() {
        let config = TracingConfig::from_lookup(lookup(&[
            ("EVENT_LOG_PATH", "/var/log/worker/worker.log"),
            ("DATA_DIR", "/srv/data"),
        ]))
        .unwrap();
        assert_eq!(config.trace_dir, PathBuf::from("/var/log/worker"));
    }

    #[test]
    fn bare_log_file_name_resolves_to_current_dir() {
        let config =
            TracingConfig::from_lookup(lookup(&[("EVENT_LOG_PATH", "worker.log")])).unwrap();
        assert_eq!(config.trace_dir, PathBuf::from("."));
    }

    #[test]
    fn rejects_malformed_size() {
        let err = TracingConfig::from_lookup(lookup(&[(
            "EVENT_TRACING_MAX_FILE_SIZE_BYTES",
            "lots",
        )]))
        .unwrap_err();
        assert!(matches!(err, InteropError::Config(_)));
    }

    #[test]
    fn rejects_out_of_range_probability() {
        let err = TracingConfig::from_lookup(lookup(&[(
            "EVENT_TRACING_SAMPLING_PROBABILITY",
            "1.5",
        )]))
        .unwrap_err();
        assert!(matches!(err, InteropError::Config(_)));
    }

    #[test]
    fn unrecognised_flag_means_disabled() {
        let config =
            TracingConfig::from_lookup(lookup(&[("EVENT_TRACING_ENABLED", "maybe")])).unwrap();
        assert!(!config.enabled);
    }
}
