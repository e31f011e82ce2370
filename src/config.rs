//! Runtime configuration
//!
//! Everything is read from `DEVBOT_*` environment variables with defaults
//! suitable for running against a local checkout. Validation reports every
//! problem at once rather than stopping at the first.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Prefix shared by every variable this module reads
pub const ENV_PREFIX: &str = "DEVBOT_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration errors:\n  - {}", .0.join("\n  - "))]
    Invalid(Vec<String>),
}

/// Where the repository comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// An existing checkout on disk
    Local,
    /// A clone managed inside the workspace directory
    Sandbox,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(Mode::Local),
            "sandbox" => Ok(Mode::Sandbox),
            other => Err(format!(
                "invalid mode {:?}, must be 'local' or 'sandbox'",
                other
            )),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Local => f.write_str("local"),
            Mode::Sandbox => f.write_str("sandbox"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub repo_path: Option<PathBuf>,
    pub github_repo: Option<String>,
    pub github_token: Option<String>,
    pub workspace_path: PathBuf,

    pub anthropic_api_key: String,
    pub anthropic_base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub max_iterations: usize,

    pub build_cmd: String,
    pub test_cmd: String,
    pub guidelines_file: String,
    pub command_timeout: Duration,
    pub max_output_bytes: usize,
    pub conversation_ttl: Duration,

    pub otlp_endpoint: Option<String>,
    pub log_format: LogFormat,
}

impl Config {
    pub const DEFAULT_MODEL: &'static str = "claude-sonnet-4-20250514";
    pub const DEFAULT_BASE_URL: &'static str = "https://api.anthropic.com";

    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary lookup. `key` is the full variable name,
    /// prefix included.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut errors = Vec::new();

        let mode = match get("MODE").as_deref().unwrap_or("local").parse::<Mode>() {
            Ok(mode) => mode,
            Err(e) => {
                errors.push(e);
                Mode::Local
            }
        };

        let mut number = |name: &str, default: u64| -> u64 {
            match get(name) {
                None => default,
                Some(raw) => match raw.parse::<u64>() {
                    Ok(n) if n > 0 => n,
                    _ => {
                        errors.push(format!(
                            "{}{} must be a positive integer, got {:?}",
                            ENV_PREFIX, name, raw
                        ));
                        default
                    }
                },
            }
        };

        let max_tokens = number("MAX_TOKENS", 8192) as u32;
        let max_iterations = number("MAX_ITERATIONS", 20) as usize;
        let command_timeout = Duration::from_secs(number("COMMAND_TIMEOUT_SECS", 300));
        let max_output_bytes = number("MAX_OUTPUT_BYTES", 100 * 1024) as usize;
        let conversation_ttl = Duration::from_secs(number("CONVERSATION_TTL_SECS", 24 * 60 * 60));

        let log_format = match get("LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                errors.push(format!(
                    "invalid log format {:?}, must be 'text' or 'json'",
                    other
                ));
                LogFormat::Text
            }
        };

        let config = Config {
            mode,
            repo_path: get("REPO_PATH").map(PathBuf::from),
            github_repo: get("GITHUB_REPO"),
            github_token: get("GITHUB_TOKEN"),
            workspace_path: PathBuf::from(
                get("WORKSPACE_PATH").unwrap_or_else(|| "./workspace".to_string()),
            ),
            anthropic_api_key: get("ANTHROPIC_API_KEY").unwrap_or_default(),
            anthropic_base_url: get("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string()),
            model: get("MODEL").unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
            max_tokens,
            max_iterations,
            build_cmd: get("BUILD_CMD").unwrap_or_else(|| "./build.sh build".to_string()),
            test_cmd: get("TEST_CMD").unwrap_or_else(|| "./build.sh test".to_string()),
            guidelines_file: get("GUIDELINES_FILE").unwrap_or_else(|| "CLAUDE.md".to_string()),
            command_timeout,
            max_output_bytes,
            conversation_ttl,
            otlp_endpoint: get("OTLP_ENDPOINT"),
            log_format,
        };

        errors.extend(config.problems());
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    /// Cross-field checks that depend on the mode
    fn problems(&self) -> Vec<String> {
        let mut errors = Vec::new();

        match self.mode {
            Mode::Local => match &self.repo_path {
                None => errors.push(format!("{}REPO_PATH is required in local mode", ENV_PREFIX)),
                Some(path) if !is_directory(path) => errors.push(format!(
                    "{}REPO_PATH {:?} does not exist or is not a directory",
                    ENV_PREFIX, path
                )),
                Some(_) => {}
            },
            Mode::Sandbox => {
                if self.github_repo.is_none() {
                    errors.push(format!("{}GITHUB_REPO is required in sandbox mode", ENV_PREFIX));
                }
                if self.github_token.is_none() {
                    errors.push(format!("{}GITHUB_TOKEN is required in sandbox mode", ENV_PREFIX));
                }
            }
        }

        if self.anthropic_api_key.is_empty() {
            errors.push(format!("{}ANTHROPIC_API_KEY is required", ENV_PREFIX));
        }

        errors
    }
}

fn is_directory(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (format!("{}{}", ENV_PREFIX, k), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_local_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_string_lossy().to_string();
        let config = Config::from_lookup(lookup(&[
            ("REPO_PATH", &path),
            ("ANTHROPIC_API_KEY", "sk-test"),
        ]))
        .unwrap();

        assert_eq!(config.mode, Mode::Local);
        assert_eq!(config.max_tokens, 8192);
        assert_eq!(config.max_iterations, 20);
        assert_eq!(config.build_cmd, "./build.sh build");
        assert_eq!(config.test_cmd, "./build.sh test");
        assert_eq!(config.guidelines_file, "CLAUDE.md");
        assert_eq!(config.command_timeout, Duration::from_secs(300));
        assert_eq!(config.max_output_bytes, 102400);
        assert_eq!(config.workspace_path, PathBuf::from("./workspace"));
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_collects_every_problem() {
        let err = Config::from_lookup(lookup(&[
            ("MODE", "sandbox"),
            ("MAX_ITERATIONS", "zero"),
        ]))
        .unwrap_err();

        let ConfigError::Invalid(problems) = err;
        assert_eq!(problems.len(), 4);
        assert!(problems.iter().any(|p| p.contains("MAX_ITERATIONS")));
        assert!(problems.iter().any(|p| p.contains("GITHUB_REPO")));
        assert!(problems.iter().any(|p| p.contains("GITHUB_TOKEN")));
        assert!(problems.iter().any(|p| p.contains("ANTHROPIC_API_KEY")));
    }

    #[test]
    fn test_invalid_mode() {
        let err = Config::from_lookup(lookup(&[("MODE", "cloud"), ("ANTHROPIC_API_KEY", "k")]))
            .unwrap_err();
        assert!(err.to_string().contains("invalid mode"));
    }

    #[test]
    fn test_missing_repo_dir() {
        let err = Config::from_lookup(lookup(&[
            ("REPO_PATH", "/definitely/not/here"),
            ("ANTHROPIC_API_KEY", "k"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
