use crate::error::{Result, SessionError};
use crate::session::local_now;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "claude-sessions";

/// A validation error in the configuration
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]: {}", self.field, self.message)
    }
}

/// Output format requested from the Claude CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Text,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "text" => Some(Self::Text),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "text",
        }
    }
}

/// Settings as written in config.toml; every key is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub session_duration_hours: Option<i64>,
    #[serde(default)]
    pub session_file: Option<PathBuf>,
    #[serde(default)]
    pub claude_timeout_seconds: Option<i64>,
    #[serde(default)]
    pub probe_timeout_seconds: Option<i64>,
    #[serde(default)]
    pub max_turns: Option<i64>,
    #[serde(default)]
    pub output_format: Option<OutputFormat>,
    #[serde(default)]
    pub claude_command: Option<String>,
}

impl FileConfig {
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SessionError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            SessionError::Configuration(format!("invalid config file {}: {}", path.display(), e))
        })
    }
}

/// Runtime settings, built once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub session_duration_hours: i64,
    pub session_file: PathBuf,
    pub claude_timeout_seconds: i64,
    pub probe_timeout_seconds: i64,
    pub max_turns: i64,
    pub output_format: OutputFormat,
    pub claude_command: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            session_duration_hours: 5,
            session_file: default_session_file(),
            claude_timeout_seconds: 10,
            probe_timeout_seconds: 5,
            max_turns: 1,
            output_format: OutputFormat::Json,
            claude_command: "claude".to_string(),
        }
    }
}

/// Default record location: `<data dir>/claude-sessions/session.json`
pub fn default_session_file() -> PathBuf {
    dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("share")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("session.json")
}

/// Default config location: `<config dir>/claude-sessions/config.toml`
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
}

impl Settings {
    /// Load settings: defaults, then the config file, then environment variables.
    /// An explicit `config_path` must exist; the default one is optional.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut settings = Self::default();

        match config_path {
            Some(path) => settings.merge(FileConfig::load_from(path)?),
            None => {
                if let Some(path) = default_config_file().filter(|p| p.exists()) {
                    settings.merge(FileConfig::load_from(&path)?);
                }
            }
        }

        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.check()?;
        Ok(settings)
    }

    /// Merge file values into these settings (file takes priority)
    pub fn merge(&mut self, other: FileConfig) {
        if let Some(hours) = other.session_duration_hours {
            self.session_duration_hours = hours;
        }
        if let Some(path) = other.session_file {
            self.session_file = path;
        }
        if let Some(secs) = other.claude_timeout_seconds {
            self.claude_timeout_seconds = secs;
        }
        if let Some(secs) = other.probe_timeout_seconds {
            self.probe_timeout_seconds = secs;
        }
        if let Some(turns) = other.max_turns {
            self.max_turns = turns;
        }
        if let Some(format) = other.output_format {
            self.output_format = format;
        }
        if let Some(command) = other.claude_command {
            self.claude_command = command;
        }
    }

    /// Override settings from environment variables read through `lookup`.
    /// Unparsable values fail immediately.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SESSION_DURATION_HOURS") {
            self.session_duration_hours = parse_int("SESSION_DURATION_HOURS", &v)?;
        }
        // An empty path keeps the default location
        if let Some(v) = lookup("SESSION_FILE_PATH").filter(|v| !v.trim().is_empty()) {
            self.session_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("CLAUDE_TIMEOUT_SECONDS") {
            self.claude_timeout_seconds = parse_int("CLAUDE_TIMEOUT_SECONDS", &v)?;
        }
        if let Some(v) = lookup("CLAUDE_PROBE_TIMEOUT_SECONDS") {
            self.probe_timeout_seconds = parse_int("CLAUDE_PROBE_TIMEOUT_SECONDS", &v)?;
        }
        if let Some(v) = lookup("CLAUDE_MAX_TURNS") {
            self.max_turns = parse_int("CLAUDE_MAX_TURNS", &v)?;
        }
        if let Some(v) = lookup("CLAUDE_OUTPUT_FORMAT") {
            self.output_format = OutputFormat::from_str(&v).ok_or_else(|| {
                SessionError::Configuration(format!(
                    "CLAUDE_OUTPUT_FORMAT must be 'json' or 'text', got '{}'",
                    v
                ))
            })?;
        }
        if let Some(v) = lookup("CLAUDE_CLI_PATH") {
            self.claude_command = v;
        }
        Ok(())
    }

    /// Validate settings and return any errors found
    pub fn validate(&self) -> std::result::Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        let positive = [
            ("session_duration_hours", self.session_duration_hours),
            ("claude_timeout_seconds", self.claude_timeout_seconds),
            ("probe_timeout_seconds", self.probe_timeout_seconds),
            ("max_turns", self.max_turns),
        ];
        for (field, value) in positive {
            if value <= 0 {
                errors.push(ValidationError {
                    field: field.to_string(),
                    message: format!("Must be positive, got {}", value),
                });
            }
        }

        // Positive but unrepresentable windows would overflow the expiry timestamp
        if self.session_duration_hours > 0
            && chrono::Duration::try_hours(self.session_duration_hours)
                .and_then(|d| local_now().checked_add_signed(d))
                .is_none()
        {
            errors.push(ValidationError {
                field: "session_duration_hours".to_string(),
                message: format!("Too large, got {}", self.session_duration_hours),
            });
        }

        if self.claude_command.trim().is_empty() {
            errors.push(ValidationError {
                field: "claude_command".to_string(),
                message: "Command must not be empty".to_string(),
            });
        }

        if self.session_file.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "session_file".to_string(),
                message: "Path must not be empty".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// `validate` folded into a single configuration error
    pub fn check(&self) -> Result<()> {
        self.validate().map_err(|errors| {
            let joined: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            SessionError::Configuration(joined.join("; "))
        })
    }

    pub fn session_duration(&self) -> Result<chrono::Duration> {
        chrono::Duration::try_hours(self.session_duration_hours).ok_or_else(|| {
            SessionError::Configuration(format!(
                "session duration of {} hours is out of range",
                self.session_duration_hours
            ))
        })
    }

    pub fn claude_timeout(&self) -> Duration {
        Duration::from_secs(self.claude_timeout_seconds.max(0) as u64)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds.max(0) as u64)
    }
}

fn parse_int(key: &str, value: &str) -> Result<i64> {
    value.trim().parse().map_err(|_| {
        SessionError::Configuration(format!("{} must be an integer, got '{}'", key, value))
    })
}
