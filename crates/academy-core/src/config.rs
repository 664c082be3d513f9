//! Configuration types for Academy.
//!
//! Configuration lives in `academy.json` (camelCase JSON). Every field has a
//! default, so a missing file or an empty object yields a working setup that
//! runs lessons from `./content` against a local interpreter.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AcademyError, Result};

/// The default config file name.
pub const CONFIG_FILE_NAME: &str = "academy.json";

fn default_api_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_content_dir() -> String {
    "content".to_string()
}

fn default_data_dir() -> String {
    ".academy".to_string()
}

fn default_namespace() -> String {
    "academy".to_string()
}

/// Default per-call execution timeout in seconds.
const fn default_execution_timeout() -> u64 {
    10
}

fn default_interpreter() -> String {
    "python3".to_string()
}

/// Default timeout for lesson, execution and validation HTTP requests.
const fn default_request_timeout() -> u64 {
    30
}

fn default_sections() -> Vec<SectionConfig> {
    [
        ("fundamentals", "Fundamentals", 1, 1, 4),
        ("autograd", "Autograd", 2, 5, 7),
        ("neural-networks", "Neural Networks", 3, 8, 12),
        ("data-training", "Data & Training", 4, 13, 15),
        ("advanced", "Advanced Topics", 5, 16, 20),
    ]
    .into_iter()
    .map(|(id, title, order, first, last)| SectionConfig {
        id: id.to_string(),
        title: title.to_string(),
        order,
        first_module: first,
        last_module: last,
    })
    .collect()
}

/// Main configuration for Academy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Which execution backend runs code cells and exercises.
    #[serde(default)]
    pub backend: BackendKind,

    /// Base URL of the lesson, execution and validation service.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Directory holding one sub-directory per module.
    #[serde(default = "default_content_dir")]
    pub content_dir: String,

    /// Directory where durable records are written.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Prefix for every durable record key.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Execution settings shared by both backends.
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// HTTP client settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Curriculum sections, matched against module order.
    #[serde(default = "default_sections")]
    pub sections: Vec<SectionConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            api_url: default_api_url(),
            content_dir: default_content_dir(),
            data_dir: default_data_dir(),
            namespace: default_namespace(),
            execution: ExecutionConfig::default(),
            http: HttpConfig::default(),
            sections: default_sections(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if `academy.json` exists but is invalid.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            AcademyError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads `academy.json` from a specific directory.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// A missing file yields the default configuration.
    ///
    /// # Errors
    ///
    /// Returns `AcademyError::ConfigParseError` for unreadable files, invalid
    /// JSON or unknown enum values, and `AcademyError::ConfigValidationError`
    /// when values are out of range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(AcademyError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| AcademyError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `AcademyError::ConfigValidationError` if any check fails.
    pub fn validate(&self) -> Result<()> {
        if self.execution.timeout_seconds == 0 {
            return Err(AcademyError::config_validation(
                "execution.timeoutSeconds must be greater than 0",
                "Set execution.timeoutSeconds to at least 1 second in your academy.json",
            ));
        }

        if self.http.request_timeout_seconds == 0 {
            return Err(AcademyError::config_validation(
                "http.requestTimeoutSeconds must be greater than 0",
                "Set http.requestTimeoutSeconds to at least 1 second in your academy.json",
            ));
        }

        if self.backend == BackendKind::Remote
            && !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://"))
        {
            return Err(AcademyError::config_validation(
                format!("apiUrl '{}' is not an http(s) URL", self.api_url),
                "Set apiUrl to something like http://localhost:8000 in your academy.json",
            ));
        }

        if self.execution.interpreter.trim().is_empty() {
            return Err(AcademyError::config_validation(
                "execution.interpreter must not be empty",
                "Set execution.interpreter to a Python executable such as python3",
            ));
        }

        if self.namespace.trim().is_empty() {
            return Err(AcademyError::config_validation(
                "namespace must not be empty",
                "Provide a record namespace in your academy.json (the default is 'academy')",
            ));
        }

        if self.data_dir.trim().is_empty() {
            return Err(AcademyError::config_validation(
                "dataDir must not be empty",
                "Provide a data directory in your academy.json (use '.' for current directory)",
            ));
        }

        for section in &self.sections {
            if section.first_module > section.last_module {
                return Err(AcademyError::config_validation(
                    format!(
                        "section '{}' has firstModule {} after lastModule {}",
                        section.id, section.first_module, section.last_module
                    ),
                    "Swap firstModule and lastModule for this section",
                ));
            }
        }

        Ok(())
    }

    /// Base URL with any trailing slash removed.
    #[must_use]
    pub fn api_base(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }

    /// Content directory as a path.
    #[must_use]
    pub fn content_path(&self) -> PathBuf {
        PathBuf::from(&self.content_dir)
    }

    /// Data directory as a path.
    #[must_use]
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }
}

/// Execution backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendKind {
    /// A sandboxed interpreter managed by this process (default).
    #[default]
    Local,
    /// A remote execution service reached over HTTP.
    Remote,
}

impl BackendKind {
    /// Parses a string into a `BackendKind`, case-insensitively.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "local" => Some(Self::Local),
            "remote" => Some(Self::Remote),
            _ => None,
        }
    }

    /// Lowercase name as written in `academy.json`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BackendKind {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid backend '{s}': expected one of 'local', 'remote'"
            ))
        })
    }
}

impl Serialize for BackendKind {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionConfig {
    /// Per-call timeout, sent to the remote service and enforced locally.
    #[serde(default = "default_execution_timeout")]
    pub timeout_seconds: u64,

    /// Interpreter executable for the local backend.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Modules imported during the local handshake to warm the interpreter.
    #[serde(default)]
    pub preload_modules: Vec<String>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_execution_timeout(),
            interpreter: default_interpreter(),
            preload_modules: Vec::new(),
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpConfig {
    /// Upper bound for any single HTTP request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

/// A curriculum section covering an inclusive range of module orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionConfig {
    /// Stable section id.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Position of the section in the curriculum.
    pub order: u32,
    /// First module order in this section.
    pub first_module: u32,
    /// Last module order in this section.
    pub last_module: u32,
}

impl SectionConfig {
    /// Whether a module with this order belongs to the section.
    #[must_use]
    pub const fn contains(&self, module_order: u32) -> bool {
        module_order >= self.first_module && module_order <= self.last_module
    }
}
