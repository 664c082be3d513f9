//! Error types for the Academy core crate.
//!
//! Covers configuration loading, lesson loading from a content directory,
//! and durable record storage. Parsing never fails and has no variant here.

use std::path::PathBuf;

/// A specialized `Result` type for Academy core operations.
pub type Result<T> = std::result::Result<T, AcademyError>;

/// Errors that can occur in the Academy core.
///
/// Variants carry actionable suggestions where the user can fix the cause.
#[derive(Debug, thiserror::Error)]
pub enum AcademyError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in the configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your academy.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Lesson Loading Errors
    // ========================================================================
    /// No module with this id exists in the content directory.
    #[error("Module not found: '{module_id}' (looked in '{content_dir}')\n\nSuggestion: Run 'academy curriculum' to list available modules")]
    ModuleNotFound {
        /// The requested module id.
        module_id: String,
        /// Content directory that was searched.
        content_dir: PathBuf,
    },

    /// Lesson file exceeds the size limit.
    #[error("Lesson exceeds size limit (1MB): '{path}' is {size_kb}KB\n\nSuggestion: Split the lesson into smaller modules")]
    LessonTooLarge {
        /// Path to the oversized lesson.
        path: PathBuf,
        /// Actual size in kilobytes.
        size_kb: u64,
    },

    /// Lesson front matter is not valid YAML.
    #[error("Invalid front matter in '{path}': {message}\n\nSuggestion: Check the YAML block between the '---' lines")]
    FrontMatterError {
        /// Path to the lesson file.
        path: PathBuf,
        /// Description of the YAML error.
        message: String,
    },

    /// The exercises file of a module is not valid JSON.
    #[error("Invalid exercises file '{path}': {message}\n\nSuggestion: Validate exercises.json with a JSON linter")]
    ExercisesParseError {
        /// Path to the exercises file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    // ========================================================================
    // Storage Errors
    // ========================================================================
    /// A durable record could not be written.
    #[error("Failed to persist record '{key}': {message}\n\nSuggestion: Check write permissions on the data directory")]
    StorageWriteError {
        /// Record key.
        key: String,
        /// Description of the write failure.
        message: String,
    },

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AcademyError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `ModuleNotFound` error.
    #[must_use]
    pub fn module_not_found(module_id: impl Into<String>, content_dir: impl Into<PathBuf>) -> Self {
        Self::ModuleNotFound {
            module_id: module_id.into(),
            content_dir: content_dir.into(),
        }
    }

    /// Creates a new `LessonTooLarge` error.
    #[must_use]
    pub fn lesson_too_large(path: impl Into<PathBuf>, size_kb: u64) -> Self {
        Self::LessonTooLarge {
            path: path.into(),
            size_kb,
        }
    }

    /// Creates a new `FrontMatterError`.
    #[must_use]
    pub fn front_matter(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::FrontMatterError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ExercisesParseError`.
    #[must_use]
    pub fn exercises_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ExercisesParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `StorageWriteError`.
    #[must_use]
    pub fn storage_write(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StorageWriteError {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if this error stops the application from starting.
    ///
    /// Storage write failures are not fatal: the in-memory ledger stays
    /// authoritative for the session.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigParseError { .. } | Self::ConfigValidationError { .. }
        )
    }
}
