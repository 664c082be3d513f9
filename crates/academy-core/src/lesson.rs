//! Lesson and curriculum model.
//!
//! These types mirror the lesson service's JSON wire format, so a lesson
//! loaded from a content directory and one fetched over HTTP are the same
//! value. Unknown fields are ignored and missing optional fields default.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

const fn default_estimated_minutes() -> u32 {
    30
}

fn default_pytorch_version() -> String {
    "2.2".to_string()
}

const fn default_section_order() -> u32 {
    1
}

// ============================================================================
// Enumerations
// ============================================================================

/// Exercise difficulty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Difficulty {
    /// Introductory exercise.
    Easy,
    /// Default difficulty.
    #[default]
    Medium,
    /// Challenging exercise.
    Hard,
}

impl Difficulty {
    /// Parses a string into a `Difficulty`, case-insensitively.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Some(Self::Easy),
            "medium" => Some(Self::Medium),
            "hard" => Some(Self::Hard),
            _ => None,
        }
    }

    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Unknown difficulties fall back to the default instead of rejecting the
// whole exercise file.
impl<'de> Deserialize<'de> for Difficulty {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_str_case_insensitive(&s).unwrap_or_default())
    }
}

impl Serialize for Difficulty {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Visual kind of a callout block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CalloutKind {
    /// Neutral note (default).
    #[default]
    Info,
    /// Something to watch out for.
    Warning,
    /// A common error.
    Error,
    /// A helpful hint.
    Tip,
    /// A key point.
    Important,
}

impl CalloutKind {
    /// Parses a string into a `CalloutKind`, case-insensitively.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "info" => Some(Self::Info),
            "warning" => Some(Self::Warning),
            "error" => Some(Self::Error),
            "tip" => Some(Self::Tip),
            "important" => Some(Self::Important),
            _ => None,
        }
    }

    /// Lowercase name as written in lesson markup.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Tip => "tip",
            Self::Important => "important",
        }
    }

    /// Title shown when the author gives none.
    #[must_use]
    pub const fn default_title(self) -> &'static str {
        match self {
            Self::Info => "Note",
            Self::Warning => "Warning",
            Self::Error => "Error",
            Self::Tip => "Tip",
            Self::Important => "Important",
        }
    }
}

impl std::fmt::Display for CalloutKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CalloutKind {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_str_case_insensitive(&s).unwrap_or_default())
    }
}

impl Serialize for CalloutKind {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// How the judge checks a submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidationKind {
    /// Assertion snippets run after the submission.
    #[default]
    Assert,
    /// Captured stdout compared to an expected value.
    Output,
    /// Judge-specific checking.
    Custom,
}

impl ValidationKind {
    /// Parses a string into a `ValidationKind`, case-insensitively.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "assert" => Some(Self::Assert),
            "output" => Some(Self::Output),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Assert => "assert",
            Self::Output => "output",
            Self::Custom => "custom",
        }
    }
}

// An unknown strategy is left to the judge as `custom` rather than failing
// the whole exercise file.
impl<'de> Deserialize<'de> for ValidationKind {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_str_case_insensitive(&s).unwrap_or(Self::Custom))
    }
}

impl Serialize for ValidationKind {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

// ============================================================================
// Exercises
// ============================================================================

/// How an exercise is validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSpec {
    /// Validation strategy.
    #[serde(rename = "type", default)]
    pub kind: ValidationKind,
    /// Assertion snippets, for `assert` validation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tests: Vec<String>,
    /// Expected stdout, for `output` validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
}

/// Definition of a graded exercise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseSpec {
    /// Optional id echo; the map key is authoritative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Code placed in the editor before the learner types.
    #[serde(default, alias = "starterCode")]
    pub starter_code: String,
    /// Hints, revealed in order.
    #[serde(default)]
    pub hints: Vec<String>,
    /// Validation settings.
    #[serde(default)]
    pub validation: ValidationSpec,
    /// Reference solution.
    #[serde(default)]
    pub solution: String,
    /// Declared difficulty.
    #[serde(default)]
    pub difficulty: Difficulty,
}

// ============================================================================
// Modules and curriculum
// ============================================================================

/// Metadata of one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleMetadata {
    /// Module id, also the directory name.
    pub id: String,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Position in the curriculum.
    #[serde(default)]
    pub order: u32,
    /// Modules that should be completed first.
    #[serde(default)]
    pub prerequisites: Vec<String>,
    /// Expected time to complete.
    #[serde(default = "default_estimated_minutes")]
    pub estimated_minutes: u32,
    /// Library version the lesson targets.
    #[serde(default = "default_pytorch_version")]
    pub pytorch_version: String,
    /// Section id.
    #[serde(default)]
    pub section: String,
    /// Order of the section.
    #[serde(default = "default_section_order")]
    pub section_order: u32,
}

impl ModuleMetadata {
    /// Metadata with every optional field at its default.
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>, order: u32) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            order,
            prerequisites: Vec::new(),
            estimated_minutes: default_estimated_minutes(),
            pytorch_version: default_pytorch_version(),
            section: String::new(),
            section_order: default_section_order(),
        }
    }
}

/// A lesson as delivered to the reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonContent {
    /// Module metadata.
    pub metadata: ModuleMetadata,
    /// Raw lesson markup, front matter removed.
    #[serde(rename = "content")]
    pub raw_body: String,
    /// Exercise definitions keyed by exercise id.
    #[serde(rename = "exercises", default)]
    pub exercise_definitions: BTreeMap<String, ExerciseSpec>,
}

impl LessonContent {
    /// Module id shortcut.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    /// Looks up an exercise definition.
    #[must_use]
    pub fn exercise(&self, exercise_id: &str) -> Option<&ExerciseSpec> {
        self.exercise_definitions.get(exercise_id)
    }

    /// Number of defined exercises, the denominator for module progress.
    #[must_use]
    pub fn exercise_count(&self) -> usize {
        self.exercise_definitions.len()
    }
}

/// A group of modules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Section id.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Position of the section.
    pub order: u32,
    /// Modules ordered by `order`.
    #[serde(default)]
    pub modules: Vec<ModuleMetadata>,
}

/// The complete ordered curriculum.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Curriculum {
    /// Sections ordered by `order`.
    #[serde(default)]
    pub sections: Vec<Section>,
    /// Number of modules across all sections.
    #[serde(default)]
    pub total_modules: usize,
    /// Sum of estimated minutes.
    #[serde(default)]
    pub total_estimated_minutes: u32,
}

impl Curriculum {
    /// Iterates modules in curriculum order.
    pub fn modules(&self) -> impl Iterator<Item = &ModuleMetadata> {
        self.sections.iter().flat_map(|s| s.modules.iter())
    }

    /// Finds a module by id.
    #[must_use]
    pub fn module(&self, module_id: &str) -> Option<&ModuleMetadata> {
        self.modules().find(|m| m.id == module_id)
    }
}
