//! Lessons loaded from a content directory.
//!
//! Layout:
//!
//! ```text
//! content/
//!   01-tensors/
//!     lesson.mdx       # YAML front matter + lesson markup
//!     exercises.json   # optional, exercise id -> definition
//!   02-operations/
//!     ...
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{Config, SectionConfig};
use crate::error::{AcademyError, Result};
use crate::lesson::{Curriculum, ExerciseSpec, LessonContent, ModuleMetadata, Section};

/// Maximum allowed lesson file size in bytes (1MB).
pub const MAX_LESSON_SIZE: u64 = 1024 * 1024;

/// Lesson file name inside a module directory.
pub const LESSON_FILE: &str = "lesson.mdx";

/// Exercise definitions file name inside a module directory.
pub const EXERCISES_FILE: &str = "exercises.json";

/// Order given to modules whose directory has no numeric prefix.
const UNORDERED: u32 = 99;

/// Section for modules outside every configured range.
const OTHER_SECTION: (&str, &str, u32) = ("other", "Other", 99);

/// YAML front matter of a lesson.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FrontMatter {
    pub title: Option<String>,
    pub order: Option<u32>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    pub estimated_minutes: Option<u32>,
    pub pytorch_version: Option<serde_yaml::Value>,
}

impl FrontMatter {
    pub(crate) fn parse(yaml: &str, path: &Path) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(|e| AcademyError::front_matter(path, e.to_string()))
    }

    /// The version may be written as `2.2` or `"2.2"`.
    fn pytorch_version(&self) -> Option<String> {
        match self.pytorch_version.as_ref()? {
            serde_yaml::Value::String(s) => Some(s.clone()),
            serde_yaml::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Splits `---` delimited front matter from the body.
///
/// Returns `(None, text)` when the text has no complete front matter block.
/// Leading blank lines of the body are dropped.
pub(crate) fn split_front_matter(text: &str) -> (Option<&str>, &str) {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let Some(rest) = text.strip_prefix("---") else {
        return (None, text);
    };
    let Some(rest) = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n')) else {
        return (None, text);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let yaml = &rest[..offset];
            let body = rest[offset + line.len()..].trim_start_matches(['\r', '\n']);
            return (Some(yaml), body);
        }
        offset += line.len();
    }
    (None, text)
}

/// Order from a directory name such as `07-autograd`.
fn order_from_id(module_id: &str) -> Option<u32> {
    module_id.split('-').next()?.parse().ok()
}

/// Module directories on disk.
#[derive(Debug, Clone)]
pub struct ContentLibrary {
    root: PathBuf,
    sections: Vec<SectionConfig>,
}

impl ContentLibrary {
    /// Creates a library over `root` with the given sections.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, sections: Vec<SectionConfig>) -> Self {
        Self {
            root: root.into(),
            sections,
        }
    }

    /// Creates a library from `contentDir` and `sections`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.content_path(), config.sections.clone())
    }

    /// Content root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ids of every directory holding a lesson, sorted by name.
    ///
    /// Hidden directories are skipped. A missing root yields no modules.
    pub fn module_ids(&self) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AcademyError::Io(e)),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !entry.path().is_dir() {
                continue;
            }
            if entry.path().join(LESSON_FILE).is_file() {
                ids.push(name);
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Directories under the root, including ones without a lesson.
    pub(crate) fn module_dirs(&self) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AcademyError::Io(e)),
        };
        let mut dirs: Vec<String> = entries
            .filter_map(std::result::Result::ok)
            .filter(|e| e.path().is_dir())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| !name.starts_with('.'))
            .collect();
        dirs.sort();
        Ok(dirs)
    }

    fn module_dir(&self, module_id: &str) -> Result<PathBuf> {
        let valid = !module_id.is_empty()
            && !module_id.starts_with('.')
            && !module_id.contains(['/', '\\']);
        let dir = self.root.join(module_id);
        if valid && dir.join(LESSON_FILE).is_file() {
            Ok(dir)
        } else {
            Err(AcademyError::module_not_found(module_id, &self.root))
        }
    }

    /// Reads a lesson file, enforcing the size limit.
    pub(crate) fn read_lesson(path: &Path) -> Result<String> {
        let size = std::fs::metadata(path)?.len();
        if size > MAX_LESSON_SIZE {
            return Err(AcademyError::lesson_too_large(path, size / 1024));
        }
        Ok(std::fs::read_to_string(path)?)
    }

    fn section_for(&self, order: u32) -> (String, String, u32) {
        self.sections
            .iter()
            .find(|s| s.contains(order))
            .map_or_else(
                || {
                    let (id, title, order) = OTHER_SECTION;
                    (id.to_string(), title.to_string(), order)
                },
                |s| (s.id.clone(), s.title.clone(), s.order),
            )
    }

    fn metadata_from(&self, module_id: &str, front: &FrontMatter) -> ModuleMetadata {
        let order = order_from_id(module_id)
            .or(front.order)
            .unwrap_or(UNORDERED);
        let (section, _, section_order) = self.section_for(order);
        let mut metadata = ModuleMetadata::new(
            module_id,
            front.title.clone().unwrap_or_else(|| module_id.to_string()),
            order,
        );
        metadata.prerequisites.clone_from(&front.prerequisites);
        if let Some(minutes) = front.estimated_minutes {
            metadata.estimated_minutes = minutes;
        }
        if let Some(version) = front.pytorch_version() {
            metadata.pytorch_version = version;
        }
        metadata.section = section;
        metadata.section_order = section_order;
        metadata
    }

    /// Loads a module's metadata from its front matter.
    pub fn module_metadata(&self, module_id: &str) -> Result<ModuleMetadata> {
        let path = self.module_dir(module_id)?.join(LESSON_FILE);
        let text = Self::read_lesson(&path)?;
        let (yaml, _) = split_front_matter(&text);
        let front = FrontMatter::parse(yaml.unwrap_or_default(), &path)?;
        Ok(self.metadata_from(module_id, &front))
    }

    /// Loads a full module: metadata, lesson body and exercise definitions.
    ///
    /// # Errors
    ///
    /// Returns `ModuleNotFound`, `LessonTooLarge`, `FrontMatterError` or
    /// `ExercisesParseError`.
    pub fn load_module(&self, module_id: &str) -> Result<LessonContent> {
        let dir = self.module_dir(module_id)?;
        let lesson_path = dir.join(LESSON_FILE);
        let text = Self::read_lesson(&lesson_path)?;
        let (yaml, body) = split_front_matter(&text);
        let front = FrontMatter::parse(yaml.unwrap_or_default(), &lesson_path)?;

        let exercise_definitions = load_exercises(&dir.join(EXERCISES_FILE))?.unwrap_or_default();

        debug!(
            module_id,
            exercises = exercise_definitions.len(),
            bytes = body.len(),
            "Module loaded"
        );

        Ok(LessonContent {
            metadata: self.metadata_from(module_id, &front),
            raw_body: body.to_string(),
            exercise_definitions,
        })
    }

    /// Builds the curriculum from every module on disk.
    ///
    /// Modules whose front matter cannot be read are skipped with a warning.
    pub fn curriculum(&self) -> Result<Curriculum> {
        let mut modules = Vec::new();
        for module_id in self.module_ids()? {
            match self.module_metadata(&module_id) {
                Ok(metadata) => modules.push(metadata),
                Err(e) => warn!(module_id = %module_id, error = %e, "Skipping unreadable module"),
            }
        }
        modules.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));

        let total_modules = modules.len();
        let total_estimated_minutes = modules.iter().map(|m| m.estimated_minutes).sum();

        let mut sections: Vec<Section> = Vec::new();
        for module in modules {
            if let Some(section) = sections.iter_mut().find(|s| s.id == module.section) {
                section.modules.push(module);
                continue;
            }
            let (id, title, order) = self.section_for(module.order);
            sections.push(Section {
                id,
                title,
                order,
                modules: vec![module],
            });
        }
        sections.sort_by_key(|s| s.order);

        Ok(Curriculum {
            sections,
            total_modules,
            total_estimated_minutes,
        })
    }
}

/// Loads `exercises.json`, returning `None` when the file does not exist.
pub(crate) fn load_exercises(path: &Path) -> Result<Option<BTreeMap<String, ExerciseSpec>>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(AcademyError::Io(e)),
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| AcademyError::exercises_parse(path, e.to_string()))
}
