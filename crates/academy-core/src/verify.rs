//! Consistency checks for a content directory.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::content::{
    load_exercises, split_front_matter, ContentLibrary, FrontMatter, EXERCISES_FILE, LESSON_FILE,
};
use crate::error::Result;
use crate::parser;

/// Front matter keys every lesson should declare.
const REQUIRED_FRONT_MATTER: [&str; 5] = [
    "title",
    "order",
    "prerequisites",
    "estimatedMinutes",
    "pytorchVersion",
];

/// A problem found in one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum IssueKind {
    /// The directory has no lesson file.
    MissingLesson,
    /// The lesson could not be read or its front matter is invalid.
    UnreadableLesson(String),
    /// A front matter key is absent.
    MissingFrontMatterField(String),
    /// A prerequisite names no existing module.
    UnknownPrerequisite(String),
    /// The lesson references an exercise with no definition.
    UndefinedExercise(String),
    /// An exercise is defined but never referenced.
    UnusedExercise(String),
    /// The lesson references exercises but has no exercises file.
    MissingExercisesFile,
    /// The exercises file is not valid.
    InvalidExercisesFile(String),
}

/// A problem tied to its module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationIssue {
    /// Module directory name.
    pub module_id: String,
    /// What is wrong.
    pub kind: IssueKind,
}

impl fmt::Display for VerificationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.module_id)?;
        match &self.kind {
            IssueKind::MissingLesson => write!(f, "missing {LESSON_FILE}"),
            IssueKind::UnreadableLesson(e) => write!(f, "cannot read lesson: {e}"),
            IssueKind::MissingFrontMatterField(k) => write!(f, "front matter is missing '{k}'"),
            IssueKind::UnknownPrerequisite(p) => write!(f, "unknown prerequisite '{p}'"),
            IssueKind::UndefinedExercise(e) => {
                write!(f, "exercise '{e}' is referenced but not defined")
            }
            IssueKind::UnusedExercise(e) => write!(f, "exercise '{e}' is defined but never used"),
            IssueKind::MissingExercisesFile => {
                write!(f, "exercises are referenced but {EXERCISES_FILE} does not exist")
            }
            IssueKind::InvalidExercisesFile(e) => write!(f, "invalid {EXERCISES_FILE}: {e}"),
        }
    }
}

/// Outcome of verifying a content directory.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    /// Number of module directories checked.
    pub modules_checked: usize,
    /// Problems found, grouped by module in directory order.
    pub issues: Vec<VerificationIssue>,
}

impl VerificationReport {
    /// Whether no problems were found.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

impl ContentLibrary {
    /// Checks every module directory for broken references.
    ///
    /// # Errors
    ///
    /// Only fails if the content root itself cannot be listed.
    pub fn verify(&self) -> Result<VerificationReport> {
        let dirs = self.module_dirs()?;
        let known: BTreeSet<&str> = dirs.iter().map(String::as_str).collect();

        let mut report = VerificationReport {
            modules_checked: dirs.len(),
            issues: Vec::new(),
        };
        for module_id in &dirs {
            report.issues.extend(
                self.verify_module(module_id, &known)
                    .into_iter()
                    .map(|kind| VerificationIssue {
                        module_id: module_id.clone(),
                        kind,
                    }),
            );
        }
        Ok(report)
    }

    fn verify_module(&self, module_id: &str, known: &BTreeSet<&str>) -> Vec<IssueKind> {
        let dir = self.root().join(module_id);
        let lesson_path = dir.join(LESSON_FILE);
        if !lesson_path.is_file() {
            return vec![IssueKind::MissingLesson];
        }

        let text = match Self::read_lesson(&lesson_path) {
            Ok(text) => text,
            Err(e) => return vec![IssueKind::UnreadableLesson(e.to_string())],
        };
        let (yaml, body) = split_front_matter(&text);
        let yaml = yaml.unwrap_or_default();
        let front = match FrontMatter::parse(yaml, &lesson_path) {
            Ok(front) => front,
            Err(e) => return vec![IssueKind::UnreadableLesson(e.to_string())],
        };

        let mut issues = Vec::new();

        let declared: BTreeSet<String> = serde_yaml::from_str::<serde_yaml::Mapping>(yaml)
            .map(|m| {
                m.keys()
                    .filter_map(|k| k.as_str().map(ToString::to_string))
                    .collect()
            })
            .unwrap_or_default();
        issues.extend(
            REQUIRED_FRONT_MATTER
                .iter()
                .filter(|k| !declared.contains(**k))
                .map(|k| IssueKind::MissingFrontMatterField((*k).to_string())),
        );

        issues.extend(
            front
                .prerequisites
                .iter()
                .filter(|p| !known.contains(p.as_str()))
                .map(|p| IssueKind::UnknownPrerequisite(p.clone())),
        );

        let segments = parser::parse(body);
        let referenced = parser::exercise_ids(&segments);
        match load_exercises(&dir.join(EXERCISES_FILE)) {
            Ok(Some(defined)) => {
                issues.extend(
                    referenced
                        .iter()
                        .filter(|id| !defined.contains_key(**id))
                        .map(|id| IssueKind::UndefinedExercise((*id).to_string())),
                );
                issues.extend(
                    defined
                        .keys()
                        .filter(|id| !referenced.contains(&id.as_str()))
                        .map(|id| IssueKind::UnusedExercise(id.clone())),
                );
            }
            Ok(None) if !referenced.is_empty() => issues.push(IssueKind::MissingExercisesFile),
            Ok(None) => {}
            Err(e) => issues.push(IssueKind::InvalidExercisesFile(e.to_string())),
        }

        issues
    }
}
