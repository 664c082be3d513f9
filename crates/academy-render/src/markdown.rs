//! Markdown rendering for lessons and the curriculum overview.

use std::fmt::{self, Write};

use academy_core::{
    CalloutKind, ContentSegment, Curriculum, Difficulty, LessonContent, ProgressLedger, Segment,
};
use serde::Serialize;
use tracing::debug;

use crate::doc_url;

/// A problem found while rendering. Rendering always completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderIssue {
    /// The lesson references an exercise that has no definition.
    MissingExercise {
        /// Referenced exercise id.
        exercise_id: String,
        /// Byte offset of the marker in the lesson body.
        offset: usize,
    },
}

impl fmt::Display for RenderIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingExercise {
                exercise_id,
                offset,
            } => write!(
                f,
                "exercise '{exercise_id}' at byte {offset} has no definition in exercises.json"
            ),
        }
    }
}

/// Output of [`LessonRenderer::render`].
#[derive(Debug, Clone, Default)]
pub struct RenderedLesson {
    /// The rendered document.
    pub markdown: String,
    /// Problems found along the way.
    pub issues: Vec<RenderIssue>,
}

// ============================================================================
// Lesson
// ============================================================================

/// Renders one lesson with the learner's progress.
pub struct LessonRenderer<'a> {
    lesson: &'a LessonContent,
    ledger: &'a ProgressLedger,
}

impl<'a> LessonRenderer<'a> {
    /// Creates a renderer for `lesson`, marking completions from `ledger`.
    #[must_use]
    pub const fn new(lesson: &'a LessonContent, ledger: &'a ProgressLedger) -> Self {
        Self { lesson, ledger }
    }

    /// Renders the header followed by every segment in order.
    ///
    /// Narrative text is copied verbatim. A reference to an undefined
    /// exercise renders as an error callout and is reported in `issues`.
    #[must_use]
    pub fn render(&self, segments: &[Segment]) -> RenderedLesson {
        let mut rendered = RenderedLesson::default();
        self.write_header(&mut rendered.markdown);

        for segment in segments {
            let output = &mut rendered.markdown;
            match &segment.content {
                ContentSegment::Markdown { text } => output.push_str(text),
                ContentSegment::CodeCell {
                    cell_id,
                    source_code,
                } => write_code_cell(output, cell_id, source_code),
                ContentSegment::Exercise {
                    exercise_id,
                    difficulty_override,
                    description,
                } => {
                    if let Some(issue) = self.write_exercise(
                        output,
                        exercise_id,
                        *difficulty_override,
                        description,
                        segment.span.start,
                    ) {
                        rendered.issues.push(issue);
                    }
                }
                ContentSegment::Callout { kind, title, body } => {
                    write_callout(output, *kind, title.as_deref(), body);
                }
                ContentSegment::DocReference { symbol } => {
                    let _ = write!(output, "[`{symbol}`]({})", doc_url(symbol));
                }
            }
        }

        if !rendered.markdown.ends_with('\n') {
            rendered.markdown.push('\n');
        }
        rendered
    }

    fn write_header(&self, output: &mut String) {
        let meta = &self.lesson.metadata;
        let _ = writeln!(output, "# {}\n", meta.title);

        let completed = if self.ledger.is_module_completed(&meta.id) {
            " | completed"
        } else {
            ""
        };
        let _ = writeln!(
            output,
            "*{} min | PyTorch {}{completed}*",
            meta.estimated_minutes, meta.pytorch_version
        );

        let total = self.lesson.exercise_count();
        if total > 0 {
            let done = self.ledger.completed_exercise_count(&meta.id);
            let _ = writeln!(
                output,
                "\n**Exercises**: {done}/{total} ({}%)",
                self.ledger.module_progress_percent(&meta.id, total)
            );
        }
        if !meta.prerequisites.is_empty() {
            let _ = writeln!(output, "\n**Prerequisites**: {}", meta.prerequisites.join(", "));
        }
        let _ = writeln!(output);
    }

    fn write_exercise(
        &self,
        output: &mut String,
        exercise_id: &str,
        difficulty_override: Option<Difficulty>,
        description: &str,
        offset: usize,
    ) -> Option<RenderIssue> {
        let Some(spec) = self.lesson.exercise(exercise_id) else {
            debug!(exercise_id, "Exercise has no definition");
            write_callout(
                output,
                CalloutKind::Error,
                Some("Exercise not found"),
                &format!("No definition for exercise `{exercise_id}`."),
            );
            return Some(RenderIssue::MissingExercise {
                exercise_id: exercise_id.to_string(),
                offset,
            });
        };

        let difficulty = difficulty_override.unwrap_or(spec.difficulty);
        let badge = if self.ledger.is_exercise_completed(self.lesson.id(), exercise_id) {
            "[x]"
        } else {
            "[ ]"
        };

        start_block(output);
        let _ = writeln!(output, "### {badge} Exercise `{exercise_id}` ({difficulty})\n");
        if !description.is_empty() {
            let _ = writeln!(output, "{description}\n");
        }
        match spec.hints.len() {
            0 => {}
            1 => {
                let _ = writeln!(output, "*1 hint available*\n");
            }
            n => {
                let _ = writeln!(output, "*{n} hints available*\n");
            }
        }
        if !spec.starter_code.is_empty() {
            write_fenced(output, &spec.starter_code);
        }
        end_block(output);
        None
    }
}

/// Makes sure the next block starts on a fresh paragraph.
fn start_block(output: &mut String) {
    if output.is_empty() || output.ends_with("\n\n") {
        return;
    }
    if output.ends_with('\n') {
        output.push('\n');
    } else {
        output.push_str("\n\n");
    }
}

fn end_block(output: &mut String) {
    if !output.ends_with('\n') {
        output.push('\n');
    }
    output.push('\n');
}

fn write_code_cell(output: &mut String, cell_id: &str, source_code: &str) {
    start_block(output);
    let _ = writeln!(output, "<!-- cell: {cell_id} -->");
    write_fenced(output, source_code);
    end_block(output);
}

/// Writes a python fence longer than any backtick run inside `code`.
fn write_fenced(output: &mut String, code: &str) {
    let longest_run = code
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest_run.max(2) + 1);
    let _ = writeln!(output, "{fence}python\n{}\n{fence}", code.trim_end());
}

fn write_callout(output: &mut String, kind: CalloutKind, title: Option<&str>, body: &str) {
    start_block(output);
    let title = title.unwrap_or_else(|| kind.default_title());
    let _ = writeln!(output, "> **{title}**");
    if !body.is_empty() {
        let _ = writeln!(output, ">");
        for line in body.lines() {
            if line.is_empty() {
                let _ = writeln!(output, ">");
            } else {
                let _ = writeln!(output, "> {line}");
            }
        }
    }
    end_block(output);
}

// ============================================================================
// Curriculum
// ============================================================================

/// Renders the curriculum with per-module completion.
pub struct CurriculumOverview<'a> {
    curriculum: &'a Curriculum,
    ledger: &'a ProgressLedger,
}

impl<'a> CurriculumOverview<'a> {
    /// Creates an overview of `curriculum` marked from `ledger`.
    #[must_use]
    pub const fn new(curriculum: &'a Curriculum, ledger: &'a ProgressLedger) -> Self {
        Self { curriculum, ledger }
    }

    /// Renders the aggregate line and one table per section.
    #[must_use]
    pub fn render(&self) -> String {
        let mut output = String::new();
        let progress = self.ledger.curriculum_progress(self.curriculum);

        let _ = writeln!(output, "# Curriculum\n");
        let _ = writeln!(
            output,
            "**Progress**: {}/{} modules ({}%) | {} min total\n",
            progress.completed_modules,
            progress.total_modules,
            progress.percent,
            self.curriculum.total_estimated_minutes
        );

        if self.curriculum.sections.is_empty() {
            let _ = writeln!(output, "*No modules found.*");
            return output;
        }

        for section in &self.curriculum.sections {
            let _ = writeln!(output, "## {}\n", escape_markdown(&section.title));
            let _ = writeln!(output, "| Done | Module | Title | Minutes |");
            let _ = writeln!(output, "|------|--------|-------|---------|");
            for module in &section.modules {
                let mut done = if self.ledger.is_module_completed(&module.id) {
                    "x".to_string()
                } else {
                    " ".to_string()
                };
                if self.ledger.current_module.as_deref() == Some(module.id.as_str()) {
                    done.push_str(" (current)");
                }
                let _ = writeln!(
                    output,
                    "| {done} | `{}` | {} | {} |",
                    module.id,
                    escape_markdown(&module.title),
                    module.estimated_minutes
                );
            }
            let _ = writeln!(output);
        }
        output
    }
}

/// Escapes characters that would break a table cell or inline formatting.
fn escape_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '*' | '_' | '`' | '[' | ']' | '\\' | '<' | '>' | '|' => {
                result.push('\\');
                result.push(ch);
            }
            '\n' => result.push(' '),
            _ => result.push(ch),
        }
    }
    result
}
