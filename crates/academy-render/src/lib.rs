//! Academy rendering.
//!
//! Turns parsed lessons and learner progress into Markdown for the terminal
//! or any Markdown viewer.
//!
//! - [`LessonRenderer`] renders a lesson's segments, resolving exercises
//!   against their definitions and marking completed ones.
//! - [`CurriculumOverview`] renders the module list with completion marks and
//!   the aggregate progress.
//!
//! # Example
//!
//! ```rust
//! use academy_core::{parse, LessonContent, ModuleMetadata, ProgressLedger};
//! use academy_render::LessonRenderer;
//!
//! let lesson = LessonContent {
//!     metadata: ModuleMetadata::new("01-tensors", "Tensors", 1),
//!     raw_body: "See <DocRef symbol=\"torch.zeros\" />.".to_string(),
//!     exercise_definitions: Default::default(),
//! };
//! let ledger = ProgressLedger::default();
//!
//! let rendered = LessonRenderer::new(&lesson, &ledger).render(&parse(&lesson.raw_body));
//! assert!(rendered.markdown.contains("torch.zeros.html"));
//! assert!(rendered.issues.is_empty());
//! ```

mod markdown;

pub use markdown::{CurriculumOverview, LessonRenderer, RenderIssue, RenderedLesson};

/// Base URL of the generated API reference pages.
pub const DOCS_BASE_URL: &str = "https://pytorch.org/docs/stable/generated";

/// Documentation URL for a symbol such as `torch.nn.Linear`.
#[must_use]
pub fn doc_url(symbol: &str) -> String {
    format!("{DOCS_BASE_URL}/{symbol}.html")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_url() {
        assert_eq!(
            doc_url("torch.nn.Linear"),
            "https://pytorch.org/docs/stable/generated/torch.nn.Linear.html"
        );
    }
}
