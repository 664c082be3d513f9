//! Mixed-content lesson parser.
//!
//! Lessons are markdown with four embedded components:
//!
//! ```text
//! <CodeCell id="intro">print("hi")</CodeCell>
//! <Exercise id="ex-1" difficulty="easy">Create a 2x3 tensor.</Exercise>
//! <Callout type="tip" title="Shapes">Check `.shape` often.</Callout>
//! <DocRef symbol="torch.zeros" />
//! ```
//!
//! [`parse`] is a single left-to-right pass. At every `<` the component
//! grammars are tried in priority order; a match consumes everything up to
//! and including its end marker, so the inner text of a container is never
//! scanned again and matches cannot overlap. Anything that fails to match
//! stays in the surrounding markdown, so the parser never fails.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::lesson::{CalloutKind, Difficulty};

/// Typed content of one parsed segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentSegment {
    /// Narrative text between components, verbatim.
    Markdown {
        /// The text.
        text: String,
    },
    /// An executable code block.
    CodeCell {
        /// Cell id from the `id` attribute.
        cell_id: String,
        /// Trimmed source code.
        source_code: String,
    },
    /// A graded exercise, resolved against the lesson's definitions at render time.
    Exercise {
        /// Exercise id from the `id` attribute.
        exercise_id: String,
        /// Difficulty from the `difficulty` attribute, when recognized.
        difficulty_override: Option<Difficulty>,
        /// Trimmed inline description.
        description: String,
    },
    /// A highlighted note.
    Callout {
        /// Kind from the `type` attribute.
        kind: CalloutKind,
        /// Author title, if given.
        title: Option<String>,
        /// Trimmed body.
        body: String,
    },
    /// A link to API documentation.
    DocReference {
        /// Qualified symbol, e.g. `torch.nn.Linear`.
        symbol: String,
    },
}

impl ContentSegment {
    /// Whether this is narrative text.
    #[must_use]
    pub const fn is_markdown(&self) -> bool {
        matches!(self, Self::Markdown { .. })
    }
}

/// A parsed segment together with the byte range it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Byte range in the raw lesson body.
    pub span: Range<usize>,
    /// Typed content.
    pub content: ContentSegment,
}

/// Component grammars, in the order they are tried at a `<`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Component {
    CodeCell,
    Exercise,
    Callout,
    DocRef,
}

impl Component {
    const PRIORITY: [Self; 4] = [Self::CodeCell, Self::Exercise, Self::Callout, Self::DocRef];

    const fn tag(self) -> &'static str {
        match self {
            Self::CodeCell => "CodeCell",
            Self::Exercise => "Exercise",
            Self::Callout => "Callout",
            Self::DocRef => "DocRef",
        }
    }

    const fn end_marker(self) -> &'static str {
        match self {
            Self::CodeCell => "</CodeCell>",
            Self::Exercise => "</Exercise>",
            Self::Callout => "</Callout>",
            Self::DocRef => "</DocRef>",
        }
    }

    const fn is_void(self) -> bool {
        matches!(self, Self::DocRef)
    }
}

fn start_marker_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^<([A-Za-z]+)((?:\s+[A-Za-z_][\w-]*\s*=\s*"[^"]*")*)\s*(/?)>"#).ok()
    })
    .as_ref()
}

fn attribute_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"([A-Za-z_][\w-]*)\s*=\s*"([^"]*)""#).ok())
        .as_ref()
}

/// Parses a lesson body into ordered segments.
///
/// Concatenating the spans of the result reconstructs `raw` exactly.
#[must_use]
pub fn parse(raw: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut text_start = 0;
    let mut cursor = 0;

    while let Some(offset) = raw[cursor..].find('<') {
        let at = cursor + offset;
        match match_component(raw, at) {
            Some((end, content)) => {
                push_markdown(&mut segments, raw, text_start..at);
                segments.push(Segment {
                    span: at..end,
                    content,
                });
                cursor = end;
                text_start = end;
            }
            // `<` is a single byte, so `at + 1` stays on a char boundary.
            None => cursor = at + 1,
        }
    }

    push_markdown(&mut segments, raw, text_start..raw.len());
    segments
}

fn push_markdown(segments: &mut Vec<Segment>, raw: &str, span: Range<usize>) {
    if span.is_empty() {
        return;
    }
    segments.push(Segment {
        content: ContentSegment::Markdown {
            text: raw[span.clone()].to_string(),
        },
        span,
    });
}

/// Tries every component grammar at `at`, returning the end offset and content.
fn match_component(raw: &str, at: usize) -> Option<(usize, ContentSegment)> {
    let caps = start_marker_regex()?.captures(&raw[at..])?;
    let name = caps.get(1)?.as_str();
    let component = Component::PRIORITY
        .into_iter()
        .find(|c| c.tag() == name)?;

    let start_end = at + caps.get(0)?.end();
    let attrs = parse_attributes(caps.get(2).map_or("", |m| m.as_str()));
    let self_closing = caps.get(3).is_some_and(|m| !m.as_str().is_empty());

    if component.is_void() {
        let symbol = required(&attrs, "symbol")?;
        let mut end = start_end;
        if !self_closing && raw[end..].starts_with(component.end_marker()) {
            end += component.end_marker().len();
        }
        return Some((end, ContentSegment::DocReference { symbol }));
    }

    if self_closing {
        return None;
    }

    let inner_len = raw[start_end..].find(component.end_marker())?;
    let inner = raw[start_end..start_end + inner_len].trim();
    let end = start_end + inner_len + component.end_marker().len();

    let content = match component {
        Component::CodeCell => ContentSegment::CodeCell {
            cell_id: required(&attrs, "id")?,
            source_code: inner.to_string(),
        },
        Component::Exercise => ContentSegment::Exercise {
            exercise_id: required(&attrs, "id")?,
            difficulty_override: attrs
                .get("difficulty")
                .and_then(|d| Difficulty::from_str_case_insensitive(d)),
            description: inner.to_string(),
        },
        Component::Callout => ContentSegment::Callout {
            kind: attrs
                .get("type")
                .and_then(|k| CalloutKind::from_str_case_insensitive(k))
                .unwrap_or_default(),
            title: attrs
                .get("title")
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            body: inner.to_string(),
        },
        Component::DocRef => return None,
    };

    Some((end, content))
}

/// First occurrence of each attribute wins.
fn parse_attributes(source: &str) -> HashMap<&str, &str> {
    let mut attrs = HashMap::new();
    let Some(re) = attribute_regex() else {
        return attrs;
    };
    for cap in re.captures_iter(source) {
        if let (Some(name), Some(value)) = (cap.get(1), cap.get(2)) {
            attrs.entry(name.as_str()).or_insert(value.as_str());
        }
    }
    attrs
}

fn required(attrs: &HashMap<&str, &str>, name: &str) -> Option<String> {
    attrs
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

/// Code cells in document order as `(cell_id, source_code)`.
#[must_use]
pub fn code_cells(segments: &[Segment]) -> Vec<(&str, &str)> {
    segments
        .iter()
        .filter_map(|s| match &s.content {
            ContentSegment::CodeCell {
                cell_id,
                source_code,
            } => Some((cell_id.as_str(), source_code.as_str())),
            _ => None,
        })
        .collect()
}

/// Exercise ids in document order.
#[must_use]
pub fn exercise_ids(segments: &[Segment]) -> Vec<&str> {
    segments
        .iter()
        .filter_map(|s| match &s.content {
            ContentSegment::Exercise { exercise_id, .. } => Some(exercise_id.as_str()),
            _ => None,
        })
        .collect()
}
