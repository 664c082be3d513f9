//! Academy core: lesson model, content parser and learner progress.
//!
//! This crate has no network or interpreter dependencies. It provides:
//!
//! - [`config`]: `academy.json` loading and validation
//! - [`lesson`] and [`content`]: lesson/curriculum types and the content directory loader
//! - [`parser`]: splits a lesson body into ordered, typed segments
//! - [`progress`] and [`preferences`]: persisted learner state over [`storage`]
//! - [`events`]: change notifications for the progress ledger
//! - [`verify`]: consistency checks for a content directory

pub mod config;
pub mod content;
pub mod error;
pub mod events;
pub mod lesson;
pub mod parser;
pub mod preferences;
pub mod progress;
pub mod storage;
pub mod verify;

pub use config::{BackendKind, Config, ExecutionConfig, HttpConfig, SectionConfig};
pub use content::ContentLibrary;
pub use error::{AcademyError, Result};
pub use events::{ProgressBroadcaster, ProgressEvent};
pub use lesson::{
    CalloutKind, Curriculum, Difficulty, ExerciseSpec, LessonContent, ModuleMetadata, Section,
    ValidationKind, ValidationSpec,
};
pub use parser::{parse, ContentSegment, Segment};
pub use preferences::{PreferencesStore, Theme, UiState};
pub use progress::{CurriculumProgress, ProgressLedger, ProgressStore};
pub use storage::{DurableStore, FileStore, MemoryStore};
pub use verify::{IssueKind, VerificationIssue, VerificationReport};
