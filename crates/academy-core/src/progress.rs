//! The learner's completion ledger.
//!
//! [`ProgressStore`] owns the in-memory [`ProgressLedger`] and writes it to a
//! [`DurableStore`] after every effective change. The ledger only grows:
//! completing something twice is a no-op, and [`ProgressStore::reset_progress`]
//! is the single way to remove entries.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::Result;
use crate::events::{ProgressBroadcaster, ProgressEvent};
use crate::lesson::Curriculum;
use crate::storage::{load_record, record_key, save_record, DurableStore};

/// Concern name used in the record key.
pub const PROGRESS_CONCERN: &str = "progress";

/// Persisted completion state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressLedger {
    /// Modules marked complete.
    #[serde(default)]
    pub completed_modules: BTreeSet<String>,
    /// Passed exercises per module.
    #[serde(default)]
    pub completed_exercises: BTreeMap<String, BTreeSet<String>>,
    /// Module the learner last opened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_module: Option<String>,
}

impl ProgressLedger {
    /// Whether the module is marked complete.
    #[must_use]
    pub fn is_module_completed(&self, module_id: &str) -> bool {
        self.completed_modules.contains(module_id)
    }

    /// Whether the exercise has passed.
    #[must_use]
    pub fn is_exercise_completed(&self, module_id: &str, exercise_id: &str) -> bool {
        self.completed_exercises
            .get(module_id)
            .is_some_and(|set| set.contains(exercise_id))
    }

    /// Number of passed exercises in a module.
    #[must_use]
    pub fn completed_exercise_count(&self, module_id: &str) -> usize {
        self.completed_exercises.get(module_id).map_or(0, BTreeSet::len)
    }

    /// Percentage of a module's exercises that have passed, 0 to 100.
    ///
    /// Zero when the module has no exercises.
    #[must_use]
    pub fn module_progress_percent(&self, module_id: &str, total_exercises: usize) -> u8 {
        percent(self.completed_exercise_count(module_id), total_exercises)
    }

    /// Completed modules out of the curriculum's modules.
    #[must_use]
    pub fn curriculum_progress(&self, curriculum: &Curriculum) -> CurriculumProgress {
        let total_modules = curriculum.modules().count();
        let completed_modules = curriculum
            .modules()
            .filter(|m| self.is_module_completed(&m.id))
            .count();
        CurriculumProgress {
            completed_modules,
            total_modules,
            percent: percent(completed_modules, total_modules),
        }
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.completed_modules.is_empty()
            && self.completed_exercises.is_empty()
            && self.current_module.is_none()
    }
}

/// Rounded share of `completed` in `total`, capped at 100.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let value = (completed as f64 / total as f64 * 100.0).round();
    value.min(100.0) as u8
}

/// Aggregate completion across a curriculum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumProgress {
    /// Completed modules that belong to the curriculum.
    pub completed_modules: usize,
    /// Modules in the curriculum.
    pub total_modules: usize,
    /// Rounded completion percentage.
    pub percent: u8,
}

/// Ledger plus persistence and change notification.
pub struct ProgressStore {
    ledger: ProgressLedger,
    storage: Arc<dyn DurableStore>,
    key: String,
    events: ProgressBroadcaster,
}

impl std::fmt::Debug for ProgressStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressStore")
            .field("ledger", &self.ledger)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl ProgressStore {
    /// Loads the ledger stored under `<namespace>-progress`.
    ///
    /// A missing or malformed record yields an empty ledger.
    #[must_use]
    pub fn load(storage: Arc<dyn DurableStore>, namespace: &str) -> Self {
        let key = record_key(namespace, PROGRESS_CONCERN);
        let ledger = load_record::<ProgressLedger>(storage.as_ref(), &key).unwrap_or_default();
        debug!(
            key = %key,
            completed_modules = ledger.completed_modules.len(),
            "Progress loaded"
        );
        Self {
            ledger,
            storage,
            key,
            events: ProgressBroadcaster::default(),
        }
    }

    /// Current ledger snapshot.
    #[must_use]
    pub const fn ledger(&self) -> &ProgressLedger {
        &self.ledger
    }

    /// Subscribes to change events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    /// Marks a module complete. Returns whether the ledger changed.
    ///
    /// # Errors
    ///
    /// Returns a storage error if persisting fails. The in-memory ledger
    /// keeps the change either way.
    pub fn complete_module(&mut self, module_id: &str) -> Result<bool> {
        if !self.ledger.completed_modules.insert(module_id.to_string()) {
            return Ok(false);
        }
        info!(module_id, "Module completed");
        self.commit(ProgressEvent::module_completed(module_id))?;
        Ok(true)
    }

    /// Marks an exercise passed. Returns whether the ledger changed.
    ///
    /// # Errors
    ///
    /// Same as [`ProgressStore::complete_module`].
    pub fn complete_exercise(&mut self, module_id: &str, exercise_id: &str) -> Result<bool> {
        let inserted = self
            .ledger
            .completed_exercises
            .entry(module_id.to_string())
            .or_default()
            .insert(exercise_id.to_string());
        if !inserted {
            return Ok(false);
        }
        info!(module_id, exercise_id, "Exercise completed");
        self.commit(ProgressEvent::exercise_completed(module_id, exercise_id))?;
        Ok(true)
    }

    /// Records the module the learner is on.
    ///
    /// # Errors
    ///
    /// Same as [`ProgressStore::complete_module`].
    pub fn set_current_module(&mut self, module_id: &str) -> Result<bool> {
        if self.ledger.current_module.as_deref() == Some(module_id) {
            return Ok(false);
        }
        self.ledger.current_module = Some(module_id.to_string());
        self.commit(ProgressEvent::current_module_changed(module_id))?;
        Ok(true)
    }

    /// Clears the whole ledger.
    ///
    /// # Errors
    ///
    /// Same as [`ProgressStore::complete_module`].
    pub fn reset_progress(&mut self) -> Result<bool> {
        if self.ledger.is_empty() {
            return Ok(false);
        }
        self.ledger = ProgressLedger::default();
        info!("Progress reset");
        self.commit(ProgressEvent::reset())?;
        Ok(true)
    }

    /// See [`ProgressLedger::is_module_completed`].
    #[must_use]
    pub fn is_module_completed(&self, module_id: &str) -> bool {
        self.ledger.is_module_completed(module_id)
    }

    /// See [`ProgressLedger::is_exercise_completed`].
    #[must_use]
    pub fn is_exercise_completed(&self, module_id: &str, exercise_id: &str) -> bool {
        self.ledger.is_exercise_completed(module_id, exercise_id)
    }

    /// See [`ProgressLedger::completed_exercise_count`].
    #[must_use]
    pub fn completed_exercise_count(&self, module_id: &str) -> usize {
        self.ledger.completed_exercise_count(module_id)
    }

    /// See [`ProgressLedger::module_progress_percent`].
    #[must_use]
    pub fn module_progress_percent(&self, module_id: &str, total_exercises: usize) -> u8 {
        self.ledger.module_progress_percent(module_id, total_exercises)
    }

    /// Completed modules out of the curriculum's modules.
    ///
    /// Completed ids that are not part of the curriculum are not counted.
    #[must_use]
    pub fn curriculum_progress(&self, curriculum: &Curriculum) -> CurriculumProgress {
        self.ledger.curriculum_progress(curriculum)
    }

    /// Notifies subscribers, then persists. Subscribers see the change even
    /// when the write fails, because readers observe the in-memory ledger.
    fn commit(&self, event: ProgressEvent) -> Result<()> {
        self.events.send(event);
        save_record(self.storage.as_ref(), &self.key, &self.ledger)
    }
}
