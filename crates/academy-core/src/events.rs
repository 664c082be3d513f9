//! Progress change notifications.
//!
//! The progress store publishes one event per effective ledger change so
//! completion badges, dashboards and other observers stay in sync without
//! polling. Mutations that change nothing publish nothing.
//!
//! # Example
//!
//! ```
//! use academy_core::events::{ProgressBroadcaster, ProgressEvent};
//!
//! # async fn example() {
//! let broadcaster = ProgressBroadcaster::new(16);
//! let mut receiver = broadcaster.subscribe();
//!
//! broadcaster.send(ProgressEvent::module_completed("01-tensors"));
//!
//! if let Ok(event) = receiver.recv().await {
//!     assert_eq!(event.event_name(), "module_completed");
//! }
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ============================================================================
// Event Payloads
// ============================================================================

/// Payload for the `module_completed` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleCompletedPayload {
    /// The module that was marked complete.
    pub module_id: String,
    /// When the change happened.
    pub timestamp: DateTime<Utc>,
}

/// Payload for the `exercise_completed` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseCompletedPayload {
    /// Module owning the exercise.
    pub module_id: String,
    /// The exercise that passed.
    pub exercise_id: String,
    /// When the change happened.
    pub timestamp: DateTime<Utc>,
}

/// Payload for the `current_module_changed` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentModuleChangedPayload {
    /// The new current module.
    pub module_id: String,
    /// When the change happened.
    pub timestamp: DateTime<Utc>,
}

/// Payload for the `reset` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetPayload {
    /// When the ledger was cleared.
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Event Enum
// ============================================================================

/// A change to the progress ledger.
///
/// Serialized as a JSON object with "event" and "payload" fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A module was added to the completed set.
    ModuleCompleted(ModuleCompletedPayload),
    /// An exercise was added to its module's completed set.
    ExerciseCompleted(ExerciseCompletedPayload),
    /// The current module was overwritten.
    CurrentModuleChanged(CurrentModuleChangedPayload),
    /// The ledger was cleared.
    Reset(ResetPayload),
}

impl ProgressEvent {
    /// Creates a `ModuleCompleted` event.
    #[must_use]
    pub fn module_completed(module_id: impl Into<String>) -> Self {
        Self::ModuleCompleted(ModuleCompletedPayload {
            module_id: module_id.into(),
            timestamp: Utc::now(),
        })
    }

    /// Creates an `ExerciseCompleted` event.
    #[must_use]
    pub fn exercise_completed(module_id: impl Into<String>, exercise_id: impl Into<String>) -> Self {
        Self::ExerciseCompleted(ExerciseCompletedPayload {
            module_id: module_id.into(),
            exercise_id: exercise_id.into(),
            timestamp: Utc::now(),
        })
    }

    /// Creates a `CurrentModuleChanged` event.
    #[must_use]
    pub fn current_module_changed(module_id: impl Into<String>) -> Self {
        Self::CurrentModuleChanged(CurrentModuleChangedPayload {
            module_id: module_id.into(),
            timestamp: Utc::now(),
        })
    }

    /// Creates a `Reset` event.
    #[must_use]
    pub fn reset() -> Self {
        Self::Reset(ResetPayload {
            timestamp: Utc::now(),
        })
    }

    /// Returns the event name as a string.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::ModuleCompleted(_) => "module_completed",
            Self::ExerciseCompleted(_) => "exercise_completed",
            Self::CurrentModuleChanged(_) => "current_module_changed",
            Self::Reset(_) => "reset",
        }
    }
}

// ============================================================================
// Broadcaster
// ============================================================================

/// Fans progress events out to every subscriber.
///
/// Events are not retained for subscribers that join later.
#[derive(Debug, Clone)]
pub struct ProgressBroadcaster {
    sender: broadcast::Sender<ProgressEvent>,
}

impl ProgressBroadcaster {
    /// Creates a broadcaster buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new subscriber.
    ///
    /// A subscriber that falls behind receives `Lagged` and misses events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event, returning how many subscribers will see it.
    pub fn send(&self, event: ProgressEvent) -> usize {
        // Err only means nobody is listening.
        self.sender.send(event).unwrap_or(0)
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ProgressBroadcaster {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(ProgressEvent::module_completed("m").event_name(), "module_completed");
        assert_eq!(
            ProgressEvent::exercise_completed("m", "e").event_name(),
            "exercise_completed"
        );
        assert_eq!(
            ProgressEvent::current_module_changed("m").event_name(),
            "current_module_changed"
        );
        assert_eq!(ProgressEvent::reset().event_name(), "reset");
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = ProgressEvent::exercise_completed("01-tensors", "ex-1");
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event"], "exercise_completed");
        assert_eq!(json["payload"]["moduleId"], "01-tensors");
        assert_eq!(json["payload"]["exerciseId"], "ex-1");
        assert!(json["payload"]["timestamp"].is_string());
    }

    #[test]
    fn test_send_without_subscribers_returns_zero() {
        let broadcaster = ProgressBroadcaster::default();
        assert_eq!(broadcaster.receiver_count(), 0);
        assert_eq!(broadcaster.send(ProgressEvent::reset()), 0);
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let broadcaster = ProgressBroadcaster::new(8);
        let mut first = broadcaster.subscribe();
        let mut second = broadcaster.subscribe();

        assert_eq!(broadcaster.send(ProgressEvent::module_completed("02-ops")), 2);

        let a = first.recv().await.unwrap();
        let b = second.recv().await.unwrap();
        assert_eq!(a, b);
        assert!(matches!(a, ProgressEvent::ModuleCompleted(p) if p.module_id == "02-ops"));
    }
}
