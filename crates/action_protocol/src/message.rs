//! Serializable message types for live-reload servers.
//!
//! Conveyor does not implement a reload server. After a task marked `reload`
//! completes it emits a [`CompletionMessage`]; an external server decides how
//! to push the refresh to connected browsers.

use crate::types::ActionReport;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// "Task completed" notification sent to a live-reload collaborator.
///
/// Serialized as JSON with camelCase keys:
///
/// ```rust
/// # use conveyor_action_protocol::CompletionMessage;
/// let message = CompletionMessage::new("build:html", vec!["build/index.html".into()]);
/// let json = message.to_json().unwrap();
/// assert!(json.contains("\"task\":\"build:html\""));
/// assert!(json.contains("\"finishedAt\""));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionMessage {
    /// The task that completed.
    pub task: String,

    /// Paths the task wrote, so the server can decide between a CSS
    /// injection and a full page reload.
    pub written: Vec<String>,

    /// Completion time in milliseconds since the Unix epoch.
    pub finished_at: u64,
}

impl CompletionMessage {
    #[must_use]
    pub fn new(task: impl Into<String>, written: Vec<PathBuf>) -> Self {
        let finished_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default();

        Self {
            task: task.into(),
            written: written
                .into_iter()
                .map(|path| path.display().to_string())
                .collect(),
            finished_at,
        }
    }

    /// Build a message from the report of the action that just finished.
    #[must_use]
    pub fn from_report(task: impl Into<String>, report: &ActionReport) -> Self {
        Self::new(task, report.written.clone())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_round_trips_through_json() {
        let report = ActionReport::written(vec![PathBuf::from("build/css/main.css")]);
        let message = CompletionMessage::from_report("dev:scss", &report);

        let json = message.to_json().unwrap();
        let back: CompletionMessage = serde_json::from_str(&json).unwrap();

        assert_eq!(back, message);
        assert_eq!(back.written, vec!["build/css/main.css".to_string()]);
        assert!(back.finished_at > 0);
    }
}
