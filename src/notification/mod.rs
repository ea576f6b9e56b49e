//! Success and error notices handed to the notification collaborator.
//!
//! - `Notice`: one user-facing message about a lifecycle operation
//! - `Notifier`: delivery seam; `TracingNotifier` logs, `RecordingNotifier` keeps them for tests

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::{info, warn};

use crate::errors::{ErrorKind, LifecycleError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    pub message: String,
    #[serde(skip)]
    pub kind: Option<ErrorKind>,
    pub created_at: DateTime<Utc>,
}

impl Notice {
    pub fn success(operation: &str, entity_id: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            operation: operation.to_string(),
            entity_id: entity_id.map(str::to_string),
            message: message.into(),
            kind: None,
            created_at: Utc::now(),
        }
    }

    pub fn failure(operation: &str, entity_id: Option<&str>, err: &LifecycleError) -> Self {
        Self {
            level: NoticeLevel::Error,
            operation: operation.to_string(),
            entity_id: entity_id.map(str::to_string),
            message: err.user_message(),
            kind: Some(err.kind()),
            created_at: Utc::now(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Default delivery: structured log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => info!(
                operation = %notice.operation,
                entity_id = ?notice.entity_id,
                "{}",
                notice.message
            ),
            NoticeLevel::Error => warn!(
                operation = %notice.operation,
                entity_id = ?notice.entity_id,
                kind = ?notice.kind,
                "{}",
                notice.message
            ),
        }
    }
}

/// Keeps every notice in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn last(&self) -> Option<Notice> {
        self.notices().pop()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_notice_uses_user_message() {
        let err = LifecycleError::validation(["reviewNotes"]);
        let notice = Notice::failure("review", Some("inc-1"), &err);
        assert!(notice.is_error());
        assert_eq!(notice.kind, Some(ErrorKind::Validation));
        assert_eq!(notice.message, "Please provide: reviewNotes");
    }

    #[test]
    fn test_recording_notifier_keeps_order() {
        let notifier = RecordingNotifier::new();
        notifier.notify(Notice::success("assign", Some("inc-1"), "Task assigned"));
        notifier.notify(Notice::success("accept_task", Some("task-1"), "Task accepted"));

        let notices = notifier.notices();
        assert_eq!(notices.len(), 2);
        assert_eq!(notifier.last().unwrap().operation, "accept_task");
    }
}
