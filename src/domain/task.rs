use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{IncidentId, TaskId, UserId};
use crate::geo::{GeoPoint, GeoPolygon};
use crate::priority::Priority;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Surveyed,
    Completed,
    Cancelled,
    RevisionRequired,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Surveyed,
        TaskStatus::Completed,
        TaskStatus::Cancelled,
        TaskStatus::RevisionRequired,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }

    /// Counts against the one-active-task-per-incident rule.
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Surveyed => "SURVEYED",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Cancelled => "CANCELLED",
            TaskStatus::RevisionRequired => "REVISION_REQUIRED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub incident_id: IncidentId,
    pub assigned_to_id: UserId,
    pub created_by_id: UserId,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survey_location: Option<GeoPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survey_area: Option<GeoPolygon>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survey_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub survey_photos: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn is_assigned_to(&self, user: &UserId) -> bool {
        &self.assigned_to_id == user
    }

    pub fn has_survey_geometry(&self) -> bool {
        self.survey_location.is_some() || self.survey_area.is_some()
    }
}

/// Everything needed to build the task an assignment creates.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub priority: Priority,
    pub incident_id: IncidentId,
    pub assigned_to_id: UserId,
    pub created_by_id: UserId,
    pub due_date: Option<DateTime<Utc>>,
    pub assignment_notes: Option<String>,
}

impl TaskDraft {
    pub fn into_task(self) -> Task {
        let now = Utc::now();
        Task {
            id: TaskId::generate(),
            title: self.title,
            status: TaskStatus::Pending,
            priority: self.priority,
            incident_id: self.incident_id,
            assigned_to_id: self.assigned_to_id,
            created_by_id: self.created_by_id,
            due_date: self.due_date,
            assignment_notes: self.assignment_notes,
            survey_location: None,
            survey_area: None,
            survey_notes: None,
            survey_photos: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        let terminal: Vec<_> = TaskStatus::ALL.iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal, vec![&TaskStatus::Completed, &TaskStatus::Cancelled]);
        assert!(TaskStatus::RevisionRequired.is_active());
        assert!(TaskStatus::Surveyed.is_active());
    }

    #[test]
    fn test_draft_creates_pending_task() {
        let task = TaskDraft {
            title: "Survey flood extent".to_string(),
            priority: Priority::High,
            incident_id: IncidentId::from("inc-1"),
            assigned_to_id: UserId::from("officer-a"),
            created_by_id: UserId::from("sup-1"),
            due_date: None,
            assignment_notes: Some("bring waders".to_string()),
        }
        .into_task();

        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.is_assigned_to(&UserId::from("officer-a")));
        assert!(!task.has_survey_geometry());

        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["assignedToId"], "officer-a");
        assert_eq!(json["status"], "PENDING");
        assert!(json.get("surveyArea").is_none());
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::RevisionRequired).unwrap(),
            "\"REVISION_REQUIRED\""
        );
        assert_eq!(TaskStatus::InProgress.to_string(), "IN_PROGRESS");
    }
}
