use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use super::{find_rule, Gate, TransitionRule, SUPERVISORY};
use crate::domain::{Incident, IncidentStatus, Task, TaskStatus, UserSession};
use crate::errors::{LifecycleError, TransitionError};
use crate::observability::lifecycle_metrics;

use TaskStatus::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskEvent {
    Accept,
    SubmitSurvey,
    Finalize,
    RequestRevision,
    Resume,
    Cancel,
}

impl TaskEvent {
    pub const ALL: [TaskEvent; 6] = [
        TaskEvent::Accept,
        TaskEvent::SubmitSurvey,
        TaskEvent::Finalize,
        TaskEvent::RequestRevision,
        TaskEvent::Resume,
        TaskEvent::Cancel,
    ];

    pub fn target(self) -> TaskStatus {
        match self {
            TaskEvent::Accept | TaskEvent::Resume => InProgress,
            TaskEvent::SubmitSurvey => Surveyed,
            TaskEvent::Finalize => Completed,
            TaskEvent::RequestRevision => RevisionRequired,
            TaskEvent::Cancel => Cancelled,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskEvent::Accept => "ACCEPT",
            TaskEvent::SubmitSurvey => "SUBMIT_SURVEY",
            TaskEvent::Finalize => "FINALIZE",
            TaskEvent::RequestRevision => "REQUEST_REVISION",
            TaskEvent::Resume => "RESUME",
            TaskEvent::Cancel => "CANCEL",
        }
    }
}

impl fmt::Display for TaskEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub static TASK_TRANSITIONS: &[TransitionRule<TaskStatus, TaskEvent>] = &[
    TransitionRule {
        from: &[Pending],
        event: TaskEvent::Accept,
        to: InProgress,
        gate: Gate::Assignee,
    },
    TransitionRule {
        from: &[Pending, InProgress],
        event: TaskEvent::SubmitSurvey,
        to: Surveyed,
        gate: Gate::Assignee,
    },
    TransitionRule {
        from: &[Surveyed],
        event: TaskEvent::Finalize,
        to: Completed,
        gate: Gate::Roles(SUPERVISORY),
    },
    TransitionRule {
        from: &[Surveyed],
        event: TaskEvent::RequestRevision,
        to: RevisionRequired,
        gate: Gate::Roles(SUPERVISORY),
    },
    TransitionRule {
        from: &[RevisionRequired],
        event: TaskEvent::Resume,
        to: InProgress,
        gate: Gate::Assignee,
    },
    TransitionRule {
        from: &[Pending, InProgress, Surveyed, RevisionRequired],
        event: TaskEvent::Cancel,
        to: Cancelled,
        gate: Gate::Roles(SUPERVISORY),
    },
];

/// Field task transitions. Every event except a cancel also requires the
/// parent incident to be in progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskLifecycle;

impl TaskLifecycle {
    /// Resolve the status `event` leads to, checking the actor and the parent incident.
    pub fn check(
        task: &Task,
        incident: &Incident,
        event: TaskEvent,
        actor: &UserSession,
    ) -> Result<TaskStatus, LifecycleError> {
        if task.incident_id != incident.id {
            return Err(LifecycleError::validation(["incidentId"]));
        }

        // Accepting twice is idempotent for the assignee only
        if event == TaskEvent::Accept && task.status == InProgress {
            return if task.is_assigned_to(&actor.id) {
                Ok(InProgress)
            } else {
                Err(LifecycleError::forbidden(
                    format!("accept task {}", task.id),
                    "task is already accepted by its assignee",
                ))
            };
        }

        let to = event.target();
        let rule = find_rule(TASK_TRANSITIONS, task.status, event).ok_or_else(|| {
            TransitionError::new(
                task.status,
                to,
                format!("{event} is not allowed from {}", task.status),
            )
        })?;

        if !rule.gate.admits(actor, task) {
            let reason = match rule.gate {
                Gate::Assignee => format!("only the assignee {} may do this", task.assigned_to_id),
                Gate::Roles(_) => format!("role {} is not permitted", actor.role),
            };
            return Err(LifecycleError::forbidden(
                format!("{} task {}", event.as_str().to_lowercase(), task.id),
                reason,
            ));
        }

        if event != TaskEvent::Cancel && incident.status != IncidentStatus::InProgress {
            return Err(TransitionError::new(
                task.status,
                to,
                format!("incident {} is {}", incident.id, incident.status),
            )
            .into());
        }

        Ok(rule.to)
    }

    /// Apply `event`; the input task is never modified.
    pub fn apply(
        task: &Task,
        incident: &Incident,
        event: TaskEvent,
        actor: &UserSession,
    ) -> Result<Task, LifecycleError> {
        let to = Self::plan(task, incident, event, actor)?;
        if to == task.status {
            debug!(task_id = %task.id, event = %event, "Task already in target status");
            return Ok(task.clone());
        }
        let mut next = task.clone();
        next.status = to;
        next.updated_at = Utc::now();
        Self::record_applied(task, to, event, actor);
        Ok(next)
    }

    /// `check`, with rejections logged and counted. Nothing is counted as
    /// applied until the caller reports it through `record_applied`.
    pub fn plan(
        task: &Task,
        incident: &Incident,
        event: TaskEvent,
        actor: &UserSession,
    ) -> Result<TaskStatus, LifecycleError> {
        Self::check(task, incident, event, actor).inspect_err(|err| {
            lifecycle_metrics().record_rejection();
            warn!(
                task_id = %task.id,
                event = %event,
                actor = %actor.id,
                error = %err,
                "Task transition rejected"
            );
        })
    }

    /// Count a move from `task`'s status to `to` once it has taken effect.
    pub fn record_applied(task: &Task, to: TaskStatus, event: TaskEvent, actor: &UserSession) {
        if to == task.status {
            return;
        }
        lifecycle_metrics().record_transition();
        info!(
            task_id = %task.id,
            incident_id = %task.incident_id,
            from = %task.status,
            to = %to,
            event = %event,
            actor = %actor.id,
            "Task transition applied"
        );
    }

    pub fn accept_task(
        task: &Task,
        incident: &Incident,
        actor: &UserSession,
    ) -> Result<Task, LifecycleError> {
        Self::apply(task, incident, TaskEvent::Accept, actor)
    }

    pub fn finalize(
        task: &Task,
        incident: &Incident,
        actor: &UserSession,
    ) -> Result<Task, LifecycleError> {
        Self::apply(task, incident, TaskEvent::Finalize, actor)
    }

    pub fn request_revision(
        task: &Task,
        incident: &Incident,
        actor: &UserSession,
    ) -> Result<Task, LifecycleError> {
        Self::apply(task, incident, TaskEvent::RequestRevision, actor)
    }

    pub fn resume(
        task: &Task,
        incident: &Incident,
        actor: &UserSession,
    ) -> Result<Task, LifecycleError> {
        Self::apply(task, incident, TaskEvent::Resume, actor)
    }

    pub fn cancel(
        task: &Task,
        incident: &Incident,
        actor: &UserSession,
    ) -> Result<Task, LifecycleError> {
        Self::apply(task, incident, TaskEvent::Cancel, actor)
    }

    /// Events `actor` could fire on `task` right now.
    pub fn available_events(
        task: &Task,
        incident: &Incident,
        actor: &UserSession,
    ) -> Vec<TaskEvent> {
        TaskEvent::ALL
            .into_iter()
            .filter(|event| {
                matches!(Self::check(task, incident, *event, actor), Ok(to) if to != task.status)
            })
            .collect()
    }

    /// Whether any row joins `from` and `to`, regardless of who asks.
    pub fn is_known_transition(from: TaskStatus, to: TaskStatus) -> bool {
        TASK_TRANSITIONS
            .iter()
            .any(|rule| rule.to == to && rule.from.contains(&from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DisasterType, IncidentId, NewIncident, TaskDraft, UserId};
    use crate::errors::ErrorKind;
    use crate::geo::{GeoPoint, LatLng};
    use crate::priority::Priority;

    fn incident(status: IncidentStatus) -> Incident {
        let mut incident = Incident::report(
            NewIncident {
                title: "Flash flood".to_string(),
                description: "River over its banks".to_string(),
                priority: Priority::High,
                disaster_type: DisasterType::Flood,
                location: GeoPoint::from_lat_lng(LatLng::new(18.79, 98.98)),
                address: None,
                village_id: None,
                images: vec![],
            },
            &UserId::from("reporter"),
        );
        incident.status = status;
        incident
    }

    fn task_for(incident: &Incident, status: TaskStatus) -> Task {
        let mut task = TaskDraft {
            title: "Survey flood extent".to_string(),
            priority: Priority::High,
            incident_id: incident.id.clone(),
            assigned_to_id: UserId::from("officer-a"),
            created_by_id: UserId::from("sup-1"),
            due_date: None,
            assignment_notes: None,
        }
        .into_task();
        task.status = status;
        task
    }

    fn officer_a() -> UserSession {
        UserSession::new("officer-a", crate::domain::Role::FieldOfficer)
    }

    fn supervisor() -> UserSession {
        UserSession::new("sup-1", crate::domain::Role::Supervisor)
    }

    #[test]
    fn test_assignee_accepts_pending_task() {
        let incident = incident(IncidentStatus::InProgress);
        let task = task_for(&incident, Pending);

        let accepted = TaskLifecycle::accept_task(&task, &incident, &officer_a()).unwrap();
        assert_eq!(accepted.status, InProgress);
        assert_eq!(task.status, Pending);
    }

    #[test]
    fn test_accept_is_idempotent_for_assignee() {
        let incident = incident(IncidentStatus::InProgress);
        let task = task_for(&incident, InProgress);

        let again = TaskLifecycle::accept_task(&task, &incident, &officer_a()).unwrap();
        assert_eq!(again, task);
    }

    #[test]
    fn test_accept_by_other_user_is_forbidden() {
        let incident = incident(IncidentStatus::InProgress);
        let intruder = UserSession::new("officer-b", crate::domain::Role::FieldOfficer);

        for status in [Pending, InProgress] {
            let task = task_for(&incident, status);
            let err = TaskLifecycle::accept_task(&task, &incident, &intruder).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Forbidden);
        }
    }

    #[test]
    fn test_task_requires_incident_in_progress() {
        let incident = incident(IncidentStatus::Resolved);
        let task = task_for(&incident, Pending);

        let err = TaskLifecycle::accept_task(&task, &incident, &officer_a()).unwrap_err();
        assert!(matches!(err, LifecycleError::TaskTransition(_)));
    }

    #[test]
    fn test_cancel_allowed_while_incident_closed() {
        let incident = incident(IncidentStatus::Closed);
        let task = task_for(&incident, Surveyed);

        let cancelled = TaskLifecycle::cancel(&task, &incident, &supervisor()).unwrap();
        assert_eq!(cancelled.status, Cancelled);
    }

    #[test]
    fn test_revision_round_trip() {
        let incident = incident(IncidentStatus::InProgress);
        let task = task_for(&incident, Surveyed);

        let revision = TaskLifecycle::request_revision(&task, &incident, &supervisor()).unwrap();
        assert_eq!(revision.status, RevisionRequired);

        let resumed = TaskLifecycle::resume(&revision, &incident, &officer_a()).unwrap();
        assert_eq!(resumed.status, InProgress);
    }

    #[test]
    fn test_field_officer_cannot_finalize() {
        let incident = incident(IncidentStatus::InProgress);
        let task = task_for(&incident, Surveyed);

        let err = TaskLifecycle::finalize(&task, &incident, &officer_a()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[test]
    fn test_terminal_tasks_reject_everything() {
        let incident = incident(IncidentStatus::InProgress);
        for status in [Completed, Cancelled] {
            let task = task_for(&incident, status);
            for event in TaskEvent::ALL {
                assert!(TaskLifecycle::apply(&task, &incident, event, &supervisor()).is_err());
                assert!(TaskLifecycle::apply(&task, &incident, event, &officer_a()).is_err());
            }
        }
    }

    #[test]
    fn test_mismatched_incident_is_validation_error() {
        let incident = incident(IncidentStatus::InProgress);
        let mut task = task_for(&incident, Pending);
        task.incident_id = IncidentId::from("someone-else");

        let err = TaskLifecycle::accept_task(&task, &incident, &officer_a()).unwrap_err();
        assert_eq!(err.fields(), ["incidentId"]);
    }

    #[test]
    fn test_available_events() {
        let incident = incident(IncidentStatus::InProgress);
        let task = task_for(&incident, Pending);

        assert_eq!(
            TaskLifecycle::available_events(&task, &incident, &officer_a()),
            vec![TaskEvent::Accept, TaskEvent::SubmitSurvey]
        );
        assert_eq!(
            TaskLifecycle::available_events(&task, &incident, &supervisor()),
            vec![TaskEvent::Cancel]
        );
    }
}
