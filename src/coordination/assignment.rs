use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn, Instrument};

use super::CoordinatorContext;
use crate::config::{ResponseConfig, TaskPriorityPolicy};
use crate::domain::{
    EntityKind, Incident, IncidentId, IncidentStatus, Role, Task, TaskDraft, UserId, UserSession,
};
use crate::errors::{LifecycleError, PersistenceError};
use crate::lifecycle::{IncidentEvent, IncidentLifecycle};
use crate::observability::lifecycle_metrics;
use crate::priority::Priority;
use crate::telemetry::{create_operation_span, generate_correlation_id};

/// Body of an assignment, as the supervisor fills it in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub field_officer_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    /// Defaults to the incident title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl AssignRequest {
    pub fn new(field_officer_id: impl Into<String>) -> Self {
        Self {
            field_officer_id: UserId::new(field_officer_id),
            notes: None,
            priority: None,
            due_date: None,
            title: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }
}

/// Both halves of a successful assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub incident: Incident,
    pub task: Task,
}

/// Turns a pending incident into a field task for one officer.
#[derive(Clone)]
pub struct AssignmentCoordinator {
    ctx: CoordinatorContext,
    priority_policy: TaskPriorityPolicy,
}

impl AssignmentCoordinator {
    pub fn new(ctx: CoordinatorContext) -> Self {
        Self {
            ctx,
            priority_policy: TaskPriorityPolicy::default(),
        }
    }

    pub fn from_config(ctx: CoordinatorContext, config: &ResponseConfig) -> Self {
        Self::new(ctx).with_priority_policy(config.lifecycle.task_priority_policy)
    }

    pub fn with_priority_policy(mut self, policy: TaskPriorityPolicy) -> Self {
        self.priority_policy = policy;
        self
    }

    /// Create the task, then move the incident to IN_PROGRESS. Reports success
    /// only when both are persisted; a created task is deleted again otherwise.
    pub async fn assign(
        &self,
        actor: &UserSession,
        incident_id: &IncidentId,
        request: AssignRequest,
    ) -> Result<Assignment, LifecycleError> {
        let span = create_operation_span(
            "assign",
            Some(incident_id.as_str()),
            &generate_correlation_id(),
        );
        let result = self
            .assign_inner(actor, incident_id, request)
            .instrument(span)
            .await;
        self.ctx.report("assign", incident_id.as_str(), result)
    }

    async fn assign_inner(
        &self,
        actor: &UserSession,
        incident_id: &IncidentId,
        request: AssignRequest,
    ) -> Result<Assignment, LifecycleError> {
        crate::time_operation!("assign");
        let transport = self.ctx.transport.as_ref();

        if !actor.role.is_supervisory() {
            return Err(LifecycleError::forbidden(
                format!("assign incident {incident_id}"),
                format!("role {} may not assign tasks", actor.role),
            ));
        }

        let incident = self
            .ctx
            .call("get_incident", EntityKind::Incident, incident_id.as_str(), || {
                transport.get_incident(incident_id)
            })
            .await?;

        if incident.status != IncidentStatus::Pending {
            return Err(LifecycleError::conflict(
                EntityKind::Incident,
                incident_id,
                format!("incident is {}", incident.status),
            ));
        }

        let existing = self
            .ctx
            .call("list_tasks_for_incident", EntityKind::Incident, incident_id.as_str(), || {
                transport.list_tasks_for_incident(incident_id)
            })
            .await?;
        if let Some(active) = existing.iter().find(|task| task.status.is_active()) {
            return Err(LifecycleError::conflict(
                EntityKind::Incident,
                incident_id,
                format!("task {} is still {}", active.id, active.status),
            ));
        }

        let officer_id = &request.field_officer_id;
        let officer = self
            .ctx
            .call("get_user", EntityKind::User, officer_id.as_str(), || {
                transport.get_user(officer_id)
            })
            .await?;
        if officer.role != Role::FieldOfficer {
            return Err(LifecycleError::validation(["fieldOfficerId"]));
        }

        let priority = match (request.priority, self.priority_policy) {
            (Some(priority), _) => priority,
            (None, TaskPriorityPolicy::InheritFromIncident) => incident.priority,
            (None, TaskPriorityPolicy::Explicit) => {
                return Err(LifecycleError::validation(["priority"]))
            }
        };

        IncidentLifecycle::check(incident.status, IncidentEvent::Assign, actor.role)?;

        let title = request
            .title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .map_or_else(|| incident.title.clone(), str::to_string);
        let notes = request
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|notes| !notes.is_empty())
            .map(str::to_string);

        let draft = TaskDraft {
            title,
            priority,
            incident_id: incident.id.clone(),
            assigned_to_id: officer.id.clone(),
            created_by_id: actor.id.clone(),
            due_date: request.due_date,
            assignment_notes: notes,
        }
        .into_task();

        let task = self.create_task(&draft).await?;

        let updated = match self
            .ctx
            .call_raw("update_incident_status", || {
                transport.update_incident_status(incident_id, IncidentStatus::InProgress)
            })
            .await
        {
            Ok(updated) => updated,
            Err(err) => match self.settle_status_update(incident_id, &err).await {
                StatusUpdate::Landed(updated) => updated,
                StatusUpdate::NotApplied => {
                    self.compensate(&task).await;
                    return Err(self.ctx.persistence_failure(
                        "update_incident_status",
                        EntityKind::Incident,
                        incident_id.as_str(),
                        err,
                    ));
                }
                StatusUpdate::Unknown => {
                    warn!(
                        incident_id = %incident_id,
                        task_id = %task.id,
                        error = %err,
                        "Incident update outcome unknown, keeping task until the caller re-fetches"
                    );
                    return Err(self.ctx.persistence_failure(
                        "update_incident_status",
                        EntityKind::Incident,
                        incident_id.as_str(),
                        err,
                    ));
                }
            },
        };

        info!(
            incident_id = %updated.id,
            task_id = %task.id,
            officer_id = %task.assigned_to_id,
            priority = %task.priority,
            "Incident assigned"
        );
        self.ctx.succeeded(
            "assign",
            incident_id.as_str(),
            format!("Task assigned to {}", task.assigned_to_id),
        );

        Ok(Assignment {
            incident: updated,
            task,
        })
    }

    /// Persist the new task. After an ambiguous failure the incident's tasks are
    /// re-read and an already stored copy is adopted instead of creating a second one.
    /// When they cannot be re-read the draft id is deleted so no stray task remains.
    async fn create_task(&self, draft: &Task) -> Result<Task, LifecycleError> {
        let transport = self.ctx.transport.as_ref();
        let err = match self
            .ctx
            .call_raw("create_task", || transport.create_task(draft))
            .await
        {
            Ok(task) => return Ok(task),
            Err(err) => err,
        };

        if err.is_ambiguous() {
            warn!(
                task_id = %draft.id,
                incident_id = %draft.incident_id,
                error = %err,
                "Task creation outcome unknown, re-fetching"
            );
            match self
                .ctx
                .call_raw("list_tasks_for_incident", || {
                    transport.list_tasks_for_incident(&draft.incident_id)
                })
                .await
            {
                Ok(tasks) => {
                    if let Some(task) = tasks.into_iter().find(|task| {
                        task.id == draft.id
                            || (task.status.is_active()
                                && task.assigned_to_id == draft.assigned_to_id)
                    }) {
                        info!(task_id = %task.id, "Adopted task stored by the ambiguous call");
                        return Ok(task);
                    }
                }
                Err(refetch) => {
                    warn!(
                        task_id = %draft.id,
                        error = %refetch,
                        "Could not re-fetch tasks, discarding the draft"
                    );
                    self.compensate(draft).await;
                }
            }
        }

        Err(self
            .ctx
            .persistence_failure("create_task", EntityKind::Task, draft.id.as_str(), err))
    }

    /// Decide what an ambiguous status update did. Only a re-read showing the
    /// incident still pending proves it never landed.
    async fn settle_status_update(
        &self,
        incident_id: &IncidentId,
        err: &PersistenceError,
    ) -> StatusUpdate {
        if !err.is_ambiguous() {
            return StatusUpdate::NotApplied;
        }
        let transport = self.ctx.transport.as_ref();
        match self
            .ctx
            .call_raw("get_incident", || transport.get_incident(incident_id))
            .await
        {
            Ok(incident) if incident.status == IncidentStatus::InProgress => {
                StatusUpdate::Landed(incident)
            }
            Ok(incident) if incident.status == IncidentStatus::Pending => StatusUpdate::NotApplied,
            Ok(incident) => {
                warn!(
                    incident_id = %incident_id,
                    status = %incident.status,
                    "Incident moved elsewhere during assignment"
                );
                StatusUpdate::Unknown
            }
            Err(refetch) => {
                warn!(
                    incident_id = %incident_id,
                    error = %refetch,
                    "Could not re-fetch incident after ambiguous update"
                );
                StatusUpdate::Unknown
            }
        }
    }

    async fn compensate(&self, task: &Task) {
        let transport = self.ctx.transport.as_ref();
        match self
            .ctx
            .call_raw("delete_task", || transport.delete_task(&task.id))
            .await
        {
            Ok(()) => {
                lifecycle_metrics().record_compensation();
                warn!(
                    task_id = %task.id,
                    incident_id = %task.incident_id,
                    "Rolled back task of a failed assignment"
                );
            }
            Err(PersistenceError::NotFound { .. }) => {
                debug!(task_id = %task.id, "Task was never stored, nothing to roll back");
            }
            Err(err) => {
                error!(
                    task_id = %task.id,
                    incident_id = %task.incident_id,
                    error = %err,
                    "Failed to roll back task of a failed assignment"
                );
            }
        }
    }
}

/// What an incident status update turned out to do.
enum StatusUpdate {
    Landed(Incident),
    NotApplied,
    Unknown,
}
