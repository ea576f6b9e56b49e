use tracing::{debug, info, Instrument};

use super::CoordinatorContext;
use crate::domain::{EntityKind, IncidentId, Task, TaskId, UserSession};
use crate::errors::LifecycleError;
use crate::lifecycle::{TaskEvent, TaskLifecycle};
use crate::telemetry::{create_operation_span, generate_correlation_id};

fn operation_name(event: TaskEvent) -> &'static str {
    match event {
        TaskEvent::Accept => "accept_task",
        TaskEvent::SubmitSurvey => "submit_survey",
        TaskEvent::Finalize => "finalize_task",
        TaskEvent::RequestRevision => "request_revision",
        TaskEvent::Resume => "resume_task",
        TaskEvent::Cancel => "cancel_task",
    }
}

fn success_message(event: TaskEvent) -> &'static str {
    match event {
        TaskEvent::Accept => "Task accepted",
        TaskEvent::SubmitSurvey => "Survey submitted",
        TaskEvent::Finalize => "Task completed",
        TaskEvent::RequestRevision => "Revision requested",
        TaskEvent::Resume => "Task resumed",
        TaskEvent::Cancel => "Task cancelled",
    }
}

/// Task transitions other than survey submission, persisted through the transport.
#[derive(Clone)]
pub struct TaskService {
    ctx: CoordinatorContext,
}

impl TaskService {
    pub fn new(ctx: CoordinatorContext) -> Self {
        Self { ctx }
    }

    /// Idempotent for the assignee.
    pub async fn accept(
        &self,
        actor: &UserSession,
        task_id: &TaskId,
    ) -> Result<Task, LifecycleError> {
        self.drive(actor, task_id, TaskEvent::Accept).await
    }

    pub async fn finalize(
        &self,
        actor: &UserSession,
        task_id: &TaskId,
    ) -> Result<Task, LifecycleError> {
        self.drive(actor, task_id, TaskEvent::Finalize).await
    }

    pub async fn request_revision(
        &self,
        actor: &UserSession,
        task_id: &TaskId,
    ) -> Result<Task, LifecycleError> {
        self.drive(actor, task_id, TaskEvent::RequestRevision).await
    }

    pub async fn resume(
        &self,
        actor: &UserSession,
        task_id: &TaskId,
    ) -> Result<Task, LifecycleError> {
        self.drive(actor, task_id, TaskEvent::Resume).await
    }

    pub async fn cancel(
        &self,
        actor: &UserSession,
        task_id: &TaskId,
    ) -> Result<Task, LifecycleError> {
        self.drive(actor, task_id, TaskEvent::Cancel).await
    }

    /// Fresh list from the backend; callers drop any local patches.
    pub async fn list_for_incident(
        &self,
        incident_id: &IncidentId,
    ) -> Result<Vec<Task>, LifecycleError> {
        let transport = self.ctx.transport.as_ref();
        let result = self
            .ctx
            .call("list_tasks_for_incident", EntityKind::Incident, incident_id.as_str(), || {
                transport.list_tasks_for_incident(incident_id)
            })
            .await;
        self.ctx
            .report("list_tasks_for_incident", incident_id.as_str(), result)
    }

    async fn drive(
        &self,
        actor: &UserSession,
        task_id: &TaskId,
        event: TaskEvent,
    ) -> Result<Task, LifecycleError> {
        let operation = operation_name(event);
        let span = create_operation_span(
            operation,
            Some(task_id.as_str()),
            &generate_correlation_id(),
        );
        let result = self
            .drive_inner(actor, task_id, event)
            .instrument(span)
            .await;
        self.ctx.report(operation, task_id.as_str(), result)
    }

    async fn drive_inner(
        &self,
        actor: &UserSession,
        task_id: &TaskId,
        event: TaskEvent,
    ) -> Result<Task, LifecycleError> {
        let operation = operation_name(event);
        crate::time_operation!(operation);
        let transport = self.ctx.transport.as_ref();

        let task = self
            .ctx
            .call("get_task", EntityKind::Task, task_id.as_str(), || {
                transport.get_task(task_id)
            })
            .await?;
        let incident = self
            .ctx
            .call("get_incident", EntityKind::Incident, task.incident_id.as_str(), || {
                transport.get_incident(&task.incident_id)
            })
            .await?;

        let planned = TaskLifecycle::plan(&task, &incident, event, actor)?;
        if planned == task.status {
            debug!(task_id = %task_id, operation = operation, "Nothing to persist");
            return Ok(task);
        }

        let stored = match event {
            TaskEvent::Accept => {
                self.ctx
                    .call(operation, EntityKind::Task, task_id.as_str(), || {
                        transport.accept_task(task_id, &actor.id)
                    })
                    .await?
            }
            _ => {
                self.ctx
                    .call(operation, EntityKind::Task, task_id.as_str(), || {
                        transport.update_task_status(task_id, planned)
                    })
                    .await?
            }
        };

        TaskLifecycle::record_applied(&task, stored.status, event, actor);
        info!(
            task_id = %stored.id,
            incident_id = %stored.incident_id,
            status = %stored.status,
            actor = %actor.id,
            "Task updated"
        );
        self.ctx
            .succeeded(operation, task_id.as_str(), success_message(event));
        Ok(stored)
    }
}
