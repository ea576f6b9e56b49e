// Field survey submission - validated geometry and notes onto a task,
// moving it to SURVEYED

pub mod submission;

pub use submission::SurveySubmission;

use tracing::{info, Instrument};

use crate::coordination::CoordinatorContext;
use crate::domain::{EntityKind, Task, TaskId, TaskStatus, UserSession};
use crate::errors::LifecycleError;
use crate::lifecycle::{TaskEvent, TaskLifecycle};
use crate::telemetry::{create_operation_span, generate_correlation_id};

#[derive(Clone)]
pub struct SurveyOrchestrator {
    ctx: CoordinatorContext,
}

impl SurveyOrchestrator {
    pub fn new(ctx: CoordinatorContext) -> Self {
        Self { ctx }
    }

    pub async fn submit(
        &self,
        actor: &UserSession,
        task_id: &TaskId,
        submission: SurveySubmission,
    ) -> Result<Task, LifecycleError> {
        let span = create_operation_span(
            "submit_survey",
            Some(task_id.as_str()),
            &generate_correlation_id(),
        );
        let result = self
            .submit_inner(actor, task_id, submission)
            .instrument(span)
            .await;
        self.ctx.report("submit_survey", task_id.as_str(), result)
    }

    async fn submit_inner(
        &self,
        actor: &UserSession,
        task_id: &TaskId,
        submission: SurveySubmission,
    ) -> Result<Task, LifecycleError> {
        crate::time_operation!("submit_survey");
        submission.validate()?;

        let transport = self.ctx.transport.as_ref();
        let task = self
            .ctx
            .call("get_task", EntityKind::Task, task_id.as_str(), || {
                transport.get_task(task_id)
            })
            .await?;

        if task.status == TaskStatus::Surveyed {
            return Err(LifecycleError::conflict(
                EntityKind::Task,
                task_id,
                "survey already submitted",
            ));
        }

        let incident = self
            .ctx
            .call("get_incident", EntityKind::Incident, task.incident_id.as_str(), || {
                transport.get_incident(&task.incident_id)
            })
            .await?;
        TaskLifecycle::plan(&task, &incident, TaskEvent::SubmitSurvey, actor)?;

        let payload = submission.normalized();
        let stored = self
            .ctx
            .call("submit_survey", EntityKind::Task, task_id.as_str(), || {
                transport.submit_survey(task_id, &payload)
            })
            .await?;
        TaskLifecycle::record_applied(&task, stored.status, TaskEvent::SubmitSurvey, actor);

        info!(
            task_id = %stored.id,
            incident_id = %stored.incident_id,
            has_location = payload.survey_location.is_some(),
            area_vertices = payload.survey_area.as_ref().map(|area| area.vertex_count()),
            photos = payload.survey_photos.len(),
            "Survey submitted"
        );
        self.ctx
            .succeeded("submit_survey", task_id.as_str(), "Survey submitted");
        Ok(stored)
    }
}
