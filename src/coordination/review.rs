use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, Instrument};

use super::CoordinatorContext;
use crate::domain::{EntityKind, Incident, IncidentId, ReviewDecision, ReviewEntry, UserSession};
use crate::errors::LifecycleError;
use crate::lifecycle::{IncidentEvent, IncidentLifecycle};
use crate::telemetry::{create_operation_span, generate_correlation_id};
use crate::transport::ReviewRequest;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSubmission {
    pub decision: ReviewDecision,
    pub review_notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_notes: Option<String>,
}

impl ReviewSubmission {
    pub fn new(decision: ReviewDecision, review_notes: impl Into<String>) -> Self {
        Self {
            decision,
            review_notes: review_notes.into(),
            additional_notes: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewOutcome {
    /// Backend incident with the new audit entry appended.
    pub incident: Incident,
    pub entry: ReviewEntry,
}

/// APPROVED resolves the incident, REJECTED rejects it.
pub fn decision_event(decision: ReviewDecision) -> IncidentEvent {
    match decision {
        ReviewDecision::Approved => IncidentEvent::Approve,
        ReviewDecision::Rejected => IncidentEvent::Reject,
    }
}

#[derive(Clone)]
pub struct ReviewCoordinator {
    ctx: CoordinatorContext,
}

impl ReviewCoordinator {
    pub fn new(ctx: CoordinatorContext) -> Self {
        Self { ctx }
    }

    pub async fn review(
        &self,
        actor: &UserSession,
        incident_id: &IncidentId,
        submission: ReviewSubmission,
    ) -> Result<ReviewOutcome, LifecycleError> {
        let span = create_operation_span(
            "review",
            Some(incident_id.as_str()),
            &generate_correlation_id(),
        );
        let result = self
            .review_inner(actor, incident_id, submission)
            .instrument(span)
            .await;
        self.ctx.report("review", incident_id.as_str(), result)
    }

    async fn review_inner(
        &self,
        actor: &UserSession,
        incident_id: &IncidentId,
        submission: ReviewSubmission,
    ) -> Result<ReviewOutcome, LifecycleError> {
        crate::time_operation!("review");

        if !actor.role.is_supervisory() {
            return Err(LifecycleError::forbidden(
                format!("review incident {incident_id}"),
                format!("role {} may not review incidents", actor.role),
            ));
        }

        let notes = submission.review_notes.trim();
        if notes.is_empty() {
            return Err(LifecycleError::validation(["reviewNotes"]));
        }
        let additional_notes = submission
            .additional_notes
            .as_deref()
            .map(str::trim)
            .filter(|extra| !extra.is_empty())
            .map(str::to_string);

        let transport = self.ctx.transport.as_ref();
        let incident = self
            .ctx
            .call("get_incident", EntityKind::Incident, incident_id.as_str(), || {
                transport.get_incident(incident_id)
            })
            .await?;

        let target = IncidentLifecycle::check(
            incident.status,
            decision_event(submission.decision),
            actor.role,
        )?;

        let request = ReviewRequest {
            status: target,
            review_notes: notes.to_string(),
            additional_notes: additional_notes.clone(),
        };
        let mut updated = self
            .ctx
            .call("review", EntityKind::Incident, incident_id.as_str(), || {
                transport.review(incident_id, &request)
            })
            .await?;

        let entry = ReviewEntry {
            actor: actor.id.clone(),
            timestamp: Utc::now(),
            decision: submission.decision,
            notes: notes.to_string(),
            additional_notes,
        };
        updated.review_history.push(entry.clone());

        info!(
            incident_id = %incident_id,
            decision = %submission.decision,
            status = %updated.status,
            reviewer = %actor.id,
            "Incident reviewed"
        );
        self.ctx.succeeded(
            "review",
            incident_id.as_str(),
            format!("Incident {}", updated.status),
        );

        Ok(ReviewOutcome {
            incident: updated,
            entry,
        })
    }
}
