use tracing::{info, Instrument};

use super::CoordinatorContext;
use crate::domain::{EntityKind, Incident, NewIncident, UserSession};
use crate::errors::LifecycleError;
use crate::telemetry::{create_operation_span, generate_correlation_id};

/// Files new incident reports. Any role may report.
#[derive(Clone)]
pub struct IncidentIntake {
    ctx: CoordinatorContext,
}

impl IncidentIntake {
    pub fn new(ctx: CoordinatorContext) -> Self {
        Self { ctx }
    }

    pub async fn report(
        &self,
        actor: &UserSession,
        input: NewIncident,
    ) -> Result<Incident, LifecycleError> {
        let span = create_operation_span("report_incident", None, &generate_correlation_id());
        let result = self.report_inner(actor, input).instrument(span).await;
        self.ctx.report("report_incident", actor.id.as_str(), result)
    }

    async fn report_inner(
        &self,
        actor: &UserSession,
        input: NewIncident,
    ) -> Result<Incident, LifecycleError> {
        crate::time_operation!("report_incident");

        let mut missing = Vec::new();
        if input.title.trim().is_empty() {
            missing.push("title");
        }
        if input.location.validate().is_err() {
            missing.push("location");
        }
        if !missing.is_empty() {
            return Err(LifecycleError::validation(missing));
        }

        let incident = Incident::report(input, &actor.id);
        let transport = self.ctx.transport.as_ref();
        let stored = self
            .ctx
            .call("create_incident", EntityKind::Incident, incident.id.as_str(), || {
                transport.create_incident(&incident)
            })
            .await?;

        info!(
            incident_id = %stored.id,
            reporter = %actor.id,
            priority = %stored.priority,
            "Incident reported"
        );
        self.ctx
            .succeeded("report_incident", stored.id.as_str(), "Incident reported");
        Ok(stored)
    }
}
