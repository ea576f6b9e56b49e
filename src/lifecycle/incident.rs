use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use super::{find_rule, Gate, TransitionRule, ADMIN_ONLY, SUPERVISORY};
use crate::domain::{Incident, IncidentStatus, Role};
use crate::errors::TransitionError;
use crate::observability::lifecycle_metrics;

use IncidentStatus::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentEvent {
    /// Emitted by the assignment coordinator only.
    Assign,
    /// Emitted by the review coordinator only.
    Approve,
    /// Emitted by the review coordinator only.
    Reject,
    Close,
    /// Administrative override, closes from any open status.
    AdminClose,
}

impl IncidentEvent {
    pub const ALL: [IncidentEvent; 5] = [
        IncidentEvent::Assign,
        IncidentEvent::Approve,
        IncidentEvent::Reject,
        IncidentEvent::Close,
        IncidentEvent::AdminClose,
    ];

    pub fn target(self) -> IncidentStatus {
        match self {
            IncidentEvent::Assign => InProgress,
            IncidentEvent::Approve => Resolved,
            IncidentEvent::Reject => Rejected,
            IncidentEvent::Close | IncidentEvent::AdminClose => Closed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IncidentEvent::Assign => "ASSIGN",
            IncidentEvent::Approve => "APPROVE",
            IncidentEvent::Reject => "REJECT",
            IncidentEvent::Close => "CLOSE",
            IncidentEvent::AdminClose => "ADMIN_CLOSE",
        }
    }
}

impl fmt::Display for IncidentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub static INCIDENT_TRANSITIONS: &[TransitionRule<IncidentStatus, IncidentEvent>] = &[
    TransitionRule {
        from: &[Pending],
        event: IncidentEvent::Assign,
        to: InProgress,
        gate: Gate::Roles(SUPERVISORY),
    },
    TransitionRule {
        from: &[InProgress],
        event: IncidentEvent::Approve,
        to: Resolved,
        gate: Gate::Roles(SUPERVISORY),
    },
    TransitionRule {
        from: &[InProgress],
        event: IncidentEvent::Reject,
        to: Rejected,
        gate: Gate::Roles(SUPERVISORY),
    },
    TransitionRule {
        from: &[Resolved],
        event: IncidentEvent::Close,
        to: Closed,
        gate: Gate::Roles(SUPERVISORY),
    },
    TransitionRule {
        from: &[Pending, InProgress, Resolved, Rejected],
        event: IncidentEvent::AdminClose,
        to: Closed,
        gate: Gate::Roles(ADMIN_ONLY),
    },
];

/// Incident status transitions, evaluated against [`INCIDENT_TRANSITIONS`].
#[derive(Debug, Clone, Copy, Default)]
pub struct IncidentLifecycle;

impl IncidentLifecycle {
    /// Resolve the status `event` leads to without touching any entity.
    pub fn check(
        from: IncidentStatus,
        event: IncidentEvent,
        role: Role,
    ) -> Result<IncidentStatus, TransitionError<IncidentStatus>> {
        let to = event.target();
        if from == to {
            return Err(TransitionError::new(from, to, format!("incident is already {from}")));
        }

        let rule = find_rule(INCIDENT_TRANSITIONS, from, event).ok_or_else(|| {
            TransitionError::new(from, to, format!("{event} is not allowed from {from}"))
        })?;

        if !rule.gate.admits_role(role) {
            return Err(TransitionError::new(
                from,
                to,
                format!("role {role} may not {event}"),
            ));
        }

        Ok(rule.to)
    }

    /// Apply `event`; the input incident is never modified.
    pub fn apply(
        incident: &Incident,
        event: IncidentEvent,
        role: Role,
    ) -> Result<Incident, TransitionError<IncidentStatus>> {
        match Self::check(incident.status, event, role) {
            Ok(to) => {
                let mut next = incident.clone();
                next.status = to;
                next.updated_at = Utc::now();
                lifecycle_metrics().record_transition();
                info!(
                    incident_id = %incident.id,
                    from = %incident.status,
                    to = %to,
                    event = %event,
                    role = %role,
                    "Incident transition applied"
                );
                Ok(next)
            }
            Err(err) => {
                lifecycle_metrics().record_rejection();
                warn!(
                    incident_id = %incident.id,
                    event = %event,
                    role = %role,
                    reason = %err.reason,
                    "Incident transition rejected"
                );
                Err(err)
            }
        }
    }

    /// Move to `target`, inferring the event from the `(from, target)` pair.
    pub fn transition(
        incident: &Incident,
        target: IncidentStatus,
        role: Role,
    ) -> Result<Incident, TransitionError<IncidentStatus>> {
        let event = Self::event_for(incident.status, target, role)?;
        Self::apply(incident, event, role)
    }

    /// Pick the table event joining `from` and `to`, preferring one `role` may fire.
    pub fn event_for(
        from: IncidentStatus,
        to: IncidentStatus,
        role: Role,
    ) -> Result<IncidentEvent, TransitionError<IncidentStatus>> {
        if from == to {
            return Err(TransitionError::new(from, to, format!("incident is already {from}")));
        }

        let mut candidates = INCIDENT_TRANSITIONS
            .iter()
            .filter(|rule| rule.to == to && rule.from.contains(&from))
            .peekable();

        let first = candidates.peek().map(|rule| rule.event).ok_or_else(|| {
            TransitionError::new(from, to, format!("no transition from {from} to {to}"))
        })?;

        Ok(candidates
            .find(|rule| rule.gate.admits_role(role))
            .map(|rule| rule.event)
            .unwrap_or(first))
    }

    /// Statuses `role` can move an incident to from `from`.
    pub fn allowed_targets(from: IncidentStatus, role: Role) -> Vec<IncidentStatus> {
        let mut targets = Vec::new();
        for rule in INCIDENT_TRANSITIONS {
            if rule.from.contains(&from)
                && rule.gate.admits_role(role)
                && !targets.contains(&rule.to)
            {
                targets.push(rule.to);
            }
        }
        targets
    }

    /// Whether any row joins `from` and `to`, regardless of role.
    pub fn is_known_transition(from: IncidentStatus, to: IncidentStatus) -> bool {
        INCIDENT_TRANSITIONS
            .iter()
            .any(|rule| rule.to == to && rule.from.contains(&from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DisasterType, NewIncident, UserId};
    use crate::geo::{GeoPoint, LatLng};
    use crate::priority::Priority;

    fn incident_in(status: IncidentStatus) -> Incident {
        let mut incident = Incident::report(
            NewIncident {
                title: "Landslide on route 1095".to_string(),
                description: "Road blocked".to_string(),
                priority: Priority::Critical,
                disaster_type: DisasterType::Landslide,
                location: GeoPoint::from_lat_lng(LatLng::new(19.36, 98.44)),
                address: None,
                village_id: None,
                images: vec![],
            },
            &UserId::from("reporter"),
        );
        incident.status = status;
        incident
    }

    #[test]
    fn test_supervisor_happy_path() {
        let pending = incident_in(Pending);
        let assigned =
            IncidentLifecycle::apply(&pending, IncidentEvent::Assign, Role::Supervisor).unwrap();
        assert_eq!(assigned.status, InProgress);

        let resolved =
            IncidentLifecycle::transition(&assigned, Resolved, Role::Supervisor).unwrap();
        assert_eq!(resolved.status, Resolved);

        let closed = IncidentLifecycle::transition(&resolved, Closed, Role::Supervisor).unwrap();
        assert_eq!(closed.status, Closed);
    }

    #[test]
    fn test_rejection_leaves_incident_unchanged() {
        let pending = incident_in(Pending);
        let err = IncidentLifecycle::transition(&pending, Resolved, Role::Admin).unwrap_err();
        assert_eq!(err.from, Pending);
        assert_eq!(err.to, Resolved);
        assert_eq!(pending.status, Pending);
    }

    #[test]
    fn test_no_op_transition_rejected() {
        let in_progress = incident_in(InProgress);
        let err = IncidentLifecycle::transition(&in_progress, InProgress, Role::Admin).unwrap_err();
        assert!(err.reason.contains("already"));
    }

    #[test]
    fn test_field_officer_cannot_drive_transitions() {
        for event in IncidentEvent::ALL {
            for status in IncidentStatus::ALL {
                assert!(IncidentLifecycle::check(status, event, Role::FieldOfficer).is_err());
                assert!(IncidentLifecycle::check(status, event, Role::Executive).is_err());
            }
        }
    }

    #[test]
    fn test_admin_override_closes_from_any_open_status() {
        for status in [Pending, InProgress, Resolved, Rejected] {
            let incident = incident_in(status);
            let closed = IncidentLifecycle::transition(&incident, Closed, Role::Admin).unwrap();
            assert_eq!(closed.status, Closed);
        }
    }

    #[test]
    fn test_supervisor_cannot_override_close() {
        let incident = incident_in(InProgress);
        let err = IncidentLifecycle::transition(&incident, Closed, Role::Supervisor).unwrap_err();
        assert!(err.reason.contains("SUPERVISOR"));
    }

    #[test]
    fn test_closed_is_terminal() {
        for role in Role::ALL {
            assert!(IncidentLifecycle::allowed_targets(Closed, role).is_empty());
        }
    }

    #[test]
    fn test_allowed_targets_by_role() {
        assert_eq!(
            IncidentLifecycle::allowed_targets(InProgress, Role::Supervisor),
            vec![Resolved, Rejected]
        );
        assert_eq!(
            IncidentLifecycle::allowed_targets(InProgress, Role::Admin),
            vec![Resolved, Rejected, Closed]
        );
        assert_eq!(
            IncidentLifecycle::event_for(Resolved, Closed, Role::Supervisor),
            Ok(IncidentEvent::Close)
        );
        assert_eq!(
            IncidentLifecycle::event_for(Rejected, Closed, Role::Admin),
            Ok(IncidentEvent::AdminClose)
        );
    }
}
