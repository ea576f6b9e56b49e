// Property-Based Testing for the lifecycle tables and the capture engine
// Random event sequences are checked against an independent model of the tables

use disaster_response::{
    CaptureError, DisasterType, DrawingTool, GeoCapture, GeoPoint, Incident, IncidentEvent,
    IncidentLifecycle, IncidentStatus, LatLng, NewIncident, Priority, Role, TaskEvent,
    TaskLifecycle, TaskStatus, UserId, UserSession,
};
use disaster_response::domain::TaskDraft;
use proptest::prelude::*;
use proptest_derive::Arbitrary;

#[derive(Debug, Clone, Copy, Arbitrary)]
enum EventPick {
    Assign,
    Approve,
    Reject,
    Close,
    AdminClose,
}

impl EventPick {
    fn event(self) -> IncidentEvent {
        match self {
            EventPick::Assign => IncidentEvent::Assign,
            EventPick::Approve => IncidentEvent::Approve,
            EventPick::Reject => IncidentEvent::Reject,
            EventPick::Close => IncidentEvent::Close,
            EventPick::AdminClose => IncidentEvent::AdminClose,
        }
    }
}

#[derive(Debug, Clone, Copy, Arbitrary)]
enum RolePick {
    FieldOfficer,
    Supervisor,
    Executive,
    Admin,
}

impl RolePick {
    fn role(self) -> Role {
        match self {
            RolePick::FieldOfficer => Role::FieldOfficer,
            RolePick::Supervisor => Role::Supervisor,
            RolePick::Executive => Role::Executive,
            RolePick::Admin => Role::Admin,
        }
    }
}

#[derive(Debug, Clone, Copy, Arbitrary)]
enum TaskEventPick {
    Accept,
    SubmitSurvey,
    Finalize,
    RequestRevision,
    Resume,
    Cancel,
}

impl TaskEventPick {
    fn event(self) -> TaskEvent {
        match self {
            TaskEventPick::Accept => TaskEvent::Accept,
            TaskEventPick::SubmitSurvey => TaskEvent::SubmitSurvey,
            TaskEventPick::Finalize => TaskEvent::Finalize,
            TaskEventPick::RequestRevision => TaskEvent::RequestRevision,
            TaskEventPick::Resume => TaskEvent::Resume,
            TaskEventPick::Cancel => TaskEvent::Cancel,
        }
    }
}

#[derive(Debug, Clone, Copy, Arbitrary)]
enum ActorPick {
    Assignee,
    OtherOfficer,
    Supervisor,
    Admin,
}

impl ActorPick {
    fn session(self) -> UserSession {
        match self {
            ActorPick::Assignee => UserSession::new("officer-a", Role::FieldOfficer),
            ActorPick::OtherOfficer => UserSession::new("officer-b", Role::FieldOfficer),
            ActorPick::Supervisor => UserSession::new("sup-1", Role::Supervisor),
            ActorPick::Admin => UserSession::new("admin-1", Role::Admin),
        }
    }
}

fn expected_incident(
    from: IncidentStatus,
    event: IncidentEvent,
    role: Role,
) -> Option<IncidentStatus> {
    use IncidentStatus::*;
    let supervisory = matches!(role, Role::Supervisor | Role::Admin);
    match (from, event) {
        (Pending, IncidentEvent::Assign) if supervisory => Some(InProgress),
        (InProgress, IncidentEvent::Approve) if supervisory => Some(Resolved),
        (InProgress, IncidentEvent::Reject) if supervisory => Some(Rejected),
        (Resolved, IncidentEvent::Close) if supervisory => Some(Closed),
        (Pending | InProgress | Resolved | Rejected, IncidentEvent::AdminClose)
            if role == Role::Admin =>
        {
            Some(Closed)
        }
        _ => None,
    }
}

fn expected_task(
    from: TaskStatus,
    event: TaskEvent,
    actor: ActorPick,
    incident: IncidentStatus,
) -> Option<TaskStatus> {
    use TaskStatus::*;
    let assignee = matches!(actor, ActorPick::Assignee);
    let supervisory = matches!(actor, ActorPick::Supervisor | ActorPick::Admin);
    let incident_open = incident == IncidentStatus::InProgress;
    match (from, event) {
        (Pending, TaskEvent::Accept) if assignee && incident_open => Some(InProgress),
        (InProgress, TaskEvent::Accept) if assignee => Some(InProgress),
        (Pending | InProgress, TaskEvent::SubmitSurvey) if assignee && incident_open => {
            Some(Surveyed)
        }
        (Surveyed, TaskEvent::Finalize) if supervisory && incident_open => Some(Completed),
        (Surveyed, TaskEvent::RequestRevision) if supervisory && incident_open => {
            Some(RevisionRequired)
        }
        (RevisionRequired, TaskEvent::Resume) if assignee && incident_open => Some(InProgress),
        (Pending | InProgress | Surveyed | RevisionRequired, TaskEvent::Cancel) if supervisory => {
            Some(Cancelled)
        }
        _ => None,
    }
}

fn incident_in(status: IncidentStatus) -> Incident {
    let mut incident = Incident::report(
        NewIncident {
            title: "Generated incident".to_string(),
            description: String::new(),
            priority: Priority::Medium,
            disaster_type: DisasterType::Other,
            location: GeoPoint::from_lat_lng(LatLng::new(0.0, 0.0)),
            address: None,
            village_id: None,
            images: vec![],
        },
        &UserId::from("reporter"),
    );
    incident.status = status;
    incident
}

fn incident_status_strategy() -> impl Strategy<Value = IncidentStatus> {
    prop::sample::select(IncidentStatus::ALL.to_vec())
}

fn lat_lng_strategy() -> impl Strategy<Value = LatLng> {
    (-90.0f64..=90.0, -180.0f64..=180.0).prop_map(|(lat, lng)| LatLng::new(lat, lng))
}

proptest! {
    #[test]
    fn incident_sequences_follow_the_table(
        steps in prop::collection::vec((any::<EventPick>(), any::<RolePick>()), 0..20)
    ) {
        let mut incident = incident_in(IncidentStatus::Pending);
        let mut model = IncidentStatus::Pending;

        for (event, role) in steps {
            let (event, role) = (event.event(), role.role());
            let before = incident.clone();
            let actual = IncidentLifecycle::apply(&incident, event, role);
            match (actual, expected_incident(model, event, role)) {
                (Ok(next), Some(expected)) => {
                    prop_assert_eq!(next.status, expected);
                    model = expected;
                    incident = next;
                }
                (Err(err), None) => {
                    prop_assert_eq!(err.from, model);
                    prop_assert_eq!(&incident, &before);
                }
                (actual, expected) => {
                    prop_assert!(
                        false,
                        "{:?} from {:?} by {:?}: got {:?}, model {:?}",
                        event,
                        model,
                        role,
                        actual.map(|i| i.status),
                        expected
                    );
                }
            }
        }
        prop_assert_eq!(incident.status, model);
    }

    #[test]
    fn closed_incidents_never_move(event in any::<EventPick>(), role in any::<RolePick>()) {
        let incident = incident_in(IncidentStatus::Closed);
        prop_assert!(IncidentLifecycle::apply(&incident, event.event(), role.role()).is_err());
    }

    #[test]
    fn task_sequences_follow_the_table(
        incident_status in incident_status_strategy(),
        steps in prop::collection::vec((any::<TaskEventPick>(), any::<ActorPick>()), 0..20)
    ) {
        let incident = incident_in(incident_status);
        let mut task = TaskDraft {
            title: "Generated task".to_string(),
            priority: Priority::Medium,
            incident_id: incident.id.clone(),
            assigned_to_id: UserId::from("officer-a"),
            created_by_id: UserId::from("sup-1"),
            due_date: None,
            assignment_notes: None,
        }
        .into_task();

        for (event, actor) in steps {
            let expected = expected_task(task.status, event.event(), actor, incident_status);
            let before = task.clone();
            match TaskLifecycle::apply(&task, &incident, event.event(), &actor.session()) {
                Ok(next) => {
                    prop_assert_eq!(Some(next.status), expected);
                    task = next;
                }
                Err(_) => {
                    prop_assert_eq!(expected, None);
                    prop_assert_eq!(&task, &before);
                }
            }
        }
    }

    #[test]
    fn completing_short_rings_always_fails(
        vertices in prop::collection::vec(lat_lng_strategy(), 0..3)
    ) {
        let mut capture = GeoCapture::new();
        capture.set_mode(DrawingTool::Polygon).unwrap();
        for vertex in &vertices {
            capture.click(vertex.lat, vertex.lng).unwrap();
        }

        let err = capture.complete().unwrap_err();
        prop_assert_eq!(err, CaptureError::InsufficientVertices { count: vertices.len() });
        prop_assert_eq!(capture.working_ring(), vertices.as_slice());
    }

    #[test]
    fn completed_rings_are_closed_and_lng_lat(
        vertices in prop::collection::vec(lat_lng_strategy(), 3..30)
    ) {
        let mut capture = GeoCapture::new();
        capture.set_mode(DrawingTool::Polygon).unwrap();
        for vertex in &vertices {
            capture.click(vertex.lat, vertex.lng).unwrap();
        }

        let polygon = capture.complete().unwrap();
        let ring = polygon.outer_ring().unwrap();
        prop_assert_eq!(ring.len(), vertices.len() + 1);
        prop_assert_eq!(ring.first(), ring.last());
        for (position, vertex) in ring.iter().zip(&vertices) {
            prop_assert_eq!(*position, [vertex.lng, vertex.lat]);
        }
        prop_assert!(capture.working_ring().is_empty());
    }

    #[test]
    fn marker_emits_lng_lat(position in lat_lng_strategy()) {
        let mut capture = GeoCapture::new();
        capture.set_mode(DrawingTool::Marker).unwrap();
        capture.click(position.lat, position.lng).unwrap();
        prop_assert_eq!(
            capture.marker_geometry().unwrap().coordinates,
            [position.lng, position.lat]
        );
    }
}
