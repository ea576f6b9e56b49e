// Lifecycle counters only move for transitions the backend has stored
// Kept as the only test in this binary since the counters are process-wide

use disaster_response::{
    lifecycle_metrics, AssignRequest, AssignmentCoordinator, CoordinatorContext, DisasterType,
    DrawingTool, GeoCapture, GeoPoint, IncidentIntake, InMemoryTransport, LatLng, NewIncident,
    PersistenceError, Priority, RetryPolicy, Role, SurveyOrchestrator, SurveySubmission,
    TaskService, TaskStatus, User, UserSession,
};
use std::sync::Arc;

#[tokio::test]
async fn test_failed_persistence_is_not_counted_as_applied() {
    let transport = Arc::new(InMemoryTransport::new());
    transport.insert_user(User::new("officer-a", Role::FieldOfficer)).await;
    let ctx = CoordinatorContext::new(transport.clone()).with_retry(RetryPolicy::none());
    let supervisor = UserSession::new("sup-1", Role::Supervisor);
    let officer = UserSession::new("officer-a", Role::FieldOfficer);

    let incident = IncidentIntake::new(ctx.clone())
        .report(
            &officer,
            NewIncident {
                title: "Landslide on route 1095".to_string(),
                description: "Road blocked".to_string(),
                priority: Priority::High,
                disaster_type: DisasterType::Landslide,
                location: GeoPoint::from_lat_lng(LatLng::new(19.35, 98.44)),
                address: None,
                village_id: None,
                images: vec![],
            },
        )
        .await
        .unwrap();
    let task = AssignmentCoordinator::new(ctx.clone())
        .assign(&supervisor, &incident.id, AssignRequest::new("officer-a"))
        .await
        .unwrap()
        .task;

    let service = TaskService::new(ctx.clone());
    let before_accept = lifecycle_metrics().get_stats();
    transport
        .fail_next(
            "accept_task",
            PersistenceError::Backend {
                status: Some(500),
                message: "database unavailable".to_string(),
            },
        )
        .await;
    assert!(service.accept(&officer, &task.id).await.is_err());
    let after_failed_accept = lifecycle_metrics().get_stats();
    assert_eq!(
        after_failed_accept.transitions_applied,
        before_accept.transitions_applied
    );
    assert_eq!(
        after_failed_accept.persistence_failures,
        before_accept.persistence_failures + 1
    );

    let accepted = service.accept(&officer, &task.id).await.unwrap();
    assert_eq!(accepted.status, TaskStatus::InProgress);
    assert_eq!(
        lifecycle_metrics().get_stats().transitions_applied,
        before_accept.transitions_applied + 1
    );

    let mut capture = GeoCapture::new();
    capture.set_mode(DrawingTool::Marker).unwrap();
    capture.click(19.35, 98.44).unwrap();
    let surveys = SurveyOrchestrator::new(ctx);

    let before_submit = lifecycle_metrics().get_stats();
    transport
        .fail_next(
            "submit_survey",
            PersistenceError::Backend {
                status: Some(502),
                message: "bad gateway".to_string(),
            },
        )
        .await;
    assert!(surveys
        .submit(
            &officer,
            &task.id,
            SurveySubmission::from_capture(&capture, "road fully blocked"),
        )
        .await
        .is_err());
    assert_eq!(
        lifecycle_metrics().get_stats().transitions_applied,
        before_submit.transitions_applied
    );

    let surveyed = surveys
        .submit(
            &officer,
            &task.id,
            SurveySubmission::from_capture(&capture, "road fully blocked"),
        )
        .await
        .unwrap();
    assert_eq!(surveyed.status, TaskStatus::Surveyed);
    assert_eq!(
        lifecycle_metrics().get_stats().transitions_applied,
        before_submit.transitions_applied + 1
    );
}
