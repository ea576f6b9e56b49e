// Disaster Response Library - incident and field task lifecycle core
// Lifecycle tables, coordinators, geospatial capture and survey submission

pub mod config;
pub mod coordination;
pub mod domain;
pub mod errors;
pub mod geo;
pub mod lifecycle;
pub mod notification;
pub mod observability;
pub mod priority;
pub mod survey;
pub mod telemetry;
pub mod transport;

// Re-export key types for easy access
pub use config::{config, init_config, ResponseConfig, TaskPriorityPolicy};
pub use coordination::{
    AssignRequest, Assignment, AssignmentCoordinator, CoordinatorContext, IncidentIntake,
    ReviewCoordinator, ReviewOutcome, ReviewSubmission, TaskService,
};
pub use domain::{
    DisasterType, EntityKind, Incident, IncidentId, IncidentStatus, NewIncident, ReviewDecision,
    ReviewEntry, Role, Survey, SurveyId, SurveyStatus, Task, TaskId, TaskStatus, User, UserId,
    UserSession, Village, VillageId,
};
pub use errors::{ErrorKind, LifecycleError, PersistenceError, TransitionError};
pub use geo::{
    CaptureError, CaptureMode, DrawingTool, GeoCapture, GeoPoint, GeoPolygon, LatLng,
    LocationProvider,
};
pub use lifecycle::{IncidentEvent, IncidentLifecycle, TaskEvent, TaskLifecycle};
pub use notification::{Notice, NoticeLevel, Notifier, RecordingNotifier, TracingNotifier};
pub use observability::{lifecycle_metrics, LifecycleMetrics, OperationTimer};
pub use priority::Priority;
pub use survey::{SurveyOrchestrator, SurveySubmission};
pub use telemetry::{create_operation_span, generate_correlation_id, init_telemetry};
pub use transport::{InMemoryTransport, ResponseTransport, RetryPolicy, ReviewRequest};
