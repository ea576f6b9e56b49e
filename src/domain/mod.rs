// Entity model - incidents, field tasks, surveys, users, villages
// Wire names follow the backend: camelCase fields, SCREAMING_SNAKE_CASE enums

pub mod ids;
pub mod incident;
pub mod survey;
pub mod task;
pub mod user;

pub use ids::{EntityKind, IncidentId, SurveyId, TaskId, TemplateId, UserId, VillageId};
pub use incident::{
    DisasterType, Incident, IncidentStatus, NewIncident, ReviewDecision, ReviewEntry,
};
pub use survey::{Survey, SurveyStatus, Village};
pub use task::{Task, TaskDraft, TaskStatus};
pub use user::{Role, User, UserSession};
