// Persistence transport seam. The backend owns authoritative state and enforces
// the same transition tables; coordinators only ever talk to it through this trait.

pub mod memory;
pub mod retry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{Incident, IncidentId, IncidentStatus, Task, TaskId, TaskStatus, User, UserId};
use crate::errors::PersistenceError;
use crate::survey::SurveySubmission;

pub use memory::InMemoryTransport;
pub use retry::RetryPolicy;

/// Body of the review endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub status: IncidentStatus,
    pub review_notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_notes: Option<String>,
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ResponseTransport: Send + Sync {
    async fn create_incident(&self, incident: &Incident) -> Result<Incident, PersistenceError>;

    async fn get_incident(&self, id: &IncidentId) -> Result<Incident, PersistenceError>;

    async fn update_incident_status(
        &self,
        id: &IncidentId,
        status: IncidentStatus,
    ) -> Result<Incident, PersistenceError>;

    async fn review(
        &self,
        id: &IncidentId,
        request: &ReviewRequest,
    ) -> Result<Incident, PersistenceError>;

    async fn get_user(&self, id: &UserId) -> Result<User, PersistenceError>;

    async fn get_task(&self, id: &TaskId) -> Result<Task, PersistenceError>;

    async fn list_tasks_for_incident(&self, id: &IncidentId) -> Result<Vec<Task>, PersistenceError>;

    async fn create_task(&self, task: &Task) -> Result<Task, PersistenceError>;

    /// Used to roll back a task whose assignment did not complete.
    async fn delete_task(&self, id: &TaskId) -> Result<(), PersistenceError>;

    async fn accept_task(&self, id: &TaskId, actor: &UserId) -> Result<Task, PersistenceError>;

    async fn submit_survey(
        &self,
        id: &TaskId,
        submission: &SurveySubmission,
    ) -> Result<Task, PersistenceError>;

    async fn update_task_status(
        &self,
        id: &TaskId,
        status: TaskStatus,
    ) -> Result<Task, PersistenceError>;
}
