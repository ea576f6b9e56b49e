use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;
use tracing::debug;

use super::{ResponseTransport, ReviewRequest};
use crate::domain::{
    EntityKind, Incident, IncidentId, IncidentStatus, Task, TaskId, TaskStatus, User, UserId,
};
use crate::errors::PersistenceError;
use crate::lifecycle::{IncidentLifecycle, TaskLifecycle};
use crate::survey::SurveySubmission;

#[derive(Debug, Clone)]
struct InjectedFailure {
    error: PersistenceError,
    /// Apply the change, then report the error.
    after_commit: bool,
    /// Calls allowed through before this one fires.
    skip: usize,
}

#[derive(Debug, Default)]
struct Store {
    incidents: HashMap<IncidentId, Incident>,
    tasks: HashMap<TaskId, Task>,
    users: HashMap<UserId, User>,
    failures: HashMap<&'static str, VecDeque<InjectedFailure>>,
}

impl Store {
    /// `Err` fails the call before it takes effect; `Ok(Some)` fails it after.
    fn take_failure(
        &mut self,
        operation: &'static str,
    ) -> Result<Option<PersistenceError>, PersistenceError> {
        let Some(queue) = self.failures.get_mut(operation) else {
            return Ok(None);
        };
        if let Some(front) = queue.front_mut() {
            if front.skip > 0 {
                front.skip -= 1;
                return Ok(None);
            }
        }
        match queue.pop_front() {
            Some(failure) if failure.after_commit => Ok(Some(failure.error)),
            Some(failure) => Err(failure.error),
            None => Ok(None),
        }
    }

    fn incident_mut(&mut self, id: &IncidentId) -> Result<&mut Incident, PersistenceError> {
        self.incidents.get_mut(id).ok_or_else(|| PersistenceError::NotFound {
            entity: EntityKind::Incident,
            id: id.to_string(),
        })
    }

    fn task_mut(&mut self, id: &TaskId) -> Result<&mut Task, PersistenceError> {
        self.tasks.get_mut(id).ok_or_else(|| PersistenceError::NotFound {
            entity: EntityKind::Task,
            id: id.to_string(),
        })
    }
}

fn settle<T>(value: T, late: Option<PersistenceError>) -> Result<T, PersistenceError> {
    match late {
        Some(err) => Err(err),
        None => Ok(value),
    }
}

/// Reference store with the backend's rules: known transitions only and one
/// active task per incident. Failures can be queued per operation name.
#[derive(Debug, Default)]
pub struct InMemoryTransport {
    store: Mutex<Store>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: User) {
        self.store.lock().await.users.insert(user.id.clone(), user);
    }

    pub async fn insert_incident(&self, incident: Incident) {
        self.store
            .lock()
            .await
            .incidents
            .insert(incident.id.clone(), incident);
    }

    pub async fn insert_task(&self, task: Task) {
        self.store.lock().await.tasks.insert(task.id.clone(), task);
    }

    /// Fail the next `operation` call without applying it.
    pub async fn fail_next(&self, operation: &'static str, error: PersistenceError) {
        self.queue_failure(operation, error, false, 0).await;
    }

    /// Apply the next `operation` call, then report `error` anyway.
    pub async fn fail_after_commit(&self, operation: &'static str, error: PersistenceError) {
        self.queue_failure(operation, error, true, 0).await;
    }

    /// Let `nth - 1` calls of `operation` through, then fail the next one.
    pub async fn fail_nth(&self, operation: &'static str, nth: usize, error: PersistenceError) {
        self.queue_failure(operation, error, false, nth.saturating_sub(1))
            .await;
    }

    async fn queue_failure(
        &self,
        operation: &'static str,
        error: PersistenceError,
        after_commit: bool,
        skip: usize,
    ) {
        self.store
            .lock()
            .await
            .failures
            .entry(operation)
            .or_default()
            .push_back(InjectedFailure {
                error,
                after_commit,
                skip,
            });
    }

    pub async fn incident(&self, id: &IncidentId) -> Option<Incident> {
        self.store.lock().await.incidents.get(id).cloned()
    }

    pub async fn task_count(&self) -> usize {
        self.store.lock().await.tasks.len()
    }
}

#[async_trait]
impl ResponseTransport for InMemoryTransport {
    async fn create_incident(&self, incident: &Incident) -> Result<Incident, PersistenceError> {
        let mut store = self.store.lock().await;
        let late = store.take_failure("create_incident")?;
        if store.incidents.contains_key(&incident.id) {
            return Err(PersistenceError::Conflict {
                message: format!("incident {} already exists", incident.id),
            });
        }
        store.incidents.insert(incident.id.clone(), incident.clone());
        debug!(incident_id = %incident.id, "Stored incident");
        settle(incident.clone(), late)
    }

    async fn get_incident(&self, id: &IncidentId) -> Result<Incident, PersistenceError> {
        let mut store = self.store.lock().await;
        let late = store.take_failure("get_incident")?;
        let incident = store.incident_mut(id)?.clone();
        settle(incident, late)
    }

    async fn update_incident_status(
        &self,
        id: &IncidentId,
        status: IncidentStatus,
    ) -> Result<Incident, PersistenceError> {
        let mut store = self.store.lock().await;
        let late = store.take_failure("update_incident_status")?;
        let incident = store.incident_mut(id)?;
        if !IncidentLifecycle::is_known_transition(incident.status, status) {
            return Err(PersistenceError::Conflict {
                message: format!("incident is {}, cannot become {status}", incident.status),
            });
        }
        incident.status = status;
        incident.updated_at = Utc::now();
        let updated = incident.clone();
        settle(updated, late)
    }

    async fn review(
        &self,
        id: &IncidentId,
        request: &ReviewRequest,
    ) -> Result<Incident, PersistenceError> {
        let mut store = self.store.lock().await;
        let late = store.take_failure("review")?;
        if request.review_notes.trim().is_empty() {
            return Err(PersistenceError::Invalid {
                field: "reviewNotes".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        let incident = store.incident_mut(id)?;
        let decided = matches!(request.status, IncidentStatus::Resolved | IncidentStatus::Rejected);
        if !decided || incident.status != IncidentStatus::InProgress {
            return Err(PersistenceError::Conflict {
                message: format!(
                    "cannot review incident {} into {}",
                    incident.status, request.status
                ),
            });
        }
        incident.status = request.status;
        incident.updated_at = Utc::now();
        let updated = incident.clone();
        settle(updated, late)
    }

    async fn get_user(&self, id: &UserId) -> Result<User, PersistenceError> {
        let mut store = self.store.lock().await;
        let late = store.take_failure("get_user")?;
        let user = store.users.get(id).cloned().ok_or_else(|| PersistenceError::NotFound {
            entity: EntityKind::User,
            id: id.to_string(),
        })?;
        settle(user, late)
    }

    async fn get_task(&self, id: &TaskId) -> Result<Task, PersistenceError> {
        let mut store = self.store.lock().await;
        let late = store.take_failure("get_task")?;
        let task = store.task_mut(id)?.clone();
        settle(task, late)
    }

    async fn list_tasks_for_incident(
        &self,
        id: &IncidentId,
    ) -> Result<Vec<Task>, PersistenceError> {
        let mut store = self.store.lock().await;
        let late = store.take_failure("list_tasks_for_incident")?;
        let mut tasks: Vec<Task> = store
            .tasks
            .values()
            .filter(|task| &task.incident_id == id)
            .cloned()
            .collect();
        tasks.sort_by_key(|task| task.created_at);
        settle(tasks, late)
    }

    async fn create_task(&self, task: &Task) -> Result<Task, PersistenceError> {
        let mut store = self.store.lock().await;
        let late = store.take_failure("create_task")?;
        if !store.incidents.contains_key(&task.incident_id) {
            return Err(PersistenceError::NotFound {
                entity: EntityKind::Incident,
                id: task.incident_id.to_string(),
            });
        }
        let has_active = store
            .tasks
            .values()
            .any(|existing| {
                existing.incident_id == task.incident_id && existing.status.is_active()
            });
        if has_active || store.tasks.contains_key(&task.id) {
            return Err(PersistenceError::Conflict {
                message: format!("incident {} already has an active task", task.incident_id),
            });
        }
        store.tasks.insert(task.id.clone(), task.clone());
        debug!(task_id = %task.id, incident_id = %task.incident_id, "Stored task");
        settle(task.clone(), late)
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), PersistenceError> {
        let mut store = self.store.lock().await;
        let late = store.take_failure("delete_task")?;
        store.tasks.remove(id).ok_or_else(|| PersistenceError::NotFound {
            entity: EntityKind::Task,
            id: id.to_string(),
        })?;
        settle((), late)
    }

    async fn accept_task(&self, id: &TaskId, actor: &UserId) -> Result<Task, PersistenceError> {
        let mut store = self.store.lock().await;
        let late = store.take_failure("accept_task")?;
        let task = store.task_mut(id)?;
        if !task.is_assigned_to(actor) {
            return Err(PersistenceError::Forbidden {
                message: format!("task {id} is assigned to someone else"),
            });
        }
        match task.status {
            TaskStatus::InProgress => {}
            TaskStatus::Pending => {
                task.status = TaskStatus::InProgress;
                task.updated_at = Utc::now();
            }
            other => {
                return Err(PersistenceError::Conflict {
                    message: format!("task is {other}"),
                })
            }
        }
        let updated = task.clone();
        settle(updated, late)
    }

    async fn submit_survey(
        &self,
        id: &TaskId,
        submission: &SurveySubmission,
    ) -> Result<Task, PersistenceError> {
        let mut store = self.store.lock().await;
        let late = store.take_failure("submit_survey")?;
        let task = store.task_mut(id)?;
        if !matches!(task.status, TaskStatus::Pending | TaskStatus::InProgress) {
            return Err(PersistenceError::Conflict {
                message: format!("task is {}", task.status),
            });
        }
        task.survey_location = submission.survey_location.clone();
        task.survey_area = submission.survey_area.clone();
        task.survey_notes = Some(submission.survey_notes.clone());
        task.survey_photos = submission.survey_photos.clone();
        task.status = TaskStatus::Surveyed;
        task.updated_at = Utc::now();
        let updated = task.clone();
        settle(updated, late)
    }

    async fn update_task_status(
        &self,
        id: &TaskId,
        status: TaskStatus,
    ) -> Result<Task, PersistenceError> {
        let mut store = self.store.lock().await;
        let late = store.take_failure("update_task_status")?;
        let task = store.task_mut(id)?;
        if !TaskLifecycle::is_known_transition(task.status, status) {
            return Err(PersistenceError::Conflict {
                message: format!("task is {}, cannot become {status}", task.status),
            });
        }
        task.status = status;
        task.updated_at = Utc::now();
        let updated = task.clone();
        settle(updated, late)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DisasterType, NewIncident, Role, TaskDraft};
    use crate::geo::{GeoPoint, LatLng};
    use crate::priority::Priority;

    fn incident() -> Incident {
        Incident::report(
            NewIncident {
                title: "Storm damage".to_string(),
                description: "Roofs torn off".to_string(),
                priority: Priority::Medium,
                disaster_type: DisasterType::Storm,
                location: GeoPoint::from_lat_lng(LatLng::new(7.88, 98.39)),
                address: None,
                village_id: None,
                images: vec![],
            },
            &UserId::from("reporter"),
        )
    }

    fn task_for(incident: &Incident) -> Task {
        TaskDraft {
            title: incident.title.clone(),
            priority: incident.priority,
            incident_id: incident.id.clone(),
            assigned_to_id: UserId::from("officer-a"),
            created_by_id: UserId::from("sup-1"),
            due_date: None,
            assignment_notes: None,
        }
        .into_task()
    }

    #[tokio::test]
    async fn test_one_active_task_per_incident() {
        let transport = InMemoryTransport::new();
        let incident = incident();
        transport.insert_incident(incident.clone()).await;

        transport.create_task(&task_for(&incident)).await.unwrap();
        let err = transport.create_task(&task_for(&incident)).await.unwrap_err();
        assert!(matches!(err, PersistenceError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_unknown_incident_transition_is_conflict() {
        let transport = InMemoryTransport::new();
        let incident = incident();
        transport.insert_incident(incident.clone()).await;

        let err = transport
            .update_incident_status(&incident.id, IncidentStatus::Resolved)
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::Conflict { .. }));
        assert_eq!(
            transport.incident(&incident.id).await.unwrap().status,
            IncidentStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let transport = InMemoryTransport::new();
        transport.insert_user(User::new("officer-a", Role::FieldOfficer)).await;
        transport
            .fail_next(
                "get_user",
                PersistenceError::Transient {
                    message: "offline".to_string(),
                },
            )
            .await;

        let officer = UserId::from("officer-a");
        assert!(transport.get_user(&officer).await.unwrap_err().is_transient());
        assert!(transport.get_user(&officer).await.is_ok());

        let incident = incident();
        transport.insert_incident(incident.clone()).await;
        transport
            .fail_after_commit(
                "create_task",
                PersistenceError::Ambiguous {
                    message: "timeout".to_string(),
                },
            )
            .await;
        let err = transport.create_task(&task_for(&incident)).await.unwrap_err();
        assert!(err.is_ambiguous());
        assert_eq!(transport.task_count().await, 1);
    }

    #[tokio::test]
    async fn test_accept_requires_assignee() {
        let transport = InMemoryTransport::new();
        let incident = incident();
        let task = task_for(&incident);
        transport.insert_task(task.clone()).await;

        let err = transport
            .accept_task(&task.id, &UserId::from("officer-b"))
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::Forbidden { .. }));

        let accepted = transport
            .accept_task(&task.id, &UserId::from("officer-a"))
            .await
            .unwrap();
        assert_eq!(accepted.status, TaskStatus::InProgress);
    }
}
