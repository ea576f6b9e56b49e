// Coordinators - validate locally against the lifecycle tables, then persist
// through the transport. The backend response is always taken as authoritative.

pub mod assignment;
pub mod intake;
pub mod review;
pub mod tasks;

use std::future::Future;
use std::sync::Arc;

use crate::config::ResponseConfig;
use crate::domain::EntityKind;
use crate::errors::{LifecycleError, PersistenceError};
use crate::notification::{Notice, Notifier, TracingNotifier};
use crate::observability::lifecycle_metrics;
use crate::transport::{ResponseTransport, RetryPolicy};

pub use assignment::{AssignRequest, Assignment, AssignmentCoordinator};
pub use intake::IncidentIntake;
pub use review::{ReviewCoordinator, ReviewOutcome, ReviewSubmission};
pub use tasks::TaskService;

/// Shared handles every coordinator needs.
#[derive(Clone)]
pub struct CoordinatorContext {
    pub transport: Arc<dyn ResponseTransport>,
    pub notifier: Arc<dyn Notifier>,
    pub retry: RetryPolicy,
}

impl CoordinatorContext {
    pub fn new(transport: Arc<dyn ResponseTransport>) -> Self {
        Self {
            transport,
            notifier: Arc::new(TracingNotifier),
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_config(transport: Arc<dyn ResponseTransport>, config: &ResponseConfig) -> Self {
        Self::new(transport).with_retry(config.transport.retry.clone())
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run a transport call under the retry policy, mapping its failure.
    pub(crate) async fn call<T, F, Fut>(
        &self,
        operation: &'static str,
        entity: EntityKind,
        entity_id: &str,
        call: F,
    ) -> Result<T, LifecycleError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PersistenceError>>,
    {
        self.call_raw(operation, call)
            .await
            .map_err(|err| self.persistence_failure(operation, entity, entity_id, err))
    }

    /// Like `call`, but hands back the transport error for callers that
    /// must tell ambiguous outcomes apart.
    pub(crate) async fn call_raw<T, F, Fut>(
        &self,
        operation: &'static str,
        call: F,
    ) -> Result<T, PersistenceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PersistenceError>>,
    {
        self.retry.run(operation, call).await
    }

    pub(crate) fn persistence_failure(
        &self,
        operation: &'static str,
        entity: EntityKind,
        entity_id: &str,
        err: PersistenceError,
    ) -> LifecycleError {
        lifecycle_metrics().record_persistence_failure();
        LifecycleError::from_persistence(operation, entity, entity_id, err)
    }

    pub(crate) fn succeeded(&self, operation: &str, entity_id: &str, message: impl Into<String>) {
        self.notifier
            .notify(Notice::success(operation, Some(entity_id), message));
    }

    /// Report `result` to the notifier when it failed, then pass it through.
    pub(crate) fn report<T>(
        &self,
        operation: &str,
        entity_id: &str,
        result: Result<T, LifecycleError>,
    ) -> Result<T, LifecycleError> {
        if let Err(err) = &result {
            self.notifier
                .notify(Notice::failure(operation, Some(entity_id), err));
        }
        result
    }
}
