use std::fmt;
use thiserror::Error;
use tracing::error;

use crate::domain::{EntityKind, IncidentStatus, TaskStatus};

/// Illegal state move. The entity it was attempted on is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot move from {from} to {to}: {reason}")]
pub struct TransitionError<S> {
    pub from: S,
    pub to: S,
    pub reason: String,
}

impl<S> TransitionError<S> {
    pub fn new(from: S, to: S, reason: impl Into<String>) -> Self {
        Self {
            from,
            to,
            reason: reason.into(),
        }
    }
}

/// Failure reported by the persistence transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: String },
    #[error("conflict: {message}")]
    Conflict { message: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String },
    #[error("invalid {field}: {message}")]
    Invalid { field: String, message: String },
    /// No response was received; the request never took effect.
    #[error("transient failure: {message}")]
    Transient { message: String },
    /// The request was dispatched but its outcome is unknown.
    #[error("outcome unknown: {message}")]
    Ambiguous { message: String },
    #[error("backend error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Backend { status: Option<u16>, message: String },
}

impl PersistenceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, PersistenceError::Transient { .. })
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, PersistenceError::Ambiguous { .. })
    }
}

/// Errors surfaced by the lifecycle managers and coordinators.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("missing or invalid field(s): {}", .fields.join(", "))]
    Validation { fields: Vec<String> },

    #[error("incident {0}")]
    IncidentTransition(#[from] TransitionError<IncidentStatus>),

    #[error("task {0}")]
    TaskTransition(#[from] TransitionError<TaskStatus>),

    #[error("forbidden to {action}: {reason}")]
    Forbidden { action: String, reason: String },

    #[error("{entity} {id} conflicts with current state: {reason}")]
    Conflict {
        entity: EntityKind,
        id: String,
        reason: String,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: String },

    #[error("{operation} failed for {entity_id}: {source}")]
    Persistence {
        operation: &'static str,
        entity_id: String,
        #[source]
        source: PersistenceError,
    },
}

impl LifecycleError {
    pub fn validation<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        LifecycleError::Validation {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn conflict(entity: EntityKind, id: impl fmt::Display, reason: impl Into<String>) -> Self {
        LifecycleError::Conflict {
            entity,
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: EntityKind, id: impl fmt::Display) -> Self {
        LifecycleError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn forbidden(action: impl Into<String>, reason: impl Into<String>) -> Self {
        LifecycleError::Forbidden {
            action: action.into(),
            reason: reason.into(),
        }
    }

    /// Map a transport failure onto the taxonomy. Untagged failures stay
    /// opaque and are logged with the operation and entity for diagnosis.
    pub fn from_persistence(
        operation: &'static str,
        entity: EntityKind,
        entity_id: &str,
        err: PersistenceError,
    ) -> Self {
        match err {
            PersistenceError::NotFound { entity, id } => LifecycleError::NotFound { entity, id },
            PersistenceError::Conflict { message } => LifecycleError::Conflict {
                entity,
                id: entity_id.to_string(),
                reason: message,
            },
            PersistenceError::Forbidden { message } => LifecycleError::Forbidden {
                action: operation.to_string(),
                reason: message,
            },
            PersistenceError::Invalid { field, .. } => LifecycleError::Validation {
                fields: vec![field],
            },
            other => {
                error!(
                    operation = operation,
                    entity = %entity,
                    entity_id = entity_id,
                    error = %other,
                    "Persistence call failed"
                );
                LifecycleError::Persistence {
                    operation,
                    entity_id: entity_id.to_string(),
                    source: other,
                }
            }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LifecycleError::Validation { .. } => ErrorKind::Validation,
            LifecycleError::IncidentTransition(_) | LifecycleError::TaskTransition(_) => {
                ErrorKind::Transition
            }
            LifecycleError::Forbidden { .. } => ErrorKind::Forbidden,
            LifecycleError::Conflict { .. } => ErrorKind::Conflict,
            LifecycleError::NotFound { .. } => ErrorKind::NotFound,
            LifecycleError::Persistence { .. } => ErrorKind::OperationFailed,
        }
    }

    /// Fields named by a validation failure, empty for every other kind.
    pub fn fields(&self) -> &[String] {
        match self {
            LifecycleError::Validation { fields } => fields,
            _ => &[],
        }
    }

    /// Message for the notification collaborator. Validation stays field-level.
    pub fn user_message(&self) -> String {
        match self {
            LifecycleError::Validation { fields } => {
                format!("Please provide: {}", fields.join(", "))
            }
            other => other.kind().user_message().to_string(),
        }
    }
}

/// User-facing classification of every failure this crate produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Transition,
    Forbidden,
    Conflict,
    NotFound,
    LocationUnavailable,
    OperationFailed,
}

impl ErrorKind {
    pub fn user_message(self) -> &'static str {
        match self {
            ErrorKind::Validation => "Some required information is missing or invalid.",
            ErrorKind::Transition => "This action is not available right now.",
            ErrorKind::Forbidden => "You do not have permission to perform this action.",
            ErrorKind::Conflict => "This item was changed elsewhere. Please refresh and try again.",
            ErrorKind::NotFound => "This item no longer exists. Returning to the list.",
            ErrorKind::LocationUnavailable => {
                "Current location is unavailable. You can still place points on the map."
            }
            ErrorKind::OperationFailed => "The operation failed. Please try again.",
        }
    }

    /// Whether offering the same action again makes sense to the user.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Validation | ErrorKind::LocationUnavailable | ErrorKind::OperationFailed
        )
    }
}
