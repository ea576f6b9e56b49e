// Lifecycle managers - pure transition tables for incidents and field tasks
// No I/O here: coordinators validate locally, then ask the transport to persist

pub mod incident;
pub mod task;

use crate::domain::{Role, Task, UserSession};

pub use incident::{IncidentEvent, IncidentLifecycle, INCIDENT_TRANSITIONS};
pub use task::{TaskEvent, TaskLifecycle, TASK_TRANSITIONS};

pub(crate) const SUPERVISORY: &[Role] = &[Role::Supervisor, Role::Admin];
pub(crate) const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// Who may fire a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Roles(&'static [Role]),
    /// Only the user the task is assigned to.
    Assignee,
}

impl Gate {
    pub fn admits_role(&self, role: Role) -> bool {
        match self {
            Gate::Roles(roles) => roles.contains(&role),
            Gate::Assignee => false,
        }
    }

    pub fn admits(&self, actor: &UserSession, task: &Task) -> bool {
        match self {
            Gate::Roles(roles) => roles.contains(&actor.role),
            Gate::Assignee => task.is_assigned_to(&actor.id),
        }
    }
}

/// One row of a transition table: `(from, event, gate) -> to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRule<S: 'static, E> {
    pub from: &'static [S],
    pub event: E,
    pub to: S,
    pub gate: Gate,
}

pub(crate) fn find_rule<S, E>(
    table: &'static [TransitionRule<S, E>],
    from: S,
    event: E,
) -> Option<&'static TransitionRule<S, E>>
where
    S: PartialEq + Copy,
    E: PartialEq + Copy,
{
    table
        .iter()
        .find(|rule| rule.event == event && rule.from.contains(&from))
}
