use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{IncidentId, UserId, VillageId};
use crate::geo::GeoPoint;
use crate::priority::Priority;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentStatus {
    Pending,
    InProgress,
    Resolved,
    Rejected,
    Closed,
}

impl IncidentStatus {
    pub const ALL: [IncidentStatus; 5] = [
        IncidentStatus::Pending,
        IncidentStatus::InProgress,
        IncidentStatus::Resolved,
        IncidentStatus::Rejected,
        IncidentStatus::Closed,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, IncidentStatus::Closed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IncidentStatus::Pending => "PENDING",
            IncidentStatus::InProgress => "IN_PROGRESS",
            IncidentStatus::Resolved => "RESOLVED",
            IncidentStatus::Rejected => "REJECTED",
            IncidentStatus::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisasterType {
    Flood,
    Fire,
    Storm,
    Landslide,
    Earthquake,
    Drought,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

impl fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewDecision::Approved => f.write_str("APPROVED"),
            ReviewDecision::Rejected => f.write_str("REJECTED"),
        }
    }
}

/// Audit record of one supervisor review. Entries are only ever appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEntry {
    pub actor: UserId,
    pub timestamp: DateTime<Utc>,
    pub decision: ReviewDecision,
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: IncidentId,
    pub title: String,
    pub description: String,
    pub status: IncidentStatus,
    pub priority: Priority,
    pub disaster_type: DisasterType,
    pub location: GeoPoint,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub village_id: Option<VillageId>,
    #[serde(default)]
    pub images: Vec<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub review_history: Vec<ReviewEntry>,
}

/// Reporter input for a new incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIncident {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub disaster_type: DisasterType,
    pub location: GeoPoint,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub village_id: Option<VillageId>,
    #[serde(default)]
    pub images: Vec<String>,
}

impl Incident {
    /// Every report starts PENDING, whoever files it.
    pub fn report(input: NewIncident, reporter: &UserId) -> Self {
        let now = Utc::now();
        Self {
            id: IncidentId::generate(),
            title: input.title.trim().to_string(),
            description: input.description,
            status: IncidentStatus::Pending,
            priority: input.priority,
            disaster_type: input.disaster_type,
            location: input.location,
            address: input.address,
            village_id: input.village_id,
            images: input.images,
            created_by: reporter.clone(),
            created_at: now,
            updated_at: now,
            review_history: Vec::new(),
        }
    }

    pub fn latest_review(&self) -> Option<&ReviewEntry> {
        self.review_history.last()
    }
}
