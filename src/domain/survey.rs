use serde::{Deserialize, Serialize};

use super::ids::{IncidentId, SurveyId, TemplateId, UserId, VillageId};
use crate::geo::{GeoPolygon, GeometryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SurveyStatus {
    #[default]
    Draft,
    Active,
    Completed,
}

/// Structured data collection tied to exactly one incident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Survey {
    pub id: SurveyId,
    pub template_id: TemplateId,
    pub incident_id: IncidentId,
    #[serde(default)]
    pub village_id: Option<VillageId>,
    pub status: SurveyStatus,
    pub created_by_id: UserId,
}

impl Survey {
    pub fn new(
        template_id: TemplateId,
        incident_id: IncidentId,
        village_id: Option<VillageId>,
        created_by_id: UserId,
    ) -> Self {
        Self {
            id: SurveyId::generate(),
            template_id,
            incident_id,
            village_id,
            status: SurveyStatus::Draft,
            created_by_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Village {
    pub id: VillageId,
    pub village_no: u32,
    pub name: String,
    #[serde(default)]
    boundary: Option<GeoPolygon>,
}

impl Village {
    pub fn new(id: VillageId, village_no: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            village_no,
            name: name.into(),
            boundary: None,
        }
    }

    /// Boundaries must be a closed ring, same rule as survey areas.
    pub fn with_boundary(mut self, boundary: GeoPolygon) -> Result<Self, GeometryError> {
        boundary.validate()?;
        self.boundary = Some(boundary);
        Ok(self)
    }

    pub fn boundary(&self) -> Option<&GeoPolygon> {
        self.boundary.as_ref()
    }

    /// Re-check a village that came off the wire.
    pub fn validate(&self) -> Result<(), GeometryError> {
        match &self.boundary {
            Some(boundary) => boundary.validate(),
            None => Ok(()),
        }
    }
}
