use serde::{Deserialize, Serialize};

use crate::errors::LifecycleError;
use crate::geo::{GeoCapture, GeoPoint, GeoPolygon, LatLng};

/// Survey payload for one task: geometry, notes and opaque photo references.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveySubmission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survey_location: Option<GeoPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survey_area: Option<GeoPolygon>,
    pub survey_notes: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub survey_photos: Vec<String>,
}

impl SurveySubmission {
    pub fn new(notes: impl Into<String>) -> Self {
        Self {
            survey_notes: notes.into(),
            ..Self::default()
        }
    }

    /// Take whatever the capture engine holds: the marker and the last completed area.
    pub fn from_capture(capture: &GeoCapture, notes: impl Into<String>) -> Self {
        Self {
            survey_location: capture.marker_geometry(),
            survey_area: capture.area_geometry(),
            survey_notes: notes.into(),
            survey_photos: Vec::new(),
        }
    }

    pub fn with_location(mut self, position: LatLng) -> Self {
        self.survey_location = Some(GeoPoint::from_lat_lng(position));
        self
    }

    pub fn with_area(mut self, area: GeoPolygon) -> Self {
        self.survey_area = Some(area);
        self
    }

    pub fn with_photos<I, S>(mut self, photos: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.survey_photos = photos.into_iter().map(Into::into).collect();
        self
    }

    /// Reports every missing or invalid field at once.
    pub fn validate(&self) -> Result<(), LifecycleError> {
        let mut fields = Vec::new();

        if self.survey_notes.trim().is_empty() {
            fields.push("surveyNotes");
        }
        if self.survey_location.is_none() && self.survey_area.is_none() {
            fields.push("location or area");
        }
        if let Some(location) = &self.survey_location {
            if location.validate().is_err() {
                fields.push("surveyLocation");
            }
        }
        if let Some(area) = &self.survey_area {
            if area.validate().is_err() {
                fields.push("surveyArea");
            }
        }

        if fields.is_empty() {
            Ok(())
        } else {
            Err(LifecycleError::validation(fields))
        }
    }

    /// Copy with trimmed notes, as sent to the backend.
    pub fn normalized(&self) -> Self {
        Self {
            survey_notes: self.survey_notes.trim().to_string(),
            ..self.clone()
        }
    }
}
