use async_trait::async_trait;
use statig::prelude::*;
use thiserror::Error;

use super::geometry::{GeoPoint, GeoPolygon, LatLng};
use crate::errors::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureMode {
    #[default]
    Idle,
    PlacingMarker,
    DrawingPolygon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawingTool {
    Marker,
    Polygon,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    SetMode(DrawingTool),
    Click(LatLng),
    Complete,
    Clear,
    /// Device position acquired by the "use current location" affordance.
    Located(LatLng),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CaptureError {
    #[error("polygon needs at least 3 vertices, have {count}")]
    InsufficientVertices { count: usize },
    #[error("current location unavailable: {reason}")]
    LocationUnavailable { reason: String },
    #[error("cannot switch tools while {mode:?}")]
    ModeBusy { mode: CaptureMode },
    #[error("no polygon is being drawn")]
    NotDrawing,
    #[error("no drawing tool is active")]
    NotCapturing,
    #[error("coordinate out of range: lat={lat}, lng={lng}")]
    InvalidCoordinate { lat: f64, lng: f64 },
}

impl CaptureError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CaptureError::LocationUnavailable { .. } => ErrorKind::LocationUnavailable,
            CaptureError::InsufficientVertices { .. } | CaptureError::InvalidCoordinate { .. } => {
                ErrorKind::Validation
            }
            CaptureError::ModeBusy { .. }
            | CaptureError::NotDrawing
            | CaptureError::NotCapturing => ErrorKind::Transition,
        }
    }
}

/// Device positioning collaborator (GPS).
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self) -> Result<LatLng, String>;
}

/// Drawing state shared by the capture states.
#[derive(Debug, Default)]
pub struct CaptureState {
    mode: CaptureMode,
    marker: Option<LatLng>,
    ring: Vec<LatLng>,
    area: Option<GeoPolygon>,
    rejection: Option<CaptureError>,
}

#[state_machine(initial = "State::idle()")]
impl CaptureState {
    #[state]
    fn idle(&mut self, event: &CaptureEvent) -> Outcome<State> {
        self.rejection = None;
        match event {
            CaptureEvent::SetMode(DrawingTool::Marker) => {
                self.mode = CaptureMode::PlacingMarker;
                tracing::debug!("Marker placement armed");
                Transition(State::placing_marker())
            }
            CaptureEvent::SetMode(DrawingTool::Polygon) => {
                self.ring.clear();
                self.mode = CaptureMode::DrawingPolygon;
                tracing::debug!("Polygon drawing started");
                Transition(State::drawing_polygon())
            }
            CaptureEvent::Click(_) => {
                self.rejection = Some(CaptureError::NotCapturing);
                Handled
            }
            CaptureEvent::Complete => {
                self.rejection = Some(CaptureError::NotDrawing);
                Handled
            }
            CaptureEvent::Clear => {
                self.reset();
                Handled
            }
            CaptureEvent::Located(position) => {
                self.marker = Some(*position);
                Handled
            }
        }
    }

    #[state]
    fn placing_marker(&mut self, event: &CaptureEvent) -> Outcome<State> {
        self.rejection = None;
        match event {
            CaptureEvent::Click(position) | CaptureEvent::Located(position) => {
                self.marker = Some(*position);
                self.mode = CaptureMode::Idle;
                tracing::info!(lat = position.lat, lng = position.lng, "Marker placed");
                Transition(State::idle())
            }
            CaptureEvent::SetMode(_) => {
                self.rejection = Some(CaptureError::ModeBusy { mode: self.mode });
                Handled
            }
            CaptureEvent::Complete => {
                self.rejection = Some(CaptureError::NotDrawing);
                Handled
            }
            CaptureEvent::Clear => {
                self.reset();
                Transition(State::idle())
            }
        }
    }

    #[state]
    fn drawing_polygon(&mut self, event: &CaptureEvent) -> Outcome<State> {
        self.rejection = None;
        match event {
            CaptureEvent::Click(position) => {
                self.ring.push(*position);
                Handled
            }
            CaptureEvent::Complete => match GeoPolygon::close(&self.ring) {
                Ok(polygon) => {
                    tracing::info!(vertices = self.ring.len(), "Polygon completed");
                    self.area = Some(polygon);
                    self.ring.clear();
                    self.mode = CaptureMode::Idle;
                    Transition(State::idle())
                }
                Err(_) => {
                    self.rejection = Some(CaptureError::InsufficientVertices {
                        count: self.ring.len(),
                    });
                    Handled
                }
            },
            CaptureEvent::SetMode(_) => {
                self.rejection = Some(CaptureError::ModeBusy { mode: self.mode });
                Handled
            }
            CaptureEvent::Located(position) => {
                self.marker = Some(*position);
                Handled
            }
            CaptureEvent::Clear => {
                self.reset();
                Transition(State::idle())
            }
        }
    }
}

impl CaptureState {
    fn reset(&mut self) {
        self.mode = CaptureMode::Idle;
        self.marker = None;
        self.ring.clear();
        self.area = None;
    }
}

/// Marker and polygon capture for a single field survey.
///
/// Stores `(lat, lng)` pairs and emits GeoJSON in `[lng, lat]` order.
pub struct GeoCapture {
    machine: StateMachine<CaptureState>,
}

impl Default for GeoCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GeoCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoCapture")
            .field("state", self.machine.inner())
            .finish()
    }
}

impl GeoCapture {
    pub fn new() -> Self {
        Self {
            machine: CaptureState::default().state_machine(),
        }
    }

    fn dispatch(&mut self, event: CaptureEvent) -> Result<(), CaptureError> {
        self.machine.handle(&event);
        match &self.machine.inner().rejection {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    pub fn set_mode(&mut self, tool: DrawingTool) -> Result<(), CaptureError> {
        self.dispatch(CaptureEvent::SetMode(tool))
    }

    /// Map click from the map provider.
    pub fn click(&mut self, lat: f64, lng: f64) -> Result<(), CaptureError> {
        let position = LatLng::new(lat, lng);
        if !position.is_valid() {
            return Err(CaptureError::InvalidCoordinate { lat, lng });
        }
        self.dispatch(CaptureEvent::Click(position))
    }

    /// Close the working ring and emit it.
    pub fn complete(&mut self) -> Result<GeoPolygon, CaptureError> {
        self.dispatch(CaptureEvent::Complete)?;
        self.machine
            .inner()
            .area
            .clone()
            .ok_or(CaptureError::NotDrawing)
    }

    pub fn clear(&mut self) {
        self.machine.handle(&CaptureEvent::Clear);
    }

    /// Place the marker at the device position. Drawing state is untouched
    /// when the position cannot be acquired.
    pub async fn use_current_location(
        &mut self,
        provider: &dyn LocationProvider,
    ) -> Result<LatLng, CaptureError> {
        let position = match provider.current_position().await {
            Ok(position) if position.is_valid() => position,
            Ok(position) => {
                return Err(CaptureError::LocationUnavailable {
                    reason: format!(
                        "device reported an invalid position ({}, {})",
                        position.lat, position.lng
                    ),
                })
            }
            Err(reason) => {
                tracing::warn!(reason = %reason, "Device location unavailable");
                return Err(CaptureError::LocationUnavailable { reason });
            }
        };
        self.dispatch(CaptureEvent::Located(position))?;
        Ok(position)
    }

    pub fn mode(&self) -> CaptureMode {
        self.machine.inner().mode
    }

    pub fn marker(&self) -> Option<LatLng> {
        self.machine.inner().marker
    }

    pub fn working_ring(&self) -> &[LatLng] {
        &self.machine.inner().ring
    }

    pub fn marker_geometry(&self) -> Option<GeoPoint> {
        self.marker().map(GeoPoint::from_lat_lng)
    }

    pub fn area_geometry(&self) -> Option<GeoPolygon> {
        self.machine.inner().area.clone()
    }
}
