use serde::{Deserialize, Serialize};
use thiserror::Error;

/// GeoJSON position: `[longitude, latitude]`.
pub type Position = [f64; 2];

/// A map position as the capture engine and map clicks carry it: latitude first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("coordinate out of range: lat={lat}, lng={lng}")]
    OutOfRange { lat: f64, lng: f64 },
    #[error("ring has {len} positions, a closed ring needs at least 4")]
    RingTooShort { len: usize },
    #[error("ring is not closed: first and last positions differ")]
    RingNotClosed,
    #[error("polygon must have exactly one outer ring, found {rings}")]
    RingCount { rings: usize },
    #[error("polygon needs at least 3 vertices, got {count}")]
    TooFewVertices { count: usize },
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    pub fn validate(&self) -> Result<(), GeometryError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(GeometryError::OutOfRange {
                lat: self.lat,
                lng: self.lng,
            })
        }
    }

    /// Swap into GeoJSON order.
    pub fn to_position(self) -> Position {
        [self.lng, self.lat]
    }

    pub fn from_position(position: Position) -> Self {
        Self {
            lat: position[1],
            lng: position[0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointType {
    Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolygonType {
    Polygon,
}

/// GeoJSON `Point` as the backend expects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "type")]
    kind: PointType,
    pub coordinates: Position,
}

impl GeoPoint {
    pub fn from_lat_lng(point: LatLng) -> Self {
        Self {
            kind: PointType::Point,
            coordinates: point.to_position(),
        }
    }

    pub fn lat_lng(&self) -> LatLng {
        LatLng::from_position(self.coordinates)
    }

    pub fn validate(&self) -> Result<(), GeometryError> {
        self.lat_lng().validate()
    }
}

/// GeoJSON `Polygon` restricted to a single closed outer ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPolygon {
    #[serde(rename = "type")]
    kind: PolygonType,
    pub coordinates: Vec<Vec<Position>>,
}

impl GeoPolygon {
    /// Close an open vertex list by repeating its first vertex.
    pub fn close(vertices: &[LatLng]) -> Result<Self, GeometryError> {
        if vertices.len() < 3 {
            return Err(GeometryError::TooFewVertices {
                count: vertices.len(),
            });
        }
        let mut ring: Vec<Position> = vertices.iter().map(|v| v.to_position()).collect();
        ring.push(vertices[0].to_position());
        Self::from_ring(ring)
    }

    /// Wrap a ring that is already closed.
    pub fn from_ring(ring: Vec<Position>) -> Result<Self, GeometryError> {
        validate_closed_ring(&ring)?;
        Ok(Self {
            kind: PolygonType::Polygon,
            coordinates: vec![ring],
        })
    }

    pub fn outer_ring(&self) -> Option<&[Position]> {
        self.coordinates.first().map(Vec::as_slice)
    }

    pub fn vertex_count(&self) -> usize {
        self.outer_ring().map(|r| r.len().saturating_sub(1)).unwrap_or(0)
    }

    pub fn validate(&self) -> Result<(), GeometryError> {
        if self.coordinates.len() != 1 {
            return Err(GeometryError::RingCount {
                rings: self.coordinates.len(),
            });
        }
        validate_closed_ring(&self.coordinates[0])
    }
}

/// Shared by survey areas and village boundaries.
pub fn validate_closed_ring(ring: &[Position]) -> Result<(), GeometryError> {
    if ring.len() < 4 {
        return Err(GeometryError::RingTooShort { len: ring.len() });
    }
    if ring.first() != ring.last() {
        return Err(GeometryError::RingNotClosed);
    }
    for position in ring {
        LatLng::from_position(*position).validate()?;
    }
    Ok(())
}
