// Geospatial capture - marker and polygon drawing for field surveys
// Internal pairs are (lat, lng); everything emitted is GeoJSON [lng, lat]

pub mod capture;
pub mod geometry;

pub use capture::{
    CaptureError, CaptureEvent, CaptureMode, DrawingTool, GeoCapture, LocationProvider,
};
pub use geometry::{validate_closed_ring, GeoPoint, GeoPolygon, GeometryError, LatLng, Position};
