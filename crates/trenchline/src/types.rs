//! Core geometric types shared by the scene, the renderer, and the exporter.

use serde::{Deserialize, Serialize};

/// A 2D point.
///
/// In world space `x` is the station (m) and `y` the elevation (m); in
/// device space both are pixels with `y` growing downward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

impl Point2D {
    /// Create a new 2D point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Origin point (0, 0).
    pub const ORIGIN: Self = Self { x: 0.0, y: 0.0 };

    /// Same point shifted by `(dx, dy)`.
    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl Default for Point2D {
    fn default() -> Self {
        Self::ORIGIN
    }
}

/// World-space extent of a profile drawing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Smallest station (m).
    pub min_station: f64,
    /// Largest station (m).
    pub max_station: f64,
    /// Lowest elevation (m).
    pub min_elevation: f64,
    /// Highest elevation (m).
    pub max_elevation: f64,
}

impl Bounds {
    /// Create bounds from explicit extents.
    pub fn new(min_station: f64, max_station: f64, min_elevation: f64, max_elevation: f64) -> Self {
        Self {
            min_station,
            max_station,
            min_elevation,
            max_elevation,
        }
    }

    /// Empty elevation range over the given stations, ready to accumulate.
    pub fn stations(min_station: f64, max_station: f64) -> Self {
        Self {
            min_station,
            max_station,
            min_elevation: f64::INFINITY,
            max_elevation: f64::NEG_INFINITY,
        }
    }

    /// Expand the elevation range to include `elevation`.
    pub fn include_elevation(&mut self, elevation: f64) {
        self.min_elevation = self.min_elevation.min(elevation);
        self.max_elevation = self.max_elevation.max(elevation);
    }

    /// Widen the elevation range by `margin` on both sides.
    pub fn padded(&self, margin: f64) -> Self {
        Self {
            min_elevation: self.min_elevation - margin,
            max_elevation: self.max_elevation + margin,
            ..*self
        }
    }

    /// Station extent.
    pub fn station_span(&self) -> f64 {
        self.max_station - self.min_station
    }

    /// Elevation extent.
    pub fn elevation_span(&self) -> f64 {
        self.max_elevation - self.min_elevation
    }

    /// Midpoint station.
    pub fn mid_station(&self) -> f64 {
        (self.min_station + self.max_station) / 2.0
    }

    /// Check if the bounds enclose a non-empty area.
    pub fn is_valid(&self) -> bool {
        self.min_station < self.max_station && self.min_elevation < self.max_elevation
    }
}

/// An open polyline in world coordinates, vertices in station order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    /// Ordered vertices.
    pub points: Vec<Point2D>,
}

impl Polyline {
    /// Create a polyline from its vertices.
    pub fn new(points: Vec<Point2D>) -> Self {
        Self { points }
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the polyline has no vertices.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterate over the elevations of all vertices.
    pub fn elevations(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.y)
    }

    /// The same polyline shifted vertically by `dy`.
    pub fn shifted(&self, dy: f64) -> Self {
        Self {
            points: self.points.iter().map(|p| p.offset(0.0, dy)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_accumulate_and_pad() {
        let mut b = Bounds::stations(0.0, 35.0);
        assert!(!b.is_valid());

        b.include_elevation(600.0);
        b.include_elevation(602.5);
        b.include_elevation(601.0);

        assert!(b.is_valid());
        assert!((b.elevation_span() - 2.5).abs() < 1e-10);

        let p = b.padded(0.5);
        assert!((p.min_elevation - 599.5).abs() < 1e-10);
        assert!((p.max_elevation - 603.0).abs() < 1e-10);
        assert_eq!(p.min_station, 0.0);
        assert_eq!(p.max_station, 35.0);
    }

    #[test]
    fn test_polyline_shift() {
        let line = Polyline::new(vec![Point2D::new(0.0, 1.0), Point2D::new(3.0, 5.0)]);
        let up = line.shifted(0.2);
        assert!((up.points[1].y - 5.2).abs() < 1e-10);
        assert_eq!(up.points[0].x, 0.0);
        assert_eq!(line.points[1].y, 5.0);
    }
}
