//! World-to-device coordinate mapping.
//!
//! Station maps to device X (increasing), elevation maps to device Y
//! (decreasing, since device Y grows downward).

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{ProfileError, Result};
use crate::types::{Bounds, Point2D};

/// Target drawing surface in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceRect {
    /// Surface width (px).
    pub width: f64,
    /// Surface height (px).
    pub height: f64,
    /// Blank margin kept on every side of the plot area (px).
    pub margin: f64,
}

impl DeviceRect {
    /// Create a device rectangle.
    pub fn new(width: f64, height: f64, margin: f64) -> Self {
        Self {
            width,
            height,
            margin,
        }
    }

    /// Width of the plot area inside the margins.
    pub fn plot_width(&self) -> f64 {
        self.width - 2.0 * self.margin
    }

    /// Height of the plot area inside the margins.
    pub fn plot_height(&self) -> f64 {
        self.height - 2.0 * self.margin
    }

    /// Left edge of the plot area.
    pub fn left(&self) -> f64 {
        self.margin
    }

    /// Right edge of the plot area.
    pub fn right(&self) -> f64 {
        self.width - self.margin
    }

    /// Top edge of the plot area.
    pub fn top(&self) -> f64 {
        self.margin
    }

    /// Bottom edge of the plot area.
    pub fn bottom(&self) -> f64 {
        self.height - self.margin
    }
}

impl Default for DeviceRect {
    fn default() -> Self {
        Self::new(1200.0, 600.0, 80.0)
    }
}

/// Affine map between world (station, elevation) and device pixels.
#[derive(Debug, Clone)]
pub struct CoordinateMapper {
    bounds: Bounds,
    device: DeviceRect,
    to_device: Matrix3<f64>,
    to_world: Matrix3<f64>,
}

impl CoordinateMapper {
    /// Build a mapper fitting `bounds` into the plot area of `device`.
    pub fn new(bounds: Bounds, device: DeviceRect) -> Result<Self> {
        let finite = [
            bounds.min_station,
            bounds.max_station,
            bounds.min_elevation,
            bounds.max_elevation,
        ]
        .iter()
        .all(|v| v.is_finite());
        if !finite {
            return Err(ProfileError::DegenerateBounds(
                "world bounds must be finite".into(),
            ));
        }
        if bounds.max_station <= bounds.min_station {
            return Err(ProfileError::DegenerateBounds(format!(
                "station range [{}, {}] is empty",
                bounds.min_station, bounds.max_station
            )));
        }
        if bounds.max_elevation <= bounds.min_elevation {
            return Err(ProfileError::DegenerateBounds(format!(
                "elevation range [{}, {}] is empty",
                bounds.min_elevation, bounds.max_elevation
            )));
        }
        if !(device.plot_width() > 0.0 && device.plot_height() > 0.0) {
            return Err(ProfileError::DegenerateBounds(format!(
                "device {}x{} with margin {} has no plot area",
                device.width, device.height, device.margin
            )));
        }

        let sx = device.plot_width() / bounds.station_span();
        let sy = device.plot_height() / bounds.elevation_span();

        #[rustfmt::skip]
        let to_device = Matrix3::new(
            sx,  0.0, device.left() - sx * bounds.min_station,
            0.0, -sy, device.top() + sy * bounds.max_elevation,
            0.0, 0.0, 1.0,
        );
        let to_world = to_device.try_inverse().ok_or_else(|| {
            ProfileError::DegenerateBounds("world-to-device transform is singular".into())
        })?;

        Ok(Self {
            bounds,
            device,
            to_device,
            to_world,
        })
    }

    /// World bounds this mapper was built from.
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Device rectangle this mapper targets.
    pub fn device(&self) -> &DeviceRect {
        &self.device
    }

    /// Horizontal scale (px per meter).
    pub fn scale_x(&self) -> f64 {
        self.to_device[(0, 0)]
    }

    /// Vertical scale (px per meter, positive).
    pub fn scale_y(&self) -> f64 {
        -self.to_device[(1, 1)]
    }

    /// Map a station to device X.
    pub fn world_to_device_x(&self, station: f64) -> f64 {
        self.to_device[(0, 0)] * station + self.to_device[(0, 2)]
    }

    /// Map an elevation to device Y.
    pub fn world_to_device_y(&self, elevation: f64) -> f64 {
        self.to_device[(1, 1)] * elevation + self.to_device[(1, 2)]
    }

    /// Map device X back to a station.
    pub fn device_to_world_x(&self, x: f64) -> f64 {
        self.to_world[(0, 0)] * x + self.to_world[(0, 2)]
    }

    /// Map device Y back to an elevation.
    pub fn device_to_world_y(&self, y: f64) -> f64 {
        self.to_world[(1, 1)] * y + self.to_world[(1, 2)]
    }

    /// Map a world point to device space.
    pub fn world_to_device(&self, p: Point2D) -> Point2D {
        let v = self.to_device * Vector3::new(p.x, p.y, 1.0);
        Point2D::new(v.x, v.y)
    }

    /// Map a device point back to world space.
    pub fn device_to_world(&self, p: Point2D) -> Point2D {
        let v = self.to_world * Vector3::new(p.x, p.y, 1.0);
        Point2D::new(v.x, v.y)
    }

    /// Map a sequence of world points.
    pub fn map_points(&self, points: &[Point2D]) -> Vec<Point2D> {
        points.iter().map(|p| self.world_to_device(*p)).collect()
    }
}
