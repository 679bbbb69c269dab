use glam::DVec2;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle.
///
/// Stored as corners so that quadrant splits share exact edges; `center` and
/// `half` are derived.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: DVec2,
    pub max: DVec2,
}

impl Rect {
    pub fn new(center: DVec2, half_width: f64, half_height: f64) -> Self {
        let half = DVec2::new(half_width, half_height);
        Self {
            min: center - half,
            max: center + half,
        }
    }

    pub fn from_min_max(min: DVec2, max: DVec2) -> Self {
        Self { min, max }
    }

    /// Square bounds enclosing every finite point, padded so nothing sits on the edge.
    pub fn fitted(points: impl IntoIterator<Item = DVec2>, padding: f64) -> Option<Self> {
        let mut min = DVec2::splat(f64::INFINITY);
        let mut max = DVec2::splat(f64::NEG_INFINITY);
        for point in points {
            if !point.is_finite() {
                continue;
            }
            min = min.min(point);
            max = max.max(point);
        }

        if !min.is_finite() || !max.is_finite() {
            return None;
        }

        let span = (max - min).max(DVec2::ONE);
        let half_extent = (span.x.max(span.y) * 0.5) + padding.max(1.0);
        Some(Self::new((min + max) * 0.5, half_extent, half_extent))
    }

    pub fn center(&self) -> DVec2 {
        (self.min + self.max) * 0.5
    }

    pub fn half(&self) -> DVec2 {
        (self.max - self.min) * 0.5
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Finite with strictly positive extents.
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.width() > 0.0 && self.height() > 0.0
    }

    pub fn contains(&self, point: DVec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        self.contains(other.min) && self.contains(other.max)
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }

    /// Squared distance from `point` to the closest point of the rectangle.
    pub fn distance_sq_to_point(&self, point: DVec2) -> f64 {
        let outside = (self.min - point).max(point - self.max).max(DVec2::ZERO);
        outside.length_squared()
    }

    pub fn intersects_circle(&self, center: DVec2, radius: f64) -> bool {
        self.distance_sq_to_point(center) <= radius * radius
    }

    pub fn expanded(&self, amount: f64) -> Self {
        Self {
            min: self.min - DVec2::splat(amount),
            max: self.max + DVec2::splat(amount),
        }
    }

    /// Quadrant layout: 0 = (-x, -y), 1 = (+x, -y), 2 = (-x, +y), 3 = (+x, +y).
    pub(crate) fn quadrant_for(&self, point: DVec2) -> usize {
        let center = self.center();
        let right = point.x >= center.x;
        let upper = point.y >= center.y;
        match (right, upper) {
            (false, false) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (true, true) => 3,
        }
    }

    pub(crate) fn child(&self, quadrant: usize) -> Self {
        let center = self.center();
        let (min_x, max_x) = if quadrant & 1 == 0 {
            (self.min.x, center.x)
        } else {
            (center.x, self.max.x)
        };
        let (min_y, max_y) = if quadrant & 2 == 0 {
            (self.min.y, center.y)
        } else {
            (center.y, self.max.y)
        };

        Self {
            min: DVec2::new(min_x, min_y),
            max: DVec2::new(max_x, max_y),
        }
    }
}
