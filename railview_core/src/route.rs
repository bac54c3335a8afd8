//! Route geometry - projects progress fractions onto the base polyline.
//!
//! The polyline itself is supplied by an external collaborator; this module
//! never fetches or parses geometry. Coordinates are treated as planar,
//! which holds for schematic surfaces and for corridor-sized map extents.

use geo::{Coord, EuclideanLength, LineString};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RouteError {
    #[error("Route needs at least two points, got {0}")]
    TooFewPoints(usize),

    #[error("Route point {0} is not finite")]
    NonFinite(usize),

    #[error("Route has zero length")]
    ZeroLength,
}

/// The corridor centre line.
#[derive(Debug, Clone)]
pub struct RouteGeometry {
    line: LineString<f64>,

    /// Cumulative length at each vertex (same length as the vertex list)
    cumulative: Vec<f64>,
}

impl RouteGeometry {
    /// Builds the geometry from `[x, y]` vertices.
    pub fn new(points: &[[f64; 2]]) -> Result<Self, RouteError> {
        if points.len() < 2 {
            return Err(RouteError::TooFewPoints(points.len()));
        }
        if let Some(index) = points.iter().position(|p| !p[0].is_finite() || !p[1].is_finite()) {
            return Err(RouteError::NonFinite(index));
        }

        let line: LineString<f64> = points.iter().map(|p| Coord { x: p[0], y: p[1] }).collect();

        let mut cumulative = Vec::with_capacity(points.len());
        cumulative.push(0.0);
        let mut total = 0.0;
        for segment in line.lines() {
            total += segment.euclidean_length();
            cumulative.push(total);
        }

        if total <= 0.0 {
            return Err(RouteError::ZeroLength);
        }

        Ok(Self { line, cumulative })
    }

    /// Total polyline length in surface units.
    pub fn length(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    /// Point at `fraction` of the route (clamped to `[0, 1]`), shifted by
    /// `lateral_offset` along the left normal of the local segment.
    pub fn point_at(&self, fraction: f64, lateral_offset: f64) -> [f64; 2] {
        let target = fraction.clamp(0.0, 1.0) * self.length();

        let mut chosen = None;
        for (index, segment) in self.line.lines().enumerate() {
            let (start, end) = (self.cumulative[index], self.cumulative[index + 1]);
            if end - start <= 0.0 {
                continue;
            }
            chosen = Some((segment, start, end));
            if target <= end {
                break;
            }
        }

        // A valid route always has one non-degenerate segment
        let Some((segment, start, end)) = chosen else {
            let c = self.line.0[0];
            return [c.x, c.y];
        };

        let local = ((target - start) / (end - start)).clamp(0.0, 1.0);
        let delta = segment.delta();
        let length = end - start;
        let normal = (-delta.y / length, delta.x / length);

        [
            segment.start.x + delta.x * local + normal.0 * lateral_offset,
            segment.start.y + delta.y * local + normal.1 * lateral_offset,
        ]
    }

    /// The whole polyline shifted sideways by `lateral_offset`.
    ///
    /// Interior vertices use the averaged normal of their two segments.
    pub fn track_line(&self, lateral_offset: f64) -> Vec<[f64; 2]> {
        let normals: Vec<(f64, f64)> = self
            .line
            .lines()
            .map(|segment| {
                let delta = segment.delta();
                let length = segment.euclidean_length();
                if length > 0.0 {
                    (-delta.y / length, delta.x / length)
                } else {
                    (0.0, 0.0)
                }
            })
            .collect();

        self.line
            .0
            .iter()
            .enumerate()
            .map(|(index, vertex)| {
                let before = index.checked_sub(1).and_then(|i| normals.get(i)).copied();
                let after = normals.get(index).copied();
                let (nx, ny) = match (before, after) {
                    (Some(a), Some(b)) => {
                        let (sx, sy) = (a.0 + b.0, a.1 + b.1);
                        let norm = (sx * sx + sy * sy).sqrt();
                        if norm > 0.0 { (sx / norm, sy / norm) } else { b }
                    }
                    (Some(n), None) | (None, Some(n)) => n,
                    (None, None) => (0.0, 0.0),
                };
                [vertex.x + nx * lateral_offset, vertex.y + ny * lateral_offset]
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn l_shape() -> RouteGeometry {
        // 10 east, then 10 north
        RouteGeometry::new(&[[0.0, 0.0], [10.0, 0.0], [10.0, 10.0]]).unwrap()
    }

    #[test]
    fn test_route_length_and_interpolation() {
        let route = l_shape();
        assert_relative_eq!(route.length(), 20.0);

        let start = route.point_at(0.0, 0.0);
        let corner = route.point_at(0.5, 0.0);
        let quarter = route.point_at(0.75, 0.0);
        let end = route.point_at(1.5, 0.0);

        assert_relative_eq!(start[0], 0.0);
        assert_relative_eq!(corner[0], 10.0);
        assert_relative_eq!(corner[1], 0.0);
        assert_relative_eq!(quarter[1], 5.0);
        assert_relative_eq!(end[1], 10.0);
    }

    #[test]
    fn test_lateral_offset_uses_left_normal() {
        let route = l_shape();

        // Heading east: left is north
        let p = route.point_at(0.25, 1.0);
        assert_relative_eq!(p[0], 5.0);
        assert_relative_eq!(p[1], 1.0);

        // Heading north: left is west
        let q = route.point_at(0.75, 1.0);
        assert_relative_eq!(q[0], 9.0);
        assert_relative_eq!(q[1], 5.0);
    }

    #[test]
    fn test_track_line_offsets_every_vertex() {
        let route = RouteGeometry::new(&[[0.0, 0.0], [10.0, 0.0], [20.0, 0.0]]).unwrap();
        let line = route.track_line(-2.0);

        assert_eq!(line.len(), 3);
        for vertex in &line {
            assert_relative_eq!(vertex[1], -2.0);
        }
    }

    #[test]
    fn test_invalid_routes_rejected() {
        assert_eq!(RouteGeometry::new(&[[0.0, 0.0]]).unwrap_err(), RouteError::TooFewPoints(1));
        assert_eq!(
            RouteGeometry::new(&[[0.0, 0.0], [f64::NAN, 1.0]]).unwrap_err(),
            RouteError::NonFinite(1)
        );
        assert_eq!(
            RouteGeometry::new(&[[1.0, 1.0], [1.0, 1.0]]).unwrap_err(),
            RouteError::ZeroLength
        );
    }

    #[test]
    fn test_duplicate_vertices_are_skipped() {
        let route = RouteGeometry::new(&[[0.0, 0.0], [0.0, 0.0], [4.0, 0.0]]).unwrap();
        let p = route.point_at(0.5, 1.0);
        assert_relative_eq!(p[0], 2.0);
        assert_relative_eq!(p[1], 1.0);
    }
}
