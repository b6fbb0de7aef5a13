//! Support polygon as a 2-D convex hull.
//!
//! The DCM MPC constrains its ZMP input to the hull of the foot corners in
//! contact at each horizon sample; the same polygon backs the measured-ZMP
//! audit. Hull construction is Andrew's monotone chain; constraint rows come
//! out as half-planes `n · x ≤ b` with outward normals.

use nalgebra::{Isometry3, Vector2, Vector3};

/// Ground-plane corners of a sole rectangle under a world foot pose.
///
/// `limits_x = [back, front]`, `limits_y = [right, left]` in the sole frame.
#[must_use]
pub fn foot_corners(
    pose: &Isometry3<f64>,
    limits_x: [f64; 2],
    limits_y: [f64; 2],
) -> [Vector2<f64>; 4] {
    let mut corners = [Vector2::zeros(); 4];
    for (k, (cx, cy)) in [
        (limits_x[0], limits_y[0]),
        (limits_x[1], limits_y[0]),
        (limits_x[1], limits_y[1]),
        (limits_x[0], limits_y[1]),
    ]
    .into_iter()
    .enumerate()
    {
        let world = pose.rotation * Vector3::new(cx, cy, 0.0) + pose.translation.vector;
        corners[k] = Vector2::new(world.x, world.y);
    }
    corners
}

/// A convex polygon, vertices counter-clockwise.
#[derive(Clone, Debug, Default)]
pub struct ConvexHull {
    vertices: Vec<Vector2<f64>>,
}

impl ConvexHull {
    /// Build the hull of a point cloud (Andrew's monotone chain).
    ///
    /// Degenerate clouds (fewer than 3 distinct points) yield a hull that
    /// reports nothing as contained.
    #[must_use]
    pub fn from_points(points: &[Vector2<f64>]) -> Self {
        let mut sorted: Vec<Vector2<f64>> = points.to_vec();
        sorted.sort_by(|a, b| (a.x, a.y).partial_cmp(&(b.x, b.y)).expect("finite points"));
        sorted.dedup_by(|a, b| (*a - *b).norm() < 1e-12);

        if sorted.len() < 3 {
            return Self { vertices: sorted };
        }

        let cross = |o: &Vector2<f64>, a: &Vector2<f64>, b: &Vector2<f64>| {
            (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
        };

        let mut lower: Vec<Vector2<f64>> = Vec::with_capacity(sorted.len());
        for p in &sorted {
            while lower.len() >= 2
                && cross(&lower[lower.len() - 2], &lower[lower.len() - 1], p) <= 0.0
            {
                lower.pop();
            }
            lower.push(*p);
        }

        let mut upper: Vec<Vector2<f64>> = Vec::with_capacity(sorted.len());
        for p in sorted.iter().rev() {
            while upper.len() >= 2
                && cross(&upper[upper.len() - 2], &upper[upper.len() - 1], p) <= 0.0
            {
                upper.pop();
            }
            upper.push(*p);
        }

        lower.pop();
        upper.pop();
        lower.extend(upper);
        Self { vertices: lower }
    }

    /// Hull of the corners of the feet currently in contact.
    #[must_use]
    pub fn support_polygon(
        left_pose: Option<&Isometry3<f64>>,
        right_pose: Option<&Isometry3<f64>>,
        limits_x: [f64; 2],
        limits_y: [f64; 2],
    ) -> Self {
        let mut points = Vec::with_capacity(8);
        if let Some(pose) = left_pose {
            points.extend(foot_corners(pose, limits_x, limits_y));
        }
        if let Some(pose) = right_pose {
            points.extend(foot_corners(pose, limits_x, limits_y));
        }
        Self::from_points(&points)
    }

    #[must_use]
    pub fn vertices(&self) -> &[Vector2<f64>] {
        &self.vertices
    }

    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.vertices.len() < 3
    }

    /// Half-plane rows `(normal, offset)` with `normal · x ≤ offset` inside.
    #[must_use]
    pub fn half_planes(&self) -> Vec<(Vector2<f64>, f64)> {
        if self.is_degenerate() {
            return Vec::new();
        }
        let n = self.vertices.len();
        let mut planes = Vec::with_capacity(n);
        for k in 0..n {
            let a = self.vertices[k];
            let b = self.vertices[(k + 1) % n];
            let edge = b - a;
            // CCW polygon: the outward normal is the edge rotated -90 deg
            let normal = Vector2::new(edge.y, -edge.x).normalize();
            planes.push((normal, normal.dot(&a)));
        }
        planes
    }

    /// True when the point is inside (or within `tolerance` of) the hull.
    #[must_use]
    pub fn contains(&self, point: &Vector2<f64>, tolerance: f64) -> bool {
        if self.is_degenerate() {
            return false;
        }
        self.half_planes()
            .iter()
            .all(|(normal, offset)| normal.dot(point) <= offset + tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const FOOT_X: [f64; 2] = [-0.06, 0.10];
    const FOOT_Y: [f64; 2] = [-0.04, 0.04];

    #[test]
    fn foot_corners_identity_pose() {
        let corners = foot_corners(&Isometry3::identity(), FOOT_X, FOOT_Y);
        assert_relative_eq!(corners[0], Vector2::new(-0.06, -0.04), epsilon = 1e-12);
        assert_relative_eq!(corners[2], Vector2::new(0.10, 0.04), epsilon = 1e-12);
    }

    #[test]
    fn foot_corners_rotated_pose() {
        let pose = Isometry3::new(
            Vector3::new(0.5, 0.2, 0.0),
            Vector3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2),
        );
        let corners = foot_corners(&pose, FOOT_X, FOOT_Y);
        // Front-right corner (0.10, -0.04) rotates to (0.04, 0.10) + offset
        assert_relative_eq!(corners[1], Vector2::new(0.54, 0.30), epsilon = 1e-10);
    }

    #[test]
    fn hull_of_square() {
        let points = vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(1.0, 1.0),
            Vector2::new(0.0, 1.0),
            Vector2::new(0.5, 0.5), // interior point dropped
        ];
        let hull = ConvexHull::from_points(&points);
        assert_eq!(hull.vertices().len(), 4);
        assert!(hull.contains(&Vector2::new(0.5, 0.5), 0.0));
        assert!(!hull.contains(&Vector2::new(1.5, 0.5), 0.0));
    }

    #[test]
    fn contains_respects_tolerance() {
        let hull = ConvexHull::from_points(&[
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(0.0, 1.0),
        ]);
        let outside = Vector2::new(1.0005, 0.0);
        assert!(!hull.contains(&outside, 0.0));
        assert!(hull.contains(&outside, 1e-3));
    }

    #[test]
    fn degenerate_hull_contains_nothing() {
        let hull = ConvexHull::from_points(&[Vector2::new(0.0, 0.0), Vector2::new(1.0, 0.0)]);
        assert!(hull.is_degenerate());
        assert!(!hull.contains(&Vector2::new(0.5, 0.0), 1e-6));
        assert!(hull.half_planes().is_empty());
    }

    #[test]
    fn single_support_polygon_is_foot_rectangle() {
        let pose = Isometry3::translation(0.0, -0.07, 0.0);
        let hull = ConvexHull::support_polygon(None, Some(&pose), FOOT_X, FOOT_Y);
        assert_eq!(hull.vertices().len(), 4);
        assert!(hull.contains(&Vector2::new(0.0, -0.07), 0.0));
        assert!(!hull.contains(&Vector2::new(0.0, 0.07), 0.0));
    }

    #[test]
    fn double_support_polygon_spans_both_feet() {
        let left = Isometry3::translation(0.0, 0.07, 0.0);
        let right = Isometry3::translation(0.0, -0.07, 0.0);
        let hull = ConvexHull::support_polygon(Some(&left), Some(&right), FOOT_X, FOOT_Y);
        // The midpoint between the feet is inside the double-support hull
        assert!(hull.contains(&Vector2::new(0.0, 0.0), 0.0));
        assert!(hull.contains(&Vector2::new(0.09, 0.1), 1e-9));
        assert!(!hull.contains(&Vector2::new(0.2, 0.0), 0.0));
    }

    #[test]
    fn half_planes_describe_the_square() {
        let hull = ConvexHull::from_points(&[
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(1.0, 1.0),
            Vector2::new(0.0, 1.0),
        ]);
        let planes = hull.half_planes();
        assert_eq!(planes.len(), 4);
        let inside = Vector2::new(0.5, 0.5);
        for (normal, offset) in &planes {
            assert!(normal.dot(&inside) < *offset);
            assert_relative_eq!(normal.norm(), 1.0, epsilon = 1e-12);
        }
    }
}
