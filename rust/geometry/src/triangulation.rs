// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polygon triangulation utilities
//!
//! Wrapper around earcutr for 2D polygon triangulation, plus the plane
//! fitting used to bring 3D rings into 2D.

use crate::{Error, Point2, Point3, Result, Vector3};

/// Areas below this (m²) are treated as degenerate
pub const MIN_AREA: f64 = 1e-10;

/// Check if a polygon is convex (all cross products have same sign)
#[inline]
fn is_convex(points: &[Point2<f64>]) -> bool {
    if points.len() < 3 {
        return false;
    }

    let n = points.len();
    let mut sign = 0i8;

    for i in 0..n {
        let p0 = &points[i];
        let p1 = &points[(i + 1) % n];
        let p2 = &points[(i + 2) % n];

        // Cross product of edges
        let cross = (p1.x - p0.x) * (p2.y - p1.y) - (p1.y - p0.y) * (p2.x - p1.x);

        if cross.abs() > 1e-10 {
            let current_sign = if cross > 0.0 { 1i8 } else { -1i8 };
            if sign == 0 {
                sign = current_sign;
            } else if sign != current_sign {
                return false;
            }
        }
    }

    true
}

/// Simple fan triangulation for convex polygons
#[inline]
fn fan_triangulate(n: usize) -> Vec<usize> {
    let mut indices = Vec::with_capacity((n - 2) * 3);
    for i in 1..n - 1 {
        indices.push(0);
        indices.push(i);
        indices.push(i + 1);
    }
    indices
}

/// Triangulate a simple polygon (no holes)
/// Returns triangle indices into the input points
#[inline]
pub fn triangulate_polygon(points: &[Point2<f64>]) -> Result<Vec<usize>> {
    let n = points.len();

    if n < 3 {
        return Err(Error::TriangulationError(
            "Need at least 3 points to triangulate".to_string(),
        ));
    }

    // FAST PATH: Triangle - no triangulation needed
    if n == 3 {
        return Ok(vec![0, 1, 2]);
    }

    // FAST PATH: Convex polygon - use fan triangulation
    if n <= 8 && is_convex(points) {
        return Ok(fan_triangulate(n));
    }

    let mut vertices = Vec::with_capacity(n * 2);
    for p in points {
        vertices.push(p.x);
        vertices.push(p.y);
    }

    let indices = earcutr::earcut(&vertices, &[], 2)
        .map_err(|e| Error::TriangulationError(format!("{:?}", e)))?;

    Ok(indices)
}

/// Triangulate a polygon with holes
/// Returns triangle indices into the combined vertex array (outer + all holes)
#[inline]
pub fn triangulate_polygon_with_holes(
    outer: &[Point2<f64>],
    holes: &[Vec<Point2<f64>>],
) -> Result<Vec<usize>> {
    if outer.len() < 3 {
        return Err(Error::TriangulationError(
            "Need at least 3 points in outer boundary".to_string(),
        ));
    }

    if holes.iter().any(|h| h.len() < 3) {
        return Err(Error::TriangulationError(
            "Need at least 3 points in every hole".to_string(),
        ));
    }

    // FAST PATH: No holes - use optimized simple triangulation
    if holes.is_empty() {
        return triangulate_polygon(outer);
    }

    let total_points: usize = outer.len() + holes.iter().map(|h| h.len()).sum::<usize>();
    let mut vertices = Vec::with_capacity(total_points * 2);

    for p in outer {
        vertices.push(p.x);
        vertices.push(p.y);
    }

    // Add holes and track their start indices
    let mut hole_indices = Vec::with_capacity(holes.len());
    for hole in holes {
        hole_indices.push(vertices.len() / 2);
        for p in hole {
            vertices.push(p.x);
            vertices.push(p.y);
        }
    }

    let indices = earcutr::earcut(&vertices, &hole_indices, 2)
        .map_err(|e| Error::TriangulationError(format!("{:?}", e)))?;

    Ok(indices)
}

/// Orthonormal 2D frame on a plane
#[derive(Debug, Clone, Copy)]
pub struct PlaneBasis {
    pub origin: Point3<f64>,
    pub u_axis: Vector3<f64>,
    pub v_axis: Vector3<f64>,
    pub normal: Vector3<f64>,
}

impl PlaneBasis {
    /// Build a right-handed basis (u × v = normal) through `origin`
    pub fn new(origin: Point3<f64>, normal: Vector3<f64>) -> Self {
        // Find the axis least parallel to the normal for stable cross product
        let abs_x = normal.x.abs();
        let abs_y = normal.y.abs();
        let abs_z = normal.z.abs();

        let reference = if abs_x <= abs_y && abs_x <= abs_z {
            Vector3::new(1.0, 0.0, 0.0)
        } else if abs_y <= abs_z {
            Vector3::new(0.0, 1.0, 0.0)
        } else {
            Vector3::new(0.0, 0.0, 1.0)
        };

        let u_axis = reference.cross(&normal).normalize();
        let v_axis = normal.cross(&u_axis).normalize();

        Self {
            origin,
            u_axis,
            v_axis,
            normal,
        }
    }

    #[inline]
    pub fn project(&self, p: &Point3<f64>) -> Point2<f64> {
        let v = p - self.origin;
        Point2::new(v.dot(&self.u_axis), v.dot(&self.v_axis))
    }

    /// Signed distance of `p` from the plane
    #[inline]
    pub fn distance(&self, p: &Point3<f64>) -> f64 {
        (p - self.origin).dot(&self.normal)
    }
}

/// Project 3D points using an existing basis
/// This ensures multiple rings of one polygon share the same 2D space
#[inline]
pub fn project_to_2d(points_3d: &[Point3<f64>], basis: &PlaneBasis) -> Vec<Point2<f64>> {
    points_3d.iter().map(|p| basis.project(p)).collect()
}

/// Newell normal of a ring, unnormalized (length = 2 × area)
#[inline]
fn newell(points: &[Point3<f64>]) -> Vector3<f64> {
    let n = points.len();
    let mut normal = Vector3::<f64>::zeros();

    for i in 0..n {
        let current = &points[i];
        let next = &points[(i + 1) % n];

        normal.x += (current.y - next.y) * (current.z + next.z);
        normal.y += (current.z - next.z) * (current.x + next.x);
        normal.z += (current.x - next.x) * (current.y + next.y);
    }

    normal
}

/// Area of a (near-)planar 3D ring
#[inline]
pub fn polygon_area(points: &[Point3<f64>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    newell(points).norm() / 2.0
}

/// Calculate the unit normal of a ring with Newell's method
///
/// Returns `None` for rings whose area is (near) zero.
#[inline]
pub fn calculate_polygon_normal(points: &[Point3<f64>]) -> Option<Vector3<f64>> {
    if points.len() < 3 {
        return None;
    }
    let normal = newell(points);
    let len = normal.norm();
    if len / 2.0 > MIN_AREA {
        Some(normal / len)
    } else {
        None
    }
}

/// Best-fit plane of a ring: Newell normal through the vertex mean
pub fn best_fit_plane(points: &[Point3<f64>]) -> Option<PlaneBasis> {
    let normal = calculate_polygon_normal(points)?;
    let sum = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    let origin = Point3::from(sum / points.len() as f64);
    Some(PlaneBasis::new(origin, normal))
}

/// Largest distance of any point from the plane
#[inline]
pub fn planarity_deviation(points: &[Point3<f64>], basis: &PlaneBasis) -> f64 {
    points
        .iter()
        .map(|p| basis.distance(p).abs())
        .fold(0.0, f64::max)
}
