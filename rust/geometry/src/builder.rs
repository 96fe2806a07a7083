// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometry builder
//!
//! Turns parsed city objects into triangulated mesh fragments, one per
//! boundary surface. The global offset is computed once up front and then
//! threaded into every per-object call; objects are processed in parallel
//! with rayon and collected back in document order.

use crate::mesh::{Mesh, MeshFragment, ObjectGeometry};
use crate::offset::{GlobalOffset, OffsetStrategy};
use crate::triangulation::{
    best_fit_plane, planarity_deviation, polygon_area, project_to_2d,
    triangulate_polygon_with_holes, MIN_AREA,
};
use crate::{Error, Point2, Point3, Result};
use citygml_lite_core::{CityObject, Polygon};
use rayon::prelude::*;

/// Geometry building options
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryOptions {
    pub offset_strategy: OffsetStrategy,
    /// Maximum distance (source units) of a vertex from its polygon's
    /// best-fit plane before the polygon counts as non-planar
    pub planarity_tolerance: f64,
    /// Fail objects that had polygons but produced no triangles
    pub strict: bool,
}

impl Default for GeometryOptions {
    fn default() -> Self {
        Self {
            offset_strategy: OffsetStrategy::default(),
            planarity_tolerance: 0.05,
            strict: false,
        }
    }
}

/// Counters for locally recovered geometry defects
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeometryStats {
    /// Polygons triangulated through a best-fit plane despite exceeding the tolerance
    pub non_planar_polygons: usize,
    /// Polygons dropped for (near) zero area
    pub degenerate_polygons: usize,
    /// Polygons the triangulator rejected
    pub failed_polygons: usize,
    /// Objects whose polygons all failed to produce triangles
    pub empty_objects: usize,
}

impl GeometryStats {
    pub fn total(&self) -> usize {
        self.non_planar_polygons + self.degenerate_polygons + self.failed_polygons
    }

    fn add(mut self, other: GeometryStats) -> Self {
        self.non_planar_polygons += other.non_planar_polygons;
        self.degenerate_polygons += other.degenerate_polygons;
        self.failed_polygons += other.failed_polygons;
        self.empty_objects += other.empty_objects;
        self
    }
}

/// Result of building geometry for a whole document
#[derive(Debug, Clone)]
pub struct GeometryOutput {
    pub offset: GlobalOffset,
    /// One entry per input object, in input order
    pub objects: Vec<ObjectGeometry>,
    pub stats: GeometryStats,
}

impl GeometryOutput {
    pub fn vertex_count(&self) -> usize {
        self.objects.iter().map(|o| o.vertex_count()).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.objects.iter().map(|o| o.triangle_count()).sum()
    }
}

/// Build geometry for every object.
///
/// `cancelled` is polled once per object; when it returns `true` the build
/// stops with [`Error::Cancelled`].
pub fn build_geometry<F>(
    objects: &[CityObject],
    options: &GeometryOptions,
    cancelled: F,
) -> Result<GeometryOutput>
where
    F: Fn() -> bool + Sync,
{
    // Barrier: the offset is final before any triangulation starts
    let offset = GlobalOffset::compute(objects, options.offset_strategy);

    let built: Vec<(ObjectGeometry, GeometryStats)> = objects
        .par_iter()
        .map(|object| {
            if cancelled() {
                return Err(Error::Cancelled);
            }
            build_object(object, &offset, options)
        })
        .collect::<Result<_>>()?;

    let mut stats = GeometryStats::default();
    let mut geometries = Vec::with_capacity(built.len());
    for (geometry, object_stats) in built {
        stats = stats.add(object_stats);
        geometries.push(geometry);
    }

    let output = GeometryOutput {
        offset,
        objects: geometries,
        stats,
    };

    if stats.total() > 0 {
        tracing::warn!(
            non_planar = stats.non_planar_polygons,
            degenerate = stats.degenerate_polygons,
            failed = stats.failed_polygons,
            "Recovered from geometry defects"
        );
    }
    tracing::info!(
        objects = output.objects.len(),
        vertices = output.vertex_count(),
        triangles = output.triangle_count(),
        "Geometry built"
    );
    Ok(output)
}

/// Triangulate every surface of one object in the offset frame
pub fn build_object(
    object: &CityObject,
    offset: &GlobalOffset,
    options: &GeometryOptions,
) -> Result<(ObjectGeometry, GeometryStats)> {
    let mut stats = GeometryStats::default();
    let mut fragments = Vec::with_capacity(object.surfaces.len());

    for surface in &object.surfaces {
        let mut mesh = Mesh::with_capacity(
            surface.polygons.iter().map(Polygon::point_count).sum(),
            surface.polygons.len() * 6,
        );
        let mut polygon_count = 0;
        for polygon in &surface.polygons {
            if triangulate_into(&mut mesh, polygon, offset, options, &object.id, &mut stats) {
                polygon_count += 1;
            }
        }
        if mesh.is_empty() {
            continue;
        }
        fragments.push(MeshFragment {
            object_id: object.id.clone(),
            surface_id: surface.id.clone(),
            element_type: surface.element_type,
            polygon_count,
            mesh,
        });
    }

    let polygons = object.polygon_count();
    if fragments.is_empty() && polygons > 0 {
        if options.strict {
            return Err(Error::NoValidFragments {
                object_id: object.id.clone(),
                polygons,
            });
        }
        stats.empty_objects += 1;
        tracing::warn!(object = %object.id, polygons, "No polygon of this object produced triangles");
    }

    let geometry = ObjectGeometry {
        object_id: object.id.clone(),
        fragments,
    };
    tracing::debug!(
        object = %object.id,
        fragments = geometry.fragments.len(),
        triangles = geometry.triangle_count(),
        "Built object geometry"
    );
    Ok((geometry, stats))
}

/// Triangulate one polygon and append it to `mesh`.
///
/// Returns `false` when the polygon was dropped.
fn triangulate_into(
    mesh: &mut Mesh,
    polygon: &Polygon,
    offset: &GlobalOffset,
    options: &GeometryOptions,
    object_id: &str,
    stats: &mut GeometryStats,
) -> bool {
    let exterior: Vec<Point3<f64>> = polygon.exterior.iter().map(|p| offset.apply(p)).collect();

    let basis = match best_fit_plane(&exterior) {
        Some(basis) => basis,
        None => {
            stats.degenerate_polygons += 1;
            tracing::warn!(object = object_id, points = exterior.len(), "Dropping zero-area polygon");
            return false;
        }
    };

    // Holes that collapse to nothing are ignored rather than failing the polygon
    let mut kept_holes = Vec::with_capacity(polygon.interiors.len());
    let mut holes_local = Vec::with_capacity(polygon.interiors.len());
    for hole in &polygon.interiors {
        let local: Vec<Point3<f64>> = hole.iter().map(|p| offset.apply(p)).collect();
        if polygon_area(&local) > MIN_AREA {
            kept_holes.push(hole);
            holes_local.push(local);
        }
    }

    let deviation = std::iter::once(&exterior)
        .chain(holes_local.iter())
        .map(|ring| planarity_deviation(ring, &basis))
        .fold(0.0, f64::max);
    if deviation > options.planarity_tolerance {
        stats.non_planar_polygons += 1;
        tracing::warn!(
            object = object_id,
            deviation,
            tolerance = options.planarity_tolerance,
            "Non-planar polygon, triangulating in best-fit plane"
        );
    }

    let outer_2d = project_to_2d(&exterior, &basis);
    let holes_2d: Vec<Vec<Point2<f64>>> = holes_local
        .iter()
        .map(|ring| project_to_2d(ring, &basis))
        .collect();

    let indices = match triangulate_polygon_with_holes(&outer_2d, &holes_2d) {
        Ok(indices) if !indices.is_empty() => indices,
        Ok(_) => {
            stats.degenerate_polygons += 1;
            tracing::warn!(object = object_id, "Polygon produced no triangles");
            return false;
        }
        Err(e) => {
            stats.failed_polygons += 1;
            tracing::warn!(object = object_id, error = %e, "Dropping polygon the triangulator rejected");
            return false;
        }
    };

    let points_2d: Vec<&Point2<f64>> = outer_2d.iter().chain(holes_2d.iter().flatten()).collect();
    let base = mesh.vertex_count() as u32;
    let normal = basis.normal;
    for p in polygon
        .exterior
        .iter()
        .chain(kept_holes.iter().flat_map(|ring| ring.iter()))
    {
        mesh.add_vertex_with_shift(p, normal, offset);
    }

    // Wind every triangle counter-clockwise around the polygon normal
    for tri in indices.chunks_exact(3) {
        let (a, b, c) = (points_2d[tri[0]], points_2d[tri[1]], points_2d[tri[2]]);
        let cross = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
        let (i0, i1, i2) = (tri[0] as u32, tri[1] as u32, tri[2] as u32);
        if cross < 0.0 {
            mesh.add_triangle(base + i0, base + i2, base + i1);
        } else {
            mesh.add_triangle(base + i0, base + i1, base + i2);
        }
    }
    true
}
