// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh data structures

use crate::offset::GlobalOffset;
use citygml_lite_core::ElementType;
use nalgebra::{Point3, Vector3};

/// Triangle mesh in the local (offset) frame
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    /// Vertex positions (x, y, z)
    pub positions: Vec<f32>,
    /// Vertex normals (nx, ny, nz)
    pub normals: Vec<f32>,
    /// Triangle indices (i0, i1, i2)
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self {
            positions: Vec::new(),
            normals: Vec::new(),
            indices: Vec::new(),
        }
    }

    /// Create a mesh with capacity
    pub fn with_capacity(vertex_count: usize, index_count: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertex_count * 3),
            normals: Vec::with_capacity(vertex_count * 3),
            indices: Vec::with_capacity(index_count),
        }
    }

    /// Add a vertex with normal
    #[inline]
    pub fn add_vertex(&mut self, position: Point3<f64>, normal: Vector3<f64>) {
        self.positions.push(position.x as f32);
        self.positions.push(position.y as f32);
        self.positions.push(position.z as f32);

        self.normals.push(normal.x as f32);
        self.normals.push(normal.y as f32);
        self.normals.push(normal.z as f32);
    }

    /// Add a source vertex, applying the global offset in f64 BEFORE f32 conversion
    ///
    /// For coordinates like 5,000,000m (UTM northing), direct f32 conversion
    /// loses ~0.5m precision. Subtracting the offset first keeps local values
    /// small, which preserves sub-millimetre precision.
    #[inline]
    pub fn add_vertex_with_shift(
        &mut self,
        position: &citygml_lite_core::Point3,
        normal: Vector3<f64>,
        offset: &GlobalOffset,
    ) {
        self.add_vertex(offset.apply(position), normal);
    }

    /// Add a triangle
    #[inline]
    pub fn add_triangle(&mut self, i0: u32, i1: u32, i2: u32) {
        self.indices.push(i0);
        self.indices.push(i1);
        self.indices.push(i2);
    }

    /// Merge another mesh into this one
    #[inline]
    pub fn merge(&mut self, other: &Mesh) {
        if other.is_empty() {
            return;
        }

        let vertex_offset = (self.positions.len() / 3) as u32;

        self.positions.reserve(other.positions.len());
        self.normals.reserve(other.normals.len());
        self.indices.reserve(other.indices.len());

        self.positions.extend_from_slice(&other.positions);
        self.normals.extend_from_slice(&other.normals);
        self.indices
            .extend(other.indices.iter().map(|&i| i + vertex_offset));
    }

    /// Get vertex count
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Get triangle count
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Check if mesh is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Calculate bounds (min, max)
    #[inline]
    pub fn bounds(&self) -> ([f32; 3], [f32; 3]) {
        if self.is_empty() {
            return ([0.0; 3], [0.0; 3]);
        }

        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];

        self.positions.chunks_exact(3).for_each(|chunk| {
            for axis in 0..3 {
                min[axis] = min[axis].min(chunk[axis]);
                max[axis] = max[axis].max(chunk[axis]);
            }
        });

        (min, max)
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}

/// Triangulated boundary surface with a back-reference to its owner
#[derive(Debug, Clone, PartialEq)]
pub struct MeshFragment {
    /// Id of the owning city object
    pub object_id: String,
    /// Surface gml:id, if declared
    pub surface_id: Option<String>,
    pub element_type: ElementType,
    /// Polygons of the surface that produced triangles
    pub polygon_count: usize,
    pub mesh: Mesh,
}

/// All fragments of one city object, in surface order
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectGeometry {
    pub object_id: String,
    pub fragments: Vec<MeshFragment>,
}

impl ObjectGeometry {
    pub fn vertex_count(&self) -> usize {
        self.fragments.iter().map(|f| f.mesh.vertex_count()).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.fragments.iter().map(|f| f.mesh.triangle_count()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.iter().all(|f| f.mesh.is_empty())
    }

    /// Merge fragments of one element type into a single mesh
    pub fn merged_by_type(&self, element_type: ElementType) -> Mesh {
        let mut merged = Mesh::new();
        for fragment in self.fragments.iter().filter(|f| f.element_type == element_type) {
            merged.merge(&fragment.mesh);
        }
        merged
    }

    /// Element types present, in material-table order
    pub fn element_types(&self) -> Vec<ElementType> {
        ElementType::ALL
            .into_iter()
            .filter(|t| self.fragments.iter().any(|f| f.element_type == *t && !f.mesh.is_empty()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_creation() {
        let mesh = Mesh::new();
        assert!(mesh.is_empty());
        assert_eq!(mesh.vertex_count(), 0);
        assert_eq!(mesh.triangle_count(), 0);
    }

    #[test]
    fn test_add_vertex() {
        let mut mesh = Mesh::new();
        mesh.add_vertex(Point3::new(1.0, 2.0, 3.0), Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(mesh.vertex_count(), 1);
        assert_eq!(mesh.positions, vec![1.0, 2.0, 3.0]);
        assert_eq!(mesh.normals, vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_merge() {
        let mut mesh1 = Mesh::new();
        mesh1.add_vertex(Point3::new(0.0, 0.0, 0.0), Vector3::z());
        mesh1.add_triangle(0, 1, 2);

        let mut mesh2 = Mesh::new();
        mesh2.add_vertex(Point3::new(1.0, 1.0, 1.0), Vector3::y());
        mesh2.add_triangle(0, 1, 2);

        mesh1.merge(&mesh2);
        assert_eq!(mesh1.vertex_count(), 2);
        assert_eq!(mesh1.triangle_count(), 2);
        assert_eq!(&mesh1.indices[3..], &[1, 2, 3]);
    }

    #[test]
    fn test_add_vertex_with_shift_preserves_precision() {
        let mut mesh = Mesh::new();

        // UTM zone 32N style coordinates
        let p1 = citygml_lite_core::Point3::new(691_012.123456, 5_336_892.654321, 432.111);
        let p2 = citygml_lite_core::Point3::new(691_012.223456, 5_336_892.754321, 432.211);
        let offset = GlobalOffset::new(691_012.0, 5_336_892.0, 432.0);

        mesh.add_vertex_with_shift(&p1, Vector3::z(), &offset);
        mesh.add_vertex_with_shift(&p2, Vector3::z(), &offset);

        approx::assert_abs_diff_eq!(mesh.positions[0], 0.123456, epsilon = 1e-4);
        approx::assert_abs_diff_eq!(mesh.positions[1], 0.654321, epsilon = 1e-4);
        approx::assert_abs_diff_eq!(mesh.positions[2], 0.111, epsilon = 1e-4);

        let dy = mesh.positions[4] - mesh.positions[1];
        approx::assert_abs_diff_eq!(dy, 0.1, epsilon = 1e-4);
    }

    #[test]
    fn test_object_geometry_grouping() {
        let mut roof = Mesh::new();
        for p in [[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [0.0, 1.0, 1.0]] {
            roof.add_vertex(Point3::from(p), Vector3::z());
        }
        roof.add_triangle(0, 1, 2);

        let fragment = |element_type, mesh: Mesh| MeshFragment {
            object_id: "b1".into(),
            surface_id: None,
            element_type,
            polygon_count: 1,
            mesh,
        };
        let geometry = ObjectGeometry {
            object_id: "b1".into(),
            fragments: vec![
                fragment(ElementType::WallSurface, roof.clone()),
                fragment(ElementType::RoofSurface, roof.clone()),
                fragment(ElementType::WallSurface, roof),
            ],
        };

        assert_eq!(geometry.triangle_count(), 3);
        assert_eq!(
            geometry.element_types(),
            vec![ElementType::RoofSurface, ElementType::WallSurface]
        );
        let walls = geometry.merged_by_type(ElementType::WallSurface);
        assert_eq!(walls.vertex_count(), 6);
        assert_eq!(walls.indices, vec![0, 1, 2, 3, 4, 5]);
    }
}
