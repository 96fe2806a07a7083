// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CityGML-Lite Geometry Processing
//!
//! Triangulates CityGML boundary surfaces into render-ready meshes using
//! earcutr triangulation and nalgebra for plane fitting, in a local frame
//! shifted by one global offset.

pub mod builder;
pub mod error;
pub mod mesh;
pub mod offset;
pub mod triangulation;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point2, Point3, Vector3};

pub use builder::{build_geometry, build_object, GeometryOptions, GeometryOutput, GeometryStats};
pub use error::{Error, Result};
pub use mesh::{Mesh, MeshFragment, ObjectGeometry};
pub use offset::{GlobalOffset, OffsetStrategy};
pub use triangulation::{calculate_polygon_normal, triangulate_polygon, triangulate_polygon_with_holes};
