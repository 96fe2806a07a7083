// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dual exporter: OBJ/MTL text mesh, GLB binary scene and JSON metadata
//!
//! Serializers are pure functions from a [`SceneModel`] to bytes. Each one
//! reports what it wrote as an [`ExportSummary`], and [`export_scene`]
//! refuses to hand out artifacts whose summaries disagree.

pub mod glb;
pub mod metadata;
pub mod obj;
pub mod writer;

use crate::error::ExportError;
use crate::scene::SceneModel;

pub use writer::StagedArtifacts;

/// Which mesh formats to produce; metadata is always written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Formats {
    pub obj: bool,
    pub glb: bool,
}

impl Formats {
    pub const ALL: Formats = Formats { obj: true, glb: true };
    pub const OBJ: Formats = Formats { obj: true, glb: false };
    pub const GLB: Formats = Formats { obj: false, glb: true };
}

impl Default for Formats {
    fn default() -> Self {
        Formats::ALL
    }
}

/// File names derived from one output stem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNames {
    pub obj: String,
    pub mtl: String,
    pub glb: String,
    pub metadata: String,
}

impl ArtifactNames {
    pub fn new(stem: &str) -> Self {
        Self {
            obj: format!("{stem}.obj"),
            mtl: format!("{stem}.mtl"),
            glb: format!("{stem}.glb"),
            metadata: format!("{stem}_metadata.json"),
        }
    }
}

/// What a serializer wrote, used as a cross-format checksum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExportSummary {
    pub object_count: usize,
    pub triangle_count: usize,
}

impl ExportSummary {
    pub fn of(scene: &SceneModel<'_>) -> Self {
        Self {
            object_count: scene.len(),
            triangle_count: scene.triangle_count(),
        }
    }
}

/// Serialized artifacts held in memory
#[derive(Debug, Clone, Default)]
pub struct ExportedArtifacts {
    pub obj: Option<Vec<u8>>,
    pub mtl: Option<Vec<u8>>,
    pub glb: Option<Vec<u8>>,
    pub metadata: Vec<u8>,
    pub summary: ExportSummary,
}

fn check(expected: ExportSummary, actual: ExportSummary, format: &str) -> Result<(), ExportError> {
    if expected != actual {
        return Err(ExportError::Inconsistent(format!(
            "{format} wrote {} objects / {} triangles, scene has {} / {}",
            actual.object_count,
            actual.triangle_count,
            expected.object_count,
            expected.triangle_count
        )));
    }
    Ok(())
}

/// Serialize the scene into every requested format
pub fn export_scene(
    scene: &SceneModel<'_>,
    formats: Formats,
    names: &ArtifactNames,
) -> Result<ExportedArtifacts, ExportError> {
    let expected = ExportSummary::of(scene);

    let (metadata, summary) = metadata::encode_metadata(scene)?;
    check(expected, summary, "metadata")?;

    let mut artifacts = ExportedArtifacts {
        metadata,
        summary: expected,
        ..Default::default()
    };

    if formats.obj {
        let mut obj_bytes = Vec::new();
        let summary = obj::write_obj(scene, &names.mtl, &mut obj_bytes)
            .map_err(|e| ExportError::io(&names.obj, e))?;
        check(expected, summary, "OBJ")?;

        let mut mtl_bytes = Vec::new();
        obj::write_mtl(&mut mtl_bytes).map_err(|e| ExportError::io(&names.mtl, e))?;

        artifacts.obj = Some(obj_bytes);
        artifacts.mtl = Some(mtl_bytes);
    }

    if formats.glb {
        let (glb_bytes, summary) = glb::encode_glb(scene)?;
        check(expected, summary, "GLB")?;
        artifacts.glb = Some(glb_bytes);
    }

    tracing::debug!(
        objects = expected.object_count,
        triangles = expected.triangle_count,
        obj = formats.obj,
        glb = formats.glb,
        "Scene exported"
    );
    Ok(artifacts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{fixture, Fixture};

    #[test]
    fn test_artifact_names() {
        let names = ArtifactNames::new("city");
        assert_eq!(names.obj, "city.obj");
        assert_eq!(names.mtl, "city.mtl");
        assert_eq!(names.glb, "city.glb");
        assert_eq!(names.metadata, "city_metadata.json");
    }

    #[test]
    fn test_export_formats() {
        let Fixture {
            model,
            geometry,
            summaries,
        } = fixture();
        let scene = SceneModel::new(&model, &geometry, &summaries).unwrap();
        let names = ArtifactNames::new("out");

        let all = export_scene(&scene, Formats::ALL, &names).unwrap();
        assert!(all.obj.is_some() && all.mtl.is_some() && all.glb.is_some());
        assert_eq!(all.summary, ExportSummary { object_count: 2, triangle_count: 4 });

        let glb_only = export_scene(&scene, Formats::GLB, &names).unwrap();
        assert!(glb_only.obj.is_none() && glb_only.mtl.is_none());
        assert!(glb_only.glb.is_some());
        assert_eq!(glb_only.metadata, all.metadata);
    }

    #[test]
    fn test_check_reports_mismatch() {
        let a = ExportSummary { object_count: 2, triangle_count: 4 };
        let b = ExportSummary { object_count: 2, triangle_count: 3 };
        assert!(check(a, a, "OBJ").is_ok());
        assert!(matches!(check(a, b, "OBJ"), Err(ExportError::Inconsistent(_))));
    }
}
