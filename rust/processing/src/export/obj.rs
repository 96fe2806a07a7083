// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wavefront OBJ + MTL writer
//!
//! One `g <id>` group per city object. Fragments keep their own `usemtl`
//! so roofs, walls and ground stay separately colored inside a group.
//! Each vertex carries its own normal, so faces use `v//vn` with equal
//! indices.

use super::ExportSummary;
use crate::palette::{material_for, MATERIALS};
use crate::scene::SceneModel;
use std::io::{self, Write};

/// Write the grouped OBJ text for `scene`
pub fn write_obj<W: Write>(
    scene: &SceneModel<'_>,
    mtl_file_name: &str,
    out: &mut W,
) -> io::Result<ExportSummary> {
    let offset = scene.offset;
    writeln!(out, "# CityGML to OBJ conversion")?;
    writeln!(out, "# Objects: {}", scene.len())?;
    writeln!(out, "# Offset: {} {} {}", offset.x, offset.y, offset.z)?;
    writeln!(out, "mtllib {mtl_file_name}")?;

    let mut summary = ExportSummary::default();
    // OBJ indices are 1-based and global to the file
    let mut next_index = 1usize;

    for object in &scene.objects {
        writeln!(out)?;
        writeln!(out, "# {} ({})", object.id(), object.element_type())?;
        writeln!(out, "g {}", object.id())?;
        summary.object_count += 1;

        for fragment in &object.geometry.fragments {
            let mesh = &fragment.mesh;
            for p in mesh.positions.chunks_exact(3) {
                writeln!(out, "v {:.6} {:.6} {:.6}", p[0], p[1], p[2])?;
            }
            for n in mesh.normals.chunks_exact(3) {
                writeln!(out, "vn {:.6} {:.6} {:.6}", n[0], n[1], n[2])?;
            }
            writeln!(out, "usemtl {}", material_for(fragment.element_type).name)?;
            for tri in mesh.indices.chunks_exact(3) {
                let a = next_index + tri[0] as usize;
                let b = next_index + tri[1] as usize;
                let c = next_index + tri[2] as usize;
                writeln!(out, "f {a}//{a} {b}//{b} {c}//{c}")?;
            }
            next_index += mesh.vertex_count();
            summary.triangle_count += mesh.triangle_count();
        }
    }

    out.flush()?;
    Ok(summary)
}

/// Write the material library shared by every OBJ export
pub fn write_mtl<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "# CityGML element type materials")?;
    for material in &MATERIALS {
        let [ar, ag, ab] = material.ambient;
        let [dr, dg, db] = material.diffuse;
        let [sr, sg, sb] = material.specular;
        writeln!(out)?;
        writeln!(out, "newmtl {}", material.name)?;
        writeln!(out, "Ka {ar} {ag} {ab}")?;
        writeln!(out, "Kd {dr} {dg} {db}")?;
        writeln!(out, "Ks {sr} {sg} {sb}")?;
        writeln!(out, "Ns {:.1}", material.shininess)?;
        writeln!(out, "d 1.0")?;
        writeln!(out, "illum 2")?;
    }
    out.flush()
}
