// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! glTF 2.0 binary (GLB) writer
//!
//! Layout: 12-byte header, JSON chunk padded with spaces, BIN chunk padded
//! with zeros, all little-endian. Every city object becomes a root node
//! whose name is exactly the object id. Objects with geometry get a mesh of
//! the same name with one primitive per element type, so each primitive
//! can use its element type's material.

use super::ExportSummary;
use crate::error::ExportError;
use crate::palette::{material_index, MATERIALS};
use crate::scene::SceneModel;
use citygml_lite_geometry::Mesh;
use serde::Serialize;
use std::collections::BTreeMap;

const GLB_MAGIC: u32 = 0x4654_6C67; // "glTF"
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A; // "JSON"
const CHUNK_BIN: u32 = 0x004E_4942; // "BIN\0"

const COMPONENT_FLOAT: u32 = 5126;
const COMPONENT_UNSIGNED_INT: u32 = 5125;
const TARGET_ARRAY_BUFFER: u32 = 34962;
const TARGET_ELEMENT_ARRAY_BUFFER: u32 = 34963;
const MODE_TRIANGLES: u32 = 4;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Gltf<'a> {
    asset: Asset,
    scene: usize,
    scenes: Vec<SceneDef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    nodes: Vec<Node<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    meshes: Vec<MeshDef<'a>>,
    materials: Vec<MaterialDef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    accessors: Vec<Accessor>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    buffer_views: Vec<BufferView>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    buffers: Vec<Buffer>,
}

#[derive(Serialize)]
struct Asset {
    version: &'static str,
    generator: &'static str,
}

#[derive(Serialize)]
struct SceneDef {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    nodes: Vec<usize>,
}

#[derive(Serialize)]
struct Node<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    mesh: Option<usize>,
}

#[derive(Serialize)]
struct MeshDef<'a> {
    name: &'a str,
    primitives: Vec<Primitive>,
}

#[derive(Serialize)]
struct Primitive {
    attributes: BTreeMap<&'static str, usize>,
    indices: usize,
    material: usize,
    mode: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MaterialDef {
    name: &'static str,
    pbr_metallic_roughness: Pbr,
    double_sided: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Pbr {
    base_color_factor: [f32; 4],
    metallic_factor: f32,
    roughness_factor: f32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Accessor {
    buffer_view: usize,
    component_type: u32,
    count: usize,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    min: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max: Option<[f32; 3]>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BufferView {
    buffer: usize,
    byte_offset: usize,
    byte_length: usize,
    target: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Buffer {
    byte_length: usize,
}

/// Accumulates the BIN chunk and the views/accessors pointing into it
#[derive(Default)]
struct BinaryBuilder {
    bin: Vec<u8>,
    buffer_views: Vec<BufferView>,
    accessors: Vec<Accessor>,
}

impl BinaryBuilder {
    fn push_view(&mut self, bytes: impl Iterator<Item = [u8; 4]>, target: u32) -> usize {
        let byte_offset = self.bin.len();
        for chunk in bytes {
            self.bin.extend_from_slice(&chunk);
        }
        self.buffer_views.push(BufferView {
            buffer: 0,
            byte_offset,
            byte_length: self.bin.len() - byte_offset,
            target,
        });
        self.buffer_views.len() - 1
    }

    fn push_vec3(&mut self, values: &[f32], bounds: Option<([f32; 3], [f32; 3])>) -> usize {
        let view = self.push_view(values.iter().map(|v| v.to_le_bytes()), TARGET_ARRAY_BUFFER);
        self.accessors.push(Accessor {
            buffer_view: view,
            component_type: COMPONENT_FLOAT,
            count: values.len() / 3,
            kind: "VEC3",
            min: bounds.map(|b| b.0),
            max: bounds.map(|b| b.1),
        });
        self.accessors.len() - 1
    }

    fn push_indices(&mut self, indices: &[u32]) -> usize {
        let view = self.push_view(
            indices.iter().map(|i| i.to_le_bytes()),
            TARGET_ELEMENT_ARRAY_BUFFER,
        );
        self.accessors.push(Accessor {
            buffer_view: view,
            component_type: COMPONENT_UNSIGNED_INT,
            count: indices.len(),
            kind: "SCALAR",
            min: None,
            max: None,
        });
        self.accessors.len() - 1
    }

    /// Add one primitive; POSITION carries the min/max the format requires
    fn push_primitive(&mut self, mesh: &Mesh, material: usize) -> Primitive {
        let position = self.push_vec3(&mesh.positions, Some(mesh.bounds()));
        let normal = self.push_vec3(&mesh.normals, None);
        let indices = self.push_indices(&mesh.indices);
        Primitive {
            attributes: BTreeMap::from([("NORMAL", normal), ("POSITION", position)]),
            indices,
            material,
            mode: MODE_TRIANGLES,
        }
    }
}

fn materials() -> Vec<MaterialDef> {
    MATERIALS
        .iter()
        .map(|m| MaterialDef {
            name: m.name,
            pbr_metallic_roughness: Pbr {
                base_color_factor: [m.diffuse[0], m.diffuse[1], m.diffuse[2], 1.0],
                metallic_factor: 0.0,
                roughness_factor: 0.9,
            },
            // Surface orientation in CityGML data is not reliable
            double_sided: true,
        })
        .collect()
}

/// Encode the scene as a GLB file
pub fn encode_glb(scene: &SceneModel<'_>) -> Result<(Vec<u8>, ExportSummary), ExportError> {
    let mut binary = BinaryBuilder::default();
    let mut nodes = Vec::with_capacity(scene.len());
    let mut meshes = Vec::new();
    let mut summary = ExportSummary::default();

    for object in &scene.objects {
        let mut mesh_index = None;
        if object.has_geometry() {
            let mut primitives = Vec::new();
            for element_type in object.geometry.element_types() {
                let merged = object.geometry.merged_by_type(element_type);
                summary.triangle_count += merged.triangle_count();
                primitives.push(binary.push_primitive(&merged, material_index(element_type)));
            }
            meshes.push(MeshDef {
                name: object.id(),
                primitives,
            });
            mesh_index = Some(meshes.len() - 1);
        }
        nodes.push(Node {
            name: object.id(),
            mesh: mesh_index,
        });
        summary.object_count += 1;
    }

    let BinaryBuilder {
        bin,
        buffer_views,
        accessors,
    } = binary;

    let buffers = if bin.is_empty() {
        Vec::new()
    } else {
        vec![Buffer {
            byte_length: bin.len(),
        }]
    };

    let gltf = Gltf {
        asset: Asset {
            version: "2.0",
            generator: concat!("citygml-lite ", env!("CARGO_PKG_VERSION")),
        },
        scene: 0,
        scenes: vec![SceneDef {
            nodes: (0..nodes.len()).collect(),
        }],
        nodes,
        meshes,
        materials: materials(),
        accessors,
        buffer_views,
        buffers,
    };

    let json = serde_json::to_vec(&gltf)?;
    let glb = assemble_glb(json, bin)?;
    Ok((glb, summary))
}

#[inline]
fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

/// Wrap JSON and BIN payloads into a GLB container
fn assemble_glb(mut json: Vec<u8>, mut bin: Vec<u8>) -> Result<Vec<u8>, ExportError> {
    json.resize(padded_len(json.len()), b' ');
    bin.resize(padded_len(bin.len()), 0);

    let bin_chunk_len = if bin.is_empty() { 0 } else { 8 + bin.len() };
    let total = 12 + 8 + json.len() + bin_chunk_len;
    let total_u32 = u32::try_from(total)
        .map_err(|_| ExportError::TooLarge(format!("{total} bytes exceeds the 4 GiB GLB limit")))?;

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    out.extend_from_slice(&GLB_VERSION.to_le_bytes());
    out.extend_from_slice(&total_u32.to_le_bytes());

    // Lengths below fit: both are smaller than total
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(&json);

    if !bin.is_empty() {
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
        out.extend_from_slice(&bin);
    }

    Ok(out)
}
