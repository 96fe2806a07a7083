// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Deterministic material table, one material per element type

use citygml_lite_core::ElementType;

/// Shared material definition for OBJ/MTL and glTF
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    /// Material name used in `usemtl` and glTF `materials[].name`
    pub name: &'static str,
    /// Diffuse color (Kd / baseColorFactor)
    pub diffuse: [f32; 3],
    /// Ambient color (Ka), same as diffuse
    pub ambient: [f32; 3],
    /// Specular color (Ks)
    pub specular: [f32; 3],
    /// Specular exponent (Ns)
    pub shininess: f32,
}

const fn material(name: &'static str, diffuse: [f32; 3], specular: f32, shininess: f32) -> Material {
    Material {
        name,
        diffuse,
        ambient: diffuse,
        specular: [specular; 3],
        shininess,
    }
}

/// Materials in [`ElementType::ALL`] order
pub const MATERIALS: [Material; 6] = [
    // Building - blue-gray
    material("building", [0.55, 0.6, 0.7], 0.2, 30.0),
    // Roofs - terracotta
    material("roof", [0.8, 0.3, 0.2], 0.2, 50.0),
    // Walls - light gray
    material("wall", [0.85, 0.85, 0.85], 0.3, 30.0),
    // Ground - earth brown
    material("ground", [0.5, 0.4, 0.3], 0.1, 20.0),
    // Closure - blue
    material("closure", [0.3, 0.4, 0.7], 0.2, 40.0),
    // Anything else - neutral gray
    material("default", [0.5, 0.5, 0.5], 0.2, 25.0),
];

/// Index into [`MATERIALS`] for an element type
#[inline]
pub fn material_index(element_type: ElementType) -> usize {
    match element_type {
        ElementType::Building => 0,
        ElementType::RoofSurface => 1,
        ElementType::WallSurface => 2,
        ElementType::GroundSurface => 3,
        ElementType::ClosureSurface => 4,
        ElementType::Unknown => 5,
    }
}

#[inline]
pub fn material_for(element_type: ElementType) -> &'static Material {
    &MATERIALS[material_index(element_type)]
}
