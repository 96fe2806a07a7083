// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Semantic classification of CityGML elements
//!
//! Maps raw element names to a closed set of element types. Names outside the
//! modelled set (ADE extensions, openings, other thematic modules) classify as
//! [`ElementType::Unknown`] instead of failing.

use crate::model::CityObject;
use std::collections::BTreeMap;
use std::fmt;

/// Coarse semantic type of a city object or boundary surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ElementType {
    Building,
    RoofSurface,
    WallSurface,
    GroundSurface,
    ClosureSurface,
    Unknown,
}

impl ElementType {
    /// All element types in material-table order
    pub const ALL: [ElementType; 6] = [
        ElementType::Building,
        ElementType::RoofSurface,
        ElementType::WallSurface,
        ElementType::GroundSurface,
        ElementType::ClosureSurface,
        ElementType::Unknown,
    ];

    /// Classify an element by name.
    ///
    /// Accepts both local names (`RoofSurface`) and prefixed names
    /// (`bldg:RoofSurface`); the prefix is ignored.
    pub fn from_name(name: &str) -> Self {
        let local = match name.rsplit_once(':') {
            Some((_, local)) => local,
            None => name,
        };
        match local {
            "Building" => ElementType::Building,
            "RoofSurface" => ElementType::RoofSurface,
            "WallSurface" => ElementType::WallSurface,
            "GroundSurface" => ElementType::GroundSurface,
            "ClosureSurface" => ElementType::ClosureSurface,
            _ => ElementType::Unknown,
        }
    }

    /// Canonical CityGML name
    pub fn name(&self) -> &'static str {
        match self {
            ElementType::Building => "Building",
            ElementType::RoofSurface => "RoofSurface",
            ElementType::WallSurface => "WallSurface",
            ElementType::GroundSurface => "GroundSurface",
            ElementType::ClosureSurface => "ClosureSurface",
            ElementType::Unknown => "Unknown",
        }
    }

    /// True for the thematic boundary surface types
    #[inline]
    pub fn is_boundary_surface(&self) -> bool {
        matches!(
            self,
            ElementType::RoofSurface
                | ElementType::WallSurface
                | ElementType::GroundSurface
                | ElementType::ClosureSurface
        )
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-object semantic summary, independent of geometry processing
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticSummary {
    pub object_id: String,
    pub element_type: ElementType,
    pub polygon_count: usize,
    pub surface_counts: BTreeMap<ElementType, usize>,
}

/// Summarize one object's semantics.
///
/// Reads only identifiers, type tags and counts, so it can run alongside
/// geometry building on the same records.
pub fn summarize(object: &CityObject) -> SemanticSummary {
    let mut surface_counts = BTreeMap::new();
    for surface in &object.surfaces {
        *surface_counts.entry(surface.element_type).or_insert(0) += 1;
    }

    SemanticSummary {
        object_id: object.id.clone(),
        element_type: object.element_type,
        polygon_count: object.polygon_count(),
        surface_counts,
    }
}
