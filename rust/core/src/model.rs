// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed city object records
//!
//! Records are produced by the reader and are read-only afterwards. Geometry
//! stays in source coordinates; recentering happens in the geometry crate.

use crate::classify::ElementType;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

/// Point in the source coordinate reference system
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Closed ring without the repeated closing point
pub type Ring = Vec<Point3>;

/// Planar polygon: one exterior ring and zero or more holes
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Polygon {
    pub exterior: Ring,
    pub interiors: Vec<Ring>,
}

impl Polygon {
    pub fn new(exterior: Ring) -> Self {
        Self {
            exterior,
            interiors: Vec::new(),
        }
    }

    /// Rings in order: exterior first, then holes
    pub fn rings(&self) -> impl Iterator<Item = &Ring> {
        std::iter::once(&self.exterior).chain(self.interiors.iter())
    }

    /// Total number of points over all rings
    pub fn point_count(&self) -> usize {
        self.rings().map(|r| r.len()).sum()
    }
}

/// Thematic boundary surface (wall, roof, ...) of a city object
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundarySurface {
    /// Surface gml:id, if the document declares one
    pub id: Option<String>,
    pub element_type: ElementType,
    pub polygons: Vec<Polygon>,
}

impl BoundarySurface {
    pub fn new(id: Option<String>, element_type: ElementType) -> Self {
        Self {
            id,
            element_type,
            polygons: Vec::new(),
        }
    }
}

/// Declared building attributes.
///
/// Every field is optional: a missing value is `None`, never zero, because
/// zero is a legitimate height or storey count.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BuildingAttributes {
    pub name: Option<String>,
    pub description: Option<String>,
    pub measured_height: Option<f64>,
    pub storeys_above_ground: Option<i32>,
    pub storeys_below_ground: Option<i32>,
    pub year_of_construction: Option<i32>,
    pub function: Option<String>,
    pub roof_type: Option<String>,
    /// Generic attributes (`gen:*Attribute`) by name
    pub generic: BTreeMap<String, String>,
}

impl BuildingAttributes {
    /// True when no attribute was declared at all
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.measured_height.is_none()
            && self.storeys_above_ground.is_none()
            && self.storeys_below_ground.is_none()
            && self.year_of_construction.is_none()
            && self.function.is_none()
            && self.roof_type.is_none()
            && self.generic.is_empty()
    }

    /// Fill fields that are still absent from `other` (first value wins)
    pub fn merge_missing(&mut self, other: BuildingAttributes) {
        fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
            if slot.is_none() {
                *slot = value;
            }
        }
        fill(&mut self.name, other.name);
        fill(&mut self.description, other.description);
        fill(&mut self.measured_height, other.measured_height);
        fill(&mut self.storeys_above_ground, other.storeys_above_ground);
        fill(&mut self.storeys_below_ground, other.storeys_below_ground);
        fill(&mut self.year_of_construction, other.year_of_construction);
        fill(&mut self.function, other.function);
        fill(&mut self.roof_type, other.roof_type);
        for (key, value) in other.generic {
            self.generic.entry(key).or_insert(value);
        }
    }
}

/// Top-level city object (one `cityObjectMember`)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CityObject {
    /// gml:id, unique within a document
    pub id: String,
    pub element_type: ElementType,
    pub surfaces: Vec<BoundarySurface>,
    /// Present only for buildings that declare at least one attribute
    pub attributes: Option<BuildingAttributes>,
}

impl CityObject {
    pub fn new(id: String, element_type: ElementType) -> Self {
        Self {
            id,
            element_type,
            surfaces: Vec::new(),
            attributes: None,
        }
    }

    /// Number of polygons over all surfaces
    pub fn polygon_count(&self) -> usize {
        self.surfaces.iter().map(|s| s.polygons.len()).sum()
    }

    /// Iterate over every point of every ring
    pub fn points(&self) -> impl Iterator<Item = &Point3> {
        self.surfaces
            .iter()
            .flat_map(|s| s.polygons.iter())
            .flat_map(|p| p.rings())
            .flat_map(|r| r.iter())
    }

    /// Absorb a later record with the same id
    fn absorb(&mut self, other: CityObject) {
        self.surfaces.extend(other.surfaces);
        match (&mut self.attributes, other.attributes) {
            (Some(existing), Some(incoming)) => existing.merge_missing(incoming),
            (slot @ None, Some(incoming)) => *slot = Some(incoming),
            (_, None) => {}
        }
    }
}

/// Axis-aligned envelope declared by the document
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Envelope {
    pub lower: Point3,
    pub upper: Point3,
}

/// Statistics about defects the reader recovered from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReadStats {
    /// Rings dropped for having fewer than 3 distinct points or bad numbers
    pub dropped_rings: usize,
    /// Polygons dropped because their exterior ring was dropped
    pub dropped_polygons: usize,
    /// Surfaces skipped because they held no usable polygon
    pub empty_surfaces: usize,
    /// Attribute values that could not be parsed
    pub invalid_attributes: usize,
}

impl ReadStats {
    pub fn total(&self) -> usize {
        self.dropped_rings + self.empty_surfaces + self.invalid_attributes
    }
}

/// Whole parsed document, objects in document order
#[derive(Debug, Clone, Default)]
pub struct CityModel {
    pub objects: Vec<CityObject>,
    pub envelope: Option<Envelope>,
    pub stats: ReadStats,
    index: FxHashMap<String, usize>,
}

impl CityModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an object, merging it into an earlier one with the same id
    pub fn push(&mut self, object: CityObject) {
        if let Some(&idx) = self.index.get(&object.id) {
            tracing::debug!(id = %object.id, "Merging repeated city object id");
            self.objects[idx].absorb(object);
            return;
        }
        self.index.insert(object.id.clone(), self.objects.len());
        self.objects.push(object);
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CityObject> {
        self.index.get(id).map(|&idx| &self.objects[idx])
    }

    /// Total polygon count over all objects
    pub fn polygon_count(&self) -> usize {
        self.objects.iter().map(|o| o.polygon_count()).sum()
    }
}
