// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Global coordinate offset
//!
//! CityGML coordinates are projected and large (5,000,000m northings are
//! common). Converting them directly to f32 loses around half a metre, so
//! every point is shifted by one document-wide offset in f64 before the cast.
//! The offset is computed once from all points and passed explicitly into
//! every geometry call.

use citygml_lite_core::{CityObject, ModelBounds};
use nalgebra::Point3;
use std::fmt;
use std::str::FromStr;

/// How the global offset is derived from the model's points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetStrategy {
    /// Center of the axis-aligned bounding box
    #[default]
    BoundingBoxCenter,
    /// Mean of all ring points
    Centroid,
    /// Lower corner of the bounding box (all local coordinates non-negative)
    MinCorner,
    /// No shift, coordinates are exported as-is
    None,
}

impl OffsetStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            OffsetStrategy::BoundingBoxCenter => "bbox-center",
            OffsetStrategy::Centroid => "centroid",
            OffsetStrategy::MinCorner => "min-corner",
            OffsetStrategy::None => "none",
        }
    }
}

impl fmt::Display for OffsetStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OffsetStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bbox-center" | "bbox" | "center" => Ok(OffsetStrategy::BoundingBoxCenter),
            "centroid" => Ok(OffsetStrategy::Centroid),
            "min-corner" | "min" => Ok(OffsetStrategy::MinCorner),
            "none" => Ok(OffsetStrategy::None),
            other => Err(format!(
                "unknown offset strategy '{other}' (expected bbox-center, centroid, min-corner or none)"
            )),
        }
    }
}

/// Translation subtracted from every source coordinate
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GlobalOffset {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl GlobalOffset {
    #[inline]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Compute the offset for a whole document
    pub fn compute<'a>(
        objects: impl IntoIterator<Item = &'a CityObject>,
        strategy: OffsetStrategy,
    ) -> Self {
        if strategy == OffsetStrategy::None {
            return Self::default();
        }
        let bounds = ModelBounds::from_objects(objects);
        let origin = match strategy {
            OffsetStrategy::BoundingBoxCenter => bounds.center(),
            OffsetStrategy::Centroid => bounds.centroid(),
            OffsetStrategy::MinCorner => bounds.min_corner(),
            OffsetStrategy::None => return Self::default(),
        };
        let offset = Self::new(origin.x, origin.y, origin.z);

        tracing::debug!(
            strategy = %strategy,
            points = bounds.sample_count,
            large_coordinates = bounds.has_large_coordinates(),
            x = offset.x,
            y = offset.y,
            z = offset.z,
            "Computed global offset"
        );
        offset
    }

    /// Shift a source point into the local frame, staying in f64
    #[inline]
    pub fn apply(&self, p: &citygml_lite_core::Point3) -> Point3<f64> {
        Point3::new(p.x - self.x, p.y - self.y, p.z - self.z)
    }

    /// Recover a source coordinate from a local one
    #[inline]
    pub fn restore(&self, local: [f32; 3]) -> [f64; 3] {
        [
            local[0] as f64 + self.x,
            local[1] as f64 + self.y,
            local[2] as f64 + self.z,
        ]
    }

    /// Check if offset is zero (no shifting)
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }
}
