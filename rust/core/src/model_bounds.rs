// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Model bounds calculation for large coordinate handling
//!
//! Scans parsed city objects to determine the model bounding box and point
//! centroid in f64 precision. Used for calculating the global offset before
//! geometry processing to avoid Float32 precision loss with projected
//! coordinates (UTM, Gauss-Krüger, ...).

use crate::model::{CityObject, Point3};

/// Model bounds in f64 precision
#[derive(Debug, Clone)]
pub struct ModelBounds {
    /// Minimum X coordinate found
    pub min_x: f64,
    /// Minimum Y coordinate found
    pub min_y: f64,
    /// Minimum Z coordinate found
    pub min_z: f64,
    /// Maximum X coordinate found
    pub max_x: f64,
    /// Maximum Y coordinate found
    pub max_y: f64,
    /// Maximum Z coordinate found
    pub max_z: f64,
    /// Sum of all coordinates, for the point centroid
    sum: (f64, f64, f64),
    /// Number of points sampled
    pub sample_count: usize,
}

impl ModelBounds {
    /// Create new bounds initialized to invalid state
    pub fn new() -> Self {
        Self {
            min_x: f64::MAX,
            min_y: f64::MAX,
            min_z: f64::MAX,
            max_x: f64::MIN,
            max_y: f64::MIN,
            max_z: f64::MIN,
            sum: (0.0, 0.0, 0.0),
            sample_count: 0,
        }
    }

    /// Bounds of every ring point of the given objects
    pub fn from_objects<'a>(objects: impl IntoIterator<Item = &'a CityObject>) -> Self {
        let mut bounds = Self::new();
        for object in objects {
            for p in object.points() {
                bounds.expand(p.x, p.y, p.z);
            }
        }
        bounds
    }

    /// Check if bounds are valid (at least one point added)
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.sample_count > 0
    }

    /// Expand bounds to include a point
    #[inline]
    pub fn expand(&mut self, x: f64, y: f64, z: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.min_z = self.min_z.min(z);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
        self.max_z = self.max_z.max(z);
        self.sum.0 += x;
        self.sum.1 += y;
        self.sum.2 += z;
        self.sample_count += 1;
    }

    /// Center of the bounding box
    #[inline]
    pub fn center(&self) -> Point3 {
        if !self.is_valid() {
            return Point3::default();
        }
        Point3::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
            (self.min_z + self.max_z) / 2.0,
        )
    }

    /// Mean of all sampled points
    #[inline]
    pub fn centroid(&self) -> Point3 {
        if !self.is_valid() {
            return Point3::default();
        }
        let n = self.sample_count as f64;
        Point3::new(self.sum.0 / n, self.sum.1 / n, self.sum.2 / n)
    }

    /// Lower corner of the bounding box
    #[inline]
    pub fn min_corner(&self) -> Point3 {
        if !self.is_valid() {
            return Point3::default();
        }
        Point3::new(self.min_x, self.min_y, self.min_z)
    }

    /// Check if bounds contain large coordinates (>10km from origin)
    #[inline]
    pub fn has_large_coordinates(&self) -> bool {
        const THRESHOLD: f64 = 10000.0; // 10km
        if !self.is_valid() {
            return false;
        }
        self.min_x.abs() > THRESHOLD
            || self.min_y.abs() > THRESHOLD
            || self.max_x.abs() > THRESHOLD
            || self.max_y.abs() > THRESHOLD
            || self.min_z.abs() > THRESHOLD
            || self.max_z.abs() > THRESHOLD
    }
}

impl Default for ModelBounds {
    fn default() -> Self {
        Self::new()
    }
}
