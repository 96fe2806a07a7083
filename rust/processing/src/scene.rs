// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Canonical in-memory scene shared by all exporters
//!
//! Joins each parsed object with its semantic summary and its mesh
//! fragments. Every serializer reads this one model, so the object set and
//! triangle totals cannot drift between formats.

use crate::error::ExportError;
use citygml_lite_core::{CityModel, CityObject, ElementType, Envelope, SemanticSummary};
use citygml_lite_geometry::{GeometryOutput, GlobalOffset, ObjectGeometry};

/// One city object ready for export
#[derive(Debug, Clone, Copy)]
pub struct SceneObject<'a> {
    pub record: &'a CityObject,
    pub summary: &'a SemanticSummary,
    pub geometry: &'a ObjectGeometry,
}

impl<'a> SceneObject<'a> {
    #[inline]
    pub fn id(&self) -> &'a str {
        &self.record.id
    }

    #[inline]
    pub fn element_type(&self) -> ElementType {
        self.record.element_type
    }

    pub fn has_geometry(&self) -> bool {
        !self.geometry.is_empty()
    }
}

/// Scene in document order
#[derive(Debug, Clone)]
pub struct SceneModel<'a> {
    pub offset: GlobalOffset,
    pub envelope: Option<Envelope>,
    pub objects: Vec<SceneObject<'a>>,
}

impl<'a> SceneModel<'a> {
    /// Join parsed records, summaries and geometry (all in document order)
    pub fn new(
        model: &'a CityModel,
        geometry: &'a GeometryOutput,
        summaries: &'a [SemanticSummary],
    ) -> Result<Self, ExportError> {
        if model.objects.len() != geometry.objects.len() || model.objects.len() != summaries.len() {
            return Err(ExportError::Inconsistent(format!(
                "{} objects, {} geometries, {} summaries",
                model.objects.len(),
                geometry.objects.len(),
                summaries.len()
            )));
        }

        let mut objects = Vec::with_capacity(model.objects.len());
        for ((record, geometry), summary) in model
            .objects
            .iter()
            .zip(&geometry.objects)
            .zip(summaries)
        {
            if record.id != geometry.object_id || record.id != summary.object_id {
                return Err(ExportError::Inconsistent(format!(
                    "object order diverged at '{}'",
                    record.id
                )));
            }
            objects.push(SceneObject {
                record,
                summary,
                geometry,
            });
        }

        Ok(Self {
            offset: geometry.offset,
            envelope: model.envelope,
            objects,
        })
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.objects.iter().map(|o| o.geometry.vertex_count()).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.objects.iter().map(|o| o.geometry.triangle_count()).sum()
    }
}
