// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Metadata document keyed by object id
//!
//! Objects are stored in a sorted map so two runs over the same input give
//! byte-identical output.

use super::ExportSummary;
use crate::error::ExportError;
use crate::scene::{SceneModel, SceneObject};
use citygml_lite_core::{ElementType, Envelope};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
pub struct MetadataDocument<'a> {
    pub offset: Xyz,
    pub total_objects: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub envelope: Option<EnvelopeRecord>,
    pub objects: BTreeMap<&'a str, ObjectRecord<'a>>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Xyz {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Serialize)]
pub struct EnvelopeRecord {
    pub lower: Xyz,
    pub upper: Xyz,
}

impl From<Envelope> for EnvelopeRecord {
    fn from(envelope: Envelope) -> Self {
        let xyz = |p: citygml_lite_core::Point3| Xyz { x: p.x, y: p.y, z: p.z };
        Self {
            lower: xyz(envelope.lower),
            upper: xyz(envelope.upper),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ObjectRecord<'a> {
    pub element_type: &'static str,
    pub polygon_count: usize,
    pub triangle_count: usize,
    pub surfaces: Vec<SurfaceRecord<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<AttributeRecord<'a>>,
}

#[derive(Debug, Serialize)]
pub struct SurfaceRecord<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<&'a str>,
    pub element_type: &'static str,
    pub polygon_count: usize,
}

/// Building attributes as a viewer displays them
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeRecord<'a> {
    pub name: String,
    pub description: String,
    pub measured_height: Option<f64>,
    pub storeys_above_ground: Option<i32>,
    pub storeys_below_ground: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_of_construction: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roof_type: Option<&'a str>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<&'a str, &'a str>,
    pub surface_types: BTreeMap<&'static str, usize>,
}

fn attribute_record<'a>(object: &SceneObject<'a>) -> Option<AttributeRecord<'a>> {
    let attributes = object.record.attributes.as_ref();
    if attributes.is_none() && object.element_type() != ElementType::Building {
        return None;
    }

    let id = object.id();
    let name = attributes
        .and_then(|a| a.name.clone())
        .unwrap_or_else(|| id.to_string());
    let description = attributes
        .and_then(|a| a.description.clone())
        .unwrap_or_else(|| format!("{id}, created from CityGML"));

    Some(AttributeRecord {
        name,
        description,
        measured_height: attributes.and_then(|a| a.measured_height),
        storeys_above_ground: attributes.and_then(|a| a.storeys_above_ground),
        storeys_below_ground: attributes.and_then(|a| a.storeys_below_ground),
        year_of_construction: attributes.and_then(|a| a.year_of_construction),
        function: attributes.and_then(|a| a.function.as_deref()),
        roof_type: attributes.and_then(|a| a.roof_type.as_deref()),
        attributes: attributes
            .map(|a| {
                a.generic
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect()
            })
            .unwrap_or_default(),
        surface_types: object
            .summary
            .surface_counts
            .iter()
            .map(|(t, count)| (t.name(), *count))
            .collect(),
    })
}

fn object_record<'a>(object: &SceneObject<'a>) -> ObjectRecord<'a> {
    ObjectRecord {
        element_type: object.element_type().name(),
        polygon_count: object.summary.polygon_count,
        triangle_count: object.geometry.triangle_count(),
        surfaces: object
            .record
            .surfaces
            .iter()
            .map(|s| SurfaceRecord {
                id: s.id.as_deref(),
                element_type: s.element_type.name(),
                polygon_count: s.polygons.len(),
            })
            .collect(),
        metadata: attribute_record(object),
    }
}

/// Build the metadata document for a scene
pub fn metadata_document<'a>(scene: &SceneModel<'a>) -> MetadataDocument<'a> {
    let offset = scene.offset;
    MetadataDocument {
        offset: Xyz {
            x: offset.x,
            y: offset.y,
            z: offset.z,
        },
        total_objects: scene.len(),
        envelope: scene.envelope.map(EnvelopeRecord::from),
        objects: scene
            .objects
            .iter()
            .map(|o| (o.id(), object_record(o)))
            .collect(),
    }
}

/// Encode the metadata document as pretty-printed JSON
pub fn encode_metadata(scene: &SceneModel<'_>) -> Result<(Vec<u8>, ExportSummary), ExportError> {
    let document = metadata_document(scene);
    let summary = ExportSummary {
        object_count: document.objects.len(),
        triangle_count: document.objects.values().map(|o| o.triangle_count).sum(),
    };
    let mut bytes = serde_json::to_vec_pretty(&document)?;
    bytes.push(b'\n');
    Ok((bytes, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{fixture, Fixture};
    use serde_json::Value;

    fn metadata_json() -> (Value, ExportSummary) {
        let Fixture {
            model,
            geometry,
            summaries,
        } = fixture();
        let scene = SceneModel::new(&model, &geometry, &summaries).unwrap();
        let (bytes, summary) = encode_metadata(&scene).unwrap();
        (serde_json::from_slice(&bytes).unwrap(), summary)
    }

    #[test]
    fn test_document_root() {
        let (json, summary) = metadata_json();
        assert_eq!(json["total_objects"], 2);
        assert_eq!(json["offset"]["x"], 691005.0);
        assert_eq!(json["offset"]["y"], 5336005.0);
        assert_eq!(json["offset"]["z"], 5.0);
        assert!(json.get("envelope").is_none());
        assert_eq!(summary, ExportSummary { object_count: 2, triangle_count: 4 });
    }

    #[test]
    fn test_building_record() {
        let (json, _) = metadata_json();
        let building = &json["objects"]["BLDG_0001"];
        assert_eq!(building["element_type"], "Building");
        assert_eq!(building["polygon_count"], 2);
        assert_eq!(building["triangle_count"], 4);
        assert_eq!(building["surfaces"][0]["id"], "ROOF_0001");
        assert_eq!(building["surfaces"][1]["element_type"], "WallSurface");

        let meta = &building["metadata"];
        assert_eq!(meta["name"], "BLDG_0001");
        assert_eq!(meta["description"], "Corner house");
        assert_eq!(meta["measuredHeight"], 10.0);
        assert_eq!(meta["storeysAboveGround"], 3);
        assert!(meta["storeysBelowGround"].is_null());
        assert_eq!(meta["surfaceTypes"]["RoofSurface"], 1);
        assert_eq!(meta["surfaceTypes"]["WallSurface"], 1);
        assert!(meta.get("yearOfConstruction").is_none());
    }

    #[test]
    fn test_defaults_and_zero_values() {
        let (json, _) = metadata_json();
        let meta = &json["objects"]["BLDG_0002"]["metadata"];
        assert_eq!(meta["description"], "BLDG_0002, created from CityGML");
        assert_eq!(meta["storeysBelowGround"], 0);
        assert!(meta["measuredHeight"].is_null());
        assert_eq!(json["objects"]["BLDG_0002"]["polygon_count"], 0);
    }
}
