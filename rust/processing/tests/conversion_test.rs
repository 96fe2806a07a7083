// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end conversion tests over inline CityGML documents.

use approx::assert_abs_diff_eq;
use citygml_lite_core::ElementType;
use citygml_lite_processing::{
    convert, Artifacts, ConversionMode, ConversionResult, ConvertOptions, ExportedArtifacts,
    Formats, OutputTargets, Source, Stage, StageError,
};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;

const ROOF: &str = "458000 5438000 12 458010 5438000 12 458010 5438008 12 458000 5438008 12 458000 5438000 12";
const WALL: &str = "458000 5438000 0 458010 5438000 0 458010 5438000 12 458000 5438000 12 458000 5438000 0";
const GROUND: &str = "458000 5438000 0 458000 5438008 0 458010 5438008 0 458010 5438000 0 458000 5438000 0";

fn polygon(pos_list: &str) -> String {
    format!(
        "<gml:surfaceMember><gml:Polygon><gml:exterior><gml:LinearRing>\
         <gml:posList srsDimension=\"3\">{pos_list}</gml:posList>\
         </gml:LinearRing></gml:exterior></gml:Polygon></gml:surfaceMember>"
    )
}

fn surface(element: &str, id: &str, pos_list: &str) -> String {
    format!(
        "<bldg:boundedBy><bldg:{element} gml:id=\"{id}\"><bldg:lod2MultiSurface><gml:MultiSurface>\
         {}</gml:MultiSurface></bldg:lod2MultiSurface></bldg:{element}></bldg:boundedBy>",
        polygon(pos_list)
    )
}

fn building(id: &str, body: &str) -> String {
    format!("<core:cityObjectMember><bldg:Building gml:id=\"{id}\">{body}</bldg:Building></core:cityObjectMember>")
}

fn document(members: &[String]) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <core:CityModel xmlns:core=\"http://www.opengis.net/citygml/2.0\" \
         xmlns:bldg=\"http://www.opengis.net/citygml/building/2.0\" \
         xmlns:gen=\"http://www.opengis.net/citygml/generics/2.0\" \
         xmlns:gml=\"http://www.opengis.net/gml\">{}</core:CityModel>",
        members.concat()
    )
}

fn roof_and_wall() -> String {
    document(&[building(
        "BLDG_A",
        &format!(
            "<bldg:measuredHeight uom=\"m\">12.0</bldg:measuredHeight>{}{}",
            surface("RoofSurface", "ROOF_A", ROOF),
            surface("WallSurface", "WALL_A", WALL)
        ),
    )])
}

fn district() -> String {
    document(&[
        building(
            "BLDG_1",
            &format!(
                "{}{}{}",
                surface("RoofSurface", "ROOF_1", ROOF),
                surface("WallSurface", "WALL_1", WALL),
                surface("GroundSurface", "GROUND_1", GROUND)
            ),
        ),
        building("BLDG_2", "<bldg:storeysAboveGround>2</bldg:storeysAboveGround>"),
        building("BLDG_3", &surface("ClosureSurface", "CLOSURE_3", WALL)),
    ])
}

fn convert_in_memory(gml: &str, options: &ConvertOptions) -> (ConversionResult, ExportedArtifacts) {
    let result = convert(Source::Bytes(gml.as_bytes()), &OutputTargets::memory(), options).unwrap();
    let artifacts = match &result.artifacts {
        Artifacts::Memory(artifacts) => artifacts.clone(),
        other => panic!("expected in-memory artifacts, got {other:?}"),
    };
    (result, artifacts)
}

fn metadata(artifacts: &ExportedArtifacts) -> Value {
    serde_json::from_slice(&artifacts.metadata).unwrap()
}

fn glb_json(glb: &[u8]) -> Value {
    let len = u32::from_le_bytes(glb[12..16].try_into().unwrap()) as usize;
    serde_json::from_slice(&glb[20..20 + len]).unwrap()
}

fn obj_groups(obj: &[u8]) -> Vec<String> {
    std::str::from_utf8(obj)
        .unwrap()
        .lines()
        .filter_map(|l| l.strip_prefix("g "))
        .map(str::to_string)
        .collect()
}

fn dir_entries(dir: &Path) -> BTreeSet<String> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => BTreeSet::new(),
    }
}

#[test]
fn test_roof_and_wall_building() {
    let (result, artifacts) = convert_in_memory(&roof_and_wall(), &ConvertOptions::default());

    assert_eq!(result.total_objects, 1);
    assert_eq!(result.total_polygons, 2);
    // Two triangles per convex quad
    assert_eq!(result.total_triangles, 4);
    assert_eq!(result.warnings.total(), 0);

    let meta = metadata(&artifacts);
    let object = &meta["objects"]["BLDG_A"];
    assert_eq!(object["element_type"], "Building");
    assert_eq!(object["polygon_count"], 2);
    assert_eq!(object["surfaces"][0]["id"], "ROOF_A");
    assert_eq!(object["surfaces"][0]["polygon_count"], 1);
    assert_eq!(object["metadata"]["measuredHeight"], 12.0);
    assert_eq!(object["metadata"]["surfaceTypes"]["RoofSurface"], 1);
    assert_eq!(object["metadata"]["surfaceTypes"]["WallSurface"], 1);
}

#[test]
fn test_empty_city_model() {
    let (result, artifacts) = convert_in_memory(&document(&[]), &ConvertOptions::default());
    assert_eq!(result.total_objects, 0);
    assert_eq!(result.total_triangles, 0);
    assert_eq!(metadata(&artifacts)["total_objects"], 0);

    let glb = artifacts.glb.as_deref().unwrap();
    let gltf = glb_json(glb);
    assert!(gltf.get("nodes").is_none());
    assert!(gltf["scenes"][0].as_object().unwrap().is_empty());
    assert!(!String::from_utf8_lossy(glb).contains("\"nodes\":[]"));

    assert!(obj_groups(artifacts.obj.as_deref().unwrap()).is_empty());
}

#[test]
fn test_unknown_surface_is_not_a_warning() {
    let gml = document(&[building(
        "BLDG_X",
        &format!(
            "{}{}",
            surface("OuterCeilingSurface", "CEIL_X", ROOF),
            surface("WallSurface", "WALL_X", WALL)
        ),
    )]);
    let (result, artifacts) = convert_in_memory(&gml, &ConvertOptions::default());

    assert_eq!(result.warnings.total(), 0);
    assert_eq!(result.surface_counts[&ElementType::Unknown], 1);
    assert_eq!(result.total_triangles, 4);

    let meta = metadata(&artifacts);
    assert_eq!(meta["objects"]["BLDG_X"]["surfaces"][0]["element_type"], "Unknown");

    let obj = String::from_utf8(artifacts.obj.unwrap()).unwrap();
    assert!(obj.contains("usemtl default\n"));
}

#[test]
fn test_truncated_document_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let gml = roof_and_wall();
    let truncated = &gml[..gml.len() / 2];

    let err = convert(
        Source::Bytes(truncated.as_bytes()),
        &OutputTargets::directory(&out, "city"),
        &ConvertOptions::default(),
    )
    .unwrap_err();

    assert_eq!(err.stage, Stage::Read);
    assert!(matches!(err.source, StageError::Parse(_)));
    assert!(dir_entries(&out).is_empty());
}

#[test]
fn test_directory_targets() {
    let dir = tempfile::tempdir().unwrap();
    let result = convert(
        Source::Bytes(district().as_bytes()),
        &OutputTargets::directory(dir.path(), "district"),
        &ConvertOptions::default(),
    )
    .unwrap();

    let expected: BTreeSet<String> = [
        "district.obj",
        "district.mtl",
        "district.glb",
        "district_metadata.json",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    assert_eq!(dir_entries(dir.path()), expected);

    let Artifacts::Files { obj, glb, metadata, .. } = result.artifacts else {
        panic!("expected file artifacts");
    };
    assert_eq!(obj, Some(dir.path().join("district.obj")));
    assert_eq!(glb, Some(dir.path().join("district.glb")));
    assert_eq!(metadata, dir.path().join("district_metadata.json"));

    let obj_text = std::fs::read_to_string(dir.path().join("district.obj")).unwrap();
    assert!(obj_text.contains("mtllib district.mtl\n"));
}

#[test]
fn test_glb_only_formats() {
    let dir = tempfile::tempdir().unwrap();
    let targets = OutputTargets::Directory {
        dir: dir.path().to_path_buf(),
        stem: "city".into(),
        formats: Formats::GLB,
    };
    convert(Source::Bytes(roof_and_wall().as_bytes()), &targets, &ConvertOptions::default()).unwrap();

    let expected: BTreeSet<String> = ["city.glb", "city_metadata.json"]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(dir_entries(dir.path()), expected);
}

#[test]
fn test_ids_match_across_artifacts() {
    let (result, artifacts) = convert_in_memory(&district(), &ConvertOptions::default());
    assert_eq!(result.total_objects, 3);

    let meta = metadata(&artifacts);
    let metadata_ids: BTreeSet<String> = meta["objects"].as_object().unwrap().keys().cloned().collect();

    let obj_ids: BTreeSet<String> = obj_groups(artifacts.obj.as_ref().unwrap()).into_iter().collect();

    let gltf = glb_json(artifacts.glb.as_ref().unwrap());
    let node_ids: BTreeSet<String> = gltf["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["name"].as_str().unwrap().to_string())
        .collect();

    assert_eq!(metadata_ids, obj_ids);
    assert_eq!(metadata_ids, node_ids);
    assert_eq!(meta["total_objects"], 3);

    // Node without geometry keeps its name but has no mesh
    let bare = gltf["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .find(|n| n["name"] == "BLDG_2")
        .unwrap();
    assert!(bare.get("mesh").is_none());
}

#[test]
fn test_repeated_runs_are_identical() {
    let options = ConvertOptions::default();
    let (first, a) = convert_in_memory(&district(), &options);
    let (second, b) = convert_in_memory(&district(), &options);

    assert_eq!(a.metadata, b.metadata);
    assert_eq!(a.obj, b.obj);
    assert_eq!(a.glb, b.glb);
    assert_eq!(first.total_triangles, second.total_triangles);
}

#[test]
fn test_offset_restores_source_coordinates() {
    let (result, artifacts) = convert_in_memory(&roof_and_wall(), &ConvertOptions::default());
    let offset = result.offset.unwrap();

    let meta = metadata(&artifacts);
    assert_eq!(meta["offset"]["x"], offset.x);
    assert_eq!(meta["offset"]["y"], offset.y);
    assert_eq!(meta["offset"]["z"], offset.z);

    let source: Vec<[f64; 3]> = ROOF
        .split_whitespace()
        .chain(WALL.split_whitespace())
        .map(|t| t.parse::<f64>().unwrap())
        .collect::<Vec<_>>()
        .chunks_exact(3)
        .map(|c| [c[0], c[1], c[2]])
        .collect();

    let obj = String::from_utf8(artifacts.obj.unwrap()).unwrap();
    let mut checked = 0;
    for line in obj.lines().filter(|l| l.starts_with("v ")) {
        let local: Vec<f64> = line[2..].split(' ').map(|t| t.parse().unwrap()).collect();
        let restored = [local[0] + offset.x, local[1] + offset.y, local[2] + offset.z];
        let nearest = source
            .iter()
            .min_by(|a, b| distance(a, &restored).total_cmp(&distance(b, &restored)))
            .unwrap();
        assert_abs_diff_eq!(restored[0], nearest[0], epsilon = 1e-3);
        assert_abs_diff_eq!(restored[1], nearest[1], epsilon = 1e-3);
        assert_abs_diff_eq!(restored[2], nearest[2], epsilon = 1e-3);
        checked += 1;
    }
    assert_eq!(checked, 8);
}

fn distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt()
}

#[test]
fn test_short_ring_keeps_object() {
    let gml = document(&[building(
        "BLDG_SHORT",
        &surface("RoofSurface", "ROOF_SHORT", "0 0 0 1 0 0 0 0 0"),
    )]);
    let (result, artifacts) = convert_in_memory(&gml, &ConvertOptions::default());

    assert_eq!(result.total_objects, 1);
    assert_eq!(result.total_triangles, 0);
    assert_eq!(result.warnings.read.dropped_rings, 1);

    let meta = metadata(&artifacts);
    assert_eq!(meta["objects"]["BLDG_SHORT"]["polygon_count"], 0);
    assert_eq!(obj_groups(artifacts.obj.as_ref().unwrap()), ["BLDG_SHORT"]);
}

#[test]
fn test_repeated_ids_are_merged() {
    let gml = document(&[
        building("BLDG_DUP", &surface("RoofSurface", "ROOF_D", ROOF)),
        building("BLDG_OTHER", &surface("WallSurface", "WALL_O", WALL)),
        building("BLDG_DUP", &surface("WallSurface", "WALL_D", WALL)),
    ]);
    let (result, artifacts) = convert_in_memory(&gml, &ConvertOptions::default());

    assert_eq!(result.total_objects, 2);
    let meta = metadata(&artifacts);
    assert_eq!(meta["objects"]["BLDG_DUP"]["polygon_count"], 2);
    assert_eq!(obj_groups(artifacts.obj.as_ref().unwrap()), ["BLDG_DUP", "BLDG_OTHER"]);
}

#[test]
fn test_count_only_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let options = ConvertOptions {
        mode: ConversionMode::CountOnly,
        ..Default::default()
    };
    let result = convert(
        Source::Bytes(district().as_bytes()),
        &OutputTargets::directory(dir.path(), "district"),
        &options,
    )
    .unwrap();

    assert_eq!(result.total_objects, 3);
    assert_eq!(result.total_polygons, 4);
    assert_eq!(result.surface_counts[&ElementType::GroundSurface], 1);
    assert!(matches!(result.artifacts, Artifacts::None));
    assert!(dir_entries(dir.path()).is_empty());
}

#[test]
fn test_cancelled_conversion_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let options = ConvertOptions::default();
    options.cancel.cancel();

    let err = convert(
        Source::Bytes(district().as_bytes()),
        &OutputTargets::directory(dir.path(), "district"),
        &options,
    )
    .unwrap_err();

    assert!(err.is_cancelled());
    assert!(dir_entries(dir.path()).is_empty());
}

#[test]
fn test_convert_from_path() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("city.gml");
    std::fs::write(&input, roof_and_wall()).unwrap();

    let result = convert(
        Source::Path(input),
        &OutputTargets::memory(),
        &ConvertOptions::default(),
    )
    .unwrap();
    assert_eq!(result.total_objects, 1);
    assert_eq!(result.total_triangles, 4);
}
