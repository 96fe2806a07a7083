// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared scene fixture for exporter unit tests

use citygml_lite_core::{parse_bytes, summarize, CityModel, SemanticSummary};
use citygml_lite_geometry::{build_geometry, GeometryOptions, GeometryOutput};

pub const TWO_BUILDINGS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<core:CityModel xmlns:core="http://www.opengis.net/citygml/2.0"
    xmlns:bldg="http://www.opengis.net/citygml/building/2.0"
    xmlns:gml="http://www.opengis.net/gml">
  <core:cityObjectMember>
    <bldg:Building gml:id="BLDG_0001">
      <gml:description>Corner house</gml:description>
      <bldg:measuredHeight uom="m">10.0</bldg:measuredHeight>
      <bldg:storeysAboveGround>3</bldg:storeysAboveGround>
      <bldg:boundedBy>
        <bldg:RoofSurface gml:id="ROOF_0001">
          <bldg:lod2MultiSurface><gml:MultiSurface><gml:surfaceMember><gml:Polygon>
            <gml:exterior><gml:LinearRing>
              <gml:posList srsDimension="3">691000 5336000 10 691010 5336000 10 691010 5336010 10 691000 5336010 10 691000 5336000 10</gml:posList>
            </gml:LinearRing></gml:exterior>
          </gml:Polygon></gml:surfaceMember></gml:MultiSurface></bldg:lod2MultiSurface>
        </bldg:RoofSurface>
      </bldg:boundedBy>
      <bldg:boundedBy>
        <bldg:WallSurface gml:id="WALL_0001">
          <bldg:lod2MultiSurface><gml:MultiSurface><gml:surfaceMember><gml:Polygon>
            <gml:exterior><gml:LinearRing>
              <gml:posList srsDimension="3">691000 5336000 0 691010 5336000 0 691010 5336000 10 691000 5336000 10 691000 5336000 0</gml:posList>
            </gml:LinearRing></gml:exterior>
          </gml:Polygon></gml:surfaceMember></gml:MultiSurface></bldg:lod2MultiSurface>
        </bldg:WallSurface>
      </bldg:boundedBy>
    </bldg:Building>
  </core:cityObjectMember>
  <core:cityObjectMember>
    <bldg:Building gml:id="BLDG_0002">
      <bldg:storeysBelowGround>0</bldg:storeysBelowGround>
    </bldg:Building>
  </core:cityObjectMember>
</core:CityModel>"#;

pub struct Fixture {
    pub model: CityModel,
    pub geometry: GeometryOutput,
    pub summaries: Vec<SemanticSummary>,
}

pub fn fixture() -> Fixture {
    let model = parse_bytes(TWO_BUILDINGS.as_bytes()).expect("fixture parses");
    let geometry =
        build_geometry(&model.objects, &GeometryOptions::default(), || false).expect("fixture meshes");
    let summaries = model.objects.iter().map(summarize).collect();
    Fixture {
        model,
        geometry,
        summaries,
    }
}
